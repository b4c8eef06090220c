// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::{Snapshot, SnapshotMetrics};
use crate::domain::repositories::snapshot_repository::SnapshotRepository;
use crate::domain::repositories::RepositoryError;
use crate::domain::services::collection_service::PRIMARY_LADDER_TYPE;
use crate::presentation::errors::AppError;
use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct LatestSnapshotQuery {
    pub ladder_type: Option<String>,
}

/// 最新快照摘要
#[derive(Debug, Serialize)]
pub struct LatestSnapshotResponse {
    pub snapshot: Snapshot,
    pub metrics: Option<SnapshotMetrics>,
}

/// 获取联赛的最新快照及其指标
///
/// # 参数
///
/// * `league` - 联赛名称
/// * `ladder_type` - 天梯类型，默认 `league`
pub async fn get_latest_snapshot(
    Extension(snapshots): Extension<Arc<dyn SnapshotRepository>>,
    Path(league): Path<String>,
    Query(query): Query<LatestSnapshotQuery>,
) -> Result<Json<LatestSnapshotResponse>, AppError> {
    let ladder_type = query
        .ladder_type
        .unwrap_or_else(|| PRIMARY_LADDER_TYPE.to_string());

    let snapshot = snapshots
        .latest(&league, &ladder_type)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    let metrics = snapshots.metrics(snapshot.id).await?;

    Ok(Json(LatestSnapshotResponse { snapshot, metrics }))
}
