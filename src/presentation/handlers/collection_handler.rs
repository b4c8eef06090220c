// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{CollectionJob, CollectionMode, DomainError, JobSpec};
use crate::domain::repositories::RepositoryError;
use crate::presentation::errors::AppError;
use crate::queue::scheduler::TaskScheduler;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// 提交采集任务的请求体
#[derive(Debug, Default, Deserialize)]
pub struct SubmitCollectionRequest {
    pub leagues: Option<Vec<String>>,
    pub enhance_profiles: Option<bool>,
    pub categorize_builds: Option<bool>,
    pub mode: Option<CollectionMode>,
}

impl SubmitCollectionRequest {
    fn into_spec(self) -> Result<JobSpec, DomainError> {
        if let Some(leagues) = &self.leagues {
            if leagues.iter().any(|l| l.trim().is_empty()) {
                return Err(DomainError::Validation(
                    "league names cannot be empty".to_string(),
                ));
            }
        }

        let defaults = JobSpec::default();
        Ok(JobSpec {
            leagues: self.leagues,
            enhance_profiles: self.enhance_profiles.unwrap_or(defaults.enhance_profiles),
            categorize_builds: self.categorize_builds.unwrap_or(defaults.categorize_builds),
            mode: self.mode.unwrap_or(defaults.mode),
        })
    }
}

/// 任务响应，附带进度百分比
#[derive(Debug, Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: CollectionJob,
    pub progress_percent: f64,
}

impl From<CollectionJob> for JobResponse {
    fn from(job: CollectionJob) -> Self {
        let progress_percent = job.progress_percent();
        Self {
            job,
            progress_percent,
        }
    }
}

/// 提交采集任务
///
/// 立即返回 202 与任务ID，实际采集在后台工作器中执行
pub async fn submit_collection(
    Extension(scheduler): Extension<TaskScheduler>,
    Json(payload): Json<SubmitCollectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let spec = payload.into_spec()?;
    let job_id = scheduler.submit(spec).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "job_id": job_id }))))
}

/// 列出全部任务，按创建时间倒序
pub async fn list_collections(
    Extension(scheduler): Extension<TaskScheduler>,
) -> Json<Vec<JobResponse>> {
    Json(
        scheduler
            .list_all()
            .into_iter()
            .map(JobResponse::from)
            .collect(),
    )
}

/// 当前正在执行的任务
pub async fn get_active_collection(
    Extension(scheduler): Extension<TaskScheduler>,
) -> Json<Option<JobResponse>> {
    Json(scheduler.get_active().map(JobResponse::from))
}

pub async fn get_collection(
    Extension(scheduler): Extension<TaskScheduler>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let job = scheduler.get_status(id).ok_or(RepositoryError::NotFound)?;
    Ok(Json(job.into()))
}

/// 取消任务
///
/// # 返回值
///
/// * `200` - 已取消
/// * `404` - 任务不存在
/// * `409` - 任务已开始或已结束
pub async fn cancel_collection(
    Extension(scheduler): Extension<TaskScheduler>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let job = scheduler.get_status(id).ok_or(RepositoryError::NotFound)?;

    if scheduler.cancel(id).await? {
        return Ok((StatusCode::OK, Json(json!({ "cancelled": true }))));
    }

    Ok((
        StatusCode::CONFLICT,
        Json(json!({
            "cancelled": false,
            "error": format!("job is {}, only pending jobs can be cancelled", job.status),
        })),
    ))
}
