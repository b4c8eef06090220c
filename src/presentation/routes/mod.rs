// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::{collection_handler, rate_limit_handler, snapshot_handler};
use axum::{routing::get, Router};

/// 创建应用路由
///
/// 依赖通过 `Extension` 层注入：`TaskScheduler`、`Arc<RateLimitManager>`
/// 与 `Arc<dyn SnapshotRepository>`
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        .route(
            "/v1/collections",
            get(collection_handler::list_collections).post(collection_handler::submit_collection),
        )
        .route(
            "/v1/collections/active",
            get(collection_handler::get_active_collection),
        )
        .route(
            "/v1/collections/{id}",
            get(collection_handler::get_collection).delete(collection_handler::cancel_collection),
        )
        .route("/v1/rate-limits", get(rate_limit_handler::get_rate_limits))
        .route(
            "/v1/snapshots/{league}/latest",
            get(snapshot_handler::get_latest_snapshot),
        );

    Router::new().merge(public_routes).merge(api_routes)
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
