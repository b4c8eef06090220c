// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::rate_limiting_service::{RateLimitManager, ResourceStatus};
use axum::{extract::Extension, Json};
use std::sync::Arc;

/// 各资源类别的限流状态
pub async fn get_rate_limits(
    Extension(limiter): Extension<Arc<RateLimitManager>>,
) -> Json<Vec<ResourceStatus>> {
    Json(limiter.status())
}
