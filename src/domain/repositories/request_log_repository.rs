// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 请求审计日志条目
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestLogEntry {
    pub api_type: String,
    pub endpoint: Option<String>,
    pub success: bool,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub league: Option<String>,
    pub character_name: Option<String>,
    pub account_name: Option<String>,
}

/// 请求日志仓库特质
///
/// 仅用于观测，限流器本身不会回读
#[async_trait]
pub trait RequestLogRepository: Send + Sync {
    /// 追加一条日志
    async fn record(&self, entry: &RequestLogEntry) -> Result<(), RepositoryError>;
    /// 统计某类请求在指定时间之后的条数
    async fn count_since(
        &self,
        api_type: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}
