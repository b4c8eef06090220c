// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 任务仓库（job_repository）：采集任务的持久化与崩溃恢复查询
/// - 快照仓库（snapshot_repository）：按内容哈希去重的事务性快照存储
/// - 请求日志仓库（request_log_repository）：限流器的请求审计日志
pub mod job_repository;
pub mod request_log_repository;
pub mod snapshot_repository;

use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}
