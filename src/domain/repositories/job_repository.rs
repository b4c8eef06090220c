// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::CollectionJob;
use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 采集任务仓库特质
///
/// 任务状态的持久化副本，用于进程重启后的恢复
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 插入或覆盖任务
    async fn upsert(&self, job: &CollectionJob) -> Result<(), RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, job_id: Uuid) -> Result<Option<CollectionJob>, RepositoryError>;
    /// 查找所有未结束（Pending 或 Running）的任务，按创建时间升序
    async fn find_unfinished(&self) -> Result<Vec<CollectionJob>, RepositoryError>;
    /// 按创建时间倒序列出最近的任务
    async fn list_recent(&self, limit: u64) -> Result<Vec<CollectionJob>, RepositoryError>;
}
