// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::character::{BuildCategories, EnhancedProfile, StoredCharacter};
use crate::domain::models::league::LeagueMeta;
use crate::domain::models::snapshot::{SaveOutcome, Snapshot, SnapshotMetrics};
use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// 快照仓库特质
///
/// 以 (league, ladder_type, content_hash) 去重的事务性快照存储
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// 保存一次采集结果
    ///
    /// 相同内容已存在时直接返回已有快照ID且不写入任何数据；
    /// 否则在单个事务中写入快照、角色与聚合指标
    async fn save(
        &self,
        raw_payload: &Value,
        league: &str,
        ladder_type: &str,
        meta: &LeagueMeta,
    ) -> Result<SaveOutcome, RepositoryError>;

    /// 最新快照
    async fn latest(
        &self,
        league: &str,
        ladder_type: &str,
    ) -> Result<Option<Snapshot>, RepositoryError>;

    /// 根据ID查找快照
    async fn find_by_id(&self, snapshot_id: i32) -> Result<Option<Snapshot>, RepositoryError>;

    /// 快照的全部角色，按名次升序
    async fn characters(&self, snapshot_id: i32) -> Result<Vec<StoredCharacter>, RepositoryError>;

    /// 快照的聚合指标
    async fn metrics(&self, snapshot_id: i32) -> Result<Option<SnapshotMetrics>, RepositoryError>;

    /// 写入档案增强数据
    async fn apply_enhancement(
        &self,
        character_id: i32,
        profile: &EnhancedProfile,
    ) -> Result<(), RepositoryError>;

    /// 标记角色档案为私有
    async fn mark_private(&self, character_id: i32) -> Result<(), RepositoryError>;

    /// 写入构筑分类结果
    async fn apply_categories(
        &self,
        character_id: i32,
        categories: &BuildCategories,
    ) -> Result<(), RepositoryError>;

    /// 根据当前角色记录重新计算聚合指标
    async fn refresh_metrics(&self, snapshot_id: i32) -> Result<SnapshotMetrics, RepositoryError>;

    /// 删除早于指定时间的快照，返回删除数量
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}
