// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::character::ProfileOutcome;
use crate::domain::models::league::LeagueInfo;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 天梯 API 单页最大条目数
pub const MAX_PAGE_SIZE: u32 = 200;

/// 外部抓取错误
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),
}

/// 天梯数据抓取客户端
///
/// 只负责 I/O，限流与审计由调用方负责
#[async_trait]
pub trait LadderClient: Send + Sync {
    /// 获取一页原始天梯条目
    ///
    /// # 参数
    ///
    /// * `league` - 联赛ID
    /// * `ladder_type` - 天梯类型（`league` 或 `delve-solo`）
    /// * `offset` - 起始位置（从 0 开始）
    /// * `limit` - 条目数，最大 200
    async fn fetch_ladder_page(
        &self,
        league: &str,
        ladder_type: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Value>, FetchError>;

    /// 获取角色档案，私有档案返回 `ProfileOutcome::Private`
    async fn fetch_character_profile(
        &self,
        account: &str,
        name: &str,
    ) -> Result<ProfileOutcome, FetchError>;

    /// 获取当前联赛列表
    async fn fetch_leagues(&self) -> Result<Vec<LeagueInfo>, FetchError>;
}
