// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::settings::CollectionSettings;
use crate::domain::models::character::ProfileOutcome;
use crate::domain::models::job::CollectionMode;
use crate::domain::models::league::{ChallengeLeagues, LeagueMeta};
use crate::domain::repositories::snapshot_repository::SnapshotRepository;
use crate::domain::repositories::RepositoryError;
use crate::domain::services::build_categorizer::BuildCategorizer;
use crate::domain::services::ladder_client::{FetchError, LadderClient, MAX_PAGE_SIZE};
use crate::domain::services::league_classifier;
use crate::domain::services::rate_limiting_service::{
    RateLimitManager, RateLimitingError, RequestMeta,
};
use crate::utils::shutdown::SharedShutdown;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// 天梯抓取使用的限流类别
pub const LADDER_RESOURCE: &str = "ladder";
/// 档案增强使用的限流类别
pub const PROFILE_RESOURCE: &str = "profile-enhancement";
/// 任务默认采集的天梯类型
pub const PRIMARY_LADDER_TYPE: &str = "league";

/// 采集错误类型
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Rate limited: {0}")]
    RateLimited(#[from] RateLimitingError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("No ladder entries returned for {0}")]
    Empty(String),
}

/// 单次联赛采集的选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobOptions {
    pub enhance_profiles: bool,
    pub categorize_builds: bool,
    pub mode: CollectionMode,
}

impl JobOptions {
    pub fn for_mode(mode: CollectionMode) -> Self {
        Self {
            enhance_profiles: true,
            categorize_builds: true,
            mode,
        }
    }
}

/// 单次联赛采集的结果
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LeagueOutcome {
    pub snapshot_id: i32,
    pub created: bool,
    pub characters: i32,
    pub enhanced: i32,
    pub skipped_private: i32,
    pub categorized: i32,
    /// 快照保存之后的步骤失败时的告警
    pub warnings: Vec<String>,
}

impl LeagueOutcome {
    fn post_save_failure(&mut self, league: &str, step: &str, error: CollectionError) {
        warn!(league, step, "Post-save step failed: {}", error);
        self.warnings.push(format!(
            "Failed to complete {} for league: {} ({})",
            step, league, error
        ));
    }
}

/// 采集编排器
///
/// 决定哪些联赛需要新快照，并驱动抓取、转换、分类、持久化、
/// 档案增强与构筑分类。每次外部请求之前都会先询问限流器
pub struct CollectionOrchestrator {
    client: Arc<dyn LadderClient>,
    snapshots: Arc<dyn SnapshotRepository>,
    limiter: Arc<RateLimitManager>,
    categorizer: Arc<dyn BuildCategorizer>,
    settings: CollectionSettings,
    discovered: RwLock<Option<ChallengeLeagues>>,
    shutdown: SharedShutdown,
}

impl CollectionOrchestrator {
    /// 创建采集编排器
    ///
    /// # 参数
    ///
    /// * `client` - 天梯 API 客户端
    /// * `snapshots` - 快照仓库
    /// * `limiter` - 速率限制管理器
    /// * `categorizer` - 构筑分类器
    /// * `settings` - 采集配置
    /// * `shutdown` - 关闭信号，联赛之间检查
    pub fn new(
        client: Arc<dyn LadderClient>,
        snapshots: Arc<dyn SnapshotRepository>,
        limiter: Arc<RateLimitManager>,
        categorizer: Arc<dyn BuildCategorizer>,
        settings: CollectionSettings,
        shutdown: SharedShutdown,
    ) -> Self {
        Self {
            client,
            snapshots,
            limiter,
            categorizer,
            settings,
            discovered: RwLock::new(None),
            shutdown,
        }
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &Arc<RateLimitManager> {
        &self.limiter
    }

    pub fn snapshots(&self) -> &Arc<dyn SnapshotRepository> {
        &self.snapshots
    }

    /// 判断是否需要新的快照
    ///
    /// 没有快照，或最新快照的年龄严格大于阈值时返回 true
    pub async fn needs_snapshot(
        &self,
        league: &str,
        ladder_type: &str,
        threshold_hours: f64,
    ) -> Result<bool, CollectionError> {
        let Some(latest) = self.snapshots.latest(league, ladder_type).await? else {
            return Ok(true);
        };

        let threshold = ChronoDuration::milliseconds((threshold_hours * 3_600_000.0) as i64);
        let age = Utc::now() - latest.snapshot_date;
        Ok(age > threshold)
    }

    /// 使用配置中的新鲜度阈值判断
    pub async fn is_due(&self, league: &str, ladder_type: &str) -> Result<bool, CollectionError> {
        self.needs_snapshot(league, ladder_type, self.settings.freshness_threshold_hours)
            .await
    }

    /// 当前监控的联赛，只读取缓存，不做网络请求
    pub fn monitored_leagues(&self) -> Vec<String> {
        let discovered = self.discovered.read();
        league_classifier::monitored_leagues(
            &self.settings.leagues,
            discovered.as_ref().unwrap_or(&ChallengeLeagues::default()),
        )
    }

    /// 重新发现挑战联赛并更新缓存
    pub async fn refresh_leagues(&self) -> Result<ChallengeLeagues, CollectionError> {
        self.limiter.acquire(LADDER_RESOURCE).await?;

        let started = Instant::now();
        let result = self.client.fetch_leagues().await;
        self.record(
            LADDER_RESOURCE,
            result.is_ok(),
            RequestMeta {
                endpoint: Some("leagues".to_string()),
                response_time_ms: Some(started.elapsed().as_millis() as i64),
                error_message: result.as_ref().err().map(|e| e.to_string()),
                ..Default::default()
            },
        )
        .await;

        let found = league_classifier::discover_challenge_leagues(&result?);
        if found.base.is_none() {
            warn!("Could not find base challenge league");
        } else {
            info!(
                base = ?found.base,
                variants = ?found.league_ids(),
                "Discovered challenge leagues"
            );
        }

        *self.discovered.write() = Some(found.clone());
        Ok(found)
    }

    /// 联赛分类，优先使用发现缓存
    pub fn classify(&self, league: &str) -> LeagueMeta {
        league_classifier::classify_league(league, self.discovered.read().as_ref())
    }

    async fn record(&self, class: &str, success: bool, meta: RequestMeta) {
        if let Err(e) = self.limiter.record_request(class, success, meta).await {
            warn!(resource = class, "Failed to record request: {}", e);
        }
    }

    /// 分页抓取天梯，直到达到上限或某页条目不足
    pub async fn fetch_ladder(
        &self,
        league: &str,
        ladder_type: &str,
        max_entries: usize,
    ) -> Result<Vec<Value>, CollectionError> {
        let mut entries: Vec<Value> = Vec::new();

        while entries.len() < max_entries {
            let limit = (max_entries - entries.len()).min(MAX_PAGE_SIZE as usize) as u32;
            let offset = entries.len() as u32;

            self.limiter.acquire(LADDER_RESOURCE).await?;

            let started = Instant::now();
            let result = self
                .client
                .fetch_ladder_page(league, ladder_type, offset, limit)
                .await;
            self.record(
                LADDER_RESOURCE,
                result.is_ok(),
                RequestMeta {
                    endpoint: Some(format!("ladders/{}", league)),
                    response_time_ms: Some(started.elapsed().as_millis() as i64),
                    error_message: result.as_ref().err().map(|e| e.to_string()),
                    league: Some(league.to_string()),
                    ..Default::default()
                },
            )
            .await;

            let page = result?;
            let received = page.len();
            debug!(league, ladder_type, offset, received, "Fetched ladder page");
            entries.extend(page);

            if received < limit as usize {
                break;
            }
        }

        entries.truncate(max_entries);
        Ok(entries)
    }

    /// 采集单个联赛的单个天梯
    ///
    /// 抓取、分类、保存快照；新建快照时继续进行档案增强与构筑分类
    #[instrument(skip(self, options), fields(mode = %options.mode))]
    pub async fn collect_league(
        &self,
        league: &str,
        ladder_type: &str,
        options: &JobOptions,
    ) -> Result<LeagueOutcome, CollectionError> {
        let entries = self
            .fetch_ladder(league, ladder_type, options.mode.max_entries())
            .await?;
        if entries.is_empty() {
            return Err(CollectionError::Empty(format!("{}/{}", league, ladder_type)));
        }

        let meta = self.classify(league);
        let characters = entries.len() as i32;
        let raw = Value::Array(entries);
        let saved = self.snapshots.save(&raw, league, ladder_type, &meta).await?;

        let mut outcome = LeagueOutcome {
            snapshot_id: saved.snapshot_id,
            created: saved.created,
            characters,
            ..Default::default()
        };

        // The snapshot is committed; later steps only add warnings
        if !saved.created {
            info!(
                snapshot_id = saved.snapshot_id,
                "Upstream data unchanged, skipping enhancement"
            );
            if options.categorize_builds {
                match self.categorize_snapshot(saved.snapshot_id, true).await {
                    Ok(categorized) => outcome.categorized = categorized,
                    Err(e) => outcome.post_save_failure(league, "categorization", e),
                }
            }
            return Ok(outcome);
        }

        if options.enhance_profiles {
            match self
                .enhance_profiles(league, saved.snapshot_id, &meta, options.mode)
                .await
            {
                Ok((enhanced, skipped)) => {
                    outcome.enhanced = enhanced;
                    outcome.skipped_private = skipped;
                }
                Err(e) => outcome.post_save_failure(league, "enhancement", e),
            }
            if outcome.enhanced > 0 {
                if let Err(e) = self.snapshots.refresh_metrics(saved.snapshot_id).await {
                    outcome.post_save_failure(league, "metrics refresh", e.into());
                }
            }
        }

        if options.categorize_builds {
            match self.categorize_snapshot(saved.snapshot_id, false).await {
                Ok(categorized) => outcome.categorized = categorized,
                Err(e) => outcome.post_save_failure(league, "categorization", e),
            }
        }

        info!(
            snapshot_id = outcome.snapshot_id,
            characters = outcome.characters,
            enhanced = outcome.enhanced,
            categorized = outcome.categorized,
            warnings = outcome.warnings.len(),
            "League collected"
        );
        Ok(outcome)
    }

    /// 本次可增强的角色数：`max(1, floor(base * multiplier))`
    pub fn enhancement_budget(meta: &LeagueMeta, mode: CollectionMode, available: usize) -> usize {
        let base = meta.enhancement_base_attempts() as f64;
        let k = ((base * mode.enhancement_multiplier()).floor() as usize).max(1);
        k.min(available)
    }

    async fn enhance_profiles(
        &self,
        league: &str,
        snapshot_id: i32,
        meta: &LeagueMeta,
        mode: CollectionMode,
    ) -> Result<(i32, i32), CollectionError> {
        let characters = self.snapshots.characters(snapshot_id).await?;
        let budget = Self::enhancement_budget(meta, mode, characters.len());
        let mut enhanced = 0;
        let mut skipped = 0;

        for character in characters.iter().take(budget) {
            if self.shutdown.is_requested() {
                info!("Shutdown requested, stopping enhancement");
                break;
            }
            if !self.limiter.wait_for_request(PROFILE_RESOURCE).await? {
                warn!(league, "Profile budget exhausted, stopping enhancement");
                break;
            }

            let record = &character.record;
            let started = Instant::now();
            let result = self
                .client
                .fetch_character_profile(&record.account, &record.name)
                .await;
            self.record(
                PROFILE_RESOURCE,
                result.is_ok(),
                RequestMeta {
                    endpoint: Some("character-window/get-items".to_string()),
                    response_time_ms: Some(started.elapsed().as_millis() as i64),
                    error_message: result.as_ref().err().map(|e| e.to_string()),
                    league: Some(league.to_string()),
                    character_name: Some(record.name.clone()),
                    account_name: Some(record.account.clone()),
                },
            )
            .await;

            match result {
                Ok(ProfileOutcome::Public(profile)) => {
                    self.snapshots
                        .apply_enhancement(character.id, &profile)
                        .await?;
                    enhanced += 1;
                }
                Ok(ProfileOutcome::Private) => {
                    self.snapshots.mark_private(character.id).await?;
                    skipped += 1;
                }
                Err(e) => {
                    debug!(character = %record.name, "Profile fetch failed: {}", e);
                    skipped += 1;
                }
            }
        }

        Ok((enhanced, skipped))
    }

    async fn categorize_snapshot(
        &self,
        snapshot_id: i32,
        only_missing: bool,
    ) -> Result<i32, CollectionError> {
        let characters = self.snapshots.characters(snapshot_id).await?;
        let mut categorized = 0;

        for character in characters
            .iter()
            .filter(|c| !only_missing || c.categorized_at.is_none())
        {
            let categories = self.categorizer.categorize(character);
            self.snapshots
                .apply_categories(character.id, &categories)
                .await?;
            categorized += 1;
        }

        Ok(categorized)
    }

    /// 采集所有到期的监控目标
    ///
    /// 返回 联赛 → 天梯类型 → 是否成功；仍然新鲜的目标记为成功
    pub async fn collect_if_needed(
        &self,
    ) -> Result<BTreeMap<String, BTreeMap<String, bool>>, CollectionError> {
        let needs_discovery = self.settings.leagues.is_empty() && self.discovered.read().is_none();
        if needs_discovery {
            if let Err(e) = self.refresh_leagues().await {
                warn!("League discovery failed: {}", e);
            }
        }

        let options = JobOptions::for_mode(self.settings.mode);
        let mut results: BTreeMap<String, BTreeMap<String, bool>> = BTreeMap::new();

        for league in self.monitored_leagues() {
            if self.shutdown.is_requested() {
                info!("Shutdown requested, stopping collection");
                break;
            }

            let per_type = results.entry(league.clone()).or_default();
            for ladder_type in &self.settings.ladder_types {
                // An unknown freshness counts as due
                let due = match self.is_due(&league, ladder_type).await {
                    Ok(due) => due,
                    Err(e) => {
                        warn!(
                            %league,
                            %ladder_type,
                            "Freshness check failed, collecting anyway: {}",
                            e
                        );
                        true
                    }
                };
                if !due {
                    debug!(%league, %ladder_type, "Snapshot is fresh");
                    per_type.insert(ladder_type.clone(), true);
                    continue;
                }

                let ok = match self.collect_league(&league, ladder_type, &options).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(%league, %ladder_type, "Collection failed: {}", e);
                        false
                    }
                };
                per_type.insert(ladder_type.clone(), ok);
            }
        }

        Ok(results)
    }

    /// 监控目标中需要新快照的联赛
    pub async fn due_leagues(&self) -> Result<Vec<String>, CollectionError> {
        let mut due = Vec::new();
        for league in self.monitored_leagues() {
            for ladder_type in &self.settings.ladder_types {
                if self.is_due(&league, ladder_type).await? {
                    due.push(league.clone());
                    break;
                }
            }
        }
        Ok(due)
    }

    /// 删除超过保留期的快照
    pub async fn cleanup_old_snapshots(&self) -> Result<u64, CollectionError> {
        self.cleanup_older_than(self.settings.retention_days).await
    }

    pub async fn cleanup_older_than(&self, days: i64) -> Result<u64, CollectionError> {
        let cutoff = Utc::now() - ChronoDuration::days(days);
        let deleted = self.snapshots.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, days, "Removed expired snapshots");
        }
        Ok(deleted)
    }
}
