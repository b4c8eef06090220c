// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use ladderwatch::config::settings::{
    CollectionSettings, DatabaseSettings, RateLimitingSettings, ResourceLimits, SchedulerSettings,
};
use ladderwatch::domain::models::character::{EnhancedProfile, ProfileOutcome};
use ladderwatch::domain::models::job::{CollectionJob, CollectionMode};
use ladderwatch::domain::models::league::LeagueInfo;
use ladderwatch::domain::repositories::job_repository::JobRepository;
use ladderwatch::domain::repositories::snapshot_repository::SnapshotRepository;
use ladderwatch::domain::services::build_categorizer::KeywordBuildCategorizer;
use ladderwatch::domain::services::collection_service::CollectionOrchestrator;
use ladderwatch::domain::services::ladder_client::{FetchError, LadderClient};
use ladderwatch::domain::services::rate_limiting_service::RateLimitManager;
use ladderwatch::infrastructure::database::connection;
use ladderwatch::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use ladderwatch::infrastructure::repositories::request_log_repo_impl::RequestLogRepositoryImpl;
use ladderwatch::infrastructure::repositories::snapshot_repo_impl::SnapshotRepositoryImpl;
use ladderwatch::queue::scheduler::TaskScheduler;
use ladderwatch::queue::task_queue::InMemoryJobQueue;
use ladderwatch::utils::shutdown::{SharedShutdown, ShutdownSignal};
use ladderwatch::workers::CollectionJobRunner;
use parking_lot::Mutex;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// 基于临时文件的测试数据库，TempDir 必须与连接同生命周期
pub struct TestDb {
    pub db: Arc<DatabaseConnection>,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ladderwatch-test.db");
    let settings = DatabaseSettings {
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections: Some(4),
        min_connections: Some(1),
        connect_timeout: Some(10),
        idle_timeout: None,
    };

    let db = connection::connect_and_migrate(&settings)
        .await
        .expect("migrations should apply");
    TestDb {
        db: Arc::new(db),
        _dir: dir,
    }
}

/// 不产生任何等待的限流配置
pub fn fast_limits() -> RateLimitingSettings {
    let mut settings = RateLimitingSettings {
        enable_jitter: false,
        ..Default::default()
    };
    for class in ["ladder", "profile-enhancement", "ninja"] {
        settings.resources.insert(
            class.to_string(),
            ResourceLimits::new(1000, 10_000, 100_000, 0.0, 0.0),
        );
    }
    settings
}

pub fn collection_settings(leagues: &[&str]) -> CollectionSettings {
    CollectionSettings {
        mode: CollectionMode::Conservative,
        leagues: leagues.iter().map(|l| l.to_string()).collect(),
        ..Default::default()
    }
}

/// 构造天梯条目
pub fn ladder_entries(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "rank": i + 1,
                "character": {
                    "name": format!("{}Char{}", prefix, i),
                    "level": 100 - i as i32,
                    "class": if i % 2 == 0 { "Necromancer" } else { "Juggernaut" },
                },
                "account": { "name": format!("{}Account{}", prefix, i) }
            })
        })
        .collect()
}

/// 可编程的天梯客户端
#[derive(Default)]
pub struct FakeLadderClient {
    ladders: Mutex<HashMap<String, Vec<Value>>>,
    failing: Mutex<Vec<String>>,
    private_accounts: Mutex<Vec<String>>,
    leagues: Mutex<Vec<LeagueInfo>>,
    pub ladder_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
}

impl FakeLadderClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ladder(self, league: &str, entries: Vec<Value>) -> Self {
        self.ladders.lock().insert(league.to_string(), entries);
        self
    }

    pub fn with_failure(self, league: &str) -> Self {
        self.failing.lock().push(league.to_string());
        self
    }

    pub fn with_private(self, account: &str) -> Self {
        self.private_accounts.lock().push(account.to_string());
        self
    }

    pub fn with_leagues(self, leagues: Vec<LeagueInfo>) -> Self {
        *self.leagues.lock() = leagues;
        self
    }

    pub fn set_ladder(&self, league: &str, entries: Vec<Value>) {
        self.ladders.lock().insert(league.to_string(), entries);
    }
}

#[async_trait]
impl LadderClient for FakeLadderClient {
    async fn fetch_ladder_page(
        &self,
        league: &str,
        _ladder_type: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Value>, FetchError> {
        self.ladder_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().iter().any(|l| l == league) {
            return Err(FetchError::Status(503));
        }

        let ladders = self.ladders.lock();
        let entries = ladders.get(league).cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn fetch_character_profile(
        &self,
        account: &str,
        _name: &str,
    ) -> Result<ProfileOutcome, FetchError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.private_accounts.lock().iter().any(|a| a == account) {
            return Ok(ProfileOutcome::Private);
        }

        Ok(ProfileOutcome::Public(EnhancedProfile {
            skills: vec!["Righteous Fire".to_string(), "Vaal Righteous Fire".to_string()],
            uniques: vec!["Kaom's Heart".to_string()],
            main_skill: Some("Righteous Fire".to_string()),
            life: Some(7200),
            energy_shield: Some(0),
        }))
    }

    async fn fetch_leagues(&self) -> Result<Vec<LeagueInfo>, FetchError> {
        Ok(self.leagues.lock().clone())
    }
}

/// 测试用的完整采集栈
pub struct Harness {
    pub test_db: TestDb,
    pub client: Arc<FakeLadderClient>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub limiter: Arc<RateLimitManager>,
    pub orchestrator: Arc<CollectionOrchestrator>,
    pub shutdown: SharedShutdown,
}

impl Harness {
    pub async fn new(client: FakeLadderClient, settings: CollectionSettings) -> Self {
        let test_db = test_db().await;
        let db = test_db.db.clone();
        let client = Arc::new(client);
        let shutdown = ShutdownSignal::shared();

        let limiter = Arc::new(
            RateLimitManager::new(&fast_limits())
                .with_request_log(Arc::new(RequestLogRepositoryImpl::new(db.clone()))),
        );
        let snapshots: Arc<dyn SnapshotRepository> =
            Arc::new(SnapshotRepositoryImpl::new(db.clone()));
        let jobs: Arc<dyn JobRepository> = Arc::new(JobRepositoryImpl::new(db.clone()));

        let orchestrator = Arc::new(CollectionOrchestrator::new(
            client.clone(),
            snapshots.clone(),
            limiter.clone(),
            Arc::new(KeywordBuildCategorizer::new()),
            settings,
            shutdown.clone(),
        ));

        Self {
            test_db,
            client,
            snapshots,
            jobs,
            limiter,
            orchestrator,
            shutdown,
        }
    }

    pub fn db(&self) -> Arc<DatabaseConnection> {
        self.test_db.db.clone()
    }

    pub fn scheduler(&self) -> TaskScheduler {
        let settings = SchedulerSettings {
            dequeue_timeout_ms: 20,
            ..Default::default()
        };
        TaskScheduler::new(
            Arc::new(InMemoryJobQueue::new()),
            self.jobs.clone(),
            Arc::new(CollectionJobRunner::new(self.orchestrator.clone())),
            settings,
            self.shutdown.clone(),
        )
    }
}

/// 轮询直到任务进入终态
pub async fn wait_for_terminal(scheduler: &TaskScheduler, job_id: Uuid) -> CollectionJob {
    for _ in 0..500 {
        if let Some(job) = scheduler.get_status(job_id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not reach a terminal state", job_id);
}
