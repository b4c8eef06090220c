// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    collection_settings, fast_limits, ladder_entries, test_db, FakeLadderClient, Harness,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ladderwatch::domain::models::character::{BuildCategories, EnhancedProfile, StoredCharacter};
use ladderwatch::domain::models::league::{LeagueMeta, LeagueVariant};
use ladderwatch::domain::models::snapshot::{SaveOutcome, Snapshot, SnapshotMetrics};
use ladderwatch::domain::repositories::request_log_repository::RequestLogRepository;
use ladderwatch::domain::repositories::snapshot_repository::SnapshotRepository;
use ladderwatch::domain::repositories::RepositoryError;
use ladderwatch::domain::services::build_categorizer::KeywordBuildCategorizer;
use ladderwatch::domain::services::collection_service::{
    CollectionOrchestrator, JobOptions, PRIMARY_LADDER_TYPE,
};
use ladderwatch::domain::services::rate_limiting_service::RateLimitManager;
use ladderwatch::infrastructure::database::entities::{character, snapshot, snapshot_metrics};
use ladderwatch::infrastructure::repositories::request_log_repo_impl::RequestLogRepositoryImpl;
use ladderwatch::infrastructure::repositories::snapshot_repo_impl::SnapshotRepositoryImpl;
use ladderwatch::utils::shutdown::ShutdownSignal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, Set};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn challenge_meta() -> LeagueMeta {
    LeagueMeta::challenge(LeagueVariant::Softcore, Some("Settlers".to_string()))
}

async fn backdate(db: &sea_orm::DatabaseConnection, snapshot_id: i32, age: Duration) {
    snapshot::ActiveModel {
        id: Set(snapshot_id),
        snapshot_date: Set((Utc::now() - age).into()),
        ..Default::default()
    }
    .update(db)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_identical_payload_is_stored_once() {
    let test_db = test_db().await;
    let repo = SnapshotRepositoryImpl::new(test_db.db.clone());
    let payload = Value::Array(ladder_entries("x", 3));

    let first = repo
        .save(&payload, "Settlers", "league", &challenge_meta())
        .await
        .unwrap();
    let second = repo
        .save(&payload, "Settlers", "league", &challenge_meta())
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.snapshot_id, second.snapshot_id);

    let db = test_db.db.as_ref();
    assert_eq!(snapshot::Entity::find().count(db).await.unwrap(), 1);
    assert_eq!(character::Entity::find().count(db).await.unwrap(), 3);
    assert_eq!(snapshot_metrics::Entity::find().count(db).await.unwrap(), 1);

    // Same content in another league is a separate snapshot
    let other = repo
        .save(&payload, "Hardcore Settlers", "league", &challenge_meta())
        .await
        .unwrap();
    assert!(other.created);
    assert_ne!(other.snapshot_id, first.snapshot_id);
}

#[tokio::test]
async fn test_save_writes_characters_and_metrics() {
    let test_db = test_db().await;
    let repo = SnapshotRepositoryImpl::new(test_db.db.clone());
    let payload = Value::Array(ladder_entries("m", 4));

    let saved = repo
        .save(&payload, "Settlers", "league", &challenge_meta())
        .await
        .unwrap();

    let stored = repo.find_by_id(saved.snapshot_id).await.unwrap().unwrap();
    assert_eq!(stored.total_characters, 4);
    assert_eq!(stored.meta, Some(challenge_meta()));
    assert_eq!(stored.content_hash.len(), 64);

    let characters = repo.characters(saved.snapshot_id).await.unwrap();
    let ranks: Vec<i32> = characters.iter().map(|c| c.record.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    assert!(characters[0]
        .profile_url
        .as_deref()
        .unwrap()
        .contains("mAccount0"));
    assert_eq!(
        characters[0].ladder_url.as_deref(),
        Some("https://www.pathofexile.com/ladders/league/Settlers")
    );

    let metrics = repo.metrics(saved.snapshot_id).await.unwrap().unwrap();
    assert_eq!(metrics.total_characters, 4);
    assert_eq!(metrics.max_level, 100);
    assert_eq!(metrics.level_100_count, 1);
    assert_eq!(metrics.class_distribution.get("Necromancer"), Some(&2));
    assert!(metrics.skill_popularity.is_empty());
}

#[tokio::test]
async fn test_enhancement_updates_feed_metrics() {
    let test_db = test_db().await;
    let repo = SnapshotRepositoryImpl::new(test_db.db.clone());
    let saved = repo
        .save(
            &Value::Array(ladder_entries("e", 2)),
            "Settlers",
            "league",
            &challenge_meta(),
        )
        .await
        .unwrap();
    let characters = repo.characters(saved.snapshot_id).await.unwrap();

    let profile = EnhancedProfile {
        skills: vec!["Cyclone".to_string()],
        uniques: vec!["Headhunter".to_string()],
        main_skill: Some("Cyclone".to_string()),
        life: Some(5000),
        energy_shield: None,
    };
    repo.apply_enhancement(characters[0].id, &profile)
        .await
        .unwrap();
    repo.mark_private(characters[1].id).await.unwrap();
    repo.apply_categories(
        characters[0].id,
        &BuildCategories {
            primary_damage_type: Some("physical".to_string()),
            skill_delivery: Some("melee".to_string()),
            cost_tier: Some("luxury".to_string()),
        },
    )
    .await
    .unwrap();

    let metrics = repo.refresh_metrics(saved.snapshot_id).await.unwrap();
    assert_eq!(metrics.skill_popularity.get("Cyclone"), Some(&1));
    assert_eq!(metrics.unique_usage.get("Headhunter"), Some(&1));

    let characters = repo.characters(saved.snapshot_id).await.unwrap();
    assert_eq!(characters[0].profile_public, Some(true));
    assert_eq!(characters[0].main_skill.as_deref(), Some("Cyclone"));
    assert_eq!(
        characters[0]
            .categories
            .as_ref()
            .and_then(|c| c.cost_tier.as_deref()),
        Some("luxury")
    );
    assert!(characters[0].categorized_at.is_some());
    assert_eq!(characters[1].profile_public, Some(false));

    assert!(repo.mark_private(i32::MAX).await.is_err());
}

#[tokio::test]
async fn test_cleanup_removes_expired_snapshots_with_children() {
    let test_db = test_db().await;
    let db = test_db.db.clone();
    let repo = SnapshotRepositoryImpl::new(db.clone());

    let old = repo
        .save(
            &Value::Array(ladder_entries("old", 2)),
            "Settlers",
            "league",
            &challenge_meta(),
        )
        .await
        .unwrap();
    let recent = repo
        .save(
            &Value::Array(ladder_entries("new", 3)),
            "Settlers",
            "league",
            &challenge_meta(),
        )
        .await
        .unwrap();
    backdate(db.as_ref(), old.snapshot_id, Duration::days(120)).await;

    let deleted = repo
        .delete_older_than(Utc::now() - Duration::days(90))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    assert!(repo.find_by_id(old.snapshot_id).await.unwrap().is_none());
    assert!(repo.characters(old.snapshot_id).await.unwrap().is_empty());
    assert!(repo.metrics(old.snapshot_id).await.unwrap().is_none());

    assert!(repo.find_by_id(recent.snapshot_id).await.unwrap().is_some());
    assert_eq!(character::Entity::find().count(db.as_ref()).await.unwrap(), 3);
    assert_eq!(
        repo.latest("Settlers", "league").await.unwrap().unwrap().id,
        recent.snapshot_id
    );
}

/// 新鲜度判定：无快照或超过阈值需要采集，阈值以内不需要
#[tokio::test]
async fn test_freshness_decision() {
    let client = FakeLadderClient::new().with_ladder("A", ladder_entries("a", 2));
    let harness = Harness::new(client, collection_settings(&["A"])).await;
    let orchestrator = &harness.orchestrator;

    assert!(orchestrator.needs_snapshot("A", "league", 23.0).await.unwrap());

    let outcome = orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &JobOptions::for_mode(Default::default()))
        .await
        .unwrap();
    assert!(outcome.created);
    assert!(!orchestrator.needs_snapshot("A", "league", 23.0).await.unwrap());

    backdate(harness.db().as_ref(), outcome.snapshot_id, Duration::hours(22)).await;
    assert!(!orchestrator.needs_snapshot("A", "league", 23.0).await.unwrap());

    backdate(harness.db().as_ref(), outcome.snapshot_id, Duration::hours(24)).await;
    assert!(orchestrator.needs_snapshot("A", "league", 23.0).await.unwrap());
    assert!(!orchestrator.needs_snapshot("A", "league", 25.0).await.unwrap());
}

#[tokio::test]
async fn test_unchanged_upstream_skips_enhancement() {
    let client = FakeLadderClient::new().with_ladder("A", ladder_entries("a", 2));
    let harness = Harness::new(client, collection_settings(&["A"])).await;
    let options = JobOptions::for_mode(Default::default());

    let first = harness
        .orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &options)
        .await
        .unwrap();
    let profile_calls = harness.client.profile_calls.load(Ordering::SeqCst);
    assert_eq!(first.enhanced, 2);

    let second = harness
        .orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &options)
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.snapshot_id, first.snapshot_id);
    assert_eq!(second.enhanced, 0);
    assert_eq!(
        harness.client.profile_calls.load(Ordering::SeqCst),
        profile_calls
    );

    harness.client.set_ladder("A", ladder_entries("b", 2));
    let third = harness
        .orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &options)
        .await
        .unwrap();
    assert!(third.created);
}

#[tokio::test]
async fn test_private_profiles_are_counted_as_skips() {
    let client = FakeLadderClient::new()
        .with_ladder("A", ladder_entries("p", 3))
        .with_private("pAccount1");
    let harness = Harness::new(client, collection_settings(&["A"])).await;

    let outcome = harness
        .orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &JobOptions::for_mode(Default::default()))
        .await
        .unwrap();

    assert_eq!(outcome.characters, 3);
    assert_eq!(outcome.enhanced, 2);
    assert_eq!(outcome.skipped_private, 1);
    assert_eq!(outcome.categorized, 3);

    let metrics = harness
        .snapshots
        .metrics(outcome.snapshot_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metrics.skill_popularity.get("Righteous Fire"), Some(&2));
}

#[tokio::test]
async fn test_collect_if_needed_reports_per_target() {
    let client = FakeLadderClient::new()
        .with_ladder("A", ladder_entries("a", 1))
        .with_failure("B");
    let harness = Harness::new(client, collection_settings(&["A", "B", "Empty"])).await;

    let results = harness.orchestrator.collect_if_needed().await.unwrap();
    assert!(results["A"]["league"]);
    assert!(!results["B"]["league"]);
    assert!(!results["Empty"]["league"]);

    // A second pass finds A fresh and does not fetch it again
    let calls = harness.client.ladder_calls.load(Ordering::SeqCst);
    let again = harness.orchestrator.collect_if_needed().await.unwrap();
    assert!(again["A"]["league"]);
    assert_eq!(harness.client.ladder_calls.load(Ordering::SeqCst), calls + 2);

    assert_eq!(
        harness.orchestrator.due_leagues().await.unwrap(),
        vec!["B".to_string(), "Empty".to_string()]
    );

    let logged = RequestLogRepositoryImpl::new(harness.db())
        .count_since("ladder", Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(logged, calls as u64 + 2);
}

#[tokio::test]
async fn test_shutdown_stops_collect_if_needed_between_leagues() {
    let client = FakeLadderClient::new().with_ladder("A", ladder_entries("a", 1));
    let harness = Harness::new(client, collection_settings(&["A"])).await;
    harness.shutdown.request();

    let results = harness.orchestrator.collect_if_needed().await.unwrap();
    assert!(results.is_empty());
    assert_eq!(harness.client.ladder_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_discovery_drives_monitored_leagues() {
    use ladderwatch::domain::models::league::{LeagueCategory, LeagueInfo, LeagueRule};

    let league = |id: &str, rules: &[&str]| LeagueInfo {
        id: id.to_string(),
        description: String::new(),
        rules: rules
            .iter()
            .map(|r| LeagueRule {
                id: r.to_string(),
                name: r.to_string(),
            })
            .collect(),
        start_at: None,
        end_at: None,
    };
    let client = FakeLadderClient::new().with_leagues(vec![
        league("Standard", &[]),
        league("Hardcore", &["Hardcore"]),
        league("Settlers", &[]),
        league("Hardcore Settlers", &["Hardcore"]),
    ]);
    let harness = Harness::new(client, collection_settings(&[])).await;

    assert_eq!(
        harness.orchestrator.monitored_leagues(),
        vec!["Standard".to_string(), "Hardcore".to_string()]
    );

    let found = harness.orchestrator.refresh_leagues().await.unwrap();
    assert_eq!(found.base.as_deref(), Some("Settlers"));
    assert_eq!(
        harness.orchestrator.monitored_leagues(),
        vec!["Standard", "Hardcore", "Settlers", "Hardcore Settlers"]
    );

    let meta = harness.orchestrator.classify("Hardcore Settlers");
    assert_eq!(meta.category, LeagueCategory::Challenge);
    assert_eq!(meta.variant, LeagueVariant::Hardcore);
}

#[tokio::test]
async fn test_failed_transaction_leaves_no_partial_snapshot() {
    let test_db = test_db().await;
    let repo = SnapshotRepositoryImpl::new(test_db.db.clone());

    // Metrics are the last insert of the transaction
    test_db
        .db
        .execute_unprepared("DROP TABLE snapshot_metrics")
        .await
        .unwrap();

    let payload = Value::Array(ladder_entries("r", 3));
    let result = repo.save(&payload, "Settlers", "league", &challenge_meta()).await;
    assert!(matches!(result, Err(RepositoryError::Database(_))));

    assert!(repo.latest("Settlers", "league").await.unwrap().is_none());
    assert_eq!(
        snapshot::Entity::find().count(test_db.db.as_ref()).await.unwrap(),
        0
    );
    assert_eq!(
        character::Entity::find().count(test_db.db.as_ref()).await.unwrap(),
        0
    );
}

/// 按开关各失败一次的快照仓库
struct FlakySnapshots {
    inner: SnapshotRepositoryImpl,
    fail_latest: AtomicBool,
    fail_categories: AtomicBool,
}

impl FlakySnapshots {
    fn new(db: Arc<sea_orm::DatabaseConnection>, fail_latest: bool, fail_categories: bool) -> Self {
        Self {
            inner: SnapshotRepositoryImpl::new(db),
            fail_latest: AtomicBool::new(fail_latest),
            fail_categories: AtomicBool::new(fail_categories),
        }
    }
}

fn locked() -> RepositoryError {
    RepositoryError::Database(DbErr::Custom("database is locked".to_string()))
}

fn flaky_orchestrator(snapshots: Arc<dyn SnapshotRepository>) -> CollectionOrchestrator {
    CollectionOrchestrator::new(
        Arc::new(FakeLadderClient::new().with_ladder("A", ladder_entries("a", 2))),
        snapshots,
        Arc::new(RateLimitManager::new(&fast_limits())),
        Arc::new(KeywordBuildCategorizer::new()),
        collection_settings(&["A"]),
        ShutdownSignal::shared(),
    )
}

#[async_trait]
impl SnapshotRepository for FlakySnapshots {
    async fn save(
        &self,
        raw_payload: &Value,
        league: &str,
        ladder_type: &str,
        meta: &LeagueMeta,
    ) -> Result<SaveOutcome, RepositoryError> {
        self.inner.save(raw_payload, league, ladder_type, meta).await
    }

    async fn latest(
        &self,
        league: &str,
        ladder_type: &str,
    ) -> Result<Option<Snapshot>, RepositoryError> {
        if self.fail_latest.swap(false, Ordering::SeqCst) {
            return Err(locked());
        }
        self.inner.latest(league, ladder_type).await
    }

    async fn find_by_id(&self, snapshot_id: i32) -> Result<Option<Snapshot>, RepositoryError> {
        self.inner.find_by_id(snapshot_id).await
    }

    async fn characters(&self, snapshot_id: i32) -> Result<Vec<StoredCharacter>, RepositoryError> {
        self.inner.characters(snapshot_id).await
    }

    async fn metrics(&self, snapshot_id: i32) -> Result<Option<SnapshotMetrics>, RepositoryError> {
        self.inner.metrics(snapshot_id).await
    }

    async fn apply_enhancement(
        &self,
        character_id: i32,
        profile: &EnhancedProfile,
    ) -> Result<(), RepositoryError> {
        self.inner.apply_enhancement(character_id, profile).await
    }

    async fn mark_private(&self, character_id: i32) -> Result<(), RepositoryError> {
        self.inner.mark_private(character_id).await
    }

    async fn apply_categories(
        &self,
        character_id: i32,
        categories: &BuildCategories,
    ) -> Result<(), RepositoryError> {
        if self.fail_categories.swap(false, Ordering::SeqCst) {
            return Err(locked());
        }
        self.inner.apply_categories(character_id, categories).await
    }

    async fn refresh_metrics(&self, snapshot_id: i32) -> Result<SnapshotMetrics, RepositoryError> {
        self.inner.refresh_metrics(snapshot_id).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.inner.delete_older_than(cutoff).await
    }
}

#[tokio::test]
async fn test_failure_after_save_is_a_warning_and_is_repaired_later() {
    let test_db = test_db().await;
    let snapshots: Arc<dyn SnapshotRepository> =
        Arc::new(FlakySnapshots::new(test_db.db.clone(), false, true));
    let orchestrator = flaky_orchestrator(snapshots.clone());
    let options = JobOptions::for_mode(Default::default());

    let first = orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &options)
        .await
        .unwrap();
    assert!(first.created);
    assert_eq!(first.characters, 2);
    assert_eq!(first.enhanced, 2);
    assert_eq!(first.categorized, 0);
    assert_eq!(first.warnings.len(), 1);
    assert!(first.warnings[0].contains("categorization"));
    assert!(first.warnings[0].contains("A"));

    let stored = snapshots.characters(first.snapshot_id).await.unwrap();
    assert!(stored.iter().all(|c| c.categorized_at.is_none()));

    // Unchanged upstream: no new snapshot, but missing categories are filled in
    let second = orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &options)
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.snapshot_id, first.snapshot_id);
    assert_eq!(second.enhanced, 0);
    assert_eq!(second.categorized, 2);
    assert!(second.warnings.is_empty());

    let stored = snapshots.characters(first.snapshot_id).await.unwrap();
    assert!(stored.iter().all(|c| c.categorized_at.is_some()));

    let third = orchestrator
        .collect_league("A", PRIMARY_LADDER_TYPE, &options)
        .await
        .unwrap();
    assert_eq!(third.categorized, 0);
}

#[tokio::test]
async fn test_failed_freshness_check_still_collects() {
    let test_db = test_db().await;
    let snapshots: Arc<dyn SnapshotRepository> =
        Arc::new(FlakySnapshots::new(test_db.db.clone(), true, false));
    let orchestrator = flaky_orchestrator(snapshots.clone());

    let results = orchestrator.collect_if_needed().await.unwrap();
    assert!(results["A"][PRIMARY_LADDER_TYPE]);

    let latest = snapshots.latest("A", PRIMARY_LADDER_TYPE).await.unwrap();
    assert_eq!(latest.map(|s| s.total_characters), Some(2));
}
