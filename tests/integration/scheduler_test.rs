// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{collection_settings, ladder_entries, wait_for_terminal, FakeLadderClient, Harness};
use chrono::{Duration, Utc};
use ladderwatch::domain::models::job::{CollectionJob, CollectionMode, JobSpec, JobStatus};
use ladderwatch::queue::scheduler::{SchedulerError, INTERRUPTED_BY_RESTART};
use std::sync::atomic::Ordering;

fn spec(leagues: &[&str], mode: CollectionMode) -> JobSpec {
    JobSpec {
        leagues: Some(leagues.iter().map(|l| l.to_string()).collect()),
        mode,
        ..Default::default()
    }
}

/// 一个联赛成功、一个联赛失败时任务仍然完成，并记录一条告警
#[tokio::test]
async fn test_partial_failure_completes_with_warning() {
    let client = FakeLadderClient::new()
        .with_ladder("A", ladder_entries("a", 2))
        .with_failure("B");
    let harness = Harness::new(client, collection_settings(&[])).await;
    let scheduler = harness.scheduler();

    let job_id = scheduler
        .submit(spec(&["A", "B"], CollectionMode::Conservative))
        .await
        .unwrap();
    let job = wait_for_terminal(&scheduler, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.characters_collected, 2);
    assert_eq!(job.leagues_completed, vec!["A".to_string()]);
    assert_eq!(job.warnings.len(), 1);
    assert!(job.warnings[0].starts_with("Failed to collect data for league: B"));
    assert_eq!(job.completed_steps, job.total_steps);
    assert!(job.error_message.is_none());

    // Both characters were enhanced and categorized
    assert_eq!(job.characters_enhanced, 2);
    assert_eq!(job.characters_categorized, 2);

    let persisted = harness.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(persisted.status, JobStatus::Completed);
    assert_eq!(persisted.warnings, job.warnings);
}

#[tokio::test]
async fn test_disabled_enhancement_skips_profile_requests() {
    let client = FakeLadderClient::new().with_ladder("A", ladder_entries("a", 3));
    let harness = Harness::new(client, collection_settings(&[])).await;
    let scheduler = harness.scheduler();

    let job_id = scheduler
        .submit(JobSpec {
            leagues: Some(vec!["A".to_string()]),
            enhance_profiles: false,
            categorize_builds: false,
            mode: CollectionMode::Balanced,
        })
        .await
        .unwrap();
    let job = wait_for_terminal(&scheduler, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_steps, 1);
    assert_eq!(job.characters_collected, 3);
    assert_eq!(job.characters_enhanced, 0);
    assert_eq!(harness.client.profile_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submit_uses_monitored_leagues_by_default() {
    let client = FakeLadderClient::new().with_ladder("Configured", ladder_entries("c", 1));
    let harness = Harness::new(client, collection_settings(&["Configured"])).await;
    let scheduler = harness.scheduler();

    let job_id = scheduler.submit(JobSpec::default()).await.unwrap();
    let job = wait_for_terminal(&scheduler, job_id).await;

    assert_eq!(job.leagues, vec!["Configured".to_string()]);
    assert_eq!(job.leagues_completed, vec!["Configured".to_string()]);
}

#[tokio::test]
async fn test_submit_without_any_league_is_rejected() {
    let harness = Harness::new(FakeLadderClient::new(), collection_settings(&[])).await;
    let scheduler = harness.scheduler();

    // No configuration and no discovery yet means only the permanent leagues,
    // so an explicit empty list is the only way to resolve to nothing
    let result = scheduler
        .submit(JobSpec {
            leagues: Some(Vec::new()),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(SchedulerError::NoLeagues)));
}

#[tokio::test]
async fn test_jobs_run_one_at_a_time_in_submission_order() {
    let client = FakeLadderClient::new()
        .with_ladder("A", ladder_entries("a", 1))
        .with_ladder("B", ladder_entries("b", 1));
    let harness = Harness::new(client, collection_settings(&[])).await;
    let scheduler = harness.scheduler();

    let first = scheduler
        .submit(spec(&["A"], CollectionMode::Conservative))
        .await
        .unwrap();
    let second = scheduler
        .submit(spec(&["B"], CollectionMode::Conservative))
        .await
        .unwrap();

    let first = wait_for_terminal(&scheduler, first).await;
    let second = wait_for_terminal(&scheduler, second).await;

    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(second.status, JobStatus::Completed);
    assert!(first.completed_at.unwrap() <= second.started_at.unwrap());

    let listed: Vec<_> = scheduler.list_all().iter().map(|j| j.job_id).collect();
    assert_eq!(listed, vec![second.job_id, first.job_id]);
}

/// 重启恢复：过期的运行中任务失败，新鲜的待执行任务被重新执行
#[tokio::test]
async fn test_restart_recovery() {
    let client = FakeLadderClient::new().with_ladder("A", ladder_entries("a", 2));
    let harness = Harness::new(client, collection_settings(&[])).await;

    let job_spec = spec(&["A"], CollectionMode::Conservative);
    let mut interrupted = CollectionJob::new(vec!["A".into()], &job_spec);
    interrupted.start().unwrap();
    interrupted.last_heartbeat = Some(Utc::now() - Duration::seconds(900));
    interrupted.completed_steps = 1;

    let mut abandoned = CollectionJob::new(vec!["A".into()], &job_spec);
    abandoned.created_at = Utc::now() - Duration::hours(2);

    let waiting = CollectionJob::new(vec!["A".into()], &job_spec);

    for job in [&interrupted, &abandoned, &waiting] {
        harness.jobs.upsert(job).await.unwrap();
    }

    let scheduler = harness.scheduler();
    let report = scheduler.recover().await.unwrap();
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.contains(&interrupted.job_id));
    assert!(report.failed.contains(&abandoned.job_id));
    assert_eq!(report.requeued, vec![waiting.job_id]);

    let failed = harness
        .jobs
        .find_by_id(interrupted.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some(INTERRUPTED_BY_RESTART));

    scheduler.start_worker();
    let resumed = wait_for_terminal(&scheduler, waiting.job_id).await;
    assert_eq!(resumed.status, JobStatus::Completed);
    assert_eq!(resumed.characters_collected, 2);

    // Failed jobs are never picked up again
    let still_failed = scheduler.get_status(interrupted.job_id).unwrap();
    assert_eq!(still_failed.status, JobStatus::Failed);
    assert!(harness.jobs.find_unfinished().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_worker() {
    let harness = Harness::new(FakeLadderClient::new(), collection_settings(&[])).await;
    let scheduler = harness.scheduler();
    scheduler.start_worker();

    scheduler.shutdown(std::time::Duration::from_secs(1)).await;
    assert!(harness.shutdown.is_requested());
}
