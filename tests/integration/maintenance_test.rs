// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{collection_settings, ladder_entries, wait_for_terminal, FakeLadderClient, Harness};
use chrono::{Duration, Utc};
use ladderwatch::domain::models::job::{CollectionJob, CollectionMode, JobSpec, JobStatus};
use ladderwatch::domain::repositories::job_repository::JobRepository;
use ladderwatch::queue::scheduler::INTERRUPTED_BY_RESTART;
use ladderwatch::workers::MaintenanceWorker;

#[tokio::test]
async fn test_tick_submits_due_leagues_until_fresh() {
    let client = FakeLadderClient::new()
        .with_ladder("A", ladder_entries("a", 2))
        .with_ladder("B", ladder_entries("b", 1));
    let harness = Harness::new(client, collection_settings(&["A", "B"])).await;
    let scheduler = harness.scheduler();
    let worker = MaintenanceWorker::new(
        harness.orchestrator.clone(),
        scheduler.clone(),
        harness.shutdown.clone(),
    );

    let job_id = worker.tick().await.expect("both leagues are due");
    let job = wait_for_terminal(&scheduler, job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.leagues, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(job.collection_mode, CollectionMode::Conservative);

    assert!(worker.tick().await.is_none());
}

#[tokio::test]
async fn test_tick_waits_for_unfinished_jobs() {
    let client = FakeLadderClient::new().with_ladder("A", ladder_entries("a", 1));
    let harness = Harness::new(client, collection_settings(&["A"])).await;
    let scheduler = harness.scheduler();
    let worker = MaintenanceWorker::new(
        harness.orchestrator.clone(),
        scheduler.clone(),
        harness.shutdown.clone(),
    );

    // Without a running worker the first submission stays pending
    scheduler.shutdown(std::time::Duration::from_secs(1)).await;
    let first = worker.tick().await.expect("league is due");
    assert_eq!(scheduler.get_status(first).unwrap().status, JobStatus::Pending);

    assert!(worker.tick().await.is_none());
    assert_eq!(scheduler.list_all().len(), 1);
}

#[tokio::test]
async fn test_run_exits_on_shutdown() {
    let harness = Harness::new(FakeLadderClient::new(), collection_settings(&[])).await;
    let worker = MaintenanceWorker::new(
        harness.orchestrator.clone(),
        harness.scheduler(),
        harness.shutdown.clone(),
    );

    let handle = worker.start();
    harness.shutdown.request();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("maintenance loop should stop")
        .unwrap();
}

#[tokio::test]
async fn test_tick_resumes_after_foreign_job_goes_stale() {
    let client = FakeLadderClient::new().with_ladder("A", ladder_entries("a", 1));
    let harness = Harness::new(client, collection_settings(&["A"])).await;

    // Left RUNNING by a previous instance that was still heartbeating
    let mut foreign = CollectionJob::new(vec!["A".to_string()], &JobSpec::default());
    foreign.start().unwrap();
    harness.jobs.upsert(&foreign).await.unwrap();

    let scheduler = harness.scheduler();
    let report = scheduler.recover().await.unwrap();
    assert_eq!(report.untouched, vec![foreign.job_id]);
    scheduler.start_worker();

    let worker = MaintenanceWorker::new(
        harness.orchestrator.clone(),
        scheduler.clone(),
        harness.shutdown.clone(),
    );
    assert!(worker.tick().await.is_none());

    foreign.last_heartbeat = Some(Utc::now() - Duration::hours(1));
    harness.jobs.upsert(&foreign).await.unwrap();

    let job_id = worker.tick().await.expect("orphan no longer blocks submissions");
    assert_eq!(
        wait_for_terminal(&scheduler, job_id).await.status,
        JobStatus::Completed
    );

    let orphan = harness.jobs.find_by_id(foreign.job_id).await.unwrap().unwrap();
    assert_eq!(orphan.status, JobStatus::Failed);
    assert_eq!(orphan.error_message.as_deref(), Some(INTERRUPTED_BY_RESTART));
    assert_eq!(
        scheduler.get_status(foreign.job_id).unwrap().status,
        JobStatus::Failed
    );
}
