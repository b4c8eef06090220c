// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ladderwatch::config::settings::{RateLimitingSettings, ResourceLimits};
use ladderwatch::domain::repositories::request_log_repository::{
    RequestLogEntry, RequestLogRepository,
};
use ladderwatch::domain::repositories::RepositoryError;
use ladderwatch::domain::services::rate_limiting_service::{RateLimitManager, RequestMeta};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct RecordingLog {
    entries: Mutex<Vec<RequestLogEntry>>,
    broken: bool,
}

#[async_trait]
impl RequestLogRepository for RecordingLog {
    async fn record(&self, entry: &RequestLogEntry) -> Result<(), RepositoryError> {
        if self.broken {
            return Err(RepositoryError::NotFound);
        }
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    async fn count_since(
        &self,
        api_type: &str,
        _since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.api_type == api_type)
            .count() as u64)
    }
}

fn settings() -> RateLimitingSettings {
    let mut settings = RateLimitingSettings {
        enable_jitter: false,
        ..Default::default()
    };
    settings.resources.insert(
        "ladder".to_string(),
        ResourceLimits::new(10, 100, 1000, 0.0, 0.0),
    );
    settings
}

#[tokio::test]
async fn test_record_request_writes_audit_entry() {
    let log = Arc::new(RecordingLog::default());
    let limiter = RateLimitManager::new(&settings()).with_request_log(log.clone());

    limiter
        .record_request(
            "ladder",
            false,
            RequestMeta {
                endpoint: Some("ladders/Settlers".to_string()),
                response_time_ms: Some(120),
                error_message: Some("HTTP status 503".to_string()),
                league: Some("Settlers".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let entries = log.entries.lock().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].api_type, "ladder");
    assert!(!entries[0].success);
    assert_eq!(entries[0].league.as_deref(), Some("Settlers"));
    assert_eq!(entries[0].response_time_ms, Some(120));
    assert_eq!(log.count_since("ladder", Utc::now()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_the_request() {
    let log = Arc::new(RecordingLog {
        broken: true,
        ..Default::default()
    });
    let limiter = RateLimitManager::new(&settings()).with_request_log(log);

    limiter
        .record_request("ladder", true, RequestMeta::default())
        .await
        .expect("log failures are swallowed");

    let status = limiter.status();
    let ladder = status.iter().find(|s| s.resource == "ladder").unwrap();
    assert_eq!(ladder.minute_count, 1);
    assert_eq!(ladder.day_remaining, 999);
}
