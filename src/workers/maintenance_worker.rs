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

use crate::domain::models::job::JobSpec;
use crate::domain::services::collection_service::CollectionOrchestrator;
use crate::queue::scheduler::TaskScheduler;
use crate::utils::shutdown::SharedShutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 维护工作器
///
/// 定期清理过期快照，并在空闲时为需要新快照的联赛提交采集任务
pub struct MaintenanceWorker {
    orchestrator: Arc<CollectionOrchestrator>,
    scheduler: TaskScheduler,
    interval: Duration,
    shutdown: SharedShutdown,
}

impl MaintenanceWorker {
    pub fn new(
        orchestrator: Arc<CollectionOrchestrator>,
        scheduler: TaskScheduler,
        shutdown: SharedShutdown,
    ) -> Self {
        let interval = Duration::from_secs(orchestrator.settings().check_interval_secs.max(1));
        Self {
            orchestrator,
            scheduler,
            interval,
            shutdown,
        }
    }

    /// 运行工作器，直到收到关闭信号
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Maintenance worker started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.wait() => break,
            }

            self.tick().await;
        }

        info!("Maintenance worker stopped");
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// 执行一轮维护
    ///
    /// 清理过期快照，处理心跳过期的遗留任务，然后在空闲时提交到期联赛
    ///
    /// # 返回值
    ///
    /// 本轮提交的任务ID，没有提交时为 None
    pub async fn tick(&self) -> Option<Uuid> {
        match self.orchestrator.cleanup_old_snapshots().await {
            Ok(count) if count > 0 => info!("Cleaned up {} expired snapshots", count),
            Ok(_) => {}
            Err(e) => error!("Failed to cleanup expired snapshots: {}", e),
        }

        match self.scheduler.reap_orphans().await {
            Ok(failed) if !failed.is_empty() => {
                warn!(count = failed.len(), "Resolved orphaned collection jobs")
            }
            Ok(_) => {}
            Err(e) => error!("Failed to resolve orphaned jobs: {}", e),
        }

        if self.scheduler.has_unfinished() {
            debug!("Collection job already queued or running");
            return None;
        }

        let due = match self.orchestrator.due_leagues().await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to check snapshot freshness: {}", e);
                return None;
            }
        };
        if due.is_empty() {
            debug!("All monitored leagues are fresh");
            return None;
        }

        let spec = JobSpec {
            leagues: Some(due),
            mode: self.orchestrator.settings().mode,
            ..Default::default()
        };
        match self.scheduler.submit(spec).await {
            Ok(job_id) => {
                info!(%job_id, "Submitted scheduled collection job");
                Some(job_id)
            }
            Err(e) => {
                error!("Failed to submit scheduled collection job: {}", e);
                None
            }
        }
    }
}
