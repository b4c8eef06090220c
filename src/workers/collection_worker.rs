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

use crate::domain::models::job::CollectionJob;
use crate::domain::services::collection_service::{
    CollectionOrchestrator, JobOptions, PRIMARY_LADDER_TYPE,
};
use crate::queue::scheduler::{JobContext, JobRunner};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 采集任务执行体
///
/// 按顺序逐个联赛调用采集编排器；单个联赛失败只记录告警，不会使整个任务失败
pub struct CollectionJobRunner {
    orchestrator: Arc<CollectionOrchestrator>,
}

impl CollectionJobRunner {
    pub fn new(orchestrator: Arc<CollectionOrchestrator>) -> Self {
        Self { orchestrator }
    }

    fn advance(job: &mut CollectionJob, steps: i32) {
        job.completed_steps = (job.completed_steps + steps).min(job.total_steps);
    }
}

#[async_trait]
impl JobRunner for CollectionJobRunner {
    fn default_leagues(&self) -> Vec<String> {
        self.orchestrator.monitored_leagues()
    }

    #[instrument(skip(self, ctx), fields(job_id = %ctx.job_id()))]
    async fn run(&self, ctx: JobContext) -> anyhow::Result<()> {
        let Some(job) = ctx.snapshot() else {
            anyhow::bail!("job {} disappeared before execution", ctx.job_id());
        };

        let options = JobOptions {
            enhance_profiles: job.enhance_profiles,
            categorize_builds: job.categorize_builds,
            mode: job.collection_mode,
        };
        let steps = CollectionJob::steps_per_league(options.enhance_profiles, options.categorize_builds);
        let total = job.leagues.len();

        info!(leagues = total, mode = %options.mode, "Collection job running");

        for (index, league) in job.leagues.iter().enumerate() {
            if ctx.is_shutdown_requested() {
                anyhow::bail!("shutdown requested before {}", league);
            }

            ctx.update(|job| {
                job.current_league = Some(league.clone());
                job.current_operation = Some("Collecting ladder".to_string());
                job.current_step = format!("Collecting {} ({}/{})", league, index + 1, total);
            });

            match self
                .orchestrator
                .collect_league(league, PRIMARY_LADDER_TYPE, &options)
                .await
            {
                Ok(outcome) => ctx.update(|job| {
                    job.characters_collected += outcome.characters;
                    job.characters_enhanced += outcome.enhanced;
                    job.characters_categorized += outcome.categorized;
                    job.leagues_completed.push(league.clone());
                    for warning in outcome.warnings {
                        job.add_warning(warning);
                    }
                    Self::advance(job, steps);
                }),
                Err(e) => {
                    warn!(%league, "League collection failed: {}", e);
                    ctx.update(|job| {
                        job.add_warning(format!(
                            "Failed to collect data for league: {} ({})",
                            league, e
                        ));
                        Self::advance(job, steps);
                    });
                }
            }

            ctx.checkpoint().await;
        }

        ctx.update(|job| {
            job.current_league = None;
            job.current_operation = None;
        });
        Ok(())
    }
}
