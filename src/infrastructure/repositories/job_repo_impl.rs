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

use crate::domain::models::job::{CollectionJob, JobStatus};
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::collection_job as job_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

const TERMINAL_STATUSES: [JobStatus; 3] =
    [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled];

/// 采集任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层
#[derive(Clone)]
pub struct JobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl JobRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<job_entity::Model> for CollectionJob {
    type Error = RepositoryError;

    fn try_from(model: job_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            job_id: model.job_id,
            // Unknown statuses are treated as terminal so they are never re-run
            status: model.status.parse().unwrap_or(JobStatus::Failed),
            created_at: model.created_at.with_timezone(&Utc),
            started_at: model.started_at.map(|t| t.with_timezone(&Utc)),
            completed_at: model.completed_at.map(|t| t.with_timezone(&Utc)),
            leagues: serde_json::from_value(model.leagues)?,
            enhance_profiles: model.enhance_profiles,
            categorize_builds: model.categorize_builds,
            collection_mode: model.collection_mode.parse().unwrap_or_default(),
            total_steps: model.total_steps,
            completed_steps: model.completed_steps,
            current_step: model.current_step,
            current_league: model.current_league,
            current_operation: model.current_operation,
            characters_collected: model.characters_collected,
            characters_enhanced: model.characters_enhanced,
            characters_categorized: model.characters_categorized,
            leagues_completed: serde_json::from_value(model.leagues_completed)?,
            error_message: model.error_message,
            warnings: serde_json::from_value(model.warnings)?,
            last_heartbeat: model.last_heartbeat.map(|t| t.with_timezone(&Utc)),
        })
    }
}

impl From<&CollectionJob> for job_entity::ActiveModel {
    fn from(job: &CollectionJob) -> Self {
        Self {
            job_id: Set(job.job_id),
            status: Set(job.status.to_string()),
            created_at: Set(job.created_at.into()),
            started_at: Set(job.started_at.map(Into::into)),
            completed_at: Set(job.completed_at.map(Into::into)),
            leagues: Set(serde_json::json!(job.leagues)),
            enhance_profiles: Set(job.enhance_profiles),
            categorize_builds: Set(job.categorize_builds),
            collection_mode: Set(job.collection_mode.to_string()),
            total_steps: Set(job.total_steps),
            completed_steps: Set(job.completed_steps),
            current_step: Set(job.current_step.clone()),
            current_league: Set(job.current_league.clone()),
            current_operation: Set(job.current_operation.clone()),
            characters_collected: Set(job.characters_collected),
            characters_enhanced: Set(job.characters_enhanced),
            characters_categorized: Set(job.characters_categorized),
            leagues_completed: Set(serde_json::json!(job.leagues_completed)),
            error_message: Set(job.error_message.clone()),
            warnings: Set(serde_json::json!(job.warnings)),
            last_heartbeat: Set(job.last_heartbeat.map(Into::into)),
        }
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    /// 插入或更新任务；已处于终态的记录不会被覆盖
    async fn upsert(&self, job: &CollectionJob) -> Result<(), RepositoryError> {
        let model: job_entity::ActiveModel = job.into();

        job_entity::Entity::insert(model)
            .on_conflict(
                OnConflict::column(job_entity::Column::JobId)
                    .update_columns([
                        job_entity::Column::Status,
                        job_entity::Column::StartedAt,
                        job_entity::Column::CompletedAt,
                        job_entity::Column::TotalSteps,
                        job_entity::Column::CompletedSteps,
                        job_entity::Column::CurrentStep,
                        job_entity::Column::CurrentLeague,
                        job_entity::Column::CurrentOperation,
                        job_entity::Column::CharactersCollected,
                        job_entity::Column::CharactersEnhanced,
                        job_entity::Column::CharactersCategorized,
                        job_entity::Column::LeaguesCompleted,
                        job_entity::Column::ErrorMessage,
                        job_entity::Column::Warnings,
                        job_entity::Column::LastHeartbeat,
                    ])
                    // Terminal rows are final
                    .action_and_where(
                        Expr::col((job_entity::Entity, job_entity::Column::Status))
                            .is_not_in(TERMINAL_STATUSES.map(|s| s.to_string())),
                    )
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn find_by_id(&self, job_id: Uuid) -> Result<Option<CollectionJob>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(job_id)
            .one(self.db.as_ref())
            .await?;

        model.map(CollectionJob::try_from).transpose()
    }

    async fn find_unfinished(&self) -> Result<Vec<CollectionJob>, RepositoryError> {
        let models = job_entity::Entity::find()
            .filter(job_entity::Column::Status.is_in([
                JobStatus::Pending.to_string(),
                JobStatus::Running.to_string(),
            ]))
            .order_by_asc(job_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(CollectionJob::try_from).collect()
    }

    async fn list_recent(&self, limit: u64) -> Result<Vec<CollectionJob>, RepositoryError> {
        let models = job_entity::Entity::find()
            .order_by_desc(job_entity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        models.into_iter().map(CollectionJob::try_from).collect()
    }
}
