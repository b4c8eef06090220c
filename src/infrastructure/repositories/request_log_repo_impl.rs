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

use crate::domain::repositories::request_log_repository::{RequestLogEntry, RequestLogRepository};
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::request_log;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::Arc;

/// 请求日志仓库实现
#[derive(Clone)]
pub struct RequestLogRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl RequestLogRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RequestLogRepository for RequestLogRepositoryImpl {
    async fn record(&self, entry: &RequestLogEntry) -> Result<(), RepositoryError> {
        let model = request_log::ActiveModel {
            api_type: Set(entry.api_type.clone()),
            endpoint: Set(entry.endpoint.clone()),
            success: Set(entry.success),
            response_time_ms: Set(entry.response_time_ms),
            error_message: Set(entry.error_message.clone()),
            league: Set(entry.league.clone()),
            character_name: Set(entry.character_name.clone()),
            account_name: Set(entry.account_name.clone()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn count_since(
        &self,
        api_type: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let count = request_log::Entity::find()
            .filter(request_log::Column::ApiType.eq(api_type))
            .filter(request_log::Column::CreatedAt.gte(since))
            .count(self.db.as_ref())
            .await?;

        Ok(count)
    }
}
