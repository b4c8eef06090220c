// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::character::{
    BuildCategories, CharacterRecord, EnhancedProfile, StoredCharacter,
};
use crate::domain::models::league::LeagueMeta;
use crate::domain::models::snapshot::{SaveOutcome, Snapshot, SnapshotMetrics};
use crate::domain::repositories::snapshot_repository::SnapshotRepository;
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::entities::{
    character as character_entity, snapshot as snapshot_entity,
    snapshot_metrics as metrics_entity,
};
use crate::utils::content_hash::content_hash;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Rows per multi-row insert, kept below SQLite's bound-variable limit
const INSERT_CHUNK: usize = 40;

/// 快照仓库实现
///
/// 基于SeaORM实现的快照存储，内容哈希去重，写入在单个事务内完成
#[derive(Clone)]
pub struct SnapshotRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl SnapshotRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_existing(
        &self,
        league: &str,
        ladder_type: &str,
        hash: &str,
    ) -> Result<Option<snapshot_entity::Model>, DbErr> {
        snapshot_entity::Entity::find()
            .filter(snapshot_entity::Column::League.eq(league))
            .filter(snapshot_entity::Column::LadderType.eq(ladder_type))
            .filter(snapshot_entity::Column::ContentHash.eq(hash))
            .one(self.db.as_ref())
            .await
    }

    async fn insert_snapshot(
        &self,
        raw_payload: &Value,
        league: &str,
        ladder_type: &str,
        meta: &LeagueMeta,
        hash: String,
        records: Vec<CharacterRecord>,
    ) -> Result<i32, RepositoryError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let snapshot = snapshot_entity::ActiveModel {
            league: Set(league.to_string()),
            ladder_type: Set(ladder_type.to_string()),
            snapshot_date: Set(now.into()),
            total_characters: Set(records.len() as i32),
            content_hash: Set(hash),
            raw_payload: Set(raw_payload.clone()),
            league_category: Set(Some(meta.category.to_string())),
            league_variant: Set(Some(meta.variant.to_string())),
            challenge_league_base: Set(meta.challenge_base.clone()),
            created_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let ladder_url = CharacterRecord::ladder_url(league, ladder_type);
        let rows: Vec<character_entity::ActiveModel> = records
            .iter()
            .map(|record| character_entity::ActiveModel {
                snapshot_id: Set(snapshot.id),
                rank: Set(record.rank),
                account: Set(record.account.clone()),
                name: Set(record.name.clone()),
                level: Set(record.level),
                experience: Set(record.experience),
                character_class: Set(record.class.clone()),
                depth: Set(record.depth),
                profile_url: Set(Some(record.profile_url())),
                ladder_url: Set(Some(ladder_url.clone())),
                ..Default::default()
            })
            .collect();

        for chunk in rows.chunks(INSERT_CHUNK) {
            character_entity::Entity::insert_many(chunk.to_vec())
                .exec_without_returning(&txn)
                .await?;
        }

        // Metrics are derived from the rows that were just written
        let characters = load_characters(&txn, snapshot.id).await?;
        let metrics = SnapshotMetrics::compute(snapshot.id, &characters);
        metrics_active_model(&metrics, None).insert(&txn).await?;

        txn.commit().await?;
        Ok(snapshot.id)
    }

    async fn update_character(
        &self,
        model: character_entity::ActiveModel,
    ) -> Result<(), RepositoryError> {
        match model.update(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) | Err(DbErr::RecordNotFound(_)) => {
                Err(RepositoryError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl From<snapshot_entity::Model> for Snapshot {
    fn from(model: snapshot_entity::Model) -> Self {
        let category = model.league_category.as_deref().and_then(|c| c.parse().ok());
        let variant = model.league_variant.as_deref().and_then(|v| v.parse().ok());
        let meta = match (category, variant) {
            (Some(category), Some(variant)) => Some(LeagueMeta {
                category,
                variant,
                challenge_base: model.challenge_league_base,
            }),
            _ => None,
        };

        Self {
            id: model.id,
            league: model.league,
            ladder_type: model.ladder_type,
            snapshot_date: model.snapshot_date.with_timezone(&Utc),
            total_characters: model.total_characters,
            content_hash: model.content_hash,
            meta,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<character_entity::Model> for StoredCharacter {
    fn from(model: character_entity::Model) -> Self {
        let categories = if model.primary_damage_type.is_some()
            || model.skill_delivery.is_some()
            || model.cost_tier.is_some()
        {
            Some(BuildCategories {
                primary_damage_type: model.primary_damage_type,
                skill_delivery: model.skill_delivery,
                cost_tier: model.cost_tier,
            })
        } else {
            None
        };

        Self {
            id: model.id,
            snapshot_id: model.snapshot_id,
            record: CharacterRecord {
                rank: model.rank,
                account: model.account,
                name: model.name,
                level: model.level,
                experience: model.experience,
                class: model.character_class,
                depth: model.depth,
            },
            profile_url: model.profile_url,
            ladder_url: model.ladder_url,
            enhanced_skills: string_list(model.enhanced_skills),
            enhanced_uniques: string_list(model.enhanced_uniques),
            main_skill: model.main_skill,
            life: model.life,
            energy_shield: model.energy_shield,
            profile_public: model.profile_public,
            categories,
            categorized_at: model.categorized_at.map(|t| t.with_timezone(&Utc)),
        }
    }
}

impl TryFrom<metrics_entity::Model> for SnapshotMetrics {
    type Error = RepositoryError;

    fn try_from(model: metrics_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            snapshot_id: model.snapshot_id,
            total_characters: model.total_characters,
            avg_level: model.avg_level,
            max_level: model.max_level,
            level_100_count: model.level_100_count,
            class_distribution: serde_json::from_value(model.class_distribution)?,
            ascendancy_distribution: serde_json::from_value(model.ascendancy_distribution)?,
            skill_popularity: serde_json::from_value(model.skill_popularity)?,
            unique_usage: serde_json::from_value(model.unique_usage)?,
        })
    }
}

fn string_list(value: Option<Value>) -> Vec<String> {
    value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

fn metrics_active_model(metrics: &SnapshotMetrics, id: Option<i32>) -> metrics_entity::ActiveModel {
    let mut model = metrics_entity::ActiveModel {
        snapshot_id: Set(metrics.snapshot_id),
        total_characters: Set(metrics.total_characters),
        avg_level: Set(metrics.avg_level),
        max_level: Set(metrics.max_level),
        level_100_count: Set(metrics.level_100_count),
        class_distribution: Set(json!(metrics.class_distribution)),
        ascendancy_distribution: Set(json!(metrics.ascendancy_distribution)),
        skill_popularity: Set(json!(metrics.skill_popularity)),
        unique_usage: Set(json!(metrics.unique_usage)),
        computed_at: Set(Utc::now().into()),
        ..Default::default()
    };
    if let Some(id) = id {
        model.id = Set(id);
    }
    model
}

async fn load_characters<C: ConnectionTrait>(
    conn: &C,
    snapshot_id: i32,
) -> Result<Vec<StoredCharacter>, DbErr> {
    let models = character_entity::Entity::find()
        .filter(character_entity::Column::SnapshotId.eq(snapshot_id))
        .order_by_asc(character_entity::Column::Rank)
        .all(conn)
        .await?;
    Ok(models.into_iter().map(StoredCharacter::from).collect())
}

#[async_trait]
impl SnapshotRepository for SnapshotRepositoryImpl {
    async fn save(
        &self,
        raw_payload: &Value,
        league: &str,
        ladder_type: &str,
        meta: &LeagueMeta,
    ) -> Result<SaveOutcome, RepositoryError> {
        let hash = content_hash(raw_payload);

        if let Some(existing) = self.find_existing(league, ladder_type, &hash).await? {
            debug!(
                snapshot_id = existing.id,
                league, ladder_type, "Identical payload already stored"
            );
            return Ok(SaveOutcome {
                snapshot_id: existing.id,
                created: false,
            });
        }

        let records = CharacterRecord::from_payload(raw_payload, ladder_type)?;
        let count = records.len();

        match self
            .insert_snapshot(raw_payload, league, ladder_type, meta, hash.clone(), records)
            .await
        {
            Ok(snapshot_id) => {
                info!(snapshot_id, league, ladder_type, characters = count, "Snapshot saved");
                Ok(SaveOutcome {
                    snapshot_id,
                    created: true,
                })
            }
            // A concurrent writer stored the same payload first
            Err(RepositoryError::Database(err))
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                let existing = self
                    .find_existing(league, ladder_type, &hash)
                    .await?
                    .ok_or(RepositoryError::Database(err))?;
                Ok(SaveOutcome {
                    snapshot_id: existing.id,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn latest(
        &self,
        league: &str,
        ladder_type: &str,
    ) -> Result<Option<Snapshot>, RepositoryError> {
        let model = snapshot_entity::Entity::find()
            .filter(snapshot_entity::Column::League.eq(league))
            .filter(snapshot_entity::Column::LadderType.eq(ladder_type))
            .order_by_desc(snapshot_entity::Column::SnapshotDate)
            .order_by_desc(snapshot_entity::Column::Id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_by_id(&self, snapshot_id: i32) -> Result<Option<Snapshot>, RepositoryError> {
        let model = snapshot_entity::Entity::find_by_id(snapshot_id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn characters(&self, snapshot_id: i32) -> Result<Vec<StoredCharacter>, RepositoryError> {
        Ok(load_characters(self.db.as_ref(), snapshot_id).await?)
    }

    async fn metrics(&self, snapshot_id: i32) -> Result<Option<SnapshotMetrics>, RepositoryError> {
        let model = metrics_entity::Entity::find()
            .filter(metrics_entity::Column::SnapshotId.eq(snapshot_id))
            .one(self.db.as_ref())
            .await?;

        model.map(SnapshotMetrics::try_from).transpose()
    }

    async fn apply_enhancement(
        &self,
        character_id: i32,
        profile: &EnhancedProfile,
    ) -> Result<(), RepositoryError> {
        let model = character_entity::ActiveModel {
            id: Set(character_id),
            enhanced_skills: Set(Some(json!(profile.skills))),
            enhanced_uniques: Set(Some(json!(profile.uniques))),
            main_skill: Set(profile.main_skill.clone()),
            life: Set(profile.life),
            energy_shield: Set(profile.energy_shield),
            profile_public: Set(Some(true)),
            ..Default::default()
        };
        self.update_character(model).await
    }

    async fn mark_private(&self, character_id: i32) -> Result<(), RepositoryError> {
        let model = character_entity::ActiveModel {
            id: Set(character_id),
            profile_public: Set(Some(false)),
            ..Default::default()
        };
        self.update_character(model).await
    }

    async fn apply_categories(
        &self,
        character_id: i32,
        categories: &BuildCategories,
    ) -> Result<(), RepositoryError> {
        let model = character_entity::ActiveModel {
            id: Set(character_id),
            primary_damage_type: Set(categories.primary_damage_type.clone()),
            skill_delivery: Set(categories.skill_delivery.clone()),
            cost_tier: Set(categories.cost_tier.clone()),
            categorized_at: Set(Some(Utc::now().into())),
            ..Default::default()
        };
        self.update_character(model).await
    }

    async fn refresh_metrics(&self, snapshot_id: i32) -> Result<SnapshotMetrics, RepositoryError> {
        let txn = self.db.begin().await?;

        let characters = load_characters(&txn, snapshot_id).await?;
        let metrics = SnapshotMetrics::compute(snapshot_id, &characters);

        let existing = metrics_entity::Entity::find()
            .filter(metrics_entity::Column::SnapshotId.eq(snapshot_id))
            .one(&txn)
            .await?;
        match existing {
            Some(row) => {
                metrics_active_model(&metrics, Some(row.id))
                    .update(&txn)
                    .await?;
            }
            None => {
                metrics_active_model(&metrics, None).insert(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(metrics)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let txn = self.db.begin().await?;

        let ids: Vec<i32> = snapshot_entity::Entity::find()
            .select_only()
            .column(snapshot_entity::Column::Id)
            .filter(snapshot_entity::Column::SnapshotDate.lt(cutoff))
            .into_tuple()
            .all(&txn)
            .await?;

        if ids.is_empty() {
            txn.commit().await?;
            return Ok(0);
        }

        character_entity::Entity::delete_many()
            .filter(character_entity::Column::SnapshotId.is_in(ids.clone()))
            .exec(&txn)
            .await?;
        metrics_entity::Entity::delete_many()
            .filter(metrics_entity::Column::SnapshotId.is_in(ids.clone()))
            .exec(&txn)
            .await?;
        let result = snapshot_entity::Entity::delete_many()
            .filter(snapshot_entity::Column::Id.is_in(ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(result.rows_affected)
    }
}
