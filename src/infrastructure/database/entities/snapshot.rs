// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub league: String,
    pub ladder_type: String,
    pub snapshot_date: ChronoDateTimeWithTimeZone,
    pub total_characters: i32,
    pub content_hash: String,
    pub raw_payload: Json,
    pub league_category: Option<String>,
    pub league_variant: Option<String>,
    pub challenge_league_base: Option<String>,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::character::Entity")]
    Character,
    #[sea_orm(has_one = "super::snapshot_metrics::Entity")]
    SnapshotMetrics,
}

impl Related<super::character::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Character.def()
    }
}

impl Related<super::snapshot_metrics::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SnapshotMetrics.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
