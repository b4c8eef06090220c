// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "characters")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub snapshot_id: i32,
    pub rank: i32,
    pub account: String,
    pub name: String,
    pub level: i32,
    pub experience: Option<i64>,
    pub character_class: String,
    pub depth: Option<i32>,
    pub profile_url: Option<String>,
    pub ladder_url: Option<String>,
    pub enhanced_skills: Option<Json>,
    pub enhanced_uniques: Option<Json>,
    pub main_skill: Option<String>,
    pub life: Option<i32>,
    pub energy_shield: Option<i32>,
    pub profile_public: Option<bool>,
    pub primary_damage_type: Option<String>,
    pub skill_delivery: Option<String>,
    pub cost_tier: Option<String>,
    pub categorized_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::snapshot::Entity",
        from = "Column::SnapshotId",
        to = "super::snapshot::Column::Id",
        on_delete = "Cascade"
    )]
    Snapshot,
}

impl Related<super::snapshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Snapshot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
