// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collection_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub job_id: Uuid,
    pub status: String,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub started_at: Option<ChronoDateTimeWithTimeZone>,
    pub completed_at: Option<ChronoDateTimeWithTimeZone>,
    pub leagues: Json,
    pub enhance_profiles: bool,
    pub categorize_builds: bool,
    pub collection_mode: String,
    pub total_steps: i32,
    pub completed_steps: i32,
    pub current_step: String,
    pub current_league: Option<String>,
    pub current_operation: Option<String>,
    pub characters_collected: i32,
    pub characters_enhanced: i32,
    pub characters_categorized: i32,
    pub leagues_completed: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub warnings: Json,
    pub last_heartbeat: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
