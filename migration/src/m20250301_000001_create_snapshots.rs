// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create snapshots table
        manager
            .create_table(
                Table::create()
                    .table(Snapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Snapshots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Snapshots::League).string().not_null())
                    .col(ColumnDef::new(Snapshots::LadderType).string().not_null())
                    .col(
                        ColumnDef::new(Snapshots::SnapshotDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Snapshots::TotalCharacters)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Snapshots::ContentHash).string_len(64).not_null())
                    .col(ColumnDef::new(Snapshots::RawPayload).json().not_null())
                    .col(ColumnDef::new(Snapshots::LeagueCategory).string())
                    .col(ColumnDef::new(Snapshots::LeagueVariant).string())
                    .col(ColumnDef::new(Snapshots::ChallengeLeagueBase).string())
                    .col(
                        ColumnDef::new(Snapshots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_snapshots_league_type_hash")
                    .table(Snapshots::Table)
                    .col(Snapshots::League)
                    .col(Snapshots::LadderType)
                    .col(Snapshots::ContentHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_snapshots_league_type_date")
                    .table(Snapshots::Table)
                    .col(Snapshots::League)
                    .col(Snapshots::LadderType)
                    .col(Snapshots::SnapshotDate)
                    .to_owned(),
            )
            .await?;

        // Create characters table
        manager
            .create_table(
                Table::create()
                    .table(Characters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Characters::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Characters::SnapshotId).integer().not_null())
                    .col(ColumnDef::new(Characters::Rank).integer().not_null())
                    .col(ColumnDef::new(Characters::Account).string().not_null())
                    .col(ColumnDef::new(Characters::Name).string().not_null())
                    .col(ColumnDef::new(Characters::Level).integer().not_null())
                    .col(ColumnDef::new(Characters::Experience).big_integer())
                    .col(ColumnDef::new(Characters::CharacterClass).string().not_null())
                    .col(ColumnDef::new(Characters::Depth).integer())
                    .col(ColumnDef::new(Characters::ProfileUrl).string())
                    .col(ColumnDef::new(Characters::LadderUrl).string())
                    .col(ColumnDef::new(Characters::EnhancedSkills).json())
                    .col(ColumnDef::new(Characters::EnhancedUniques).json())
                    .col(ColumnDef::new(Characters::MainSkill).string())
                    .col(ColumnDef::new(Characters::Life).integer())
                    .col(ColumnDef::new(Characters::EnergyShield).integer())
                    .col(ColumnDef::new(Characters::ProfilePublic).boolean())
                    .col(ColumnDef::new(Characters::PrimaryDamageType).string())
                    .col(ColumnDef::new(Characters::SkillDelivery).string())
                    .col(ColumnDef::new(Characters::CostTier).string())
                    .col(ColumnDef::new(Characters::CategorizedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_characters_snapshot")
                            .from(Characters::Table, Characters::SnapshotId)
                            .to(Snapshots::Table, Snapshots::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_characters_snapshot_rank")
                    .table(Characters::Table)
                    .col(Characters::SnapshotId)
                    .col(Characters::Rank)
                    .to_owned(),
            )
            .await?;

        // Create snapshot_metrics table
        manager
            .create_table(
                Table::create()
                    .table(SnapshotMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SnapshotMetrics::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SnapshotMetrics::SnapshotId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SnapshotMetrics::TotalCharacters)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SnapshotMetrics::AvgLevel).double().not_null())
                    .col(ColumnDef::new(SnapshotMetrics::MaxLevel).integer().not_null())
                    .col(
                        ColumnDef::new(SnapshotMetrics::Level100Count)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SnapshotMetrics::ClassDistribution).json().not_null())
                    .col(
                        ColumnDef::new(SnapshotMetrics::AscendancyDistribution)
                            .json()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SnapshotMetrics::SkillPopularity).json().not_null())
                    .col(ColumnDef::new(SnapshotMetrics::UniqueUsage).json().not_null())
                    .col(
                        ColumnDef::new(SnapshotMetrics::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_snapshot_metrics_snapshot")
                            .from(SnapshotMetrics::Table, SnapshotMetrics::SnapshotId)
                            .to(Snapshots::Table, Snapshots::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SnapshotMetrics::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Characters::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Snapshots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Snapshots {
    Table,
    Id,
    League,
    LadderType,
    SnapshotDate,
    TotalCharacters,
    ContentHash,
    RawPayload,
    LeagueCategory,
    LeagueVariant,
    ChallengeLeagueBase,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Characters {
    Table,
    Id,
    SnapshotId,
    Rank,
    Account,
    Name,
    Level,
    Experience,
    CharacterClass,
    Depth,
    ProfileUrl,
    LadderUrl,
    EnhancedSkills,
    EnhancedUniques,
    MainSkill,
    Life,
    EnergyShield,
    ProfilePublic,
    PrimaryDamageType,
    SkillDelivery,
    CostTier,
    CategorizedAt,
}

#[derive(DeriveIden)]
enum SnapshotMetrics {
    Table,
    Id,
    SnapshotId,
    TotalCharacters,
    AvgLevel,
    MaxLevel,
    #[sea_orm(iden = "level_100_count")]
    Level100Count,
    ClassDistribution,
    AscendancyDistribution,
    SkillPopularity,
    UniqueUsage,
    ComputedAt,
}
