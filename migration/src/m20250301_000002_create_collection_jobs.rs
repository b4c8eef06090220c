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
        manager
            .create_table(
                Table::create()
                    .table(CollectionJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollectionJobs::JobId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CollectionJobs::Status).string().not_null())
                    .col(
                        ColumnDef::new(CollectionJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CollectionJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(CollectionJobs::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(CollectionJobs::Leagues).json().not_null())
                    .col(
                        ColumnDef::new(CollectionJobs::EnhanceProfiles)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::CategorizeBuilds)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::CollectionMode)
                            .string()
                            .not_null()
                            .default("balanced"),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::TotalSteps)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::CompletedSteps)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::CurrentStep)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(CollectionJobs::CurrentLeague).string())
                    .col(ColumnDef::new(CollectionJobs::CurrentOperation).string())
                    .col(
                        ColumnDef::new(CollectionJobs::CharactersCollected)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::CharactersEnhanced)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CollectionJobs::CharactersCategorized)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CollectionJobs::LeaguesCompleted).json().not_null())
                    .col(ColumnDef::new(CollectionJobs::ErrorMessage).text())
                    .col(ColumnDef::new(CollectionJobs::Warnings).json().not_null())
                    .col(ColumnDef::new(CollectionJobs::LastHeartbeat).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_collection_jobs_status")
                    .table(CollectionJobs::Table)
                    .col(CollectionJobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_collection_jobs_created_at")
                    .table(CollectionJobs::Table)
                    .col(CollectionJobs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CollectionJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CollectionJobs {
    Table,
    JobId,
    Status,
    CreatedAt,
    StartedAt,
    CompletedAt,
    Leagues,
    EnhanceProfiles,
    CategorizeBuilds,
    CollectionMode,
    TotalSteps,
    CompletedSteps,
    CurrentStep,
    CurrentLeague,
    CurrentOperation,
    CharactersCollected,
    CharactersEnhanced,
    CharactersCategorized,
    LeaguesCompleted,
    ErrorMessage,
    Warnings,
    LastHeartbeat,
}
