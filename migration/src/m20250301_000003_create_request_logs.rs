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
                    .table(RequestLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RequestLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RequestLogs::ApiType).string().not_null())
                    .col(ColumnDef::new(RequestLogs::Endpoint).string())
                    .col(ColumnDef::new(RequestLogs::Success).boolean().not_null())
                    .col(ColumnDef::new(RequestLogs::ResponseTimeMs).big_integer())
                    .col(ColumnDef::new(RequestLogs::ErrorMessage).text())
                    .col(ColumnDef::new(RequestLogs::League).string())
                    .col(ColumnDef::new(RequestLogs::CharacterName).string())
                    .col(ColumnDef::new(RequestLogs::AccountName).string())
                    .col(
                        ColumnDef::new(RequestLogs::CreatedAt)
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
                    .name("idx_request_logs_api_type_created_at")
                    .table(RequestLogs::Table)
                    .col(RequestLogs::ApiType)
                    .col(RequestLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RequestLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum RequestLogs {
    Table,
    Id,
    ApiType,
    Endpoint,
    Success,
    ResponseTimeMs,
    ErrorMessage,
    League,
    CharacterName,
    AccountName,
    CreatedAt,
}
