//! Migration to create the distros table.
//!
//! A distro is identified by the composite `(name, version)` pair.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Distros::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Distros::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Distros::Name).text().not_null())
                    .col(ColumnDef::new(Distros::Version).text().not_null())
                    .col(
                        ColumnDef::new(Distros::CreatedAt)
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
                    .name("idx_distros_name_version")
                    .table(Distros::Table)
                    .col(Distros::Name)
                    .col(Distros::Version)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_distros_name_version").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Distros::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Distros {
    Table,
    Id,
    Name,
    Version,
    CreatedAt,
}
