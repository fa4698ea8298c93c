//! Migration to create the submissions table.
//!
//! Each row is one accepted report. The `(system_id, id)` index serves the
//! "latest submission for a system" lookup used by the throttle.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Submissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submissions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Submissions::SystemId).integer().not_null())
                    .col(ColumnDef::new(Submissions::DistroId).integer().not_null())
                    .col(ColumnDef::new(Submissions::Arch).text().not_null())
                    .col(ColumnDef::new(Submissions::PopcornVersion).text().not_null())
                    .col(
                        ColumnDef::new(Submissions::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_system_id")
                            .from(Submissions::Table, Submissions::SystemId)
                            .to(Systems::Table, Systems::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_distro_id")
                            .from(Submissions::Table, Submissions::DistroId)
                            .to(Distros::Table, Distros::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_system_id")
                    .table(Submissions::Table)
                    .col(Submissions::SystemId)
                    .col(Submissions::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_distro_id")
                    .table(Submissions::Table)
                    .col(Submissions::DistroId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_submissions_system_id").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_submissions_distro_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Submissions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Submissions {
    Table,
    Id,
    SystemId,
    DistroId,
    Arch,
    PopcornVersion,
    SubmittedAt,
}

#[derive(DeriveIden)]
enum Systems {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Distros {
    Table,
    Id,
}
