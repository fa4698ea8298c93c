//! Migration to create the submission_packages table.
//!
//! One fact per report line, joining a submission to a package identity with
//! the reported usage status.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SubmissionPackages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubmissionPackages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SubmissionPackages::SubmissionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubmissionPackages::PackageId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SubmissionPackages::Status).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submission_packages_submission_id")
                            .from(SubmissionPackages::Table, SubmissionPackages::SubmissionId)
                            .to(Submissions::Table, Submissions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submission_packages_package_id")
                            .from(SubmissionPackages::Table, SubmissionPackages::PackageId)
                            .to(Packages::Table, Packages::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submission_packages_submission_id")
                    .table(SubmissionPackages::Table)
                    .col(SubmissionPackages::SubmissionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submission_packages_package_status")
                    .table(SubmissionPackages::Table)
                    .col(SubmissionPackages::PackageId)
                    .col(SubmissionPackages::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_submission_packages_submission_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_submission_packages_package_status")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SubmissionPackages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SubmissionPackages {
    Table,
    Id,
    SubmissionId,
    PackageId,
    Status,
}

#[derive(DeriveIden)]
enum Submissions {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Packages {
    Table,
    Id,
}
