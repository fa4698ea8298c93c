//! Migration to create the packages table.
//!
//! Package identities are deduplicated on the full
//! `(name, version, release, epoch, arch, vendor_id)` tuple. `epoch` is
//! non-null with an empty-string default so the unique index treats a missing
//! epoch as one value rather than as distinct NULLs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Packages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Packages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Packages::Name).text().not_null())
                    .col(ColumnDef::new(Packages::Version).text().not_null())
                    .col(ColumnDef::new(Packages::Release).text().not_null())
                    .col(
                        ColumnDef::new(Packages::Epoch)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Packages::Arch).text().not_null())
                    .col(ColumnDef::new(Packages::VendorId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_packages_vendor_id")
                            .from(Packages::Table, Packages::VendorId)
                            .to(Vendors::Table, Vendors::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_packages_natural_key")
                    .table(Packages::Table)
                    .col(Packages::Name)
                    .col(Packages::Version)
                    .col(Packages::Release)
                    .col(Packages::Epoch)
                    .col(Packages::Arch)
                    .col(Packages::VendorId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_packages_natural_key").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Packages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Packages {
    Table,
    Id,
    Name,
    Version,
    Release,
    Epoch,
    Arch,
    VendorId,
}

#[derive(DeriveIden)]
enum Vendors {
    Table,
    Id,
}
