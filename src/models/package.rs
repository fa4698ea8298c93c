//! Package identity entity model
//!
//! This module contains the SeaORM entity model for the packages table. A
//! package identity is the deduplicated `(name, version, release, epoch, arch,
//! vendor)` tuple shared by every system that reports it.

use super::vendor::Entity as Vendor;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

/// Package identity; immutable once created
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "packages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    pub version: String,

    pub release: String,

    /// Package epoch; empty string when the client did not report one
    pub epoch: String,

    pub arch: String,

    /// Vendor that built the package
    pub vendor_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Vendor",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
}

impl Related<Vendor> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
