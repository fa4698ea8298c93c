//! Submission entity model
//!
//! This module contains the SeaORM entity model for the submissions table.
//! A submission is one accepted report; it is immutable once written.

use super::distro::Entity as Distro;
use super::system::Entity as System;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Submission entity representing one ingested report
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    /// Monotonic surrogate identifier (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Submitting system
    pub system_id: i32,

    /// Distribution release the report was made from
    pub distro_id: i32,

    /// Architecture from the report header
    pub arch: String,

    /// Protocol version announced by the client
    pub popcorn_version: String,

    /// Timestamp when the report was accepted
    pub submitted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "System",
        from = "Column::SystemId",
        to = "super::system::Column::Id"
    )]
    System,
    #[sea_orm(
        belongs_to = "Distro",
        from = "Column::DistroId",
        to = "super::distro::Column::Id"
    )]
    Distro,
}

impl Related<System> for Entity {
    fn to() -> RelationDef {
        Relation::System.def()
    }
}

impl Related<Distro> for Entity {
    fn to() -> RelationDef {
        Relation::Distro.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
