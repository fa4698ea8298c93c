//! System entity model
//!
//! This module contains the SeaORM entity model for the systems table, one row
//! per machine that has ever submitted a report.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// A reporting machine, identified by its hardware UUID
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "systems")]
pub struct Model {
    /// Surrogate identifier (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Opaque hardware UUID reported by the client (unique)
    #[sea_orm(unique)]
    pub hw_uuid: String,

    /// Architecture recorded on first sight
    pub arch: String,

    /// Timestamp when the system was first seen
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
