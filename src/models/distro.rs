//! Distro entity model
//!
//! A distribution release, unique on `(name, version)`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "distros")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Distribution name, e.g. "openSUSE"
    pub name: String,

    /// Distribution release, e.g. "12.1"
    pub version: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
