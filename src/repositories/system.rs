//! System repository and natural key
//!
//! Systems are keyed by the hardware UUID the client reports. The
//! architecture is recorded when the system is first seen.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QuerySelect, Set,
};
use std::sync::Arc;

use crate::identity::{EntityKind, NaturalKey};
use crate::models::system::{self, Entity as System};

/// Natural key of a [`system::Model`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemKey {
    pub hw_uuid: String,
    /// Recorded on creation only
    pub arch: String,
}

#[async_trait]
impl NaturalKey for SystemKey {
    type Model = system::Model;

    fn kind(&self) -> EntityKind {
        EntityKind::System
    }

    async fn find(&self, txn: &DatabaseTransaction) -> Result<Option<system::Model>, DbErr> {
        System::find()
            .filter(system::Column::HwUuid.eq(self.hw_uuid.as_str()))
            .one(txn)
            .await
    }

    async fn insert(&self, txn: &DatabaseTransaction) -> Result<system::Model, DbErr> {
        system::ActiveModel {
            hw_uuid: Set(self.hw_uuid.clone()),
            arch: Set(self.arch.clone()),
            created_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(txn)
        .await
    }
}

/// Take a row lock on the system for the rest of `txn`.
///
/// Serializes concurrent reports from one machine so the throttle sees the
/// latest submission. SQLite ignores the clause; there the ingest service
/// holds a [`WriteGate`](crate::db::WriteGate) around the transaction.
pub async fn lock_system(txn: &DatabaseTransaction, system_id: i32) -> Result<(), DbErr> {
    System::find_by_id(system_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("system {system_id}")))?;
    Ok(())
}

/// Repository for system lookups
#[derive(Debug, Clone)]
pub struct SystemRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl SystemRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds a system by its hardware UUID
    pub async fn find_by_hw_uuid(&self, hw_uuid: &str) -> Result<Option<system::Model>, DbErr> {
        System::find()
            .filter(system::Column::HwUuid.eq(hw_uuid))
            .one(&*self.db)
            .await
    }

    pub async fn count(&self) -> Result<u64, DbErr> {
        System::find().count(&*self.db).await
    }
}
