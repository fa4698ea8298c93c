//! Vendor repository and natural key

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;

use crate::identity::{EntityKind, NaturalKey};
use crate::models::vendor::{self, Entity as Vendor};

/// Natural key of a [`vendor::Model`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorKey {
    pub name: String,
    /// Recorded on creation only
    pub url: String,
}

impl VendorKey {
    /// Key for a vendor named in a report. Reports carry no url, so the
    /// name doubles as one.
    pub fn reported(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: name.to_string(),
        }
    }
}

#[async_trait]
impl NaturalKey for VendorKey {
    type Model = vendor::Model;

    fn kind(&self) -> EntityKind {
        EntityKind::Vendor
    }

    async fn find(&self, txn: &DatabaseTransaction) -> Result<Option<vendor::Model>, DbErr> {
        Vendor::find()
            .filter(vendor::Column::Name.eq(self.name.as_str()))
            .one(txn)
            .await
    }

    async fn insert(&self, txn: &DatabaseTransaction) -> Result<vendor::Model, DbErr> {
        vendor::ActiveModel {
            name: Set(self.name.clone()),
            url: Set(self.url.clone()),
            created_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(txn)
        .await
    }
}

/// Repository for vendor lookups
#[derive(Debug, Clone)]
pub struct VendorRepository {
    pub db: Arc<DatabaseConnection>,
}

impl VendorRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<vendor::Model>, DbErr> {
        Vendor::find()
            .filter(vendor::Column::Name.eq(name))
            .one(&*self.db)
            .await
    }

    pub async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<vendor::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Vendor::find()
            .filter(vendor::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(vendor::Column::Name)
            .all(&*self.db)
            .await
    }
}
