//! Package repository and natural key
//!
//! Package identities are deduplicated by the full
//! `(name, version, release, epoch, arch, vendor)` tuple. Usage counts are
//! never stored on the identity; they are derived from the facts recorded
//! per submission.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::identity::{EntityKind, NaturalKey};
use crate::models::package::{self, Entity as Package};
use crate::models::submission_package::{self, Entity as SubmissionPackage};
use crate::report::PackageStatus;

/// Natural key of a [`package::Model`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
    pub release: String,
    /// Empty when the client reported no epoch
    pub epoch: String,
    pub arch: String,
    pub vendor_id: i32,
}

#[async_trait]
impl NaturalKey for PackageKey {
    type Model = package::Model;

    fn kind(&self) -> EntityKind {
        EntityKind::Package
    }

    async fn find(&self, txn: &DatabaseTransaction) -> Result<Option<package::Model>, DbErr> {
        Package::find()
            .filter(package::Column::Name.eq(self.name.as_str()))
            .filter(package::Column::Version.eq(self.version.as_str()))
            .filter(package::Column::Release.eq(self.release.as_str()))
            .filter(package::Column::Epoch.eq(self.epoch.as_str()))
            .filter(package::Column::Arch.eq(self.arch.as_str()))
            .filter(package::Column::VendorId.eq(self.vendor_id))
            .one(txn)
            .await
    }

    async fn insert(&self, txn: &DatabaseTransaction) -> Result<package::Model, DbErr> {
        package::ActiveModel {
            name: Set(self.name.clone()),
            version: Set(self.version.clone()),
            release: Set(self.release.clone()),
            epoch: Set(self.epoch.clone()),
            arch: Set(self.arch.clone()),
            vendor_id: Set(self.vendor_id),
            ..Default::default()
        }
        .insert(txn)
        .await
    }
}

/// Number of facts per usage status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub voted: i64,
    pub recent: i64,
    pub old: i64,
    pub nofiles: i64,
}

impl StatusCounts {
    pub fn get(&self, status: PackageStatus) -> i64 {
        match status {
            PackageStatus::Voted => self.voted,
            PackageStatus::Recent => self.recent,
            PackageStatus::Old => self.old,
            PackageStatus::NoFiles => self.nofiles,
        }
    }

    fn add(&mut self, status: PackageStatus, count: i64) {
        match status {
            PackageStatus::Voted => self.voted += count,
            PackageStatus::Recent => self.recent += count,
            PackageStatus::Old => self.old += count,
            PackageStatus::NoFiles => self.nofiles += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.voted + self.recent + self.old + self.nofiles
    }
}

/// Repository for package identities and their usage counts
#[derive(Debug, Clone)]
pub struct PackageRepository {
    pub db: Arc<DatabaseConnection>,
}

impl PackageRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All identities of a package across vendors. With `epoch: None` any
    /// epoch matches.
    pub async fn find_generic(
        &self,
        name: &str,
        version: &str,
        release: &str,
        epoch: Option<&str>,
        arch: &str,
    ) -> Result<Vec<package::Model>, DbErr> {
        let mut query = Package::find()
            .filter(package::Column::Name.eq(name))
            .filter(package::Column::Version.eq(version))
            .filter(package::Column::Release.eq(release))
            .filter(package::Column::Arch.eq(arch));

        if let Some(epoch) = epoch {
            query = query.filter(package::Column::Epoch.eq(epoch));
        }

        query.order_by_asc(package::Column::Id).all(&*self.db).await
    }

    /// Number of submissions that reported any of `package_ids`.
    pub async fn occurrences(&self, package_ids: &[i32]) -> Result<u64, DbErr> {
        if package_ids.is_empty() {
            return Ok(0);
        }

        SubmissionPackage::find()
            .filter(submission_package::Column::PackageId.is_in(package_ids.iter().copied()))
            .count(&*self.db)
            .await
    }

    /// Facts per status for `package_ids`, summed across the identities.
    pub async fn status_counts(&self, package_ids: &[i32]) -> Result<StatusCounts, DbErr> {
        let mut counts = StatusCounts::default();
        if package_ids.is_empty() {
            return Ok(counts);
        }

        let rows: Vec<(String, i64)> = SubmissionPackage::find()
            .select_only()
            .column(submission_package::Column::Status)
            .column_as(Expr::col(submission_package::Column::Id).count(), "count")
            .filter(submission_package::Column::PackageId.is_in(package_ids.iter().copied()))
            .group_by(submission_package::Column::Status)
            .into_tuple()
            .all(&*self.db)
            .await?;

        for (status, count) in rows {
            match PackageStatus::from_stored(&status) {
                Some(status) => counts.add(status, count),
                None => tracing::warn!(%status, "Ignoring fact with unrecognized status"),
            }
        }

        Ok(counts)
    }
}
