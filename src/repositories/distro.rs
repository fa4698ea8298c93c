//! Distro repository and natural key
//!
//! A distro is one release of a distribution, keyed by `(name, version)`.
//! The repository also carries the per-distro aggregate counts served on
//! the index page.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, sea_query::Expr,
};
use std::sync::Arc;

use crate::identity::{EntityKind, NaturalKey};
use crate::models::distro::{self, Entity as Distro};
use crate::models::submission::{self, Entity as Submission};
use crate::models::submission_package::{self, Entity as SubmissionPackage};

/// Name and version used when a report does not say which distro it is from
pub const UNKNOWN_DISTRO: &str = "unknown";

/// Natural key of a [`distro::Model`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroKey {
    pub name: String,
    pub version: String,
}

impl DistroKey {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_DISTRO.to_string(),
            version: UNKNOWN_DISTRO.to_string(),
        }
    }
}

#[async_trait]
impl NaturalKey for DistroKey {
    type Model = distro::Model;

    fn kind(&self) -> EntityKind {
        EntityKind::Distro
    }

    async fn find(&self, txn: &DatabaseTransaction) -> Result<Option<distro::Model>, DbErr> {
        Distro::find()
            .filter(distro::Column::Name.eq(self.name.as_str()))
            .filter(distro::Column::Version.eq(self.version.as_str()))
            .one(txn)
            .await
    }

    async fn insert(&self, txn: &DatabaseTransaction) -> Result<distro::Model, DbErr> {
        distro::ActiveModel {
            name: Set(self.name.clone()),
            version: Set(self.version.clone()),
            created_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        }
        .insert(txn)
        .await
    }
}

/// Repository for distro lookups and aggregates
#[derive(Debug, Clone)]
pub struct DistroRepository {
    pub db: Arc<DatabaseConnection>,
}

impl DistroRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<distro::Model>, DbErr> {
        Distro::find_by_id(id).one(&*self.db).await
    }

    pub async fn find(&self, name: &str, version: &str) -> Result<Option<distro::Model>, DbErr> {
        Distro::find()
            .filter(distro::Column::Name.eq(name))
            .filter(distro::Column::Version.eq(version))
            .one(&*self.db)
            .await
    }

    /// Number of submissions per distro release, as `(name, version, count)`
    /// ordered by name then version.
    pub async fn submission_counts(&self) -> Result<Vec<(String, String, i64)>, DbErr> {
        Submission::find()
            .select_only()
            .column(distro::Column::Name)
            .column(distro::Column::Version)
            .column_as(
                Expr::col((Submission, submission::Column::Id)).count(),
                "submissions",
            )
            .join(JoinType::InnerJoin, submission::Relation::Distro.def())
            .group_by(distro::Column::Name)
            .group_by(distro::Column::Version)
            .order_by_asc(distro::Column::Name)
            .order_by_asc(distro::Column::Version)
            .into_tuple()
            .all(&*self.db)
            .await
    }

    /// Number of package facts recorded per distro name, across releases.
    pub async fn package_fact_counts(&self) -> Result<Vec<(String, i64)>, DbErr> {
        SubmissionPackage::find()
            .select_only()
            .column(distro::Column::Name)
            .column_as(
                Expr::col((SubmissionPackage, submission_package::Column::Id)).count(),
                "facts",
            )
            .join(
                JoinType::InnerJoin,
                submission_package::Relation::Submission.def(),
            )
            .join(JoinType::InnerJoin, submission::Relation::Distro.def())
            .group_by(distro::Column::Name)
            .order_by_asc(distro::Column::Name)
            .into_tuple()
            .all(&*self.db)
            .await
    }
}
