//! Submission repository
//!
//! Submissions and their package facts are written once, inside the
//! ingestion transaction, and only read afterwards.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::package;
use crate::models::submission::{self, Entity as Submission};
use crate::models::submission_package::{self, Entity as SubmissionPackage};
use crate::models::vendor;
use crate::report::PackageStatus;

/// Rows per multi-row insert; keeps bound parameters well under SQLite's limit
const FACT_BATCH_SIZE: usize = 300;

/// Attributes of a submission about to be recorded
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub system_id: i32,
    pub distro_id: i32,
    pub arch: String,
    pub popcorn_version: String,
    pub submitted_at: DateTime<Utc>,
}

/// One package fact of a submission, joined with its package identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult, ToSchema)]
pub struct PackageFactRow {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: String,
    pub arch: String,
    pub vendor: String,
    pub status: String,
}

/// Most recent submission of a system, by insertion order.
pub async fn latest_for_system<C: ConnectionTrait>(
    conn: &C,
    system_id: i32,
) -> Result<Option<submission::Model>, DbErr> {
    Submission::find()
        .filter(submission::Column::SystemId.eq(system_id))
        .order_by_desc(submission::Column::Id)
        .one(conn)
        .await
}

/// Insert the submission row.
pub async fn create(
    txn: &DatabaseTransaction,
    new: NewSubmission,
) -> Result<submission::Model, DbErr> {
    submission::ActiveModel {
        system_id: Set(new.system_id),
        distro_id: Set(new.distro_id),
        arch: Set(new.arch),
        popcorn_version: Set(new.popcorn_version),
        submitted_at: Set(new.submitted_at.fixed_offset()),
        ..Default::default()
    }
    .insert(txn)
    .await
}

/// Append one fact per `(package_id, status)` pair, in batches.
pub async fn insert_facts(
    txn: &DatabaseTransaction,
    submission_id: i32,
    facts: &[(i32, PackageStatus)],
) -> Result<(), DbErr> {
    for batch in facts.chunks(FACT_BATCH_SIZE) {
        let rows = batch
            .iter()
            .map(|(package_id, status)| submission_package::ActiveModel {
                submission_id: Set(submission_id),
                package_id: Set(*package_id),
                status: Set(status.as_str().to_string()),
                ..Default::default()
            });

        SubmissionPackage::insert_many(rows).exec(txn).await?;
    }
    Ok(())
}

/// Repository for submission reads
#[derive(Debug, Clone)]
pub struct SubmissionRepository {
    pub db: Arc<DatabaseConnection>,
}

impl SubmissionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<submission::Model>, DbErr> {
        Submission::find_by_id(id).one(&*self.db).await
    }

    pub async fn latest_for_system(
        &self,
        system_id: i32,
    ) -> Result<Option<submission::Model>, DbErr> {
        latest_for_system(&*self.db, system_id).await
    }

    /// Submissions of one distro release, newest first.
    pub async fn for_distro(&self, distro_id: i32) -> Result<Vec<submission::Model>, DbErr> {
        Submission::find()
            .filter(submission::Column::DistroId.eq(distro_id))
            .order_by_desc(submission::Column::Id)
            .all(&*self.db)
            .await
    }

    /// Package facts of a submission in the order they were reported.
    pub async fn package_facts(&self, submission_id: i32) -> Result<Vec<PackageFactRow>, DbErr> {
        SubmissionPackage::find()
            .select_only()
            .column(package::Column::Name)
            .column(package::Column::Version)
            .column(package::Column::Release)
            .column(package::Column::Epoch)
            .column(package::Column::Arch)
            .column_as(vendor::Column::Name, "vendor")
            .column(submission_package::Column::Status)
            .join(JoinType::InnerJoin, submission_package::Relation::Package.def())
            .join(JoinType::InnerJoin, package::Relation::Vendor.def())
            .filter(submission_package::Column::SubmissionId.eq(submission_id))
            .order_by_asc(submission_package::Column::Id)
            .into_model::<PackageFactRow>()
            .all(&*self.db)
            .await
    }
}
