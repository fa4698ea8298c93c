//! # Ingestion Orchestrator
//!
//! Turns one uploaded report into durable records:
//!
//! ```text
//! RECEIVED -> DECODED -> PARSED -> THROTTLE_CHECKED -> RESOLVED -> PERSISTED
//!                          |              |
//!                   FORMAT_REJECTED  THROTTLE_REJECTED
//! ```
//!
//! Everything after parsing runs in a single database transaction, so a
//! report is stored completely or not at all. Dropping the future drops the
//! transaction, which rolls it back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::db::{WriteGate, checkpoint};
use crate::identity::{ResolveError, resolve};
use crate::report::{FormatError, PackageStatus, Report, parse_report};
use crate::repositories::submission::{self, NewSubmission};
use crate::repositories::system::lock_system;
use crate::repositories::{DistroKey, PackageKey, SystemKey, VendorKey};
use crate::telemetry;
use crate::throttle::{EarlySubmissionError, SubmissionThrottle, ThrottleError};
use crate::transport::{PayloadEncoding, decode_payload};

/// Progress of a report through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Decoded,
    Parsed,
    ThrottleChecked,
    Resolved,
    Persisted,
    FormatRejected,
    ThrottleRejected,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Decoded => "DECODED",
            Self::Parsed => "PARSED",
            Self::ThrottleChecked => "THROTTLE_CHECKED",
            Self::Resolved => "RESOLVED",
            Self::Persisted => "PERSISTED",
            Self::FormatRejected => "FORMAT_REJECTED",
            Self::ThrottleRejected => "THROTTLE_REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Persisted | Self::FormatRejected | Self::ThrottleRejected
        )
    }
}

/// A report as received from a client
#[derive(Debug, Clone)]
pub struct Upload {
    pub payload: Vec<u8>,
    pub encoding: PayloadEncoding,
    /// Distro release the report belongs to; unknown when absent
    pub distro: Option<DistroKey>,
}

impl Upload {
    /// Upload whose framing is sniffed from the payload alone.
    pub fn new(payload: Vec<u8>) -> Self {
        let encoding = PayloadEncoding::detect(None, &payload);
        Self {
            payload,
            encoding,
            distro: None,
        }
    }

    /// Re-detect framing honouring a `Content-Encoding` value.
    pub fn with_content_encoding(mut self, content_encoding: Option<&str>) -> Self {
        self.encoding = PayloadEncoding::detect(content_encoding, &self.payload);
        self
    }

    pub fn with_distro(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.distro = Some(DistroKey {
            name: name.into(),
            version: version.into(),
        });
        self
    }
}

/// What an accepted report produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IngestReceipt {
    pub submission_id: i32,
    pub system_id: i32,
    /// Package facts recorded
    pub packages: usize,
    /// Package identities seen for the first time
    pub new_packages: usize,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    EarlySubmission(#[from] EarlySubmissionError),
    #[error("identity resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("storage error: {0}")]
    Storage(#[from] DbErr),
}

impl IngestError {
    /// Metric label for the outcome this error represents.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Format(_) => "format_rejected",
            Self::EarlySubmission(_) => "throttle_rejected",
            Self::Resolve(_) | Self::Storage(_) => "error",
        }
    }
}

impl From<ThrottleError> for IngestError {
    fn from(err: ThrottleError) -> Self {
        match err {
            ThrottleError::Early(early) => Self::EarlySubmission(early),
            ThrottleError::Storage(db) => Self::Storage(db),
        }
    }
}

/// Runs the ingestion pipeline against the shared connection pool
#[derive(Debug, Clone)]
pub struct IngestService {
    db: Arc<DatabaseConnection>,
    write_gate: WriteGate,
    throttle: SubmissionThrottle,
    max_submission_bytes: usize,
}

impl IngestService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        throttle: SubmissionThrottle,
        max_submission_bytes: usize,
    ) -> Self {
        Self {
            write_gate: WriteGate::for_backend(db.get_database_backend()),
            db,
            throttle,
            max_submission_bytes,
        }
    }

    pub fn from_config(db: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        Self::new(
            db,
            SubmissionThrottle::new(config.submission_min_interval()),
            config.max_submission_bytes(),
        )
    }

    /// Ingest `upload` using the current time.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestReceipt, IngestError> {
        self.ingest_at(upload, Utc::now()).await
    }

    /// Ingest `upload` as if received at `now`.
    pub async fn ingest_at(
        &self,
        upload: Upload,
        now: DateTime<Utc>,
    ) -> Result<IngestReceipt, IngestError> {
        let started = Instant::now();
        let result = self.run(upload, now).await;

        match &result {
            Ok(receipt) => {
                telemetry::record_submission("accepted");
                telemetry::record_submission_packages(receipt.packages);
                tracing::info!(
                    submission_id = receipt.submission_id,
                    system_id = receipt.system_id,
                    packages = receipt.packages,
                    new_packages = receipt.new_packages,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Submission accepted"
                );
            }
            Err(err) => {
                telemetry::record_submission(err.outcome());
                if matches!(err, IngestError::Resolve(_) | IngestError::Storage(_)) {
                    tracing::error!(error = %err, "Submission failed");
                }
            }
        }

        result
    }

    async fn run(&self, upload: Upload, now: DateTime<Utc>) -> Result<IngestReceipt, IngestError> {
        enter(IngestStage::Received);
        tracing::debug!(
            payload_bytes = upload.payload.len(),
            encoding = upload.encoding.name(),
            "Report received"
        );

        let decoded = decode_payload(&upload.payload, upload.encoding, self.max_submission_bytes);
        if decoded.len() > self.max_submission_bytes {
            return Err(format_rejected(FormatError::TooLarge {
                limit: self.max_submission_bytes,
            }));
        }
        enter(IngestStage::Decoded);

        let report = parse_report(&decoded).map_err(format_rejected)?;
        enter(IngestStage::Parsed);
        tracing::debug!(
            hw_uuid = %report.header.hw_uuid,
            protocol_version = %report.header.protocol_version,
            lines = report.lines.len(),
            "Report parsed"
        );

        let distro = upload.distro.unwrap_or_else(DistroKey::unknown);

        // Held until commit; on SQLite this queues writers in-process
        let writer = self.write_gate.enter().await;
        let txn = self.db.begin().await?;
        let receipt = match persist(&txn, &self.throttle, &report, &distro, now).await {
            Ok(receipt) => receipt,
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back ingestion transaction");
                }
                return Err(err);
            }
        };
        txn.commit().await?;
        drop(writer);

        // The report is committed; a failed checkpoint only delays visibility
        if let Err(err) = checkpoint(&*self.db).await {
            tracing::warn!(error = %err, "Post-commit checkpoint failed");
        }
        enter(IngestStage::Persisted);

        Ok(receipt)
    }
}

fn enter(stage: IngestStage) {
    tracing::debug!(stage = stage.as_str(), "Ingestion stage");
}

fn format_rejected(err: FormatError) -> IngestError {
    tracing::info!(stage = IngestStage::FormatRejected.as_str(), error = %err, "Report rejected");
    IngestError::Format(err)
}

async fn persist(
    txn: &DatabaseTransaction,
    throttle: &SubmissionThrottle,
    report: &Report,
    distro: &DistroKey,
    now: DateTime<Utc>,
) -> Result<IngestReceipt, IngestError> {
    let header = &report.header;
    let system = resolve(
        txn,
        &SystemKey {
            hw_uuid: header.hw_uuid.clone(),
            arch: header.arch.clone(),
        },
    )
    .await?;
    let system_id = system.model.id;
    if system.created {
        tracing::debug!(system_id, hw_uuid = %header.hw_uuid, "New system");
    }

    lock_system(txn, system_id).await?;
    if let Err(err) = throttle.check_system(txn, system_id, now).await {
        if let ThrottleError::Early(early) = &err {
            tracing::info!(
                stage = IngestStage::ThrottleRejected.as_str(),
                system_id,
                retry_at = %early.retry_at,
                "Report rejected"
            );
        }
        return Err(err.into());
    }
    enter(IngestStage::ThrottleChecked);

    let distro = resolve(txn, distro).await?;
    let submission = submission::create(
        txn,
        NewSubmission {
            system_id,
            distro_id: distro.model.id,
            arch: header.arch.clone(),
            popcorn_version: header.protocol_version.clone(),
            submitted_at: now,
        },
    )
    .await?;

    let mut vendors: HashMap<&str, i32> = HashMap::new();
    let mut packages: HashMap<PackageKey, i32> = HashMap::new();
    let mut facts: Vec<(i32, PackageStatus)> = Vec::with_capacity(report.lines.len());
    let mut new_packages = 0;

    for line in &report.lines {
        let vendor_id = match vendors.get(line.vendor.as_str()) {
            Some(id) => *id,
            None => {
                let vendor = resolve(txn, &VendorKey::reported(&line.vendor)).await?;
                vendors.insert(line.vendor.as_str(), vendor.model.id);
                vendor.model.id
            }
        };

        let key = PackageKey {
            name: line.name.clone(),
            version: line.version.clone(),
            release: line.release.clone(),
            epoch: String::new(),
            arch: line.arch.clone(),
            vendor_id,
        };
        let package_id = match packages.get(&key) {
            Some(id) => *id,
            None => {
                let package = resolve(txn, &key).await?;
                if package.created {
                    new_packages += 1;
                }
                packages.insert(key, package.model.id);
                package.model.id
            }
        };

        facts.push((package_id, line.status));
    }
    enter(IngestStage::Resolved);

    submission::insert_facts(txn, submission.id, &facts).await?;

    Ok(IngestReceipt {
        submission_id: submission.id,
        system_id,
        packages: facts.len(),
        new_packages,
    })
}
