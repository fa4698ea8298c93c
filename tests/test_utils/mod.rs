//! Test utilities for database testing.
//!
//! In-memory SQLite databases with migrations applied, plus report fixtures
//! shared by the integration tests.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use popcorn::ingest::IngestService;
use popcorn::throttle::SubmissionThrottle;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait};
use std::sync::Arc;
use tempfile::TempDir;

/// Hardware UUID used by the fixture reports
#[allow(dead_code)]
pub const HW_UUID: &str = "33d08e56f1d2748bc7d056375042dcd1336a7635fdc1cec159bedacfce9c2c4f";

/// Decoded-size limit used by test ingest services
#[allow(dead_code)]
pub const TEST_SUBMISSION_LIMIT: usize = 1024 * 1024;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Sets up an in-memory SQLite database with all migrations applied and returns an Arc.
#[allow(dead_code)]
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(db))
}

/// File-backed SQLite in `dir` with a pool of `max_connections`, so
/// concurrent tasks really run on separate connections.
#[allow(dead_code)]
pub async fn setup_file_db(dir: &TempDir, max_connections: u32) -> Result<Arc<DatabaseConnection>> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("popcorn.db").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(max_connections).sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;
    Ok(Arc::new(db))
}

/// Ingest service over `db` with the given throttle interval.
#[allow(dead_code)]
pub fn ingest_service(db: Arc<DatabaseConnection>, throttle: SubmissionThrottle) -> IngestService {
    IngestService::new(db, throttle, TEST_SUBMISSION_LIMIT)
}

/// Fixed reference time for throttle-sensitive tests.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
}

/// A report for `hw_uuid` with the given package lines.
#[allow(dead_code)]
pub fn report_for(hw_uuid: &str, lines: &[&str]) -> Vec<u8> {
    let mut text = format!("popcorn 0.1 x86_64 {hw_uuid}\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text.into_bytes()
}

/// The single-package example report.
#[allow(dead_code)]
pub fn example_report() -> Vec<u8> {
    report_for(HW_UUID, &["v sed 4.2.1 5.1.2 x86_64 openSUSE"])
}

/// One line per usage status.
#[allow(dead_code)]
pub fn all_statuses_report(hw_uuid: &str) -> Vec<u8> {
    report_for(
        hw_uuid,
        &[
            "v sed 4.2.1 5.1.2 x86_64 openSUSE",
            "r grep 2.5.4 1.1 x86_64 openSUSE",
            "o bash 4.0 68.1 x86_64 openSUSE",
            "n filesystem 11.2 3.1 noarch openSUSE",
        ],
    )
}

/// Gzip `data` in memory.
#[allow(dead_code)]
pub fn gzip(data: &[u8]) -> Vec<u8> {
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Row count of an entity's table.
#[allow(dead_code)]
pub async fn count_rows<E: EntityTrait>(db: &DatabaseConnection) -> u64
where
    E::Model: Sync,
{
    E::find().count(db).await.unwrap()
}
