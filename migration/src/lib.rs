//! Database migrations for the Popcorn submission service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_10_01_000001_create_systems;
mod m2026_10_01_000002_create_vendors;
mod m2026_10_01_000003_create_distros;
mod m2026_10_01_000004_create_submissions;
mod m2026_10_01_000005_create_packages;
mod m2026_10_01_000006_create_submission_packages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_10_01_000001_create_systems::Migration),
            Box::new(m2026_10_01_000002_create_vendors::Migration),
            Box::new(m2026_10_01_000003_create_distros::Migration),
            Box::new(m2026_10_01_000004_create_submissions::Migration),
            Box::new(m2026_10_01_000005_create_packages::Migration),
            Box::new(m2026_10_01_000006_create_submission_packages::Migration),
        ]
    }
}
