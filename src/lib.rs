//! # Popcorn Submission Service
//!
//! Collects "popularity contest" package usage reports from client machines,
//! normalizes them into systems, vendors, distros, submissions and
//! per-package status facts, and serves aggregate statistics.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod ingest;
pub mod models;
pub mod report;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod throttle;
pub mod transport;
pub use migration;
