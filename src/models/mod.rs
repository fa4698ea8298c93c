//! # Data Models
//!
//! This module contains the SeaORM entities backing the popcorn submission
//! store and small shared response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod distro;
pub mod package;
pub mod submission;
pub mod submission_package;
pub mod system;
pub mod vendor;

pub use distro::Entity as Distro;
pub use package::Entity as Package;
pub use submission::Entity as Submission;
pub use submission_package::Entity as SubmissionPackage;
pub use system::Entity as System;
pub use vendor::Entity as Vendor;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "popcorn".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
