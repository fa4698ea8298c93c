//! # Repository Layer
//!
//! Repositories encapsulate the SeaORM queries behind the read endpoints,
//! and each module defines the natural key used to resolve its entity
//! during ingestion.

pub mod distro;
pub mod package;
pub mod submission;
pub mod system;
pub mod vendor;

pub use distro::{DistroKey, DistroRepository};
pub use package::{PackageKey, PackageRepository, StatusCounts};
pub use submission::SubmissionRepository;
pub use system::{SystemKey, SystemRepository};
pub use vendor::{VendorKey, VendorRepository};
