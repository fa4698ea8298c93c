//! # Statistics Handlers
//!
//! Read-only JSON views over the submission store: per-distro totals and
//! lookups of individual systems, vendors, submissions and packages.

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, not_found};
use crate::models::{distro, submission};
use crate::repositories::submission::PackageFactRow;
use crate::repositories::{
    DistroRepository, PackageRepository, StatusCounts, SubmissionRepository, SystemRepository,
    VendorRepository,
};
use crate::server::AppState;

/// Aggregate counts shown on the index page
#[derive(Debug, Serialize, ToSchema)]
pub struct IndexResponse {
    /// `[distro_name, package_facts]` pairs
    #[schema(value_type = Vec<Vec<Object>>)]
    pub distro_packages: Vec<(String, i64)>,
    /// `["name version", submissions]` pairs
    #[schema(value_type = Vec<Vec<Object>>)]
    pub submissions_distrover: Vec<(String, i64)>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DistroListResponse {
    /// `["name version", submissions]` pairs
    #[schema(value_type = Vec<Vec<Object>>)]
    pub submissions_distrover: Vec<(String, i64)>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DistroInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionSummary {
    pub id: i32,
    pub date: DateTime<Utc>,
    pub arch: String,
    pub popcorn_version: String,
}

impl From<submission::Model> for SubmissionSummary {
    fn from(model: submission::Model) -> Self {
        Self {
            id: model.id,
            date: model.submitted_at.with_timezone(&Utc),
            arch: model.arch,
            popcorn_version: model.popcorn_version,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DistroReleaseResponse {
    pub distro: DistroInfo,
    pub submissions: Vec<SubmissionSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VendorInfo {
    pub vendor_name: String,
    pub vendor_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VendorResponse {
    pub vendor: VendorInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemInfo {
    pub sys_hwuuid: String,
    pub arch: String,
    /// Time of the latest accepted submission
    pub last_sub_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemResponse {
    pub system: SystemInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionResponse {
    pub submission: SubmissionSummary,
    pub distro: Option<DistroInfo>,
    pub packages: Vec<PackageFactRow>,
}

/// A package across vendors
#[derive(Debug, Serialize, ToSchema)]
pub struct GenericPackage {
    pub name: String,
    pub version: String,
    pub release: String,
    /// Absent when the lookup did not constrain the epoch
    pub epoch: Option<String>,
    pub arch: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PackageResponse {
    pub package: GenericPackage,
    /// Vendors shipping this package
    pub vendors: Vec<String>,
    /// Package facts across all submissions
    pub occurrences: u64,
    pub counts: StatusCounts,
}

fn release_label(name: &str, version: &str) -> String {
    format!("{name} {version}")
}

async fn submissions_by_release(state: &AppState) -> Result<Vec<(String, i64)>, ApiError> {
    let rows = DistroRepository::new(state.db.clone())
        .submission_counts()
        .await?;
    Ok(rows
        .into_iter()
        .map(|(name, version, count)| (release_label(&name, &version), count))
        .collect())
}

/// Index statistics
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Per-distro totals", body = IndexResponse),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn index(State(state): State<AppState>) -> Result<Json<IndexResponse>, ApiError> {
    let distro_packages = DistroRepository::new(state.db.clone())
        .package_fact_counts()
        .await?;
    let submissions_distrover = submissions_by_release(&state).await?;

    Ok(Json(IndexResponse {
        distro_packages,
        submissions_distrover,
    }))
}

/// Submissions per distro release
#[utoipa::path(
    get,
    path = "/distro",
    responses(
        (status = 200, description = "Submission counts", body = DistroListResponse),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn distros(State(state): State<AppState>) -> Result<Json<DistroListResponse>, ApiError> {
    Ok(Json(DistroListResponse {
        submissions_distrover: submissions_by_release(&state).await?,
    }))
}

/// One distro release and its submissions
#[utoipa::path(
    get,
    path = "/distro/{name}/{version}",
    params(
        ("name" = String, Path, description = "Distribution name"),
        ("version" = String, Path, description = "Distribution release")
    ),
    responses(
        (status = 200, description = "Distro release", body = DistroReleaseResponse),
        (status = 404, description = "Unknown distro release", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn distro_release(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<DistroReleaseResponse>, ApiError> {
    let distro = DistroRepository::new(state.db.clone())
        .find(&name, &version)
        .await?
        .ok_or_else(|| not_found("distro"))?;

    let submissions = SubmissionRepository::new(state.db.clone())
        .for_distro(distro.id)
        .await?
        .into_iter()
        .map(SubmissionSummary::from)
        .collect();

    Ok(Json(DistroReleaseResponse {
        distro: distro_info(distro),
        submissions,
    }))
}

fn distro_info(model: distro::Model) -> DistroInfo {
    DistroInfo {
        name: model.name,
        version: model.version,
    }
}

/// Vendor details
#[utoipa::path(
    get,
    path = "/vendor/{name}",
    params(("name" = String, Path, description = "Vendor name")),
    responses(
        (status = 200, description = "Vendor", body = VendorResponse),
        (status = 404, description = "Unknown vendor", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn vendor(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<VendorResponse>, ApiError> {
    let vendor = VendorRepository::new(state.db.clone())
        .find_by_name(&name)
        .await?
        .ok_or_else(|| not_found("vendor"))?;

    Ok(Json(VendorResponse {
        vendor: VendorInfo {
            vendor_name: vendor.name,
            vendor_url: vendor.url,
        },
    }))
}

/// System details
#[utoipa::path(
    get,
    path = "/system/{hw_uuid}",
    params(("hw_uuid" = String, Path, description = "Hardware UUID reported by the client")),
    responses(
        (status = 200, description = "System", body = SystemResponse),
        (status = 404, description = "Unknown system", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn system(
    State(state): State<AppState>,
    Path(hw_uuid): Path<String>,
) -> Result<Json<SystemResponse>, ApiError> {
    let system = SystemRepository::new(state.db.clone())
        .find_by_hw_uuid(&hw_uuid)
        .await?
        .ok_or_else(|| not_found("system"))?;

    let last_sub_date = SubmissionRepository::new(state.db.clone())
        .latest_for_system(system.id)
        .await?
        .map(|submission| submission.submitted_at.with_timezone(&Utc));

    Ok(Json(SystemResponse {
        system: SystemInfo {
            sys_hwuuid: system.hw_uuid,
            arch: system.arch,
            last_sub_date,
        },
    }))
}

/// A submission and its package facts
#[utoipa::path(
    get,
    path = "/submission/{id}",
    params(("id" = i32, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission", body = SubmissionResponse),
        (status = 404, description = "Unknown submission", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn submission(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submissions = SubmissionRepository::new(state.db.clone());
    let submission = submissions
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found("submission"))?;

    let distro = DistroRepository::new(state.db.clone())
        .find_by_id(submission.distro_id)
        .await?
        .map(distro_info);
    let packages = submissions.package_facts(submission.id).await?;

    Ok(Json(SubmissionResponse {
        submission: submission.into(),
        distro,
        packages,
    }))
}

/// Usage counts of a package, any epoch
#[utoipa::path(
    get,
    path = "/package/{name}/{version}/{release}/{arch}",
    params(
        ("name" = String, Path, description = "Package name"),
        ("version" = String, Path, description = "Package version"),
        ("release" = String, Path, description = "Package release"),
        ("arch" = String, Path, description = "Package architecture")
    ),
    responses(
        (status = 200, description = "Package usage", body = PackageResponse),
        (status = 404, description = "Unknown package", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn package(
    State(state): State<AppState>,
    Path((name, version, release, arch)): Path<(String, String, String, String)>,
) -> Result<Json<PackageResponse>, ApiError> {
    package_usage(&state, name, version, release, None, arch).await
}

/// Usage counts of a package with an explicit epoch
#[utoipa::path(
    get,
    path = "/package/{name}/{version}/{release}/{epoch}/{arch}",
    params(
        ("name" = String, Path, description = "Package name"),
        ("version" = String, Path, description = "Package version"),
        ("release" = String, Path, description = "Package release"),
        ("epoch" = String, Path, description = "Package epoch"),
        ("arch" = String, Path, description = "Package architecture")
    ),
    responses(
        (status = 200, description = "Package usage", body = PackageResponse),
        (status = 404, description = "Unknown package", body = ApiError)
    ),
    tag = "stats"
)]
pub async fn package_with_epoch(
    State(state): State<AppState>,
    Path((name, version, release, epoch, arch)): Path<(String, String, String, String, String)>,
) -> Result<Json<PackageResponse>, ApiError> {
    package_usage(&state, name, version, release, Some(epoch), arch).await
}

async fn package_usage(
    state: &AppState,
    name: String,
    version: String,
    release: String,
    epoch: Option<String>,
    arch: String,
) -> Result<Json<PackageResponse>, ApiError> {
    let packages = PackageRepository::new(state.db.clone());
    let identities = packages
        .find_generic(&name, &version, &release, epoch.as_deref(), &arch)
        .await?;
    if identities.is_empty() {
        return Err(not_found("package"));
    }

    let ids: Vec<i32> = identities.iter().map(|package| package.id).collect();
    let mut vendor_ids: Vec<i32> = identities.iter().map(|package| package.vendor_id).collect();
    vendor_ids.sort_unstable();
    vendor_ids.dedup();

    let occurrences = packages.occurrences(&ids).await?;
    let counts = packages.status_counts(&ids).await?;
    let vendors = VendorRepository::new(state.db.clone())
        .find_by_ids(&vendor_ids)
        .await?
        .into_iter()
        .map(|vendor| vendor.name)
        .collect();

    Ok(Json(PackageResponse {
        package: GenericPackage {
            name,
            version,
            release,
            epoch,
            arch,
        },
        vendors,
        occurrences,
        counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_label_joins_name_and_version() {
        assert_eq!(release_label("openSUSE", "11.2"), "openSUSE 11.2");
    }

    #[test]
    fn index_serializes_pairs_as_arrays() {
        let response = IndexResponse {
            distro_packages: vec![("openSUSE".to_string(), 3)],
            submissions_distrover: vec![("openSUSE 11.2".to_string(), 1)],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["distro_packages"][0][0], "openSUSE");
        assert_eq!(json["distro_packages"][0][1], 3);
        assert_eq!(json["submissions_distrover"][0][0], "openSUSE 11.2");
    }
}
