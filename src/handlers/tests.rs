//! # Tests for Handlers
//!
//! Handler-level tests calling the functions directly with an in-memory
//! SQLite state.

use crate::config::AppConfig;
use crate::handlers::{health, ready, stats};
use crate::migration::{Migrator, MigratorTrait};
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use sea_orm::Database;

async fn test_state() -> AppState {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to apply migrations");
    AppState::new(AppConfig::default(), db)
}

#[tokio::test]
async fn test_health_returns_service_info() {
    let Json(service_info) = health().await;

    assert_eq!(service_info.service, "popcorn");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_ready_with_live_database() {
    let state = test_state().await;

    let result = ready(State(state)).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_index_on_empty_store() {
    let state = test_state().await;

    let Json(index) = stats::index(State(state)).await.unwrap();

    assert!(index.distro_packages.is_empty());
    assert!(index.submissions_distrover.is_empty());
}

#[tokio::test]
async fn test_unknown_vendor_is_not_found() {
    let state = test_state().await;

    let error = stats::vendor(State(state), Path("nobody".to_string()))
        .await
        .unwrap_err();

    assert_eq!(error.status, StatusCode::NOT_FOUND);
    assert_eq!(
        error.into_response().headers().get("content-type").unwrap(),
        "application/problem+json"
    );
}

#[tokio::test]
async fn test_unknown_package_is_not_found() {
    let state = test_state().await;

    let error = stats::package(
        State(state),
        Path((
            "sed".to_string(),
            "4.2.1".to_string(),
            "5.1.2".to_string(),
            "x86_64".to_string(),
        )),
    )
    .await
    .unwrap_err();

    assert_eq!(error.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_router_submit_then_read_back() {
    use crate::server::create_app;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    let app = create_app(test_state().await);
    let body = "--popcorn-boundary\r\n\
        Content-Disposition: form-data; name=\"popcorn\"; filename=\"popcorn.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        POPCORN 0.1 x86_64 router-test\n\
        v sed 4.2.1 5.1.2 x86_64 openSUSE\n\r\n\
        --popcorn-boundary--\r\n";

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(
                    header::CONTENT_TYPE,
                    "multipart/form-data; boundary=popcorn-boundary",
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Submission received. Thanks!");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/system/router-test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_package_route_without_epoch_matches_every_epoch() {
    use crate::identity::resolve;
    use crate::repositories::{PackageKey, VendorKey};
    use sea_orm::TransactionTrait;

    let state = test_state().await;
    let txn = state.db.begin().await.unwrap();
    for (epoch, vendor) in [("", "openSUSE"), ("1", "Packman")] {
        let vendor = resolve(&txn, &VendorKey::reported(vendor)).await.unwrap();
        let key = PackageKey {
            name: "sed".to_string(),
            version: "4.2.1".to_string(),
            release: "5.1.2".to_string(),
            epoch: epoch.to_string(),
            arch: "x86_64".to_string(),
            vendor_id: vendor.model.id,
        };
        resolve(&txn, &key).await.unwrap();
    }
    txn.commit().await.unwrap();

    let Json(any_epoch) = stats::package(
        State(state.clone()),
        Path((
            "sed".to_string(),
            "4.2.1".to_string(),
            "5.1.2".to_string(),
            "x86_64".to_string(),
        )),
    )
    .await
    .unwrap();
    assert_eq!(any_epoch.package.epoch, None);
    assert_eq!(any_epoch.vendors, vec!["Packman", "openSUSE"]);

    let Json(exact) = stats::package_with_epoch(
        State(state.clone()),
        Path((
            "sed".to_string(),
            "4.2.1".to_string(),
            "5.1.2".to_string(),
            "1".to_string(),
            "x86_64".to_string(),
        )),
    )
    .await
    .unwrap();
    assert_eq!(exact.package.epoch.as_deref(), Some("1"));
    assert_eq!(exact.vendors, vec!["Packman"]);

    let error = stats::package_with_epoch(
        State(state),
        Path((
            "sed".to_string(),
            "4.2.1".to_string(),
            "5.1.2".to_string(),
            "2".to_string(),
            "x86_64".to_string(),
        )),
    )
    .await
    .unwrap_err();
    assert_eq!(error.status, StatusCode::NOT_FOUND);
}
