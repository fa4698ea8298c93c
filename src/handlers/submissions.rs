//! # Submission Upload Handler
//!
//! `POST /` accepts a multipart form whose `popcorn` field holds the report,
//! plain or gzip-compressed. Responses are plain text for the benefit of
//! shell-script clients.

use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use utoipa::ToSchema;

use crate::ingest::{IngestError, Upload};
use crate::repositories::distro::UNKNOWN_DISTRO;
use crate::server::AppState;

/// Body returned for an accepted report
pub const SUBMISSION_ACCEPTED: &str = "Submission received. Thanks!";

const REPORT_FIELD: &str = "popcorn";
const DISTRO_NAME_FIELD: &str = "distro_name";
const DISTRO_VERSION_FIELD: &str = "distro_version";

/// Media types accepted for the report field; a missing type is accepted too
const ACCEPTED_REPORT_TYPES: &[&str] = &[
    "text/plain",
    "application/octet-stream",
    "application/gzip",
    "application/x-gzip",
];

/// Multipart form accepted by the upload endpoint
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct SubmissionForm {
    /// Report text, optionally gzip-compressed
    #[schema(value_type = String, format = Binary)]
    popcorn: Vec<u8>,
    /// Distribution name, e.g. `openSUSE`
    distro_name: Option<String>,
    /// Distribution release, e.g. `11.2`
    distro_version: Option<String>,
}

#[derive(Debug, Error)]
pub enum SubmissionRejection {
    #[error("nothing uploaded")]
    NothingUploaded,
    #[error("unsupported content type '{0}' for report field")]
    UnsupportedMediaType(String),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl IntoResponse for SubmissionRejection {
    fn into_response(self) -> Response {
        match self {
            SubmissionRejection::NothingUploaded => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            SubmissionRejection::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, self.to_string()).into_response()
            }
            SubmissionRejection::Multipart(err) => (err.status(), err.body_text()).into_response(),
            SubmissionRejection::Ingest(err) => err.into_response(),
        }
    }
}

/// Receive a popcorn report
#[utoipa::path(
    post,
    path = "/",
    request_body(content = SubmissionForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Report stored", body = String, content_type = "text/plain"),
        (status = 400, description = "Malformed report or missing field", body = String, content_type = "text/plain"),
        (status = 415, description = "Unsupported report content type", body = String, content_type = "text/plain"),
        (status = 429, description = "System submitted too recently", body = String, content_type = "text/plain"),
        (status = 500, description = "Storage failure", body = String, content_type = "text/plain")
    ),
    tag = "submissions"
)]
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, SubmissionRejection> {
    let mut report: Option<(Vec<u8>, Option<String>)> = None;
    let mut distro_name: Option<String> = None;
    let mut distro_version: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(REPORT_FIELD) => {
                if let Some(content_type) = field.content_type()
                    && !is_accepted_report_type(content_type)
                {
                    return Err(SubmissionRejection::UnsupportedMediaType(
                        content_type.to_string(),
                    ));
                }
                let content_encoding = field
                    .headers()
                    .get(header::CONTENT_ENCODING)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let bytes = field.bytes().await?;
                report = Some((bytes.to_vec(), content_encoding));
            }
            Some(DISTRO_NAME_FIELD) => distro_name = non_empty(field.text().await?),
            Some(DISTRO_VERSION_FIELD) => distro_version = non_empty(field.text().await?),
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown form field");
            }
        }
    }

    let Some((payload, field_encoding)) = report else {
        return Err(SubmissionRejection::NothingUploaded);
    };

    let request_encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok());
    let mut upload = Upload::new(payload)
        .with_content_encoding(field_encoding.as_deref().or(request_encoding));
    if let Some(name) = distro_name {
        let version = distro_version.unwrap_or_else(|| UNKNOWN_DISTRO.to_string());
        upload = upload.with_distro(name, version);
    }

    let receipt = state.ingest.ingest(upload).await?;
    tracing::debug!(submission_id = receipt.submission_id, "Upload handled");

    Ok((StatusCode::OK, SUBMISSION_ACCEPTED).into_response())
}

fn is_accepted_report_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ACCEPTED_REPORT_TYPES.contains(&essence.as_str())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text_and_gzip_types() {
        assert!(is_accepted_report_type("text/plain"));
        assert!(is_accepted_report_type("text/plain; charset=utf-8"));
        assert!(is_accepted_report_type("Application/X-Gzip"));
        assert!(is_accepted_report_type("application/octet-stream"));
        assert!(!is_accepted_report_type("image/png"));
        assert!(!is_accepted_report_type("application/json"));
    }

    #[test]
    fn missing_report_is_bad_request() {
        let response = SubmissionRejection::NothingUploaded.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn blank_form_values_are_ignored() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty(" 11.2 ".to_string()), Some("11.2".to_string()));
    }
}
