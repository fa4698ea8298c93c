//! # Error Handling
//!
//! JSON read endpoints answer failures with a problem+json [`ApiError`]
//! carrying the request trace id. The ingest endpoint keeps the plain-text
//! contract popcorn clients expect, see [`IngestError`]'s response mapping.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::db::is_unique_violation;
use crate::ingest::IngestError;
use crate::telemetry;

/// Body of a failed ingest caused by the server rather than the report
pub const INGEST_INTERNAL_ERROR: &str = "Internal error while storing submission";

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            trace_id: Self::current_trace_id(),
        }
    }

    /// Create an error of a standard type with a specific message
    pub fn typed<S: Into<String>>(error_type: ErrorType, message: S) -> Self {
        Self::new(
            error_type.status_code(),
            error_type.error_code().to_string(),
            message.into(),
        )
    }

    /// Trace id of the running request, or a short correlation id outside one
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Standard error types with predefined status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorType {
    #[error("Not Found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Service Unavailable")]
    ServiceUnavailable,
}

impl ErrorType {
    /// Get the appropriate HTTP status code for this error type
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::Conflict => "CONFLICT",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        Self::typed(error_type, error_type.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        Self::typed(ErrorType::InternalServerError, "An internal error occurred")
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return Self::typed(ErrorType::Conflict, "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                Self::typed(ErrorType::NotFound, format!("Record not found: {}", record))
            }
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::from(ErrorType::ServiceUnavailable)
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::typed(ErrorType::InternalServerError, "Database error occurred")
            }
        }
    }
}

/// Create a not-found error (404) naming the missing entity
pub fn not_found(what: &str) -> ApiError {
    ApiError::typed(ErrorType::NotFound, format!("{what} not found"))
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::Format(_) => StatusCode::BAD_REQUEST,
            IngestError::EarlySubmission(_) => StatusCode::TOO_MANY_REQUESTS,
            IngestError::Resolve(_) | IngestError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Plain-text response; storage details stay in the logs.
impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            IngestError::Format(_) | IngestError::EarlySubmission(_) => self.to_string(),
            IngestError::Resolve(_) | IngestError::Storage(_) => INGEST_INTERNAL_ERROR.to_string(),
        };

        let mut response = (status, body).into_response();
        if let IngestError::EarlySubmission(early) = &self {
            let seconds = early.retry_after_seconds(chrono::Utc::now());
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
