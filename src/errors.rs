// src/errors.rs
// DOCUMENTATION: Custom error types and HTTP responses
// PURPOSE: Centralized error handling for the location analysis service

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Application-specific error types
/// DOCUMENTATION: Every failure inside the pipeline is converted into one of
/// these variants at its own stage boundary before reaching the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Reverse geocoding unavailable: {0}")]
    GeocodeUnavailable(String),

    #[error("Facility store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    #[allow(dead_code)]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AnalysisError {
    /// Stable machine-readable code used in the JSON error body
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidCoordinate(_) => "INVALID_COORDINATE",
            AnalysisError::ValidationError(_) => "VALIDATION_ERROR",
            AnalysisError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            AnalysisError::GeocodeUnavailable(_) => "GEOCODE_UNAVAILABLE",
            AnalysisError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AnalysisError::NotFound(_) => "NOT_FOUND",
            AnalysisError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Client errors are rejected before the pipeline starts
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidCoordinate(_) | AnalysisError::ValidationError(_)
        )
    }
}

impl From<sqlx::Error> for AnalysisError {
    fn from(e: sqlx::Error) -> Self {
        AnalysisError::StoreUnavailable(e.to_string())
    }
}

/// Convert AnalysisError to HTTP response
/// DOCUMENTATION: Maps error types to HTTP status codes and JSON responses
impl ResponseError for AnalysisError {
    fn error_response(&self) -> HttpResponse {
        if self.is_client_error() {
            log::debug!("Rejected request: {}", self);
        } else {
            log::error!("Request failed: {}", self);
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        });

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::InvalidCoordinate(_) => StatusCode::BAD_REQUEST,
            AnalysisError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AnalysisError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::GeocodeUnavailable(_) => StatusCode::BAD_GATEWAY,
            AnalysisError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalysisError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
