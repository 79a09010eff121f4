//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! converts into a JSON HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use providence_core::error::OracleError;

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request body or parameters were invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An oracle was refused or abandoned.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl ObserverError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Oracle(error) => match error {
                OracleError::InsufficientPower { .. } => StatusCode::PAYMENT_REQUIRED,
                OracleError::Busy | OracleError::Stale => StatusCode::CONFLICT,
                OracleError::SimulationOver => StatusCode::GONE,
                OracleError::UnknownTarget(_) => StatusCode::NOT_FOUND,
                OracleError::EmptyMessage => StatusCode::BAD_REQUEST,
            },
        }
    }

    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Oracle(error) => match error {
                OracleError::InsufficientPower { .. } => "insufficient_power",
                OracleError::Busy => "busy",
                OracleError::SimulationOver => "simulation_over",
                OracleError::UnknownTarget(_) => "unknown_target",
                OracleError::EmptyMessage => "empty_message",
                OracleError::Stale => "stale",
            },
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
