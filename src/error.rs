//! Marketplace error types with HTTP status code mapping.
//!
//! [`MarketError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Credits, RequestStatus, SessionStatus};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1003,
///     "message": "insufficient credits: need 1.00, have 0.50",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`MarketError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category               | HTTP Status                    |
/// |-----------|------------------------|--------------------------------|
/// | 1000–1999 | Validation / Precondition | 400 Bad Request             |
/// | 2000–2999 | Authentication / Access | 401 Unauthorized / 403 Forbidden |
/// | 3000–3999 | Not Found / Conflict   | 404 Not Found / 409 Conflict   |
/// | 5000–5999 | Server                 | 500 Internal Server Error      |
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller's balance does not cover the operation.
    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits {
        /// Amount the operation needs.
        required: Credits,
        /// Current balance.
        available: Credits,
    },

    /// The learning request has already been resolved.
    #[error("request is not pending (status: {0})")]
    NotPending(RequestStatus),

    /// The session is completed or cancelled.
    #[error("session is {0}")]
    SessionClosed(SessionStatus),

    /// Missing, malformed or expired bearer credential.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller is not an authorized party of the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. `"profile"`).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A uniqueness rule would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Shorthand for [`MarketError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotPending(_) => 1002,
            Self::InsufficientCredits { .. } => 1003,
            Self::SessionClosed(_) => 1004,
            Self::Unauthenticated(_) => 2001,
            Self::Forbidden(_) => 2002,
            Self::NotFound { .. } => 3001,
            Self::Conflict(_) => 3002,
            Self::Internal(_) => 5000,
            Self::Persistence(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::NotPending(_)
            | Self::InsufficientCredits { .. }
            | Self::SessionClosed(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<JsonRejection> for MarketError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for MarketError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for MarketError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
