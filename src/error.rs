/// Unified error types for the registration service
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Whether error responses echo the underlying message for 5xx errors.
/// Flipped off once at startup when running in production.
static EXPOSE_INTERNAL_DETAILS: AtomicBool = AtomicBool::new(true);

/// Configure whether internal error details are echoed to clients
pub fn set_expose_internal_details(expose: bool) {
    EXPOSE_INTERNAL_DETAILS.store(expose, Ordering::Relaxed);
}

/// Main error type for the service
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request is missing a required piece (e.g. registration id for QR issue)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body over the configured upload ceiling
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Approval decision outside the allowed literals
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Missing entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique key or illegal state transition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, invalid, expired or revoked token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Role check failure
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// No OTP request exists for the registration
    #[error("No verification code has been issued for this registration")]
    OtpNotFound,

    /// OTP request is past its expiry
    #[error("Verification code has expired")]
    OtpExpired,

    /// OTP request was already consumed or invalidated
    #[error("Verification code has already been used")]
    OtpAlreadyUsed,

    /// OTP attempt ceiling reached
    #[error("Too many verification attempts")]
    OtpAttemptsExceeded,

    /// Submitted code does not match
    #[error("Invalid verification code")]
    OtpInvalidCode,

    /// Scanned value does not match any issued QR code
    #[error("QR code not recognized")]
    QrNotRecognized,

    /// QR code is past its expiry
    #[error("QR code has expired")]
    QrExpired,

    /// QR code points at a registration that no longer exists
    #[error("Registration for this QR code no longer exists")]
    RegistrationMissing,

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Map a database error, turning constraint violations into client errors
    /// instead of leaking raw database codes.
    pub fn from_db(err: sqlx::Error, context: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::Conflict(format!("{} already exists", context));
            }
            if db_err.is_foreign_key_violation() {
                return AppError::Validation(format!("{} references a missing record", context));
            }
            if db_err.is_check_violation() {
                return AppError::Validation(format!("{} has an invalid value", context));
            }
        }
        AppError::Database(err)
    }

    /// Status code and stable error identifier for this error
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "ValidationError"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            AppError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "InvalidStatus"),
            AppError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PayloadTooLarge"),
            AppError::OtpInvalidCode => (StatusCode::BAD_REQUEST, "InvalidCode"),
            AppError::OtpExpired => (StatusCode::BAD_REQUEST, "Expired"),
            AppError::OtpAlreadyUsed => (StatusCode::BAD_REQUEST, "AlreadyUsed"),
            AppError::OtpAttemptsExceeded => (StatusCode::BAD_REQUEST, "AttemptsExceeded"),
            AppError::QrExpired => (StatusCode::GONE, "Expired"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
            AppError::OtpNotFound => (StatusCode::NOT_FOUND, "NotFound"),
            AppError::QrNotRecognized => (StatusCode::NOT_FOUND, "NotRecognized"),
            AppError::RegistrationMissing => (StatusCode::NOT_FOUND, "RegistrationMissing"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AuthError"),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
            AppError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RateLimitExceeded")
            }
            AppError::Database(_) | AppError::Internal(_) | AppError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        }
    }
}

/// Map an extractor rejection onto the JSON error contract
fn rejection(status: StatusCode, body_text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(body_text)
    } else {
        AppError::Validation(body_text)
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        rejection(err.status(), err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        rejection(err.status(), err.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(err: MultipartRejection) -> Self {
        rejection(err.status(), err.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        rejection(err.status(), err.body_text())
    }
}

/// JSON error body returned for every failure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed with internal error");
            crate::metrics::record_error(error_code);
            if EXPOSE_INTERNAL_DETAILS.load(Ordering::Relaxed) {
                Some(self.to_string())
            } else {
                Some("Internal server error".to_string())
            }
        } else {
            Some(self.to_string())
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
