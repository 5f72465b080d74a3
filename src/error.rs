/// Unified error types for Event Koi
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum KoiError {
    /// Missing or invalid required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Target record absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Role-protection violation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Transition not valid from the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Underlying store read/write failure
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Account banned, carries the stored reason
    #[error("Your account has been banned. Reason: {0}")]
    AccountBanned(String),

    /// Account suspended, carries the stored reason
    #[error("Your account is suspended. Reason: {0}")]
    AccountSuspended(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl KoiError {
    /// Stable machine-readable code for the error body
    pub fn code(&self) -> &'static str {
        match self {
            KoiError::Validation(_) => "ValidationError",
            KoiError::NotFound(_) => "NotFound",
            KoiError::Forbidden(_) => "Forbidden",
            KoiError::Conflict(_) => "Conflict",
            KoiError::Storage(_) => "StorageError",
            KoiError::Authentication(_) => "AuthenticationRequired",
            KoiError::AccountBanned(_) => "AccountBanned",
            KoiError::AccountSuspended(_) => "AccountSuspended",
            KoiError::RateLimitExceeded => "RateLimitExceeded",
            KoiError::Internal(_) | KoiError::Io(_) => "InternalServerError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            KoiError::Validation(_) => StatusCode::BAD_REQUEST,
            KoiError::NotFound(_) => StatusCode::NOT_FOUND,
            KoiError::Forbidden(_)
            | KoiError::AccountBanned(_)
            | KoiError::AccountSuspended(_) => StatusCode::FORBIDDEN,
            KoiError::Conflict(_) => StatusCode::CONFLICT,
            KoiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            KoiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            KoiError::Storage(_) | KoiError::Internal(_) | KoiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for KoiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        KoiError::Validation(format!("Invalid fields: {}", fields.join(", ")))
    }
}

/// Convert KoiError to HTTP response
impl IntoResponse for KoiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            KoiError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                "Internal server error".to_string() // Don't leak details
            }
            KoiError::Internal(_) | KoiError::Io(_) => {
                tracing::error!("{}", self);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type KoiResult<T> = Result<T, KoiError>;
