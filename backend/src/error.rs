use crate::database::DatabaseError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity is absent
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the entity's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Debit exceeds the account balance
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Payment signature mismatch
    #[error("Security error: {0}")]
    Security(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::Validation(_) => 400,
            AppError::InvalidState(_) => 409,
            AppError::InsufficientFunds(_) => 422,
            AppError::Security(_) => 400,
            AppError::Config(_) => 500,
            AppError::Database(_) | AppError::Sqlx(_) => 500,
            AppError::ExternalService(_) => 502,
            _ => 500,
        }
    }

    /// Message safe to return to a caller; store internals are not leaked
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Sqlx(_) => "Database error".to_string(),
            AppError::Config(_) | AppError::Serialization(_) | AppError::Message(_) => {
                "Internal server error".to_string()
            }
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidState(msg)
            | AppError::InsufficientFunds(msg)
            | AppError::Security(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::ExternalService(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }

        let body = serde_json::json!({
            "success": false,
            "message": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Row exists but is not in a state that permits the write
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Conditional debit rejected
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::InvalidState(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
            RepositoryError::InvalidState(msg) => AppError::InvalidState(msg),
            RepositoryError::InsufficientFunds(msg) => AppError::InsufficientFunds(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    // Unique violation
                    RepositoryError::Duplicate(db_err.message().to_string())
                } else if code.as_deref() == Some("23503") {
                    // Foreign key violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else if code.as_deref() == Some("23514") {
                    // Check constraint violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else {
                    RepositoryError::Query(err)
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}
