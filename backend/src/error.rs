use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DairyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Missing, malformed or rejected credentials.
    #[error("{0}")]
    Auth(String),

    /// Authenticated, but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("Empty request. Nothing to update.")]
    EmptyUpdate,

    #[error("{0}")]
    Duplicate(String),

    /// The store did not acknowledge a write, or touched the wrong number of rows.
    #[error("Write operation failed.")]
    WriteFailed,

    #[error("{0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DairyError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DairyError::Validation(_) | DairyError::EmptyUpdate | DairyError::Duplicate(_)
        )
    }
}

// Serialized as the plain message, same as the JSON error bodies.
impl Serialize for DairyError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type DairyResult<T> = Result<T, DairyError>;

impl IntoResponse for DairyError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            DairyError::Database(ref e) => {
                tracing::error!(error = ?e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed.".to_string(),
                )
            }
            DairyError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            DairyError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            DairyError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            DairyError::EmptyUpdate => (StatusCode::BAD_REQUEST, self.to_string()),
            DairyError::Duplicate(msg) => (StatusCode::CONFLICT, msg),
            DairyError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            DairyError::WriteFailed => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            DairyError::Internal(msg) => {
                tracing::error!("Internal Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
            DairyError::Network(e) => {
                tracing::warn!(error = %e, "outbound request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Could not reach an external service.".to_string(),
                )
            }
            _ => {
                tracing::error!("Unhandled Error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unknown error.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
