use crate::auth::RotationError;
use crate::database::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RotationError> for AppError {
    fn from(err: RotationError) -> Self {
        match err {
            // Credential failures collapse to one message so the caller
            // cannot distinguish which check failed; the rotation service
            // already logged the specific case.
            e if e.is_credential_failure() => {
                AppError::Unauthorized("invalid refresh token".to_string())
            }
            e => AppError::Internal(e.to_string()),
        }
    }
}
