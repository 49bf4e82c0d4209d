pub mod clock;
pub mod config;
pub mod decision;
pub mod rotation;

use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TokensConfig;
pub use decision::TokenDecision;
pub use rotation::{IssuedToken, RotationService};

/// Failure modes of the rotation authority.
///
/// The first five are credential failures and collapse to one
/// undifferentiated message at the caller-facing boundary; they are logged
/// distinctly for security monitoring before conversion.
#[derive(Error, Debug)]
pub enum RotationError {
    #[error("refresh token not found")]
    NotFound,
    #[error("refresh token expired")]
    Expired,
    #[error("refresh token reuse detected, family revoked")]
    ReuseDetected,
    #[error("refresh token family revoked")]
    Revoked,
    #[error("unknown user: {0}")]
    UnknownUser(i32),
    #[error("transient storage failure: {0}")]
    Transient(String),
}

impl RotationError {
    /// True for cases a caller must treat as an invalid credential
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            RotationError::NotFound
                | RotationError::Expired
                | RotationError::ReuseDetected
                | RotationError::Revoked
                | RotationError::UnknownUser(_)
        )
    }
}
