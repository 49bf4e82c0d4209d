//! Pure acceptance decision over a token row's current state.
//!
//! Kept free of storage concerns so it can be unit-tested without a
//! database; the rotation service wraps it in the compare-and-swap
//! sequence that makes it safe under concurrency.

use crate::database::entities::RefreshTokenRecord;
use chrono::{DateTime, Utc};

/// Outcome of inspecting one token row at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDecision {
    /// Unused, unrevoked, within its validity window
    Accept,
    /// Validity window has passed
    Expired,
    /// Already exchanged for a successor once; presenting it again is replay
    AlreadyUsed,
    /// Family was invalidated outside normal rotation
    Revoked,
}

/// Evaluate a token row. Check order matters: an expired token never
/// triggers the replay cascade, and a used token reports replay even if
/// its family was later revoked.
pub fn evaluate(token: &RefreshTokenRecord, now: DateTime<Utc>) -> TokenDecision {
    if token.expires_at <= now {
        return TokenDecision::Expired;
    }
    if token.used_at.is_some() {
        return TokenDecision::AlreadyUsed;
    }
    if token.revoke_reason.is_some() {
        return TokenDecision::Revoked;
    }
    TokenDecision::Accept
}
