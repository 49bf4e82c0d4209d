//! Refresh token rotation authority.
//!
//! Tokens are organized into families: one family per original login,
//! every rotation appending a generation linked to its predecessor by
//! hash. Presenting an already-used token means the chain leaked, and the
//! whole family is revoked fail-closed.

use crate::{
    auth::{
        clock::Clock,
        config::TokensConfig,
        decision::{self, TokenDecision},
    },
    database::{
        entities::refresh_tokens::{generate_refresh_secret, hash_refresh_secret, RevokeReason},
        entities::RefreshTokenRecord,
        DatabaseManager, DatabaseResult,
    },
};
use chrono::Duration;
use std::{future::Future, sync::Arc};
use tracing::{info, warn};
use uuid::Uuid;

/// One retry with a short pause for storage-level conflicts
const STORAGE_RETRY_BACKOFF_MS: u64 = 50;

/// Result of issuing or rotating: the plaintext secret is exposed exactly
/// once, here, and never stored.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub family_id: String,
    pub generation: i32,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

pub struct RotationService {
    database: Arc<dyn DatabaseManager>,
    config: TokensConfig,
    clock: Arc<dyn Clock>,
}

impl RotationService {
    pub fn new(
        database: Arc<dyn DatabaseManager>,
        config: TokensConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            database,
            config,
            clock,
        }
    }

    /// Create a new token family for a login.
    ///
    /// Inserts generation 1 with no predecessor and returns the plaintext
    /// secret together with the new family id.
    pub async fn issue(
        &self,
        user_id: i32,
        device_id: Option<String>,
    ) -> Result<IssuedToken, super::RotationError> {
        let users = self.database.users();
        let user = with_retry(|| users.find_by_id(user_id)).await?;
        if user.is_none() {
            warn!(user_id, "refresh token issue refused: unknown user");
            return Err(super::RotationError::UnknownUser(user_id));
        }

        let family_id = Uuid::new_v4().to_string();
        let (row, issued) = self.prepare(user_id, &family_id, None, 1, device_id);
        let tokens = self.database.refresh_tokens();
        with_retry(|| tokens.insert(&row)).await?;

        info!(user_id, family_id = %issued.family_id, "issued new refresh token family");
        Ok(issued)
    }

    /// Exchange a valid refresh token for its successor.
    ///
    /// The presented row is consumed with a compare-and-swap on `used_at`
    /// committed atomically with the successor insert, so of two concurrent
    /// calls with the same token exactly one mints a successor; the other
    /// takes the reuse-detected path.
    pub async fn rotate(&self, presented: &str) -> Result<IssuedToken, super::RotationError> {
        let token_hash = hash_refresh_secret(presented);
        let tokens = self.database.refresh_tokens();

        let row = with_retry(|| tokens.find_by_hash(&token_hash))
            .await?
            .ok_or_else(|| {
                warn!("refresh token rotation refused: unknown token");
                super::RotationError::NotFound
            })?;

        let now = self.clock.now();
        match decision::evaluate(&row, now) {
            TokenDecision::Expired => {
                warn!(family_id = %row.family_id, generation = row.generation,
                    "refresh token rotation refused: expired");
                return Err(super::RotationError::Expired);
            }
            TokenDecision::AlreadyUsed => {
                return Err(self.handle_reuse(&row).await);
            }
            TokenDecision::Revoked => {
                warn!(family_id = %row.family_id, generation = row.generation,
                    "refresh token rotation refused: family revoked");
                return Err(super::RotationError::Revoked);
            }
            TokenDecision::Accept => {}
        }

        // Single-use enforcement. The swap on `used_at` and the successor
        // insert commit together, so a concurrent family revocation can
        // never land between them and miss the successor. Losing the swap
        // means a concurrent caller consumed the row first, which is
        // indistinguishable from replay.
        let (successor, issued) = self.prepare(
            row.user_id,
            &row.family_id,
            Some(row.token_hash.clone()),
            row.generation + 1,
            row.device_id.clone(),
        );
        let won = with_retry(|| tokens.consume_and_insert(&token_hash, &successor, now)).await?;
        if !won {
            return Err(self.handle_reuse(&row).await);
        }

        info!(family_id = %issued.family_id, generation = issued.generation,
            "rotated refresh token");
        Ok(issued)
    }

    /// Read-only validity check used by request authentication
    pub async fn validate_access(&self, token: &str) -> Result<i32, super::RotationError> {
        let token_hash = hash_refresh_secret(token);
        let tokens = self.database.refresh_tokens();

        let row = with_retry(|| tokens.find_by_hash(&token_hash))
            .await?
            .ok_or(super::RotationError::NotFound)?;

        match decision::evaluate(&row, self.clock.now()) {
            TokenDecision::Accept => Ok(row.user_id),
            TokenDecision::Expired => Err(super::RotationError::Expired),
            // Replay observed on a read path: report it, but leave the
            // cascade to the rotation path, which owns writes.
            TokenDecision::AlreadyUsed => Err(super::RotationError::ReuseDetected),
            TokenDecision::Revoked => Err(super::RotationError::Revoked),
        }
    }

    /// Revoke every unused token of a family. Idempotent: revoking an
    /// already-revoked family is a no-op, not an error.
    pub async fn revoke_family(
        &self,
        family_id: &str,
        reason: RevokeReason,
    ) -> Result<(), super::RotationError> {
        let tokens = self.database.refresh_tokens();
        let revoked =
            with_retry(|| tokens.revoke_unused_in_family(family_id, reason)).await?;

        info!(family_id, revoked, ?reason, "revoked refresh token family");
        Ok(())
    }

    /// Replay response: revoke the whole family fail-closed, then report
    async fn handle_reuse(&self, row: &RefreshTokenRecord) -> super::RotationError {
        warn!(family_id = %row.family_id, generation = row.generation,
            "refresh token reuse detected, revoking family");

        let tokens = self.database.refresh_tokens();
        match with_retry(|| {
            tokens.revoke_unused_in_family(&row.family_id, RevokeReason::ReuseDetected)
        })
        .await
        {
            Ok(_) => super::RotationError::ReuseDetected,
            Err(e) => e,
        }
    }

    /// Generate a fresh secret and build its row; no storage involved
    fn prepare(
        &self,
        user_id: i32,
        family_id: &str,
        previous_token_hash: Option<String>,
        generation: i32,
        device_id: Option<String>,
    ) -> (RefreshTokenRecord, IssuedToken) {
        let secret = generate_refresh_secret(&self.config.secret_prefix, self.config.secret_length);
        let now = self.clock.now();
        let expires_at = now + Duration::seconds(self.config.refresh_token_ttl as i64);

        let row = RefreshTokenRecord {
            id: 0, // Assigned by the database
            user_id,
            family_id: family_id.to_string(),
            token_hash: hash_refresh_secret(&secret),
            previous_token_hash,
            generation,
            device_id,
            issued_at: now,
            expires_at,
            used_at: None,
            revoke_reason: None,
        };

        let issued = IssuedToken {
            token: secret,
            family_id: family_id.to_string(),
            generation,
            expires_at,
        };

        (row, issued)
    }
}

/// Retry a storage operation once with backoff; an unresolved failure
/// surfaces as a transient error.
async fn with_retry<T, F, Fut>(op: F) -> Result<T, super::RotationError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = DatabaseResult<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!("storage operation failed, retrying once: {}", first);
            tokio::time::sleep(std::time::Duration::from_millis(STORAGE_RETRY_BACKOFF_MS)).await;
            op().await
                .map_err(|e| super::RotationError::Transient(e.to_string()))
        }
    }
}
