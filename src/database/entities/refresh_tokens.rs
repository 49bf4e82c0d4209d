use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Why a token (or its whole family) was invalidated outside normal rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RevokeReason {
    #[sea_orm(string_value = "REUSE_DETECTED")]
    ReuseDetected,
    #[sea_orm(string_value = "LOGOUT")]
    Logout,
    #[sea_orm(string_value = "ADMIN_REVOKED")]
    AdminRevoked,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    /// Groups every token descended from one original login; stable across rotations.
    pub family_id: String,
    #[sea_orm(unique)]
    pub token_hash: String,
    /// Hash of the token this one superseded. None only for generation 1.
    pub previous_token_hash: Option<String>,
    pub generation: i32,
    pub device_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set exactly once, when the token is exchanged for its successor.
    pub used_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<RevokeReason>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Generate a random refresh token secret with the given prefix and length
pub fn generate_refresh_secret(prefix: &str, length: usize) -> String {
    let random_part: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();

    format!("{}{}", prefix, random_part)
}

/// Hash a refresh token secret for storage; the secret itself is never persisted
pub fn hash_refresh_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_refresh_secret() {
        let secret = "RRT_test12345";
        let hash1 = hash_refresh_secret(secret);
        let hash2 = hash_refresh_secret(secret);

        // Same input should produce same hash
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 hex string

        // Different input should produce different hash
        let hash3 = hash_refresh_secret("RRT_different");
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_generate_refresh_secret() {
        let secret = generate_refresh_secret("RRT_", 48);
        assert!(secret.starts_with("RRT_"));
        assert_eq!(secret.len(), 52);
        assert!(secret[4..].chars().all(|c| c.is_ascii_alphanumeric()));

        // Two secrets should never collide
        assert_ne!(secret, generate_refresh_secret("RRT_", 48));
    }
}
