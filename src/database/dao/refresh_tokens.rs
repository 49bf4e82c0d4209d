use crate::database::entities::{refresh_tokens, RefreshTokenRecord, RevokeReason};
use crate::database::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

/// Refresh tokens DAO. Sole owner of writes to rotation-relevant columns.
#[derive(Clone)]
pub struct RefreshTokensDao {
    db: DatabaseConnection,
}

impl RefreshTokensDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a freshly issued token row
    pub async fn insert(&self, token: &RefreshTokenRecord) -> DatabaseResult<i32> {
        let inserted = active_model_from(token)
            .insert(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(inserted.id)
    }

    /// Get refresh token row by secret hash
    pub async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> DatabaseResult<Option<RefreshTokenRecord>> {
        let token = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::TokenHash.eq(token_hash))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(token)
    }

    /// Consume a token and insert its successor in one transaction.
    ///
    /// The presented row is marked used only if it is still unused and
    /// unrevoked; the successor insert commits together with that swap, so
    /// a concurrent family revocation either runs first and fails the swap
    /// or runs after and sees the successor row.
    ///
    /// Returns true when this caller won the swap. A false result means a
    /// concurrent rotation already consumed the row, or the family was
    /// revoked in between; no successor is inserted in that case.
    pub async fn consume_and_insert(
        &self,
        presented_hash: &str,
        successor: &RefreshTokenRecord,
        used_at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        let result = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::UsedAt, Expr::value(Some(used_at)))
            .filter(refresh_tokens::Column::TokenHash.eq(presented_hash))
            .filter(refresh_tokens::Column::UsedAt.is_null())
            .filter(refresh_tokens::Column::RevokeReason.is_null())
            .exec(&txn)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        if result.rows_affected != 1 {
            txn.rollback()
                .await
                .map_err(|e| DatabaseError::Database(e.to_string()))?;
            return Ok(false);
        }

        active_model_from(successor)
            .insert(&txn)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(true)
    }

    /// Set a revoke reason on every unused, unrevoked row of a family.
    ///
    /// Idempotent: rows already used or revoked are left untouched, so a
    /// second call affects zero rows. Returns the number of rows revoked.
    pub async fn revoke_unused_in_family(
        &self,
        family_id: &str,
        reason: RevokeReason,
    ) -> DatabaseResult<u64> {
        let result = refresh_tokens::Entity::update_many()
            .col_expr(
                refresh_tokens::Column::RevokeReason,
                Expr::value(Some(reason.to_value())),
            )
            .filter(refresh_tokens::Column::FamilyId.eq(family_id))
            .filter(refresh_tokens::Column::UsedAt.is_null())
            .filter(refresh_tokens::Column::RevokeReason.is_null())
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// All rows of a family, oldest generation first
    pub async fn find_family(&self, family_id: &str) -> DatabaseResult<Vec<RefreshTokenRecord>> {
        let tokens = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::FamilyId.eq(family_id))
            .order_by_asc(refresh_tokens::Column::Generation)
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(tokens)
    }

    /// Delete rows that are expired, or used longer ago than the retention window
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        used_retention: Duration,
    ) -> DatabaseResult<u64> {
        let used_cutoff = now - used_retention;
        let result = refresh_tokens::Entity::delete_many()
            .filter(Self::sweepable(now, used_cutoff))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Count rows the sweep would delete, for dry runs
    pub async fn count_sweepable(
        &self,
        now: DateTime<Utc>,
        used_retention: Duration,
    ) -> DatabaseResult<u64> {
        let used_cutoff = now - used_retention;
        let count = refresh_tokens::Entity::find()
            .filter(Self::sweepable(now, used_cutoff))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(count)
    }

    fn sweepable(now: DateTime<Utc>, used_cutoff: DateTime<Utc>) -> Condition {
        Condition::any()
            .add(refresh_tokens::Column::ExpiresAt.lt(now))
            .add(refresh_tokens::Column::UsedAt.lt(used_cutoff))
    }
}

fn active_model_from(token: &RefreshTokenRecord) -> refresh_tokens::ActiveModel {
    refresh_tokens::ActiveModel {
        id: ActiveValue::NotSet,
        user_id: Set(token.user_id),
        family_id: Set(token.family_id.clone()),
        token_hash: Set(token.token_hash.clone()),
        previous_token_hash: Set(token.previous_token_hash.clone()),
        generation: Set(token.generation),
        device_id: Set(token.device_id.clone()),
        issued_at: Set(token.issued_at),
        expires_at: Set(token.expires_at),
        used_at: Set(token.used_at),
        revoke_reason: Set(token.revoke_reason),
    }
}
