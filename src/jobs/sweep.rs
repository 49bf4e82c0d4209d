use super::{Job, JobResult, TokenSweepConfig};
use crate::{database::DatabaseManager, error::AppError};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

/// Job that purges refresh token rows with no further rotation value:
/// past expiry, or used and older than the retention window. Unused,
/// unexpired rows are never touched.
pub struct TokenSweepJob {
    database: Arc<dyn DatabaseManager>,
    config: TokenSweepConfig,
}

impl TokenSweepJob {
    pub fn new(database: Arc<dyn DatabaseManager>, config: TokenSweepConfig) -> Self {
        Self { database, config }
    }
}

#[async_trait]
impl Job for TokenSweepJob {
    fn name(&self) -> &str {
        "token_sweep"
    }

    async fn execute(&self) -> Result<JobResult, AppError> {
        let retention = Duration::days(self.config.used_retention_days as i64);

        info!(
            "Sweeping expired refresh tokens and used rows older than {} days",
            self.config.used_retention_days
        );

        let swept = self
            .database
            .refresh_tokens()
            .sweep(Utc::now(), retention)
            .await?;

        info!("Swept {} refresh token rows", swept);
        Ok(JobResult::success_with_count(swept))
    }
}
