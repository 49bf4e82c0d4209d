pub mod scheduler;
pub mod sweep;

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use scheduler::JobScheduler;
pub use sweep::TokenSweepJob;

/// Configuration for the job system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Enable/disable internal job scheduler
    #[serde(default = "default_jobs_enabled")]
    pub enabled: bool,

    /// Token retention sweep configuration
    #[serde(default)]
    pub token_sweep: TokenSweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSweepConfig {
    /// Cron schedule expression (6-field: sec min hour day month dow)
    #[serde(default = "default_sweep_schedule")]
    pub schedule: String,
    /// How long used rows are kept before deletion, in days
    #[serde(default = "default_used_retention_days")]
    pub used_retention_days: u32,
}

fn default_jobs_enabled() -> bool {
    true
}

fn default_sweep_schedule() -> String {
    "0 0 3 * * *".to_string() // Daily at 3 AM
}

fn default_used_retention_days() -> u32 {
    7
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: default_jobs_enabled(),
            token_sweep: TokenSweepConfig::default(),
        }
    }
}

impl Default for TokenSweepConfig {
    fn default() -> Self {
        Self {
            schedule: default_sweep_schedule(),
            used_retention_days: default_used_retention_days(),
        }
    }
}

/// Result of job execution
#[derive(Debug, Clone)]
pub struct JobResult {
    pub success: bool,
    pub message: String,
    pub items_processed: u64,
}

impl JobResult {
    pub fn success_with_count(count: u64) -> Self {
        Self {
            success: true,
            message: format!("Successfully processed {count} items"),
            items_processed: count,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            items_processed: 0,
        }
    }
}

/// Trait for executable jobs
#[async_trait]
pub trait Job: Send + Sync {
    /// Get the job name for logging and identification
    fn name(&self) -> &str;

    /// Execute the job and return the result
    async fn execute(&self) -> Result<JobResult, AppError>;
}
