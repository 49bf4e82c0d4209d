use crate::{
    auth::{RotationService, SystemClock},
    database::entities::RevokeReason,
    database::{DatabaseManager, DatabaseManagerImpl},
    Config,
};
use chrono::{Duration, Utc};
use clap::Subcommand;
use std::sync::Arc;
use tracing::info;

#[derive(Subcommand)]
pub enum MaintenanceTask {
    /// Delete expired tokens and stale used rows from the token store
    SweepTokens {
        #[arg(
            long,
            help = "Retention for used rows in days",
            default_value = "7"
        )]
        retention_days: u32,
        #[arg(
            long,
            help = "Dry run - show what would be deleted without actually deleting"
        )]
        dry_run: bool,
    },
    /// Revoke every unused token of a family
    RevokeFamily {
        #[arg(help = "Family ID to revoke")]
        family_id: String,
        #[arg(long, help = "Revocation reason (admin or logout)", default_value = "admin")]
        reason: String,
    },
}

pub async fn handle_maintenance_command(
    task: MaintenanceTask,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let db_manager = Arc::new(DatabaseManagerImpl::new_from_config(config).await?);

    match task {
        MaintenanceTask::SweepTokens {
            retention_days,
            dry_run,
        } => {
            info!(
                "Sweeping token store, used-row retention {} days (dry_run: {})...",
                retention_days, dry_run
            );

            let retention = Duration::days(retention_days as i64);
            let dao = db_manager.refresh_tokens();

            let count = if dry_run {
                dao.count_sweepable(Utc::now(), retention).await?
            } else {
                dao.sweep(Utc::now(), retention).await?
            };

            if dry_run {
                info!("Dry run: {} rows would be deleted", count);
            } else {
                info!("Sweep completed: {} rows deleted", count);
            }
        }
        MaintenanceTask::RevokeFamily { family_id, reason } => {
            let reason = match reason.as_str() {
                "admin" => RevokeReason::AdminRevoked,
                "logout" => RevokeReason::Logout,
                other => return Err(format!("Unknown revocation reason: {other}").into()),
            };

            info!("Revoking token family {}...", family_id);

            let service = RotationService::new(
                db_manager.clone() as Arc<dyn DatabaseManager>,
                config.tokens.clone(),
                Arc::new(SystemClock),
            );
            service.revoke_family(&family_id, reason).await?;

            info!("Family {} revoked", family_id);
        }
    }

    Ok(())
}
