use super::{Job, JobsConfig};
use crate::error::AppError;
use chrono::Utc;
use cron::Schedule;
use std::{str::FromStr, sync::Arc};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval_at, Duration, Instant},
};
use tracing::{error, info, warn};

/// Job scheduler that manages periodic execution of jobs
pub struct JobScheduler {
    config: JobsConfig,
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobScheduler {
    pub fn new(config: JobsConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            config,
            handles: Vec::new(),
            shutdown_tx,
        }
    }

    /// Start the scheduler with the given jobs
    pub fn start(&mut self, jobs: Vec<Arc<dyn Job>>) -> Result<(), AppError> {
        if !self.config.enabled {
            info!("Job scheduler disabled in configuration");
            return Ok(());
        }

        info!("Starting job scheduler with {} jobs", jobs.len());

        for job in jobs {
            let handle = self.spawn_job_with_schedule(job)?;
            self.handles.push(handle);
        }

        Ok(())
    }

    /// Stop the scheduler and wait for running jobs to finish
    pub async fn stop(&mut self) {
        info!("Stopping job scheduler...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Job handle failed during shutdown: {}", e);
            }
        }

        info!("Job scheduler stopped");
    }

    fn spawn_job_with_schedule(&self, job: Arc<dyn Job>) -> Result<JoinHandle<()>, AppError> {
        let schedule = self.get_schedule_for_job(job.name())?;
        let interval_duration = parse_cron_to_duration(&schedule)?;

        let job_name = job.name().to_string();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + interval_duration, interval_duration);

            info!(
                "Job '{}' scheduled, first run in {:?}",
                job_name, interval_duration
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        info!("Executing job '{}'", job_name);

                        match job.execute().await {
                            Ok(result) if result.success => {
                                info!("Job '{}' completed: {}", job_name, result.message);
                            }
                            Ok(result) => {
                                warn!("Job '{}' failed: {}", job_name, result.message);
                            }
                            Err(e) => {
                                error!("Job '{}' execution error: {}", job_name, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Job '{}' received shutdown signal", job_name);
                        break;
                    }
                }
            }
        });

        Ok(handle)
    }

    fn get_schedule_for_job(&self, job_name: &str) -> Result<String, AppError> {
        match job_name {
            "token_sweep" => Ok(self.config.token_sweep.schedule.clone()),
            _ => Err(AppError::Internal(format!("Unknown job: {job_name}"))),
        }
    }
}

/// Parse a cron expression (6-field: sec min hour day month dow) and
/// calculate the duration until its next execution
fn parse_cron_to_duration(cron: &str) -> Result<Duration, AppError> {
    let schedule = Schedule::from_str(cron)
        .map_err(|e| AppError::Internal(format!("Invalid cron expression '{cron}': {e}")))?;

    let now = Utc::now();
    let next_execution = schedule.upcoming(Utc).take(1).next().ok_or_else(|| {
        AppError::Internal(format!(
            "No upcoming execution found for cron expression: {cron}"
        ))
    })?;

    let duration_until_next = (next_execution - now)
        .to_std()
        .map_err(|e| AppError::Internal(format!("Failed to convert duration: {e}")))?;

    Ok(duration_until_next)
}
