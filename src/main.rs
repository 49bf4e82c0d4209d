use clap::Parser;
use refresh_authority::commands::{handle_command, Commands};
use refresh_authority::database::{DatabaseManager, DatabaseManagerImpl};
use refresh_authority::jobs::{JobScheduler, TokenSweepJob};
use refresh_authority::Config;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "refresh-authority")]
#[command(about = "Refresh token rotation authority")]
struct Cli {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    // Handle CLI commands
    if let Some(command) = cli.command {
        if let Err(e) = handle_command(command, &config).await {
            error!("Command failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    info!("Starting refresh token authority");

    let database = match DatabaseManagerImpl::new_from_config(&config).await {
        Ok(database) => Arc::new(database),
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if config.database.migration_on_startup {
        if let Err(e) = database.migrate().await {
            error!("Migration failed: {}", e);
            std::process::exit(1);
        }
    }

    let sweep_job = Arc::new(TokenSweepJob::new(
        database.clone() as Arc<dyn DatabaseManager>,
        config.jobs.token_sweep.clone(),
    ));

    let mut scheduler = JobScheduler::new(config.jobs.clone());
    if let Err(e) = scheduler.start(vec![sweep_job]) {
        error!("Failed to start job scheduler: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutdown signal received");
    scheduler.stop().await;
}
