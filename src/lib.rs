pub mod auth;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod test_utils;

pub use auth::rotation::RotationService;
pub use config::Config;
