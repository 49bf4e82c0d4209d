use crate::{
    auth::{Clock, ManualClock, RotationService, SystemClock, TokensConfig},
    config::Config,
    database::{entities::UserRecord, DatabaseManager, DatabaseManagerImpl},
};
use chrono::Utc;
use std::sync::Arc;

/// Test builder for a migrated in-memory authority with configurable
/// clock and token settings
pub struct TestAuthorityBuilder {
    config: Config,
    clock: Option<Arc<ManualClock>>,
}

impl TestAuthorityBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        // A single connection keeps every test statement on the same
        // in-memory database.
        config.database.max_connections = 1;
        config.tokens = TokensConfig {
            refresh_token_ttl: 3600,
            secret_prefix: "TEST_".to_string(),
            secret_length: 32,
        };

        Self {
            config,
            clock: None,
        }
    }

    /// Set the refresh token TTL in seconds
    pub fn with_token_ttl(mut self, ttl: u64) -> Self {
        self.config.tokens.refresh_token_ttl = ttl;
        self
    }

    /// Drive the service clock manually instead of using wall time
    pub fn with_manual_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the migrated database manager and rotation service
    pub async fn build(self) -> (Arc<dyn DatabaseManager>, RotationService) {
        let database: Arc<dyn DatabaseManager> = Arc::new(
            DatabaseManagerImpl::new_from_config(&self.config)
                .await
                .unwrap(),
        );
        database.migrate().await.unwrap();

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let service = RotationService::new(database.clone(), self.config.tokens.clone(), clock);

        (database, service)
    }
}

impl Default for TestAuthorityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a test user in the database
pub async fn create_test_user(database: &Arc<dyn DatabaseManager>) -> i32 {
    let user = UserRecord {
        id: 0,
        email: "test@example.com".to_string(),
        display_name: Some("Test User".to_string()),
        created_at: Utc::now(),
    };
    database.users().insert(&user).await.unwrap()
}

/// Create a test user with a custom email
pub async fn create_test_user_with_email(database: &Arc<dyn DatabaseManager>, email: &str) -> i32 {
    let user = UserRecord {
        id: 0,
        email: email.to_string(),
        display_name: None,
        created_at: Utc::now(),
    };
    database.users().insert(&user).await.unwrap()
}
