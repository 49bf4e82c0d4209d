use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
    /// Prefix on generated secrets, useful for leak scanning
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,
    /// Random part length of generated secrets
    #[serde(default = "default_secret_length")]
    pub secret_length: usize,
}

fn default_refresh_token_ttl() -> u64 {
    30 * 24 * 3600 // 30 days
}

fn default_secret_prefix() -> String {
    "RRT_".to_string()
}

fn default_secret_length() -> usize {
    48
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            refresh_token_ttl: default_refresh_token_ttl(),
            secret_prefix: default_secret_prefix(),
            secret_length: default_secret_length(),
        }
    }
}
