use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// The Pipedrive token is deliberately optional: its absence switches the
/// CRM client into mock mode, never the local store.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub pipedrive_base_url: String,
    pub pipedrive_api_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            pipedrive_base_url: std::env::var("PIPEDRIVE_BASE_URL")
                .unwrap_or_else(|_| "https://api.pipedrive.com/v1".to_string()),
            pipedrive_api_token: std::env::var("PIPEDRIVE_API_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// True when a Pipedrive credential is present.
    pub fn crm_configured(&self) -> bool {
        self.pipedrive_api_token.is_some()
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
