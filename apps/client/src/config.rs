use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Client configuration loaded from environment variables (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    /// Base address of the analysis backend, without a trailing slash.
    pub api_url: String,
    pub firebase_api_key: String,
    pub identity_url: String,
    pub token_url: String,
    /// `None` leaves reqwest's default (no timeout).
    pub request_timeout: Option<Duration>,
    /// Quiet period before a difficulty change triggers regeneration.
    pub regenerate_debounce: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let firebase_api_key = lookup("FIREBASE_API_KEY")
            .context("Required environment variable 'FIREBASE_API_KEY' is not set")?;

        let request_timeout = lookup("REQUEST_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")
            })
            .transpose()?
            .map(Duration::from_secs);

        let debounce_ms = match lookup("REGENERATE_DEBOUNCE_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("REGENERATE_DEBOUNCE_MS must be a whole number of milliseconds")?,
            None => DEFAULT_DEBOUNCE_MS,
        };

        Ok(Config {
            api_url: trim_base(lookup("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string())),
            firebase_api_key,
            identity_url: trim_base(
                lookup("FIREBASE_IDENTITY_URL").unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string()),
            ),
            token_url: trim_base(
                lookup("FIREBASE_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            ),
            request_timeout,
            regenerate_debounce: Duration::from_millis(debounce_ms),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
