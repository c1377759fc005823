//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Retry behavior for completion-gateway calls.
#[derive(Clone, Debug)]
pub struct RetrySettings {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

/// Hard wall-clock budgets for the different gateway call shapes.
#[derive(Clone, Debug)]
pub struct TimeoutBudgets {
    pub chat: Duration,
    pub bulk_text: Duration,
    pub transcription: Duration,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub chat_model: String,
    pub intent_model: String,
    pub sst_model: String,
    pub timeouts: TimeoutBudgets,
    pub retry: RetrySettings,
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let intent_model =
            std::env::var("INTENT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let sst_model = std::env::var("SST_MODEL").unwrap_or_else(|_| "whisper-1".to_string());

        let timeouts = TimeoutBudgets {
            chat: Duration::from_secs(env_u64("CHAT_TIMEOUT_SECS", 45)?),
            bulk_text: Duration::from_secs(env_u64("BULK_TEXT_TIMEOUT_SECS", 120)?),
            transcription: Duration::from_secs(env_u64("TRANSCRIPTION_TIMEOUT_SECS", 60)?),
        };

        let retry = RetrySettings {
            max_retries: env_u64("GATEWAY_MAX_RETRIES", 2)? as u32,
            base_delay: Duration::from_millis(env_u64("GATEWAY_RETRY_BASE_DELAY_MS", 2000)?),
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            chat_model,
            intent_model,
            sst_model,
            timeouts,
            retry,
        })
    }
}
