//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default transaction budget: the update transaction must finish within this.
pub const DEFAULT_TXN_BUDGET: Duration = Duration::from_secs(10);

/// Default staleness window for generated insights.
pub const DEFAULT_INSIGHT_REFRESH_DAYS: u32 = 7;

/// Server configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path to the SQLite database file.
    pub db_path: String,
    /// LLM provider configuration for insight generation.
    pub llm: LlmConfig,
    /// Wall-clock budget for the profile-update transaction.
    pub txn_budget: Duration,
    /// Days until a generated insight is considered stale (`next_update`).
    pub insight_refresh_days: u32,
    /// Frontend revalidation webhook (None disables cache invalidation).
    pub revalidate_url: Option<String>,
    /// Shared secret sent with revalidation requests.
    pub revalidate_secret: Option<String>,
}

impl ServerConfig {
    /// Build the configuration from environment variables.
    ///
    /// Requires `ANTHROPIC_API_KEY` or `OPENAI_API_KEY`; everything else has
    /// a default. `CAREERWISE_MODEL` must match the chosen backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        let (backend, api_key) = if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            (LlmBackend::Anthropic, key)
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            (LlmBackend::OpenAi, key)
        } else {
            return Err(ConfigError::MissingEnvVar(
                "ANTHROPIC_API_KEY or OPENAI_API_KEY".to_string(),
            ));
        };

        let model = env_or("CAREERWISE_MODEL", || match backend {
            LlmBackend::Anthropic => "claude-sonnet-4-20250514".to_string(),
            LlmBackend::OpenAi => "gpt-4o".to_string(),
        });

        let txn_budget_ms: u64 = env_parse(
            "CAREERWISE_TXN_BUDGET_MS",
            DEFAULT_TXN_BUDGET.as_millis() as u64,
        )?;
        let insight_refresh_days: u32 =
            env_parse("CAREERWISE_INSIGHT_REFRESH_DAYS", DEFAULT_INSIGHT_REFRESH_DAYS)?;

        Ok(Self {
            bind_addr: env_or("CAREERWISE_ADDR", || "0.0.0.0:8080".to_string()),
            db_path: env_or("CAREERWISE_DB_PATH", || {
                "./data/careerwise.db".to_string()
            }),
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
            },
            txn_budget: Duration::from_millis(txn_budget_ms),
            insight_refresh_days,
            revalidate_url: std::env::var("CAREERWISE_REVALIDATE_URL").ok(),
            revalidate_secret: std::env::var("CAREERWISE_REVALIDATE_SECRET").ok(),
        })
    }
}

fn env_or(key: &str, default: impl FnOnce() -> String) -> String {
    std::env::var(key).unwrap_or_else(|_| default())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}
