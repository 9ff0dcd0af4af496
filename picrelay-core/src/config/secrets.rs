//! Secrets configuration loaded from environment variables only.
//!
//! API keys and bot tokens never live in the TOML settings file. All of them
//! are read from environment variables (with `.env` support for development).

use std::env;

/// Secrets loaded exclusively from environment variables.
#[derive(Debug, Clone)]
pub struct Secrets {
    /// Gemini API key (env: GEMINI_API_KEY)
    pub gemini_api_key: String,

    /// Slack bot token (env: SLACK_BOT_TOKEN)
    pub slack_bot_token: String,
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// Also loads a `.env` file if present (development convenience);
    /// production should rely on real environment variables.
    pub fn from_env() -> Result<Self, SecretsError> {
        let _ = dotenvy::dotenv();

        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        Ok(Self {
            gemini_api_key: required_var("GEMINI_API_KEY")?,
            slack_bot_token: required_var("SLACK_BOT_TOKEN")?,
        })
    }
}

fn required_var(name: &'static str) -> Result<String, SecretsError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(SecretsError::MissingSecret(name))
}
