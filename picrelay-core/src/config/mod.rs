//! Configuration management for picrelay.
//!
//! Secrets (environment variables) are kept apart from settings (TOML file).
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `GEMINI_API_KEY` - Gemini API key used for image generation
//! - `SLACK_BOT_TOKEN` - Slack bot token used to post results
//!
//! ## Settings (TOML File)
//! Located at `~/.config/picrelay/config.toml`:
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [pipeline]
//! max_concurrent_jobs = 20
//! dedup_capacity = 100
//!
//! [logging]
//! level = "info"
//! ```

mod secrets;
mod settings;

pub use secrets::{Secrets, SecretsError};
pub use settings::{
    GatewaySettings, LoggingSettings, PipelineSettings, PromptSettings, ProviderSettings,
    Settings, SettingsError, StorageSettings, TemplateSettings,
};

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if a required secret is missing or the TOML file
    /// cannot be read, parsed, or fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;

        Ok(Self { secrets, settings })
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }

    /// Get the Gemini API key.
    pub fn gemini_api_key(&self) -> &str {
        &self.secrets.gemini_api_key
    }

    /// Get the Slack bot token.
    pub fn slack_bot_token(&self) -> &str {
        &self.secrets.slack_bot_token
    }
}
