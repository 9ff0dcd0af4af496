//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/picrelay/config.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default TOML configuration file content, written on first run.
const DEFAULT_CONFIG_TOML: &str = r#"# picrelay configuration file
# Located at: ~/.config/picrelay/config.toml
#
# This file contains non-sensitive configuration.
# Secrets are loaded from environment variables:
#   - GEMINI_API_KEY
#   - SLACK_BOT_TOKEN

[gateway]
host = "127.0.0.1"
port = 3000

[pipeline]
# Jobs allowed to run against the provider at the same time
max_concurrent_jobs = 20
# Recently seen trigger events remembered for deduplication
dedup_capacity = 100
max_attempts = 5
base_delay_ms = 2000
max_jitter_ms = 1000
attempt_timeout_seconds = 120

[provider]
model = "gemini-2.5-flash-image"
base_url = "https://generativelanguage.googleapis.com/v1beta"

[prompt]
# preamble = "Render in a flat, friendly illustration style."

[templates]
# Reference images attached to every request
# dir = "/srv/picrelay/templates"

[storage]
output_dir = "generated"

[logging]
level = "info"
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Job pipeline limits and retry policy
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Image provider settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Prompt enrichment
    #[serde(default)]
    pub prompt: PromptSettings,

    /// Reference template images
    #[serde(default)]
    pub templates: TemplateSettings,

    /// Where generated images are written
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Gateway server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    /// Host to bind to
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

/// Job pipeline settings.
///
/// The concurrency ceiling and dedup capacity are fixed for the lifetime of
/// the process; there is no runtime resizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,

    #[serde(default = "default_attempt_timeout_seconds")]
    pub attempt_timeout_seconds: u64,
}

/// Image provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    /// Gemini image model identifier
    #[serde(default = "default_provider_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
}

/// Prompt enrichment settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PromptSettings {
    /// Instructions prepended to every user prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
}

/// Template image settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TemplateSettings {
    /// Directory of reference images; none are attached when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Artifact storage settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_max_concurrent_jobs() -> usize {
    20
}

fn default_dedup_capacity() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

fn default_attempt_timeout_seconds() -> u64 {
    120
}

fn default_provider_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_provider_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            dedup_capacity: default_dedup_capacity(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            attempt_timeout_seconds: default_attempt_timeout_seconds(),
        }
    }
}

impl PipelineSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: default_provider_model(),
            base_url: default_provider_base_url(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content and check pipeline limits.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Get the configuration file path.
    ///
    /// Uses XDG config directory: `~/.config/picrelay/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("PICRELAY_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("picrelay");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG_TOML)?;

        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.pipeline.max_concurrent_jobs == 0 {
            return Err(SettingsError::Invalid {
                field: "pipeline.max_concurrent_jobs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.dedup_capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "pipeline.dedup_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.max_attempts == 0 {
            return Err(SettingsError::Invalid {
                field: "pipeline.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pipeline.attempt_timeout_seconds == 0 {
            return Err(SettingsError::Invalid {
                field: "pipeline.attempt_timeout_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
