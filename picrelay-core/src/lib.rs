pub mod config;
pub mod job;

// Config re-exports
pub use config::{
    Config, ConfigError, GatewaySettings, LoggingSettings, PipelineSettings, PromptSettings,
    ProviderSettings, Secrets, SecretsError, Settings, SettingsError, StorageSettings,
    TemplateSettings,
};

// Job model re-exports
pub use job::{
    AspectFlag, AspectRatio, Destination, Job, JobState, ReferenceImage, Trigger, TriggerKind,
    split_aspect_flag,
};
