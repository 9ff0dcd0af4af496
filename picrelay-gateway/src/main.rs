use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use picrelay_gateway::pipeline::JobDispatcher;
use picrelay_gateway::prompt::PromptBuilder;
use picrelay_gateway::providers::gemini::GeminiImageClient;
use picrelay_gateway::server;
use picrelay_gateway::state::AppState;
use picrelay_gateway::storage::LocalArtifactStore;
use picrelay_gateway::templates::TemplateLibrary;
use picrelay_gateway::SlackClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = picrelay_core::Config::load()?;

    // Initialize tracing (RUST_LOG wins over the configured level)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.settings.logging.level.as_str().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = &config.settings;
    info!(
        "Configuration loaded (model: {}, max concurrent jobs: {})",
        settings.provider.model, settings.pipeline.max_concurrent_jobs
    );

    let provider = GeminiImageClient::new(
        config.gemini_api_key(),
        &settings.provider.model,
        &settings.provider.base_url,
    )?;
    let slack = SlackClient::new(config.slack_bot_token())?;

    let templates = match &settings.templates.dir {
        Some(dir) => {
            let library = TemplateLibrary::load(dir).await?;
            info!("Loaded {} template image(s) from {}", library.len(), dir.display());
            library
        }
        None => TemplateLibrary::empty(),
    };

    let store = LocalArtifactStore::new(&settings.storage.output_dir);
    info!("Generated images are stored in {}", store.dir().display());

    let dispatcher = JobDispatcher::new(
        &settings.pipeline,
        Arc::new(provider),
        Arc::new(slack),
        Arc::new(store),
    )
    .with_prompt_builder(PromptBuilder::new(settings.prompt.preamble.clone()))
    .with_templates(templates);

    let state = Arc::new(AppState::new(Arc::new(dispatcher)));

    let bind_addr = config.bind_addr();
    server::run(state, &bind_addr).await?;

    Ok(())
}
