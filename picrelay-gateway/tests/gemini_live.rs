//! Live tests for the Gemini image provider (requires --features live-tests).
//!
//! Run with: cargo test --features live-tests --test gemini_live

#[cfg(feature = "live-tests")]
use picrelay_core::{AspectRatio, ProviderSettings, Secrets};
#[cfg(feature = "live-tests")]
use picrelay_gateway::providers::ImageProvider;
#[cfg(feature = "live-tests")]
use picrelay_gateway::providers::gemini::GeminiImageClient;

#[cfg(feature = "live-tests")]
fn load_gemini_client() -> Option<GeminiImageClient> {
    let api_key = match Secrets::from_env() {
        Ok(secrets) => secrets.gemini_api_key,
        Err(e) => {
            eprintln!("{}; skipping Gemini live test.", e);
            return None;
        }
    };

    let settings = ProviderSettings::default();
    Some(
        GeminiImageClient::new(api_key, settings.model, settings.base_url)
            .expect("Failed to build Gemini client"),
    )
}

#[cfg(feature = "live-tests")]
#[tokio::test]
async fn test_gemini_generates_landscape_image() {
    let Some(client) = load_gemini_client() else {
        return;
    };

    let image = client
        .generate(
            "A small red paper boat on a calm lake, flat illustration",
            &[],
            AspectRatio::Landscape16x9,
        )
        .await
        .expect("Gemini image generation failed");

    assert!(image.mime_type.starts_with("image/"));
    assert!(!image.data.is_empty());
}
