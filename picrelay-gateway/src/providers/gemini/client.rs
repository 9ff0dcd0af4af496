//! Google Gemini image generation client.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use picrelay_core::{AspectRatio, ReferenceImage};

use super::content::{GeminiContent, to_gemini_contents};
use crate::providers::provider::{GeneratedImage, ImageProvider, ProviderError};

/// Gemini API client for image models
#[derive(Clone)]
pub struct GeminiImageClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

/// Request body for the Gemini generateContent API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

/// Generation configuration
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: &'static str,
}

/// Response from the generateContent API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

/// Response parts mix text and image data; only images are kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Error envelope returned on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl GeminiImageClient {
    /// Create a new Gemini client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Per-attempt timeouts are enforced by the backoff executor; this is
        // only a ceiling for a connection that never resolves.
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(300))
            .build()?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn build_request(
    prompt: &str,
    reference_images: &[ReferenceImage],
    aspect_ratio: AspectRatio,
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: to_gemini_contents(prompt, reference_images),
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE"],
            image_config: ImageConfig {
                aspect_ratio: aspect_ratio.as_str(),
            },
        },
    }
}

/// Pull the first image out of a response, or explain why there is none.
fn extract_image(response: GenerateContentResponse) -> Result<GeneratedImage, ProviderError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(ProviderError::NoImage(format!("prompt blocked ({})", reason)));
    }

    let mut finish_reason = None;
    let mut text = None;
    for candidate in response.candidates {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        for part in parts {
            if let Some(inline) = part.inline_data {
                let data = STANDARD.decode(inline.data.as_bytes())?;
                return Ok(GeneratedImage {
                    mime_type: inline.mime_type,
                    data,
                });
            }
            if text.is_none() {
                text = part.text;
            }
        }
    }

    let detail = match (finish_reason, text) {
        (_, Some(text)) => text,
        (Some(reason), None) => format!("finish reason {}", reason),
        (None, None) => "empty response".to_string(),
    };
    Err(ProviderError::NoImage(detail))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.to_string())
}

#[async_trait::async_trait]
impl ImageProvider for GeminiImageClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        reference_images: &[ReferenceImage],
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImage, ProviderError> {
        let request_body = build_request(prompt, reference_images, aspect_ratio);
        debug!(
            model = %self.model,
            references = reference_images.len(),
            aspect_ratio = %aspect_ratio,
            "Sending Gemini image request"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_status(
                status.as_u16(),
                error_message(&response_text),
            ));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response_text)?;
        extract_image(parsed)
    }
}
