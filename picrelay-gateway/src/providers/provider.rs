//! Provider trait for abstracting image generation backends.

use std::time::Duration;

use picrelay_core::{AspectRatio, ReferenceImage};

/// Image bytes returned by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl GeneratedImage {
    /// File extension matching the declared media type
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Provider error types.
///
/// Whether an error is worth retrying is decided where the error is built,
/// never by matching on its message later.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        retryable: bool,
    },
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("No image in response: {0}")]
    NoImage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid image payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl ProviderError {
    /// Build an API error from an HTTP status, tagging transient statuses.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
            retryable: is_transient_status(status),
        }
    }

    /// Whether the failure is transient (overload, unavailability, timeout).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(err) => err.is_timeout() || err.is_connect(),
            Self::ApiError { retryable, .. } => *retryable,
            Self::Timeout(_) => true,
            Self::NoImage(_) | Self::Serialization(_) | Self::Decode(_) => false,
        }
    }

    /// HTTP status reported by the provider, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::HttpError(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Rate limiting and server-side unavailability.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Image generation backend
#[async_trait::async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Current model
    fn model(&self) -> &str;

    /// Generate one image from a prompt and optional reference images.
    async fn generate(
        &self,
        prompt: &str,
        reference_images: &[ReferenceImage],
        aspect_ratio: AspectRatio,
    ) -> Result<GeneratedImage, ProviderError>;
}
