//! User-facing message text.
//!
//! Every failure message starts with [`ERROR_PREFIX`] so it stands apart from
//! progress and success messages in the thread.

use picrelay_core::AspectRatio;

use crate::pipeline::backoff::RetryError;
use crate::providers::ProviderError;

pub const ERROR_PREFIX: &str = ":x:";

/// Shown when the requester's display name cannot be resolved.
pub const UNKNOWN_REQUESTER: &str = "there";

const MAX_DETAIL_CHARS: usize = 300;

pub fn working(aspect_ratio: AspectRatio) -> String {
    format!(
        ":hourglass_flowing_sand: Working on it. Generating a {} image, this can take a minute.",
        aspect_ratio
    )
}

pub fn too_busy(ceiling: usize) -> String {
    format!(
        "{} Too many requests right now ({} images already in progress). Please try again in a minute.",
        ERROR_PREFIX, ceiling
    )
}

pub fn invalid_request(reason: &str) -> String {
    format!("{} {}", ERROR_PREFIX, reason)
}

pub fn delivered(display_name: &str) -> String {
    format!(":frame_with_picture: Here you go, {}!", display_name)
}

pub fn generation_failed(error: &RetryError<ProviderError>) -> String {
    let detail = if error.error.is_retryable() {
        format!(
            "The image service is overloaded or timed out after {} attempt{}. Please try again later.",
            error.attempts,
            if error.attempts == 1 { "" } else { "s" }
        )
    } else {
        format!(
            "The image service could not complete the request: {}",
            truncate(&error.error.to_string(), MAX_DETAIL_CHARS)
        )
    };
    format!("{} Image generation failed. {}", ERROR_PREFIX, detail)
}

pub fn job_crashed() -> String {
    format!(
        "{} Image generation failed unexpectedly. Please try again.",
        ERROR_PREFIX
    )
}

pub fn delivery_failed() -> String {
    format!(
        "{} The image was generated but could not be uploaded here.",
        ERROR_PREFIX
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
