pub mod gemini;
pub mod provider;

pub use provider::{GeneratedImage, ImageProvider, ProviderError, is_transient_status};
