mod client;
mod content;

pub use client::GeminiImageClient;
pub use content::{GeminiContent, GeminiPart, InlineData, to_gemini_contents};
