//! Conversion from prompt + reference images to Gemini content parts.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use picrelay_core::ReferenceImage;

/// Gemini API content structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

/// Gemini API content part
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Base64 encoded binary part
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Build the single user turn sent for an image request.
///
/// The text part comes first, followed by every reference image in order.
pub fn to_gemini_contents(prompt: &str, reference_images: &[ReferenceImage]) -> Vec<GeminiContent> {
    let mut parts = Vec::with_capacity(reference_images.len() + 1);
    parts.push(GeminiPart::Text {
        text: prompt.to_string(),
    });

    for image in reference_images {
        parts.push(GeminiPart::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.data),
            },
        });
    }

    vec![GeminiContent {
        role: "user".to_string(),
        parts,
    }]
}
