//! Job data model shared between ingestion and the dispatcher.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Output aspect ratio understood by the image provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape4x3,
        AspectRatio::Landscape16x9,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1:1" | "square" => Ok(AspectRatio::Square),
            "3:4" => Ok(AspectRatio::Portrait3x4),
            "9:16" | "portrait" => Ok(AspectRatio::Portrait9x16),
            "4:3" => Ok(AspectRatio::Landscape4x3),
            "16:9" | "landscape" => Ok(AspectRatio::Landscape16x9),
            _ => Err(format!("Unknown aspect ratio: {}", s)),
        }
    }
}

/// An image sent to the provider alongside the prompt.
///
/// The payload is reference counted so template images can be attached to
/// every job without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl ReferenceImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Where results are posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Conversation (channel) identifier
    pub channel_id: String,
    /// Thread handle; every message about a job goes here once set
    pub thread_ref: Option<String>,
}

/// How the trigger reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Slash command; the caller waits for a short HTTP response
    Command,
    /// Mention event; acknowledged only through channel posts
    Mention,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Command => write!(f, "command"),
            TriggerKind::Mention => write!(f, "mention"),
        }
    }
}

/// Raw inbound request, before validation.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub prompt_text: String,
    pub destination_id: String,
    pub requester_id: String,
    pub thread_ref: Option<String>,
    /// Timestamp of the source event, used for the idempotency key
    pub source_ts: Option<String>,
    pub attachments: Vec<ReferenceImage>,
}

impl Trigger {
    /// Idempotency key for at-least-once delivered events.
    ///
    /// Returns `None` when the source carries no event timestamp (slash
    /// commands are delivered once and are not deduplicated).
    pub fn idempotency_key(&self) -> Option<String> {
        self.source_ts.as_ref().map(|ts| {
            format!("{}:{}:{}", self.destination_id, self.requester_id, ts)
        })
    }
}

/// A validated generation request. Immutable once built.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub kind: TriggerKind,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub reference_images: Vec<ReferenceImage>,
    pub destination: Destination,
    pub requester_id: String,
}

/// Lifecycle of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Received,
    Validated,
    Acknowledged,
    Admitted,
    Executing,
    Delivered,
    Failed,
}

/// Aspect flag pulled out of free-form prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspectFlag {
    /// Prompt with the flag removed
    pub prompt: String,
    /// Raw token as written by the user, if any
    pub token: Option<String>,
}

/// Split an aspect ratio flag off the prompt.
///
/// Recognized forms: `--ar 16:9`, `--aspect 16:9`, and a trailing bare ratio
/// token such as `... 9:16`. After an explicit flag the token is returned raw
/// so the caller can decide how to handle values it does not recognize. A
/// trailing bare token is only taken when it is a supported ratio; anything
/// else (`a clock showing 3:45`) stays in the prompt.
pub fn split_aspect_flag(text: &str) -> AspectFlag {
    let words: Vec<&str> = text.split_whitespace().collect();

    if let Some(pos) = words
        .iter()
        .position(|word| matches!(*word, "--ar" | "--aspect"))
    {
        let token = words.get(pos + 1).map(|token| token.to_string());
        let skip = if token.is_some() { 2 } else { 1 };
        let prompt = words
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx < pos || *idx >= pos + skip)
            .map(|(_, word)| *word)
            .collect::<Vec<_>>()
            .join(" ");
        return AspectFlag { prompt, token };
    }

    if let Some((last, rest)) = words.split_last()
        && looks_like_ratio(last)
        && last.parse::<AspectRatio>().is_ok()
    {
        return AspectFlag {
            prompt: rest.join(" "),
            token: Some(last.to_string()),
        };
    }

    AspectFlag {
        prompt: words.join(" "),
        token: None,
    }
}

fn looks_like_ratio(word: &str) -> bool {
    match word.split_once(':') {
        Some((w, h)) => {
            !w.is_empty()
                && !h.is_empty()
                && w.chars().all(|c| c.is_ascii_digit())
                && h.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
