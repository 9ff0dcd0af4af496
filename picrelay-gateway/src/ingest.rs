//! Slack payloads and their conversion into [`Trigger`]s.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use picrelay_core::{ReferenceImage, Trigger, TriggerKind};

use crate::notifier::Notifier;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[A-Z0-9]+(?:\|[^>]*)?>").expect("mention regex"));

/// Form body of a slash command (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
}

impl SlashCommand {
    pub fn into_trigger(self) -> Trigger {
        Trigger {
            kind: TriggerKind::Command,
            prompt_text: self.text,
            destination_id: self.channel_id,
            requester_id: self.user_id,
            thread_ref: None,
            source_ts: None,
            attachments: Vec::new(),
        }
    }
}

/// Top-level Events API request.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: SlackEvent,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub url_private: Option<String>,
}

impl SlackFile {
    fn image_mime(&self) -> Option<&str> {
        self.mimetype
            .as_deref()
            .filter(|mime| mime.starts_with("image/"))
    }
}

/// A mention or direct message that should become a job.
#[derive(Debug, Clone)]
pub struct MentionEvent {
    pub trigger: Trigger,
    pub files: Vec<SlackFile>,
}

/// Remove `<@U123>` user mentions and collapse the leftover whitespace.
pub fn strip_mentions(text: &str) -> String {
    MENTION_RE
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl SlackEvent {
    /// Convert an event into a trigger, or `None` when it should be ignored.
    ///
    /// Bot messages and edits are dropped. Plain `message` events only count
    /// in direct messages, since channel mentions also arrive as
    /// `app_mention`.
    pub fn into_mention(self) -> Option<MentionEvent> {
        if self.bot_id.is_some() {
            return None;
        }
        match self.subtype.as_deref() {
            None | Some("file_share") => {}
            Some(_) => return None,
        }
        let relevant = match self.kind.as_str() {
            "app_mention" => true,
            "message" => self.channel_type.as_deref() == Some("im"),
            _ => false,
        };
        if !relevant {
            return None;
        }

        let channel = self.channel?;
        let user = self.user?;
        let ts = self.ts?;
        // Replies go under the mention itself when it is not already in a thread.
        let thread_ref = self.thread_ts.unwrap_or_else(|| ts.clone());

        let files = self
            .files
            .into_iter()
            .filter(|file| file.image_mime().is_some() && file.url_private.is_some())
            .collect();

        Some(MentionEvent {
            trigger: Trigger {
                kind: TriggerKind::Mention,
                prompt_text: strip_mentions(&self.text),
                destination_id: channel,
                requester_id: user,
                thread_ref: Some(thread_ref),
                source_ts: Some(ts),
                attachments: Vec::new(),
            },
            files,
        })
    }
}

/// Download image attachments; files that fail to download are skipped.
pub async fn fetch_attachments(
    notifier: &dyn Notifier,
    files: &[SlackFile],
) -> Vec<ReferenceImage> {
    let mut images = Vec::with_capacity(files.len());
    for file in files {
        let (Some(mime), Some(url)) = (file.image_mime(), file.url_private.as_deref()) else {
            continue;
        };
        match notifier.download_file(url).await {
            Ok(bytes) => {
                debug!(
                    "Downloaded attachment {} ({} bytes)",
                    file.name.as_deref().unwrap_or("unnamed"),
                    bytes.len()
                );
                images.push(ReferenceImage::new(mime, bytes));
            }
            Err(e) => warn!(
                "Skipping attachment {}: {}",
                file.name.as_deref().unwrap_or("unnamed"),
                e
            ),
        }
    }
    images
}
