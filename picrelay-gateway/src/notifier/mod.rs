//! Outbound messages to the originating conversation.

mod slack;

pub use slack::SlackClient;

use tracing::warn;

use crate::messages::UNKNOWN_REQUESTER;

/// Handle of a posted message; later messages reply in its thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: String,
    pub ts: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Slack API error in {method}: {error}")]
    Api { method: &'static str, error: String },
    #[error("Unexpected HTTP status {status} from {method}")]
    Status { method: &'static str, status: u16 },
}

/// Chat platform client used to deliver job progress and results.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Post a text message, optionally as a thread reply.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ref: Option<&str>,
    ) -> Result<MessageRef, NotifyError>;

    /// Upload a file with a caption into a channel or thread.
    async fn post_file(
        &self,
        channel_id: &str,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
        thread_ref: Option<&str>,
    ) -> Result<(), NotifyError>;

    /// Resolve a user id to a human readable name.
    async fn lookup_display_name(&self, user_id: &str) -> Result<String, NotifyError>;

    /// Fetch the bytes of a file shared in the conversation.
    async fn download_file(&self, url: &str) -> Result<Vec<u8>, NotifyError>;
}

/// Display name with a generic placeholder when the lookup fails.
pub async fn display_name_or_placeholder(notifier: &dyn Notifier, user_id: &str) -> String {
    match notifier.lookup_display_name(user_id).await {
        Ok(name) if !name.trim().is_empty() => name,
        Ok(_) => UNKNOWN_REQUESTER.to_string(),
        Err(e) => {
            warn!("Display name lookup failed for {}: {}", user_id, e);
            UNKNOWN_REQUESTER.to_string()
        }
    }
}
