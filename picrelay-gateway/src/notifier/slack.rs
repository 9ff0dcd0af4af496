//! Slack Web API client.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MessageRef, Notifier, NotifyError};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Slack bot client
#[derive(Clone)]
pub struct SlackClient {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CompleteUploadRequest<'a> {
    files: Vec<UploadedFile<'a>>,
    channel_id: &'a str,
    initial_comment: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UploadedFile<'a> {
    id: &'a str,
    title: &'a str,
}

/// Every Web API response carries `ok` and, on failure, `error`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PostMessageBody {
    channel: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlBody {
    upload_url: String,
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoBody {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Empty {}

impl SlackUser {
    /// Profile display name, then real name, then the account handle.
    fn best_name(self) -> String {
        let profile = self.profile.unwrap_or(SlackProfile {
            display_name: None,
            real_name: None,
        });
        [profile.display_name, profile.real_name, self.real_name]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
            .unwrap_or(self.name)
    }
}

fn unwrap_envelope<T>(method: &'static str, envelope: Envelope<T>) -> Result<T, NotifyError> {
    if !envelope.ok {
        return Err(NotifyError::Api {
            method,
            error: envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }
    envelope.body.ok_or(NotifyError::Api {
        method,
        error: "missing response body".to_string(),
    })
}

impl SlackClient {
    /// Create a new Slack client
    pub fn new(bot_token: &str) -> Result<Self, NotifyError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", bot_token)).map_err(|_| {
            NotifyError::Api {
                method: "auth",
                error: "bot token is not a valid header value".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: SLACK_API_BASE.to_string(),
        })
    }

    /// Point the client at another API host (e.g. a local mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn read_envelope<T: DeserializeOwned>(
        method: &'static str,
        response: reqwest::Response,
    ) -> Result<T, NotifyError> {
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                method,
                status: status.as_u16(),
            });
        }
        let envelope: Envelope<T> = response.json().await?;
        unwrap_envelope(method, envelope)
    }
}

#[async_trait::async_trait]
impl Notifier for SlackClient {
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ref: Option<&str>,
    ) -> Result<MessageRef, NotifyError> {
        let request = PostMessageRequest {
            channel: channel_id,
            text,
            thread_ts: thread_ref,
        };
        let response = self
            .http_client
            .post(self.url("chat.postMessage"))
            .json(&request)
            .send()
            .await?;

        let body: PostMessageBody = Self::read_envelope("chat.postMessage", response).await?;
        Ok(MessageRef {
            channel_id: body.channel,
            ts: body.ts,
        })
    }

    async fn post_file(
        &self,
        channel_id: &str,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
        thread_ref: Option<&str>,
    ) -> Result<(), NotifyError> {
        let length = bytes.len().to_string();
        let response = self
            .http_client
            .post(self.url("files.getUploadURLExternal"))
            .form(&[("filename", filename), ("length", length.as_str())])
            .send()
            .await?;
        let upload: UploadUrlBody =
            Self::read_envelope("files.getUploadURLExternal", response).await?;

        let response = self
            .http_client
            .post(&upload.upload_url)
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status {
                method: "files.upload",
                status: response.status().as_u16(),
            });
        }

        let request = CompleteUploadRequest {
            files: vec![UploadedFile {
                id: &upload.file_id,
                title: filename,
            }],
            channel_id,
            initial_comment: caption,
            thread_ts: thread_ref,
        };
        let response = self
            .http_client
            .post(self.url("files.completeUploadExternal"))
            .json(&request)
            .send()
            .await?;
        let _: Empty = Self::read_envelope("files.completeUploadExternal", response).await?;

        debug!("Uploaded {} to {}", filename, channel_id);
        Ok(())
    }

    async fn lookup_display_name(&self, user_id: &str) -> Result<String, NotifyError> {
        let response = self
            .http_client
            .get(self.url("users.info"))
            .query(&[("user", user_id)])
            .send()
            .await?;

        let body: UserInfoBody = Self::read_envelope("users.info", response).await?;
        Ok(body.user.best_name())
    }

    /// `url_private` downloads need the bot token and the `files:read` scope.
    async fn download_file(&self, url: &str) -> Result<Vec<u8>, NotifyError> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                method: "files.download",
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
