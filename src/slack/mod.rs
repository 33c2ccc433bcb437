//! Slack Web API client.
//!
//! The core consumes the chat platform through the [`ChatApi`] trait so the
//! engine can be tested without a live workspace. [`SlackClient`] is the
//! production implementation over the Slack Web API.

use crate::rendering::ReplyAttachment;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

/// A message fetched from the chat platform.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Message text.
    pub text: String,
    /// Author user id, when known.
    pub user: Option<String>,
    /// Message timestamp.
    pub ts: String,
    /// Channel the message lives in.
    pub channel: String,
}

/// Display metadata for a user.
#[derive(Debug, Clone)]
pub struct UserInfo {
    /// Display name.
    pub display_name: String,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

/// Trait for the chat platform boundary.
///
/// Methods map one-to-one onto the Web API calls the core issues. All
/// implementations must be shareable across tasks (`Arc<dyn ChatApi>`).
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetches a single message by channel and timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or the message is gone.
    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<FetchedMessage>;

    /// Posts a message, optionally threaded, with attachment blocks.
    ///
    /// Returns the timestamp of the posted message.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
        attachments: &[ReplyAttachment],
    ) -> Result<String>;

    /// Deletes a previously posted message.
    ///
    /// Companion to the undo button: an interactive-callback consumer pairs
    /// this with [`crate::services::Engine::forget`] to retract a confirmed
    /// reply. No route in this crate serves that callback.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    async fn delete_message(&self, channel: &str, ts: &str) -> Result<()>;

    /// Resolves a user id to display metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    async fn user_info(&self, user: &str) -> Result<UserInfo>;

    /// Resolves a channel id to its name.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    async fn channel_name(&self, channel: &str) -> Result<String>;

    /// Produces a permalink URL for a channel+timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    async fn permalink(&self, channel: &str, ts: &str) -> Result<String>;
}

/// Slack Web API client.
pub struct SlackClient {
    /// Bot token (`xoxb-...`).
    token: SecretString,
    /// API endpoint base.
    endpoint: String,
    /// HTTP client with connection pooling.
    client: reqwest::Client,
}

impl SlackClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://slack.com/api";

    /// Creates a new client with the given bot token.
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("Lorebot/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            token,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            client,
        }
    }

    /// Sets the API endpoint (for tests against a local stub).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Calls a Web API method with a JSON body and parses the response.
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        tracing::debug!(method, "Calling Slack Web API");

        let response = self
            .client
            .post(format!("{}/{method}", self.endpoint))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(method, error = %e, "Slack API request failed");
                Error::OperationFailed {
                    operation: method.to_string(),
                    cause: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(method, %status, body = %body, "Slack API returned error status");
            return Err(Error::OperationFailed {
                operation: method.to_string(),
                cause: format!("HTTP {status}: {body}"),
            });
        }

        let envelope: ApiEnvelope<T> =
            response.json().await.map_err(|e| Error::OperationFailed {
                operation: method.to_string(),
                cause: format!("malformed response: {e}"),
            })?;

        if !envelope.ok {
            let cause = envelope.error.unwrap_or_else(|| "unknown error".to_string());
            tracing::error!(method, error = %cause, "Slack API call not ok");
            return Err(Error::OperationFailed {
                operation: method.to_string(),
                cause,
            });
        }

        envelope.payload.ok_or_else(|| Error::OperationFailed {
            operation: method.to_string(),
            cause: "missing payload in ok response".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ChatApi for SlackClient {
    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<FetchedMessage> {
        let payload: HistoryPayload = self
            .call(
                "conversations.history",
                json!({
                    "channel": channel,
                    "latest": ts,
                    "inclusive": true,
                    "limit": 1,
                }),
            )
            .await?;

        let message = payload
            .messages
            .into_iter()
            .find(|m| m.ts == ts)
            .ok_or_else(|| Error::OperationFailed {
                operation: "conversations.history".to_string(),
                cause: format!("no message at {ts} in {channel}"),
            })?;

        Ok(FetchedMessage {
            text: message.text,
            user: message.user,
            ts: message.ts,
            channel: channel.to_string(),
        })
    }

    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
        attachments: &[ReplyAttachment],
    ) -> Result<String> {
        let mut body = json!({
            "channel": channel,
            "text": text,
            "attachments": attachments,
        });
        if let (Some(thread_ts), Some(map)) = (thread_ts, body.as_object_mut()) {
            map.insert("thread_ts".to_string(), json!(thread_ts));
        }

        let payload: PostedPayload = self.call("chat.postMessage", body).await?;
        Ok(payload.ts)
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> Result<()> {
        let _: PostedPayload = self
            .call("chat.delete", json!({ "channel": channel, "ts": ts }))
            .await?;
        Ok(())
    }

    async fn user_info(&self, user: &str) -> Result<UserInfo> {
        let payload: UserPayload = self.call("users.info", json!({ "user": user })).await?;
        let profile = payload.user.profile;
        let display_name = if profile.display_name.is_empty() {
            payload.user.name
        } else {
            profile.display_name
        };
        Ok(UserInfo {
            display_name,
            avatar_url: profile.image_48,
        })
    }

    async fn channel_name(&self, channel: &str) -> Result<String> {
        let payload: ChannelPayload = self
            .call("conversations.info", json!({ "channel": channel }))
            .await?;
        Ok(payload.channel.name)
    }

    async fn permalink(&self, channel: &str, ts: &str) -> Result<String> {
        let payload: PermalinkPayload = self
            .call(
                "chat.getPermalink",
                json!({ "channel": channel, "message_ts": ts }),
            )
            .await?;
        Ok(payload.permalink)
    }
}

/// Common `{ok, error, ...payload}` response shape.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    payload: Option<T>,
}

#[derive(Debug, Deserialize)]
struct HistoryPayload {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    #[serde(default)]
    text: String,
    ts: String,
    #[serde(default)]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostedPayload {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    user: UserObject,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    #[serde(default)]
    name: String,
    #[serde(default)]
    profile: UserProfile,
}

#[derive(Debug, Deserialize, Default)]
struct UserProfile {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    image_48: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelPayload {
    channel: ChannelObject,
}

#[derive(Debug, Deserialize)]
struct ChannelObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PermalinkPayload {
    permalink: String,
}
