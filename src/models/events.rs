//! Inbound Slack event envelope types.
//!
//! Deserialized at the HTTP boundary. The authenticity (verification token)
//! check happens there as well; the core engine only ever sees mentions that
//! passed it.

use serde::{Deserialize, Serialize};

/// Top-level event envelope, discriminated by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Slack URL verification handshake; the challenge must be echoed back.
    UrlVerification {
        /// Verification token.
        token: String,
        /// Challenge string to echo.
        challenge: String,
    },
    /// A wrapped workspace event.
    EventCallback(EventCallback),
}

/// An `event_callback` wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCallback {
    /// Verification token, checked against configuration before dispatch.
    pub token: String,
    /// The inner event.
    pub event: InnerEvent,
}

/// The inner workspace event, discriminated by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InnerEvent {
    /// The bot was mentioned in a channel.
    AppMention(AppMention),
    /// Any other event type; acknowledged and ignored.
    #[serde(other)]
    Other,
}

/// An `app_mention` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMention {
    /// Message text, including the leading `<@Uxxxx>` mention.
    pub text: String,
    /// Channel the mention happened in.
    pub channel: String,
    /// Timestamp of the mentioning message.
    pub ts: String,
    /// Thread root timestamp, present when the mention is a thread reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// User who mentioned the bot.
    #[serde(default)]
    pub user: Option<String>,
}

impl AppMention {
    /// Returns the thread root timestamp, falling back to the message itself.
    ///
    /// A top-level mention is its own thread root.
    #[must_use]
    pub fn parent_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_verification_roundtrip() {
        let json = r#"{"type":"url_verification","token":"tok","challenge":"chal"}"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        match envelope {
            EventEnvelope::UrlVerification { token, challenge } => {
                assert_eq!(token, "tok");
                assert_eq!(challenge, "chal");
            },
            EventEnvelope::EventCallback(_) => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_app_mention_with_thread() {
        let json = r#"{
            "type": "event_callback",
            "token": "tok",
            "event": {
                "type": "app_mention",
                "text": "<@U123> how do I greet?",
                "channel": "C42",
                "ts": "1700000001.000200",
                "thread_ts": "1700000000.000100",
                "user": "U999"
            }
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        let EventEnvelope::EventCallback(cb) = envelope else {
            panic!("wrong variant");
        };
        let InnerEvent::AppMention(mention) = cb.event else {
            panic!("wrong inner event");
        };
        assert_eq!(mention.channel, "C42");
        assert_eq!(mention.parent_ts(), "1700000000.000100");
    }

    #[test]
    fn test_parent_ts_falls_back_to_self() {
        let mention = AppMention {
            text: "<@U123> hi".to_string(),
            channel: "C42".to_string(),
            ts: "1700000001.000200".to_string(),
            thread_ts: None,
            user: None,
        };
        assert_eq!(mention.parent_ts(), "1700000001.000200");
    }

    #[test]
    fn test_unknown_inner_event_tolerated() {
        let json = r#"{
            "type": "event_callback",
            "token": "tok",
            "event": {"type": "reaction_added"}
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        let EventEnvelope::EventCallback(cb) = envelope else {
            panic!("wrong variant");
        };
        assert!(matches!(cb.event, InnerEvent::Other));
    }
}
