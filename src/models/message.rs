//! Message references and answer records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a stored answer record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerId(String);

impl AnswerId {
    /// Creates a new answer ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random answer ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnswerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AnswerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AnswerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How a [`MessageRef`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// A user-supplied literal string anchored to a specific message.
    Text,
    /// A pointer at an existing chat message (fetched by channel+timestamp).
    Message,
}

impl RefKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Message => "message",
        }
    }

    /// Parses a kind string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "message" => Some(Self::Message),
            _ => None,
        }
    }
}

/// A fully resolved reference to a message or quoted literal.
///
/// Immutable once constructed. A `Text` ref carries a user-supplied literal
/// anchored to the message it was written in (for provenance); a `Message`
/// ref points at an existing chat message fetched by channel+timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// How this reference was produced.
    pub kind: RefKind,
    /// Channel the referenced message lives in.
    pub channel: String,
    /// Slack-style message timestamp (`"1234567890.123456"`).
    pub timestamp: String,
    /// The referenced text (literal content or fetched message text).
    pub text: String,
    /// The raw spec string the user supplied.
    pub raw_source: String,
}

impl MessageRef {
    /// Creates a text-literal reference anchored to `channel`/`timestamp`.
    #[must_use]
    pub fn literal(
        text: impl Into<String>,
        channel: impl Into<String>,
        timestamp: impl Into<String>,
        raw_source: impl Into<String>,
    ) -> Self {
        Self {
            kind: RefKind::Text,
            channel: channel.into(),
            timestamp: timestamp.into(),
            text: text.into(),
            raw_source: raw_source.into(),
        }
    }

    /// Creates a reference to an existing message.
    #[must_use]
    pub fn message(
        text: impl Into<String>,
        channel: impl Into<String>,
        timestamp: impl Into<String>,
        raw_source: impl Into<String>,
    ) -> Self {
        Self {
            kind: RefKind::Message,
            channel: channel.into(),
            timestamp: timestamp.into(),
            text: text.into(),
            raw_source: raw_source.into(),
        }
    }

    /// Returns true if both refs point at the same underlying thing.
    ///
    /// Message refs compare by message timestamp, text refs by literal
    /// content. Used by the formatter to collapse consecutive answers that
    /// share one question into a single question header.
    #[must_use]
    pub fn same_target(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match self.kind {
            RefKind::Message => self.timestamp == other.timestamp,
            RefKind::Text => self.text == other.text,
        }
    }

    /// Returns the timestamp's whole-second component.
    ///
    /// Slack timestamps are `<seconds>.<sequence>`; the fractional part is a
    /// uniqueness counter, not sub-second time, so it is ignored for scoring.
    #[must_use]
    pub fn seconds(&self) -> u64 {
        self.timestamp
            .split('.')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

/// A persisted question/answer pair.
///
/// Owned entirely by the store; the core never caches records across
/// requests. Both refs are fully resolved before a record is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Unique identifier.
    pub id: AnswerId,
    /// The question this record answers.
    pub question: MessageRef,
    /// The answer itself.
    pub answer: MessageRef,
    /// How many times this record has been surfaced by a query.
    ///
    /// Incremented best-effort after each query; loss of an individual
    /// increment under crash is tolerable.
    pub returned_count: u64,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
}

impl AnswerRecord {
    /// Creates a new record from a resolved question/answer pair.
    #[must_use]
    pub fn new(question: MessageRef, answer: MessageRef, created_at: u64) -> Self {
        Self {
            id: AnswerId::generate(),
            question,
            answer,
            returned_count: 0,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_kind_roundtrip() {
        assert_eq!(RefKind::parse("text"), Some(RefKind::Text));
        assert_eq!(RefKind::parse("message"), Some(RefKind::Message));
        assert_eq!(RefKind::parse("other"), None);
        assert_eq!(RefKind::Text.as_str(), "text");
    }

    #[test]
    fn test_same_target_message_by_timestamp() {
        let a = MessageRef::message("hello", "C123", "1700000000.000100", "src");
        let b = MessageRef::message("different text", "C123", "1700000000.000100", "src2");
        let c = MessageRef::message("hello", "C123", "1700000000.000200", "src");
        assert!(a.same_target(&b));
        assert!(!a.same_target(&c));
    }

    #[test]
    fn test_same_target_text_by_content() {
        let a = MessageRef::literal("say hi", "C123", "1.000001", "\"say hi\"");
        let b = MessageRef::literal("say hi", "C999", "2.000002", "\u{201c}say hi\u{201d}");
        let c = MessageRef::literal("say bye", "C123", "1.000001", "\"say bye\"");
        assert!(a.same_target(&b));
        assert!(!a.same_target(&c));
    }

    #[test]
    fn test_kind_mismatch_never_same_target() {
        let a = MessageRef::literal("say hi", "C123", "1.000001", "q");
        let b = MessageRef::message("say hi", "C123", "1.000001", "q");
        assert!(!a.same_target(&b));
    }

    #[test]
    fn test_seconds_extraction() {
        let m = MessageRef::message("x", "C1", "1700000123.000456", "s");
        assert_eq!(m.seconds(), 1_700_000_123);

        let bad = MessageRef::message("x", "C1", "not-a-ts", "s");
        assert_eq!(bad.seconds(), 0);
    }
}
