//! # Lorebot
//!
//! A question/answer knowledge-capture bot for Slack workspaces.
//!
//! Users teach the bot by tagging a message or quoted text as the answer to a
//! question (`"say hi" answers "how do I greet someone?"`). The pair is
//! persisted with full provenance, and later free-text mentions retrieve the
//! best-matching stored answers, ranked by relevance and recency, posted back
//! as a formatted reply.
//!
//! ## Architecture
//!
//! - Command grammar: an ordered rule list classifying mentions as teach,
//!   reset or query ([`services::CommandParser`])
//! - Reference resolution: quoted literals, permalinks and `this` become
//!   concrete [`models::MessageRef`]s ([`services::ReferenceResolver`])
//! - Ranking: FTS relevance damped by a sub-linear recency penalty
//!   ([`services::RankingEngine`])
//! - Formatting: rank-tinted attachment blocks with question collapsing
//!   ([`rendering::ResponseFormatter`])
//! - Storage: SQLite + FTS5 behind the [`storage::AnswerStore`] trait
//!
//! ## Example
//!
//! ```rust,ignore
//! use lorebot::services::{Command, CommandParser};
//!
//! let parser = CommandParser::default();
//! match parser.parse("\"say hi\" answers \"how do I greet someone?\"") {
//!     Command::Teach { answer_spec, question_spec, .. } => { /* resolve + persist */ },
//!     _ => {},
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod rendering;
pub mod server;
pub mod services;
pub mod slack;
pub mod storage;

// Re-exports for convenience
pub use config::LorebotConfig;
pub use models::{AnswerId, AnswerRecord, MessageRef, RefKind, ScoredAnswer, SearchFilter};
pub use rendering::{Reply, ReplyAttachment, ResponseFormatter};
pub use services::{Command, CommandParser, Engine, RankingEngine, ReferenceResolver};
pub use slack::ChatApi;
pub use storage::{AnswerStore, SqliteStore};

/// Error type for lorebot operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed event payloads, bad config values |
/// | `UnresolvableSpec` | A teach spec matched none of the reference forms |
/// | `OperationFailed` | Store queries fail, Slack API calls fail |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - An inbound event payload is missing required fields
    /// - A configuration value cannot be parsed
    /// - A hex color literal is malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A teach-command spec matched none of the reference forms.
    ///
    /// The three recognized forms are a quoted literal, a message permalink,
    /// and the literal token `this`. Surfaced to the user as a friendly
    /// "don't know about that one" reply, never a crash.
    #[error("could not resolve reference: {0}")]
    UnresolvableSpec(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` store operations fail
    /// - The Slack Web API returns an error or cannot be reached
    /// - Reply delivery fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for lorebot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every component scores against the same clock source.
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad payload".to_string());
        assert_eq!(err.to_string(), "invalid input: bad payload");

        let err = Error::UnresolvableSpec("no quotes, no permalink".to_string());
        assert_eq!(
            err.to_string(),
            "could not resolve reference: no quotes, no permalink"
        );

        let err = Error::OperationFailed {
            operation: "search".to_string(),
            cause: "disk io".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'search' failed: disk io");
    }

    #[test]
    fn test_current_timestamp_reasonable() {
        let ts = current_timestamp();
        // 2020-01-01 in Unix seconds
        assert!(ts > 1_577_836_800);
    }
}
