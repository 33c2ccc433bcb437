//! Search types and filters.

use super::AnswerRecord;

/// Provenance filter for answer search.
///
/// Restricts full-text hits to records whose question was captured in a
/// given channel, or to public-channel provenance only (Slack public channel
/// ids begin with `C`, private groups with `G`).
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict to records captured in this channel.
    pub channel: Option<String>,
    /// Restrict to records captured in public channels.
    pub public_only: bool,
}

impl SearchFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channel: None,
            public_only: false,
        }
    }

    /// Restricts results to records captured in `channel`.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Restricts results to public-channel provenance.
    #[must_use]
    pub const fn with_public_only(mut self, public_only: bool) -> Self {
        self.public_only = public_only;
        self
    }

    /// Returns true if the filter is empty (matches all).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channel.is_none() && !self.public_only
    }
}

/// A raw full-text search hit, before recency adjustment.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched record.
    pub record: AnswerRecord,
    /// Full-text relevance score (higher = better).
    pub relevance: f64,
}

/// A search hit with its recency-adjusted sort key attached.
///
/// Computed per-query, never persisted. The sort key is carried along so the
/// formatter can max-normalize against the same clock reading that produced
/// the ordering.
#[derive(Debug, Clone)]
pub struct ScoredAnswer {
    /// The matched record.
    pub record: AnswerRecord,
    /// Raw full-text relevance score.
    pub relevance: f64,
    /// `relevance / sqrt(1 + age_seconds)`, the ordering key.
    pub sort_key: f64,
}
