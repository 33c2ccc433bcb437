//! Relevance/recency ranking over full-text search hits.

use crate::models::{ScoredAnswer, SearchHit};

/// Orders search hits by recency-adjusted relevance.
///
/// The sort key is `relevance / sqrt(1 + age_seconds)`: the penalty is
/// always >= 1 and grows sub-linearly with age, so older answers are
/// downranked but a very strong full-text match can still dominate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine;

impl RankingEngine {
    /// Creates a new ranking engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes sort keys against `now` and returns hits in descending
    /// order.
    ///
    /// The sort is stable: ties keep the original search order. The computed
    /// key is attached to each item so the formatter can max-normalize
    /// without re-reading the clock.
    #[must_use]
    pub fn rank(&self, hits: Vec<SearchHit>, now: u64) -> Vec<ScoredAnswer> {
        let mut scored: Vec<ScoredAnswer> = hits
            .into_iter()
            .map(|hit| {
                let sort_key = hit.relevance / Self::recency_penalty(now, &hit);
                ScoredAnswer {
                    relevance: hit.relevance,
                    sort_key,
                    record: hit.record,
                }
            })
            .collect();

        // Vec::sort_by is stable; reversed comparison gives descending order.
        scored.sort_by(|a, b| {
            b.sort_key
                .partial_cmp(&a.sort_key)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored
    }

    /// `sqrt(1 + age)`, never less than 1.
    ///
    /// Ages are clamped at zero so an answer timestamped slightly ahead of
    /// the query clock is not boosted.
    fn recency_penalty(now: u64, hit: &SearchHit) -> f64 {
        let age = now.saturating_sub(hit.record.answer.seconds());
        #[allow(clippy::cast_precision_loss)]
        (1.0 + age as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerRecord, MessageRef};

    fn hit(answer_ts: &str, relevance: f64, text: &str) -> SearchHit {
        let question = MessageRef::literal("q", "C1", "1.000001", "\"q\"");
        let answer = MessageRef::message(text, "C1", answer_ts, "src");
        SearchHit {
            record: AnswerRecord::new(question, answer, 0),
            relevance,
        }
    }

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_fresh_answer_has_unit_penalty() {
        let ranked = RankingEngine::new().rank(vec![hit("1700000000.000001", 2.0, "a")], NOW);
        assert!((ranked[0].sort_key - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_older_answer_ranks_lower_at_equal_relevance() {
        let engine = RankingEngine::new();
        let ranked = engine.rank(
            vec![
                hit("1690000000.000001", 1.0, "old"),
                hit("1699999000.000001", 1.0, "new"),
            ],
            NOW,
        );
        assert_eq!(ranked[0].record.answer.text, "new");
        assert!(ranked[0].sort_key > ranked[1].sort_key);
    }

    #[test]
    fn test_strong_relevance_can_beat_recency() {
        let engine = RankingEngine::new();
        // Ten days old but vastly more relevant.
        let ranked = engine.rank(
            vec![
                hit("1699136000.000001", 10_000.0, "old strong"),
                hit("1700000000.000001", 1.0, "new weak"),
            ],
            NOW,
        );
        assert_eq!(ranked[0].record.answer.text, "old strong");
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let engine = RankingEngine::new();
        let ranked = engine.rank(
            vec![
                hit("1700000000.000001", 1.0, "first"),
                hit("1700000000.000002", 1.0, "second"),
            ],
            NOW,
        );
        // Identical whole-second age and relevance: original order kept.
        assert_eq!(ranked[0].record.answer.text, "first");
        assert_eq!(ranked[1].record.answer.text, "second");
    }

    #[test]
    fn test_idempotent_under_frozen_clock() {
        let engine = RankingEngine::new();
        let hits = vec![
            hit("1699000000.000001", 3.0, "a"),
            hit("1699500000.000001", 2.0, "b"),
            hit("1699900000.000001", 1.0, "c"),
        ];
        let first = engine.rank(hits.clone(), NOW);
        let second = engine.rank(hits, NOW);
        let order = |r: &[ScoredAnswer]| {
            r.iter()
                .map(|s| s.record.answer.text.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn test_future_timestamp_clamped() {
        let ranked = RankingEngine::new().rank(vec![hit("1700000100.000001", 5.0, "ahead")], NOW);
        // Clock skew must not boost the score past the raw relevance.
        assert!((ranked[0].sort_key - 5.0).abs() < 1e-9);
    }
}
