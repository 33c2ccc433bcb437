//! Answer store trait.
//!
//! The store provides full-text relevance search over question text plus the
//! record lifecycle operations the command handlers need.
//!
//! # Implementor Notes
//!
//! - Methods use `&self` to enable sharing via `Arc<dyn AnswerStore>`
//! - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
//! - Relevance scores must be positive and increase with match quality
//! - `bump_returned` is best-effort bookkeeping; callers dispatch it without
//!   awaiting and tolerate lost increments

use crate::Result;
use crate::models::{AnswerId, AnswerRecord, SearchFilter, SearchHit};

/// Trait for answer store backends.
pub trait AnswerStore: Send + Sync {
    /// Persists a fully resolved question/answer pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert(&self, record: &AnswerRecord) -> Result<()>;

    /// Retrieves a record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get(&self, id: &AnswerId) -> Result<Option<AnswerRecord>>;

    /// Full-text search over question text.
    ///
    /// Returns hits with their relevance scores, best match first.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<SearchHit>>;

    /// Increments the returned-count of each given record.
    ///
    /// Missing ids are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn bump_returned(&self, ids: &[AnswerId]) -> Result<()>;

    /// Deletes a record by ID. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, id: &AnswerId) -> Result<bool>;

    /// Deletes every record (the reset command).
    ///
    /// # Errors
    ///
    /// Returns an error if the clear fails.
    fn clear(&self) -> Result<()>;

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    fn count(&self) -> Result<u64>;
}
