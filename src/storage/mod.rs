//! Persistence for answer records.
//!
//! The store owns every [`crate::models::AnswerRecord`]; the core reads and
//! writes through the [`AnswerStore`] trait and never caches records across
//! requests.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::AnswerStore;
