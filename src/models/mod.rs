//! Data models for lorebot.
//!
//! This module contains all the core data structures used throughout the system.

mod events;
mod message;
mod search;

pub use events::{AppMention, EventCallback, EventEnvelope, InnerEvent};
pub use message::{AnswerId, AnswerRecord, MessageRef, RefKind};
pub use search::{ScoredAnswer, SearchFilter, SearchHit};
