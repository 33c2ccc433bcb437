//! Business logic services.
//!
//! Services orchestrate the store and the chat API and provide the
//! command-interpretation and answer-ranking core.

mod command;
mod engine;
mod ranking;
mod resolver;

pub use command::{Command, CommandParser, DEFAULT_RESET_PHRASE};
pub use engine::{Engine, NO_MATCH_TEXT, RESET_TEXT};
pub use ranking::RankingEngine;
pub use resolver::{ReferenceResolver, ResolveContext};
