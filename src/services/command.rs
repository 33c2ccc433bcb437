//! The mention command grammar.
//!
//! An ordered list of rules is tried against the normalized mention text;
//! the first matching rule wins and there is no backtracking across rules:
//!
//! 1. Teach: `<answerSpec> (is the answer to|answers) <questionSpec>`
//! 2. Reset: the exact confirmation phrase
//! 3. Query: everything else (lowest priority; optionally required to end
//!    with `?`)
//!
//! A literal `DEBUG` token inside a query is stripped before search and
//! surfaced as a structured flag, never re-read from the text downstream.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default reset confirmation phrase.
///
/// Deliberately long: the reset command is destructive and must not fire on
/// an accidental "forget everything".
pub const DEFAULT_RESET_PHRASE: &str = "forget everything you've ever learnt. yes I'm sure";

/// The in-band token toggling verbose per-result annotations.
const DEBUG_TOKEN: &str = "DEBUG";

static TEACH_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?s)^\s*(.+?)\s+(?:is the answer to|answers)\s+(.+?)\s*$").unwrap()
});

/// A parsed mention command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a new question/answer pair.
    Teach {
        /// The answer spec (quoted literal, permalink or `this`).
        answer_spec: String,
        /// The question spec.
        question_spec: String,
    },
    /// Clear the whole store.
    Reset,
    /// Search stored answers.
    Query {
        /// The query text. Empty means "use the thread root's text".
        text: String,
        /// Whether the `DEBUG` token was present.
        debug: bool,
    },
    /// No rule matched. An expected outcome, not an error: the caller
    /// responds with a generic "didn't understand" acknowledgement.
    NoMatch,
}

/// Classifies mention text into a [`Command`].
#[derive(Debug, Clone)]
pub struct CommandParser {
    /// Whether the query rule requires a trailing `?` (deployment variant).
    require_question_mark: bool,
    /// The reset confirmation phrase, compared case-insensitively with
    /// curly apostrophes normalized.
    reset_phrase: String,
}

/// A grammar rule: tried in declared order, first `Some` wins.
type Rule = fn(&CommandParser, &str) -> Option<Command>;

/// Rules in priority order. The query rule matches almost anything, so it
/// must stay last.
const RULES: &[Rule] = &[
    CommandParser::try_teach,
    CommandParser::try_reset,
    CommandParser::try_query,
];

impl CommandParser {
    /// Creates a parser with the given deployment options.
    #[must_use]
    pub fn new(require_question_mark: bool, reset_phrase: impl Into<String>) -> Self {
        Self {
            require_question_mark,
            reset_phrase: reset_phrase.into(),
        }
    }

    /// Parses normalized (mention-stripped) message text.
    #[must_use]
    pub fn parse(&self, text: &str) -> Command {
        let text = text.trim();
        for rule in RULES {
            if let Some(command) = rule(self, text) {
                return command;
            }
        }
        Command::NoMatch
    }

    fn try_teach(&self, text: &str) -> Option<Command> {
        let caps = TEACH_RE.captures(text)?;
        Some(Command::Teach {
            answer_spec: caps[1].to_string(),
            question_spec: caps[2].to_string(),
        })
    }

    fn try_reset(&self, text: &str) -> Option<Command> {
        if normalize_apostrophes(text).eq_ignore_ascii_case(&normalize_apostrophes(
            &self.reset_phrase,
        )) {
            Some(Command::Reset)
        } else {
            None
        }
    }

    fn try_query(&self, text: &str) -> Option<Command> {
        let (stripped, debug) = strip_debug_token(text);
        let stripped = stripped.trim();

        if self.require_question_mark && !stripped.is_empty() && !stripped.ends_with('?') {
            return None;
        }

        Some(Command::Query {
            text: stripped.to_string(),
            debug,
        })
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(false, DEFAULT_RESET_PHRASE)
    }
}

/// Normalizes curly apostrophes to the ASCII one.
fn normalize_apostrophes(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}'], "'")
}

/// Removes the whitespace-delimited `DEBUG` token (case-sensitive).
///
/// Returns the remaining text and whether the token was present.
fn strip_debug_token(text: &str) -> (String, bool) {
    let mut found = false;
    let kept: Vec<&str> = text
        .split_whitespace()
        .filter(|word| {
            if *word == DEBUG_TOKEN {
                found = true;
                false
            } else {
                true
            }
        })
        .collect();
    (kept.join(" "), found)
}
