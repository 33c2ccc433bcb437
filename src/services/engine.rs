//! Mention handling: parse, execute, reply.
//!
//! The engine owns one request end to end: it classifies the mention,
//! resolves references, talks to the store, ranks and formats, and always
//! posts exactly one reply. External failures degrade into a user-visible
//! reply with the raw error quoted; an inbound mention is never left
//! unanswered.

use crate::config::{LorebotConfig, SearchScope};
use crate::models::{AnswerId, AnswerRecord, AppMention, ScoredAnswer, SearchFilter};
use crate::rendering::{FormatOptions, Reply, ResponseFormatter};
use crate::services::{Command, CommandParser, RankingEngine, ReferenceResolver, ResolveContext};
use crate::slack::ChatApi;
use crate::storage::AnswerStore;
use crate::{Error, Result, current_timestamp};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Fixed reply to the reset command.
pub const RESET_TEXT: &str = "wait, who are you again?";

/// Fixed reply when no grammar rule matched.
pub const NO_MATCH_TEXT: &str = "I didn't understand that, sorry.";

static MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\s*<@[A-Z0-9]+>\s*").unwrap()
});

/// The command-interpretation and answer-ranking engine.
///
/// Collaborators are injected so the engine can be exercised without a live
/// workspace or an on-disk store.
pub struct Engine {
    store: Arc<dyn AnswerStore>,
    chat: Arc<dyn ChatApi>,
    parser: CommandParser,
    resolver: ReferenceResolver,
    formatter: ResponseFormatter,
    ranking: RankingEngine,
    search_scope: SearchScope,
    max_results: usize,
}

impl Engine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn AnswerStore>,
        chat: Arc<dyn ChatApi>,
        config: &LorebotConfig,
    ) -> Self {
        Self {
            parser: CommandParser::new(
                config.require_question_mark,
                config.reset_phrase.clone(),
            ),
            resolver: ReferenceResolver::new(Arc::clone(&chat), config.quote_anchor),
            formatter: ResponseFormatter::new(Arc::clone(&chat)),
            ranking: RankingEngine::new(),
            search_scope: config.search_scope,
            max_results: config.max_results,
            store,
            chat,
        }
    }

    /// Handles one mention end to end and posts exactly one reply.
    ///
    /// # Errors
    ///
    /// Returns an error only if posting the reply itself fails; every other
    /// failure degrades into the reply content.
    pub async fn handle_mention(&self, mention: &AppMention) -> Result<()> {
        let reply = match self.run_command(mention).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, channel = %mention.channel, "Command degraded to error reply");
                metrics::counter!("lorebot_mentions_degraded_total").increment(1);
                degraded_reply(&e)
            },
        };

        self.chat
            .post_message(
                &mention.channel,
                mention.thread_ts.as_deref(),
                &reply.text,
                &reply.attachments,
            )
            .await?;
        Ok(())
    }

    /// Runs the parsed command and builds the reply.
    async fn run_command(&self, mention: &AppMention) -> Result<Reply> {
        let text = MENTION_RE.replace(&mention.text, "");

        match self.parser.parse(&text) {
            Command::Teach {
                answer_spec,
                question_spec,
            } => self.run_teach(mention, &answer_spec, &question_spec).await,
            Command::Query { text, debug } => self.run_query(mention, &text, debug).await,
            Command::Reset => {
                self.store.clear()?;
                tracing::info!(channel = %mention.channel, "Store reset");
                Ok(Reply {
                    text: RESET_TEXT.to_string(),
                    attachments: Vec::new(),
                })
            },
            Command::NoMatch => Ok(Reply {
                text: NO_MATCH_TEXT.to_string(),
                attachments: Vec::new(),
            }),
        }
    }

    /// Resolves both specs concurrently, persists, and formats the boneless
    /// confirmation. Nothing is persisted unless both resolutions succeed.
    async fn run_teach(
        &self,
        mention: &AppMention,
        answer_spec: &str,
        question_spec: &str,
    ) -> Result<Reply> {
        let ctx = ResolveContext {
            channel: mention.channel.clone(),
            current_ts: mention.ts.clone(),
            parent_ts: mention.parent_ts().to_string(),
        };

        let (answer, question) = self
            .resolver
            .resolve_pair(answer_spec, question_spec, &ctx)
            .await?;

        let record = AnswerRecord::new(question, answer, current_timestamp());
        self.store.insert(&record)?;
        tracing::info!(id = %record.id, channel = %mention.channel, "Taught new answer");
        metrics::counter!("lorebot_answers_taught_total").increment(1);

        let scored = vec![ScoredAnswer {
            relevance: 0.0,
            sort_key: 0.0,
            record,
        }];
        self.formatter
            .format(
                &scored,
                FormatOptions {
                    boneless: true,
                    debug: false,
                },
            )
            .await
    }

    /// Searches, ranks, bumps return counts (detached) and formats.
    async fn run_query(&self, mention: &AppMention, text: &str, debug: bool) -> Result<Reply> {
        // An empty query falls back to the thread root's text
        let query = if text.is_empty() {
            self.chat
                .fetch_message(&mention.channel, mention.parent_ts())
                .await?
                .text
        } else {
            text.to_string()
        };

        let filter = self.search_filter(&mention.channel);
        let hits = self.store.search(&query, &filter, self.max_results)?;
        let ranked = self.ranking.rank(hits, current_timestamp());

        self.dispatch_bump(&ranked);

        self.formatter
            .format(
                &ranked,
                FormatOptions {
                    boneless: false,
                    debug,
                },
            )
            .await
    }

    /// Dispatches the returned-count increment without awaiting it.
    ///
    /// Best-effort bookkeeping: a failed or lost increment must never block
    /// or fail the user-facing reply.
    fn dispatch_bump(&self, ranked: &[ScoredAnswer]) {
        if ranked.is_empty() {
            return;
        }
        let ids: Vec<AnswerId> = ranked.iter().map(|s| s.record.id.clone()).collect();
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.bump_returned(&ids) {
                tracing::warn!(error = %e, "Returned-count increment failed");
            }
        });
    }

    fn search_filter(&self, channel: &str) -> SearchFilter {
        match self.search_scope {
            SearchScope::All => SearchFilter::new(),
            SearchScope::PublicChannels => SearchFilter::new().with_public_only(true),
            SearchScope::SameChannel => SearchFilter::new().with_channel(channel),
        }
    }

    /// Stores a literal question/answer pair directly (the web-form path).
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn teach_literal(
        &self,
        question: &str,
        answer: &str,
        channel: &str,
        anchor_ts: &str,
    ) -> Result<AnswerRecord> {
        use crate::models::MessageRef;
        let record = AnswerRecord::new(
            MessageRef::literal(question, channel, anchor_ts, question),
            MessageRef::literal(answer, channel, anchor_ts, answer),
            current_timestamp(),
        );
        self.store.insert(&record)?;
        Ok(record)
    }

    /// Searches and ranks without formatting (the web-form path).
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub fn ask(&self, query: &str) -> Result<Vec<ScoredAnswer>> {
        let hits = self
            .store
            .search(query, &SearchFilter::new(), self.max_results)?;
        let ranked = self.ranking.rank(hits, current_timestamp());
        self.dispatch_bump(&ranked);
        Ok(ranked)
    }

    /// Deletes one record (the undo action).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn forget(&self, id: &AnswerId) -> Result<bool> {
        self.store.delete(id)
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn stored_count(&self) -> Result<u64> {
        self.store.count()
    }

    /// Clears the store (the CLI reset path).
    ///
    /// # Errors
    ///
    /// Returns an error if the clear fails.
    pub fn reset(&self) -> Result<()> {
        self.store.clear()
    }
}

/// Builds the degraded reply for a failed command.
///
/// Users of this bot are domain experts debugging it; the raw error text is
/// surfaced in a code block rather than hidden.
fn degraded_reply(error: &Error) -> Reply {
    let text = match error {
        Error::UnresolvableSpec(_) => {
            format!("I don't know about that one, sorry.\n```{error}```")
        },
        _ => format!("something went wrong on my end:\n```{error}```"),
    };
    Reply {
        text,
        attachments: Vec::new(),
    }
}
