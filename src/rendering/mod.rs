//! Reply construction.
//!
//! Turns a ranked (or single, freshly-taught) answer set into the reply
//! payload: one attachment block per answer, preceded by a question block
//! only when the question differs from the previous entry's, colored by
//! rank. Boneless mode strips provenance metadata and adds an undo action
//! for the just-taught pair.

pub mod color;

pub use color::Rgb;

use crate::models::{MessageRef, RefKind, ScoredAnswer};
use crate::slack::ChatApi;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed summary when a query finds nothing.
pub const NO_RESULTS_TEXT: &str = "I couldn't find anything relevant, sorry.";

/// Callback id carried by the undo action of a boneless reply.
pub const UNDO_CALLBACK_ID: &str = "forget_answer";

/// A formatted reply: summary text plus attachment blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// Summary text; empty when attachments carry the content.
    pub text: String,
    /// Attachment blocks, questions interleaved with their answers.
    pub attachments: Vec<ReplyAttachment>,
}

/// One attachment block of a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyAttachment {
    /// Plain-text fallback for notifications.
    pub fallback: String,
    /// Display text.
    pub text: String,
    /// Left-border color as a `#RRGGBB` literal.
    pub color: String,
    /// Source message timestamp; omitted in boneless mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    /// Author/channel footer; omitted in boneless and debug modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    /// Author avatar shown next to the footer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_icon: Option<String>,
    /// Interactive callback id, present when actions are attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    /// Interactive actions (the boneless undo button).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AttachmentAction>,
}

/// An interactive attachment action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentAction {
    /// Action name.
    pub name: String,
    /// Button label.
    pub text: String,
    /// Action type (always `button`).
    #[serde(rename = "type")]
    pub action_type: String,
    /// Visual style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Opaque callback value (the record id).
    pub value: String,
}

impl AttachmentAction {
    /// The destructive undo button for a freshly taught pair.
    #[must_use]
    pub fn undo(record_id: &str) -> Self {
        Self {
            name: "forget".to_string(),
            text: "undo".to_string(),
            action_type: "button".to_string(),
            style: Some("danger".to_string()),
            value: record_id.to_string(),
        }
    }
}

/// Formatting options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Strip provenance metadata and add the undo action (used right after
    /// teaching a new pair).
    pub boneless: bool,
    /// Annotate each answer with its raw relevance score and return count
    /// instead of the author footer.
    pub debug: bool,
}

/// Author/channel metadata resolved for one answer.
struct AnswerMeta {
    footer: String,
    footer_icon: Option<String>,
}

/// Builds reply payloads from ranked answer sets.
pub struct ResponseFormatter {
    /// Chat API for author/channel footer lookups.
    chat: Arc<dyn ChatApi>,
}

impl ResponseFormatter {
    /// Creates a formatter over the given chat API.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatApi>) -> Self {
        Self { chat }
    }

    /// Formats a ranked answer set into a reply.
    ///
    /// Attachment order is question/answer interleaved in rank order, with
    /// consecutive answers sharing one question collapsed under a single
    /// question header. Footer metadata lookups run concurrently across the
    /// set; an answer whose lookup fails renders without a footer rather
    /// than failing the whole reply.
    ///
    /// # Errors
    ///
    /// Returns an error if a metadata lookup task cannot be joined.
    pub async fn format(&self, ranked: &[ScoredAnswer], options: FormatOptions) -> Result<Reply> {
        if ranked.is_empty() {
            return Ok(Reply {
                text: NO_RESULTS_TEXT.to_string(),
                attachments: Vec::new(),
            });
        }

        let metas = self.resolve_metas(ranked, options).await?;

        let max_score = ranked
            .iter()
            .map(|s| s.sort_key)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut attachments = Vec::new();
        let mut previous_question: Option<&MessageRef> = None;

        for (scored, meta) in ranked.iter().zip(metas) {
            let quotient = score_quotient(max_score, scored.sort_key, options.boneless);

            let new_question = previous_question
                .is_none_or(|prev| !prev.same_target(&scored.record.question));
            if new_question {
                attachments.push(question_attachment(&scored.record.question, quotient, options));
            }
            previous_question = Some(&scored.record.question);

            attachments.push(answer_attachment(scored, quotient, options, meta));
        }

        Ok(Reply {
            text: String::new(),
            attachments,
        })
    }

    /// Resolves author/channel footers for each answer, concurrently.
    ///
    /// Boneless and debug modes skip the lookups entirely. A failed lookup
    /// yields `None` for that answer: literal pairs are anchored at their
    /// teaching mention, which may no longer be fetchable.
    async fn resolve_metas(
        &self,
        ranked: &[ScoredAnswer],
        options: FormatOptions,
    ) -> Result<Vec<Option<AnswerMeta>>> {
        if options.boneless || options.debug {
            return Ok(ranked.iter().map(|_| None).collect());
        }

        let handles: Vec<_> = ranked
            .iter()
            .map(|scored| {
                let chat = Arc::clone(&self.chat);
                let answer = scored.record.answer.clone();
                tokio::spawn(async move { resolve_meta(chat, answer).await })
            })
            .collect();

        let mut metas = Vec::with_capacity(handles.len());
        for handle in handles {
            let meta = handle.await.map_err(|e| Error::OperationFailed {
                operation: "resolve_answer_meta".to_string(),
                cause: e.to_string(),
            })?;
            match meta {
                Ok(meta) => metas.push(Some(meta)),
                Err(error) => {
                    tracing::debug!(%error, "Answer metadata lookup failed, omitting footer");
                    metas.push(None);
                },
            }
        }
        Ok(metas)
    }
}

/// Fetches one answer's footer metadata.
async fn resolve_meta(chat: Arc<dyn ChatApi>, answer: MessageRef) -> Result<AnswerMeta> {
    let message = chat.fetch_message(&answer.channel, &answer.timestamp).await?;

    let (channel_name, permalink) = tokio::try_join!(
        chat.channel_name(&answer.channel),
        chat.permalink(&answer.channel, &answer.timestamp)
    )?;

    let (author, footer_icon) = match message.user {
        Some(ref user) => {
            let info = chat.user_info(user).await?;
            (info.display_name, info.avatar_url)
        },
        None => ("someone".to_string(), None),
    };

    Ok(AnswerMeta {
        footer: format!("<{permalink}|{author} in #{channel_name}>"),
        footer_icon,
    })
}

/// `sqrt((max − key) / max)`, 0 for the top rank, boneless mode, or an
/// all-zero score set.
fn score_quotient(max_score: f64, sort_key: f64, boneless: bool) -> f64 {
    if boneless || max_score <= 0.0 {
        return 0.0;
    }
    ((max_score - sort_key) / max_score).max(0.0).sqrt()
}

fn question_attachment(
    question: &MessageRef,
    quotient: f64,
    options: FormatOptions,
) -> ReplyAttachment {
    let show_ts = !options.boneless && question.kind == RefKind::Message;
    ReplyAttachment {
        fallback: question.text.clone(),
        text: question.text.clone(),
        color: color::QUESTION_BASE.mix(color::WHITE, quotient).to_hex(),
        ts: show_ts.then(|| question.timestamp.clone()),
        footer: None,
        footer_icon: None,
        callback_id: None,
        actions: Vec::new(),
    }
}

fn answer_attachment(
    scored: &ScoredAnswer,
    quotient: f64,
    options: FormatOptions,
    meta: Option<AnswerMeta>,
) -> ReplyAttachment {
    let record = &scored.record;

    let (footer, footer_icon) = if options.debug {
        (
            Some(format!(
                "score: {:.4} · returned: {}",
                scored.relevance, record.returned_count
            )),
            None,
        )
    } else {
        match meta {
            Some(meta) => (Some(meta.footer), meta.footer_icon),
            None => (None, None),
        }
    };

    let (callback_id, actions) = if options.boneless {
        (
            Some(UNDO_CALLBACK_ID.to_string()),
            vec![AttachmentAction::undo(record.id.as_str())],
        )
    } else {
        (None, Vec::new())
    };

    ReplyAttachment {
        fallback: record.answer.text.clone(),
        text: record.answer.text.clone(),
        color: color::ANSWER_BASE.mix(color::WHITE, quotient).to_hex(),
        ts: (!options.boneless).then(|| record.answer.timestamp.clone()),
        footer,
        footer_icon,
        callback_id,
        actions,
    }
}
