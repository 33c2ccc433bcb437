//! Reference resolution for teach-command specs.
//!
//! A spec is user-supplied text identifying a question or answer. Three
//! forms are recognized, tried in order:
//!
//! 1. Quoted literal (straight or curly double quotes) — a text ref
//!    anchored to the current message or the thread root, per configuration
//! 2. Message permalink — the referenced message is fetched from the API
//! 3. The literal token `this` (case-sensitive) — the thread root message
//!
//! Anything else is an [`Error::UnresolvableSpec`].

use crate::config::QuoteAnchor;
use crate::models::MessageRef;
use crate::slack::ChatApi;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Straight or curly double-quoted literal, inner text captured verbatim.
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r#"(?s)^(?:"(.*)"|\u{201C}(.*)\u{201D})$"#).unwrap()
});

/// Permalink shape: optional angle brackets, workspace subdomain, a `C` or
/// `G` channel id, and exactly sixteen timestamp digits after `p`. A
/// trailing query string is tolerated and stripped.
static PERMALINK_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^<?https://[A-Za-z0-9-]+\.slack\.com/archives/([CG][A-Z0-9]+)/p(\d{16})(?:\?\S*?)?>?$")
        .unwrap()
});

/// Context a spec is resolved against.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// Channel of the mentioning message.
    pub channel: String,
    /// Timestamp of the mentioning message.
    pub current_ts: String,
    /// Timestamp of the thread root (the message itself when top-level).
    pub parent_ts: String,
}

/// Resolves textual specs into concrete [`MessageRef`]s.
pub struct ReferenceResolver {
    /// Chat API for permalink and `this` lookups.
    chat: Arc<dyn ChatApi>,
    /// Which message a quoted literal is anchored to.
    quote_anchor: QuoteAnchor,
}

impl ReferenceResolver {
    /// Creates a resolver over the given chat API.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatApi>, quote_anchor: QuoteAnchor) -> Self {
        Self { chat, quote_anchor }
    }

    /// Resolves one spec against the given context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvableSpec`] if none of the three forms
    /// match, or [`Error::OperationFailed`] if a required API fetch fails.
    pub async fn resolve(&self, spec: &str, ctx: &ResolveContext) -> Result<MessageRef> {
        let spec = spec.trim();

        if let Some(caps) = QUOTED_RE.captures(spec) {
            let inner = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let anchor_ts = match self.quote_anchor {
                QuoteAnchor::Current => &ctx.current_ts,
                QuoteAnchor::Parent => &ctx.parent_ts,
            };
            return Ok(MessageRef::literal(inner, &ctx.channel, anchor_ts, spec));
        }

        if let Some(caps) = PERMALINK_RE.captures(spec) {
            let channel = &caps[1];
            let ts = reassemble_timestamp(&caps[2]);
            let fetched = self.chat.fetch_message(channel, &ts).await?;
            return Ok(MessageRef::message(fetched.text, channel, ts, spec));
        }

        if spec == "this" {
            let fetched = self
                .chat
                .fetch_message(&ctx.channel, &ctx.parent_ts)
                .await?;
            return Ok(MessageRef::message(
                fetched.text,
                &ctx.channel,
                &ctx.parent_ts,
                spec,
            ));
        }

        Err(Error::UnresolvableSpec(format!(
            "'{spec}' is not a quoted string, a message permalink, or 'this'"
        )))
    }

    /// Resolves a teach command's answer and question specs concurrently.
    ///
    /// Both resolutions must succeed before the caller persists anything;
    /// partial resolution is never committed.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub async fn resolve_pair(
        &self,
        answer_spec: &str,
        question_spec: &str,
        ctx: &ResolveContext,
    ) -> Result<(MessageRef, MessageRef)> {
        tokio::try_join!(
            self.resolve(answer_spec, ctx),
            self.resolve(question_spec, ctx)
        )
    }
}

/// Splits sixteen permalink digits into a `<10>.<6>` message timestamp.
fn reassemble_timestamp(digits: &str) -> String {
    format!("{}.{}", &digits[..10], &digits[10..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::{FetchedMessage, UserInfo};
    use crate::rendering::ReplyAttachment;
    use std::sync::Mutex;

    /// Chat API stub that records fetches and serves canned message text.
    struct StubChat {
        fetched: Mutex<Vec<(String, String)>>,
    }

    impl StubChat {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetched: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ChatApi for StubChat {
        async fn fetch_message(&self, channel: &str, ts: &str) -> Result<FetchedMessage> {
            self.fetched
                .lock()
                .unwrap()
                .push((channel.to_string(), ts.to_string()));
            Ok(FetchedMessage {
                text: format!("text of {ts}"),
                user: Some("U1".to_string()),
                ts: ts.to_string(),
                channel: channel.to_string(),
            })
        }

        async fn post_message(
            &self,
            _channel: &str,
            _thread_ts: Option<&str>,
            _text: &str,
            _attachments: &[ReplyAttachment],
        ) -> Result<String> {
            Ok("0.0".to_string())
        }

        async fn delete_message(&self, _channel: &str, _ts: &str) -> Result<()> {
            Ok(())
        }

        async fn user_info(&self, _user: &str) -> Result<UserInfo> {
            Ok(UserInfo {
                display_name: "stub".to_string(),
                avatar_url: None,
            })
        }

        async fn channel_name(&self, _channel: &str) -> Result<String> {
            Ok("general".to_string())
        }

        async fn permalink(&self, channel: &str, ts: &str) -> Result<String> {
            Ok(format!("https://x.slack.com/archives/{channel}/p{ts}"))
        }
    }

    fn ctx() -> ResolveContext {
        ResolveContext {
            channel: "C42".to_string(),
            current_ts: "1700000001.000200".to_string(),
            parent_ts: "1700000000.000100".to_string(),
        }
    }

    fn resolver(anchor: QuoteAnchor) -> (ReferenceResolver, Arc<StubChat>) {
        let chat = StubChat::new();
        (ReferenceResolver::new(chat.clone(), anchor), chat)
    }

    #[tokio::test]
    async fn test_quoted_literal_straight() {
        let (resolver, chat) = resolver(QuoteAnchor::Current);
        let r = resolver.resolve("\"say hi, ok?\"", &ctx()).await.unwrap();
        assert_eq!(r.kind, crate::models::RefKind::Text);
        assert_eq!(r.text, "say hi, ok?");
        assert_eq!(r.timestamp, "1700000001.000200");
        assert!(chat.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quoted_literal_curly() {
        let (resolver, _) = resolver(QuoteAnchor::Current);
        let r = resolver
            .resolve("\u{201C}tricky \"inner\" quotes\u{201D}", &ctx())
            .await
            .unwrap();
        assert_eq!(r.text, "tricky \"inner\" quotes");
    }

    #[tokio::test]
    async fn test_quote_anchor_parent_variant() {
        let (resolver, _) = resolver(QuoteAnchor::Parent);
        let r = resolver.resolve("\"x\"", &ctx()).await.unwrap();
        assert_eq!(r.timestamp, "1700000000.000100");
    }

    #[tokio::test]
    async fn test_permalink_resolves_and_splits_timestamp() {
        let (resolver, chat) = resolver(QuoteAnchor::Current);
        let r = resolver
            .resolve(
                "https://acme.slack.com/archives/C0AB12CD3/p1700000123000456",
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(r.kind, crate::models::RefKind::Message);
        assert_eq!(r.channel, "C0AB12CD3");
        assert_eq!(r.timestamp, "1700000123.000456");
        assert_eq!(
            chat.fetched.lock().unwrap()[0],
            ("C0AB12CD3".to_string(), "1700000123.000456".to_string())
        );
    }

    #[tokio::test]
    async fn test_permalink_angle_brackets_and_query_string() {
        let (resolver, _) = resolver(QuoteAnchor::Current);
        let r = resolver
            .resolve(
                "<https://acme.slack.com/archives/G9ZYX87W6/p1700000123000456?thread_ts=1.2&cid=G9>",
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(r.channel, "G9ZYX87W6");
        assert_eq!(r.timestamp, "1700000123.000456");
    }

    #[tokio::test]
    async fn test_permalink_wrong_digit_count_unresolvable() {
        let (resolver, _) = resolver(QuoteAnchor::Current);
        let err = resolver
            .resolve(
                "https://acme.slack.com/archives/C0AB12CD3/p17000001230004",
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableSpec(_)));
    }

    #[tokio::test]
    async fn test_permalink_missing_scheme_unresolvable() {
        let (resolver, _) = resolver(QuoteAnchor::Current);
        let err = resolver
            .resolve("acme.slack.com/archives/C0AB12CD3/p1700000123000456", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableSpec(_)));
    }

    #[tokio::test]
    async fn test_permalink_bad_channel_prefix_unresolvable() {
        let (resolver, _) = resolver(QuoteAnchor::Current);
        let err = resolver
            .resolve(
                "https://acme.slack.com/archives/D0AB12CD3/p1700000123000456",
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableSpec(_)));
    }

    #[tokio::test]
    async fn test_this_fetches_thread_root() {
        let (resolver, chat) = resolver(QuoteAnchor::Current);
        let r = resolver.resolve("this", &ctx()).await.unwrap();
        assert_eq!(r.kind, crate::models::RefKind::Message);
        assert_eq!(r.timestamp, "1700000000.000100");
        assert_eq!(r.text, "text of 1700000000.000100");
        assert_eq!(chat.fetched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_this_is_case_sensitive() {
        let (resolver, _) = resolver(QuoteAnchor::Current);
        let err = resolver.resolve("This", &ctx()).await.unwrap_err();
        assert!(matches!(err, Error::UnresolvableSpec(_)));
    }

    #[tokio::test]
    async fn test_resolve_pair_both_or_neither() {
        let (resolver, _) = resolver(QuoteAnchor::Current);
        let err = resolver
            .resolve_pair("\"fine\"", "not a real spec", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableSpec(_)));

        let (answer, question) = resolver
            .resolve_pair("\"say hi\"", "this", &ctx())
            .await
            .unwrap();
        assert_eq!(answer.text, "say hi");
        assert_eq!(question.timestamp, "1700000000.000100");
    }
}
