//! HTTP boundary: the Slack event endpoint plus a minimal web form.
//!
//! The event handler acknowledges immediately and does the reply work on a
//! spawned task; Slack retries events that are not acked within its deadline,
//! and a retried mention would produce duplicate replies.

use crate::models::{EventEnvelope, InnerEvent};
use crate::services::Engine;
use crate::{Error, Result, current_timestamp};
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect};
use axum::routing::{get, post};
use axum::Router;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state handed to every handler.
pub struct AppState {
    /// The command engine.
    pub engine: Arc<Engine>,
    /// Token compared against inbound event envelopes.
    pub verification_token: SecretString,
}

/// Builds the application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/", get(index))
        .route("/answers", post(post_answer))
        .route("/ask", get(ask))
        .with_state(state)
}

/// Binds and serves until the listener fails.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server exits
/// abnormally.
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{addr}: {e}"),
        })?;

    tracing::info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}

/// Response to a `url_verification` handshake.
#[derive(Debug, Serialize)]
struct ChallengeResponse {
    challenge: String,
}

/// Handles `POST /slack/events`.
///
/// Returns 200 for everything that parses; Slack disables endpoints that
/// error repeatedly. Envelope token mismatches are logged and dropped.
async fn slack_events(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<EventEnvelope>,
) -> axum::response::Response {
    match envelope {
        EventEnvelope::UrlVerification { challenge, .. } => {
            Json(ChallengeResponse { challenge }).into_response()
        },
        EventEnvelope::EventCallback(callback) => {
            if callback.token != state.verification_token.expose_secret() {
                metrics::counter!("lorebot_events_rejected_total").increment(1);
                tracing::warn!("Event with bad verification token dropped");
                return StatusCode::OK.into_response();
            }

            if let InnerEvent::AppMention(mention) = callback.event {
                metrics::counter!("lorebot_mentions_total").increment(1);
                let engine = Arc::clone(&state.engine);
                tokio::spawn(async move {
                    if let Err(e) = engine.handle_mention(&mention).await {
                        tracing::error!(error = %e, channel = %mention.channel, "Mention handling failed");
                    }
                });
            }

            StatusCode::OK.into_response()
        },
    }
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>lorebot</title></head>
<body>
<h1>lorebot</h1>
<form action="/answers" method="post">
  <p><input name="question" placeholder="question"></p>
  <p><input name="answer" placeholder="answer"></p>
  <p><button type="submit">teach</button></p>
</form>
<form action="/ask" method="get">
  <p><input name="q" placeholder="ask something"></p>
  <p><button type="submit">ask</button></p>
</form>
</body>
</html>
"#;

/// Handles `GET /`.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Form body for `POST /answers`.
#[derive(Debug, Deserialize)]
struct AnswerForm {
    question: String,
    answer: String,
}

/// Handles `POST /answers`: stores a literal pair from the form.
async fn post_answer(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AnswerForm>,
) -> axum::response::Response {
    if form.question.trim().is_empty() || form.answer.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "question and answer are required").into_response();
    }

    // Anchor at now so form-taught pairs rank on recency like chat-taught ones
    let anchor = format!("{}.000000", current_timestamp());
    match state
        .engine
        .teach_literal(form.question.trim(), form.answer.trim(), "web", &anchor)
    {
        Ok(record) => {
            tracing::info!(id = %record.id, "Stored answer from web form");
            Redirect::to("/").into_response()
        },
        Err(e) => {
            tracing::error!(error = %e, "Web form insert failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        },
    }
}

/// Query string for `GET /ask`.
#[derive(Debug, Deserialize)]
struct AskQuery {
    q: String,
}

/// One ranked hit in the `GET /ask` response.
#[derive(Debug, Serialize)]
struct AskHit {
    question: String,
    answer: String,
    relevance: f64,
    sort_key: f64,
}

/// Handles `GET /ask`: ranked results as JSON.
async fn ask(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AskQuery>,
) -> axum::response::Response {
    match state.engine.ask(&query.q) {
        Ok(ranked) => {
            let hits: Vec<AskHit> = ranked
                .into_iter()
                .map(|scored| AskHit {
                    question: scored.record.question.text.clone(),
                    answer: scored.record.answer.text.clone(),
                    relevance: scored.relevance,
                    sort_key: scored.sort_key,
                })
                .collect();
            Json(hits).into_response()
        },
        Err(e) => {
            tracing::error!(error = %e, "Search failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        },
    }
}
