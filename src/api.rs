//! HTTP endpoints.
//!
//! `POST /sms` is the gateway webhook; the GET routes expose results and
//! poll status for displays and operators.

use axum::{extract::State, Form, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

use crate::error::PollResult;
use crate::sms::{format_standings, handle_sms};
use crate::state::AppState;
use crate::twiml::TwiMl;
use crate::types::JerseyTally;

/// Form fields posted by the SMS gateway
#[derive(Debug, Deserialize)]
pub struct SmsForm {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From")]
    pub from: Option<String>,
    /// Gateway message id, used to correlate logs
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

/// Inbound SMS webhook.
///
/// POST /sms
pub async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SmsForm>,
) -> PollResult<TwiMl> {
    let msg_id = form
        .message_sid
        .unwrap_or_else(|| ulid::Ulid::new().to_string());
    let span = tracing::info_span!("sms", %msg_id);

    let reply = handle_sms(&state, form.from.as_deref(), &form.body)
        .instrument(span)
        .await?;

    Ok(TwiMl::message(&reply))
}

/// Final results of the most recently closed poll, as plain text.
///
/// GET /poll-results
pub async fn poll_results(State(state): State<Arc<AppState>>) -> PollResult<String> {
    let results = state.latest_closed_results().await?;
    Ok(format_standings(&results))
}

/// Snapshot of the poll for status displays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollStatus {
    pub is_open: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Open and inside its voting window
    pub accepting_votes: bool,
    /// Live top 5, empty while closed
    pub standings: Vec<JerseyTally>,
}

/// Current poll status as JSON.
///
/// GET /api/poll
pub async fn poll_status(State(state): State<Arc<AppState>>) -> PollResult<Json<PollStatus>> {
    let poll = state.poll_state().await?;
    let now = Utc::now();

    let accepting_votes = poll.voting_window_at(now, state.poll_window).is_ok();
    let standings = match (poll.is_open, poll.start_time) {
        (true, Some(start)) => state.current_results(start).await?,
        _ => Vec::new(),
    };

    Ok(Json(PollStatus {
        is_open: poll.is_open,
        start_time: poll.start_time,
        expires_at: poll.expires_at(state.poll_window),
        accepting_votes,
        standings,
    }))
}

/// GET /
pub async fn index() -> &'static str {
    "SMS poll webhook is running."
}
