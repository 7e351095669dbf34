//! SMS command dispatch
//!
//! Turns a parsed command from one sender into poll state operations and
//! renders the reply text sent back over SMS.

use crate::command::Command;
use crate::error::{PollError, PollResult};
use crate::state::AppState;
use crate::types::{Ballot, JerseyTally};
use sha2::{Digest, Sha256};

/// Handle one inbound message and return the reply text
pub async fn handle_sms(state: &AppState, from: Option<&str>, body: &str) -> PollResult<String> {
    let voter_id = from
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(PollError::MissingSender)?;
    let voter = voter_tag(voter_id);

    let command = Command::parse(body).inspect_err(|e| {
        tracing::debug!(%voter, "Rejected message: {}", e);
    })?;

    match command {
        Command::Open => {
            state.open_poll().await?;
            tracing::info!(%voter, "Poll opened by SMS");
            Ok(
                "Poll is open! Text up to three jersey numbers, best first, e.g. \"23 7 11\"."
                    .to_string(),
            )
        }

        Command::Close => {
            let closed = state.close_poll().await?;
            tracing::info!(%voter, archived = closed.archived, "Poll closed by SMS");

            if closed.archived == 0 {
                return Ok("Poll closed. No votes were cast.".to_string());
            }

            let results = state.latest_closed_results().await?;
            Ok(format!("Poll closed. Final results:\n{}", format_standings(&results)))
        }

        Command::Results => handle_results(state).await,

        Command::Vote(ballot) => {
            state.cast_ballot(voter_id, &ballot).await.inspect_err(|e| {
                tracing::debug!(%voter, "Vote refused: {}", e);
            })?;
            tracing::info!(%voter, picks = ballot.picks().len(), "Vote recorded");
            Ok(format!("Vote recorded: {}. Thanks!", format_ballot(&ballot)))
        }
    }
}

/// Live standings while a poll is open, the last final results otherwise
async fn handle_results(state: &AppState) -> PollResult<String> {
    let poll = state.poll_state().await?;

    if let (true, Some(start)) = (poll.is_open, poll.start_time) {
        let results = state.current_results(start).await?;
        if results.is_empty() {
            return Ok("No votes yet.".to_string());
        }
        return Ok(format!("Current standings:\n{}", format_standings(&results)));
    }

    let results = state.latest_closed_results().await?;
    Ok(format!("Latest poll results:\n{}", format_standings(&results)))
}

/// Ranked list, one jersey per line: "1. #7 - 5 pts"
pub fn format_standings(results: &[JerseyTally]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. #{} - {}", i + 1, t.jersey_number, points_label(t.points)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_ballot(ballot: &Ballot) -> String {
    ballot
        .picks()
        .iter()
        .map(|p| format!("#{} ({})", p.jersey_number, points_label(p.points)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn points_label(points: i64) -> String {
    if points == 1 {
        "1 pt".to_string()
    } else {
        format!("{} pts", points)
    }
}

/// Short stable tag for a voter, so logs never carry phone numbers
pub fn voter_tag(voter_id: &str) -> String {
    let digest = Sha256::digest(voter_id.as_bytes());
    hex::encode(&digest[..5])
}
