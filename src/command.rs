//! Inbound SMS command parsing
//!
//! A message body is either one of the keywords `open`, `close`, `results`
//! (case-insensitive, surrounding whitespace ignored) or a vote: up to three
//! jersey numbers in priority order, separated by spaces and/or commas.

use crate::error::PollError;
use crate::types::{Ballot, JerseyNumber};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    Results,
    Vote(Ballot),
}

impl Command {
    pub fn parse(body: &str) -> Result<Self, PollError> {
        let normalized = body.trim().to_lowercase();

        match normalized.as_str() {
            "open" => Ok(Command::Open),
            "close" => Ok(Command::Close),
            "results" => Ok(Command::Results),
            _ => Ballot::from_ranked(&vote_tokens(&normalized)).map(Command::Vote),
        }
    }
}

/// Extract the numeric tokens of a vote message, in order.
///
/// Words and punctuation are skipped so "MVP: #23, 7" yields `[23, 7]`.
fn vote_tokens(body: &str) -> Vec<JerseyNumber> {
    body.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let token = token.strip_prefix('#').unwrap_or(token);
            token.parse::<JerseyNumber>().ok()
        })
        .collect()
}
