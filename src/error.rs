use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::types::JerseyNumber;

/// Result type for poll operations
pub type PollResult<T> = Result<T, PollError>;

/// Everything that can go wrong while handling a poll command
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Missing sender. Votes need a phone number to count.")]
    MissingSender,

    #[error("A poll is already open. Send \"close\" to end it first.")]
    PollAlreadyOpen,

    #[error("There is no active poll to close.")]
    NoActivePoll,

    #[error("Voting for this poll has ended.")]
    PollExpired,

    #[error("Voting is closed right now.")]
    PollClosed,

    #[error("Invalid vote. Send up to three jersey numbers, best first, e.g. \"23 7 11\".")]
    InvalidVoteFormat,

    #[error("Jersey #{0} is listed more than once. Pick each jersey only once.")]
    DuplicateJersey(JerseyNumber),

    #[error("No closed polls yet.")]
    NoClosedPolls,

    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl PollError {
    pub fn status(&self) -> StatusCode {
        match self {
            PollError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the logs
        if let PollError::Storage(ref e) = self {
            tracing::error!("Storage error while handling request: {}", e);
            return (status, "Internal server error").into_response();
        }

        (status, self.to_string()).into_response()
    }
}
