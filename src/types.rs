use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PollError;

/// Opaque ID types for readability
pub type VoterId = String;
pub type JerseyNumber = i64;
pub type Points = i64;

/// Row id of the singleton poll state record
pub const POLL_STATE_ID: i64 = 1;

/// Points awarded by ballot position: 1st, 2nd, 3rd choice
pub const RANK_POINTS: [Points; 3] = [3, 2, 1];

/// How many jerseys the live standings show
pub const CURRENT_RESULTS_LIMIT: i64 = 5;

/// How many jerseys the final results of a closed poll show
pub const CLOSED_RESULTS_LIMIT: i64 = 3;

/// Default voting window after a poll opens
pub const DEFAULT_POLL_WINDOW_HOURS: i64 = 24;

/// The singleton poll record.
///
/// `start_time` is kept after close so the last window can still be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollState {
    pub is_open: bool,
    pub start_time: Option<DateTime<Utc>>,
}

impl PollState {
    /// When an open poll stops accepting votes.
    ///
    /// None when closed, or when the window runs past the representable range.
    pub fn expires_at(&self, window: Duration) -> Option<DateTime<Utc>> {
        if !self.is_open {
            return None;
        }
        self.start_time
            .and_then(|start| start.checked_add_signed(window))
    }

    /// Return the start time of the poll if a vote cast at `now` may be recorded.
    ///
    /// An expired poll stays open until someone closes it, but takes no votes.
    pub fn voting_window_at(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<DateTime<Utc>, PollError> {
        match (self.is_open, self.start_time) {
            // A window too long to represent never expires
            (true, Some(start)) => match start.checked_add_signed(window) {
                Some(end) if now >= end => Err(PollError::PollExpired),
                _ => Ok(start),
            },
            _ => Err(PollError::PollClosed),
        }
    }
}

/// Outcome of closing a poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPoll {
    pub closed_at: DateTime<Utc>,
    /// Number of vote rows copied into the history archive
    pub archived: u64,
}

/// A single weighted pick stored in the current poll's ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoteEntry {
    pub voter_id: VoterId,
    pub poll_start_time: DateTime<Utc>,
    pub jersey_number: JerseyNumber,
    pub points: Points,
}

/// Archived vote, written once when a poll closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub closed_at: DateTime<Utc>,
    pub voter_id: VoterId,
    pub jersey_number: JerseyNumber,
    pub points: Points,
}

/// Summed points for one jersey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JerseyTally {
    pub jersey_number: JerseyNumber,
    pub points: Points,
}

/// One ranked choice on a ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub jersey_number: JerseyNumber,
    pub points: Points,
}

/// A voter's ordered choices, at most one per rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    picks: Vec<Pick>,
}

impl Ballot {
    /// Build a ballot from jerseys in priority order.
    pub fn from_ranked(jerseys: &[JerseyNumber]) -> Result<Self, PollError> {
        if jerseys.is_empty() || jerseys.len() > RANK_POINTS.len() {
            return Err(PollError::InvalidVoteFormat);
        }

        for (i, jersey) in jerseys.iter().enumerate() {
            if jerseys[..i].contains(jersey) {
                return Err(PollError::DuplicateJersey(*jersey));
            }
        }

        let picks = jerseys
            .iter()
            .zip(RANK_POINTS)
            .map(|(&jersey_number, points)| Pick {
                jersey_number,
                points,
            })
            .collect();

        Ok(Self { picks })
    }

    pub fn picks(&self) -> &[Pick] {
        &self.picks
    }
}
