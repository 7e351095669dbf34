use super::poll::fetch_poll_state;
use super::AppState;
use crate::error::{PollError, PollResult};
use crate::types::*;
use chrono::{DateTime, Utc};

impl AppState {
    /// Cast a ballot into the currently open poll
    pub async fn cast_ballot(&self, voter_id: &str, ballot: &Ballot) -> PollResult<DateTime<Utc>> {
        self.cast_ballot_at(voter_id, ballot, Utc::now()).await
    }

    /// Cast a ballot as if received at `now`, returning the poll's start time
    pub async fn cast_ballot_at(
        &self,
        voter_id: &str,
        ballot: &Ballot,
        now: DateTime<Utc>,
    ) -> PollResult<DateTime<Utc>> {
        let poll = self.poll_state().await?;
        let poll_start_time = poll.voting_window_at(now, self.poll_window)?;

        self.record_votes(voter_id, poll_start_time, ballot).await?;
        Ok(poll_start_time)
    }

    /// Replace a voter's picks for one poll.
    ///
    /// Delete and insert share one transaction, and the poll is re-checked
    /// inside it so a concurrent close cannot strand votes in the ledger.
    pub async fn record_votes(
        &self,
        voter_id: &str,
        poll_start_time: DateTime<Utc>,
        ballot: &Ballot,
    ) -> PollResult<()> {
        let mut tx = self.begin_write().await?;

        let poll = fetch_poll_state(&mut *tx).await?;
        if !poll.is_open || poll.start_time != Some(poll_start_time) {
            return Err(PollError::PollClosed);
        }

        let replaced = sqlx::query("DELETE FROM votes WHERE voter_id = ? AND poll_start_time = ?")
            .bind(voter_id)
            .bind(poll_start_time)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for pick in ballot.picks() {
            sqlx::query(
                "INSERT INTO votes (voter_id, poll_start_time, jersey_number, points)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(voter_id)
            .bind(poll_start_time)
            .bind(pick.jersey_number)
            .bind(pick.points)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            picks = ballot.picks().len(),
            replaced,
            "Recorded ballot"
        );
        Ok(())
    }

    /// Every vote row in the ledger
    pub async fn current_votes(&self) -> PollResult<Vec<VoteEntry>> {
        let rows = sqlx::query_as::<_, VoteEntry>(
            "SELECT voter_id, poll_start_time, jersey_number, points FROM votes ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
