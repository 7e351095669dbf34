use super::AppState;
use crate::error::{PollError, PollResult};
use crate::types::*;
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

/// Read the singleton poll row, falling back to a closed poll if it is missing
pub(super) async fn fetch_poll_state<'e, E>(executor: E) -> Result<PollState, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let poll = sqlx::query_as::<_, PollState>(
        "SELECT is_open, start_time FROM poll_state WHERE id = ?",
    )
    .bind(POLL_STATE_ID)
    .fetch_optional(executor)
    .await?;

    Ok(poll.unwrap_or_default())
}

impl AppState {
    /// Get the current poll state
    pub async fn poll_state(&self) -> PollResult<PollState> {
        Ok(fetch_poll_state(&self.db).await?)
    }

    /// Open a new poll starting now
    pub async fn open_poll(&self) -> PollResult<PollState> {
        self.open_poll_at(Utc::now()).await
    }

    /// Open a new poll starting at `now`.
    ///
    /// Leftover votes from an earlier window are discarded.
    pub async fn open_poll_at(&self, now: DateTime<Utc>) -> PollResult<PollState> {
        let mut tx = self.begin_write().await?;

        let current = fetch_poll_state(&mut *tx).await?;
        if current.is_open {
            return Err(PollError::PollAlreadyOpen);
        }

        sqlx::query("INSERT OR REPLACE INTO poll_state (id, is_open, start_time) VALUES (?, 1, ?)")
            .bind(POLL_STATE_ID)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let cleared = sqlx::query("DELETE FROM votes")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if cleared > 0 {
            tracing::warn!(cleared, "Discarded leftover votes while opening poll");
        }
        tracing::info!(start_time = %now, "Poll opened");

        Ok(PollState {
            is_open: true,
            start_time: Some(now),
        })
    }

    /// Close the open poll now
    pub async fn close_poll(&self) -> PollResult<ClosedPoll> {
        self.close_poll_at(Utc::now()).await
    }

    /// Close the open poll, archiving every current vote under `now`.
    ///
    /// Works on expired polls too; expiry alone never archives anything.
    pub async fn close_poll_at(&self, now: DateTime<Utc>) -> PollResult<ClosedPoll> {
        let mut tx = self.begin_write().await?;

        let current = fetch_poll_state(&mut *tx).await?;
        if !current.is_open {
            return Err(PollError::NoActivePoll);
        }

        let archived = sqlx::query(
            "INSERT INTO poll_history (closed_at, voter_id, jersey_number, points)
             SELECT ?, voter_id, jersey_number, points FROM votes ORDER BY id",
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("UPDATE poll_state SET is_open = 0 WHERE id = ?")
            .bind(POLL_STATE_ID)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM votes").execute(&mut *tx).await?;

        tx.commit().await?;

        tracing::info!(closed_at = %now, archived, "Poll closed");

        Ok(ClosedPoll {
            closed_at: now,
            archived,
        })
    }

    /// All archived votes, oldest close first
    pub async fn poll_history(&self) -> PollResult<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryEntry>(
            "SELECT closed_at, voter_id, jersey_number, points FROM poll_history ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PollError;
    use crate::state::{test_state, AppState};
    use crate::types::Ballot;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_open_poll() {
        let state = test_state().await;
        let now = Utc::now();

        let poll = state.open_poll_at(now).await.unwrap();
        assert!(poll.is_open);

        let stored = state.poll_state().await.unwrap();
        assert!(stored.is_open);
        assert_eq!(stored.start_time, Some(now));
    }

    #[tokio::test]
    async fn test_open_twice_leaves_poll_untouched() {
        let state = test_state().await;
        let start = Utc::now();
        state.open_poll_at(start).await.unwrap();
        state
            .record_votes("+15550001", start, &Ballot::from_ranked(&[23, 7]).unwrap())
            .await
            .unwrap();

        let result = state.open_poll_at(start + Duration::minutes(5)).await;
        assert!(matches!(result, Err(PollError::PollAlreadyOpen)));

        let stored = state.poll_state().await.unwrap();
        assert_eq!(stored.start_time, Some(start));
        assert_eq!(state.current_votes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_close_without_poll() {
        let state = test_state().await;

        let result = state.close_poll().await;
        assert!(matches!(result, Err(PollError::NoActivePoll)));
    }

    #[tokio::test]
    async fn test_close_twice() {
        let state = test_state().await;
        state.open_poll().await.unwrap();
        state.close_poll().await.unwrap();

        let result = state.close_poll().await;
        assert!(matches!(result, Err(PollError::NoActivePoll)));
    }

    #[tokio::test]
    async fn test_close_archives_all_votes_with_one_timestamp() {
        let state = test_state().await;
        let start = Utc::now();
        state.open_poll_at(start).await.unwrap();

        state
            .record_votes("+15550001", start, &Ballot::from_ranked(&[23, 7]).unwrap())
            .await
            .unwrap();
        state
            .record_votes("+15550002", start, &Ballot::from_ranked(&[7]).unwrap())
            .await
            .unwrap();

        let closed_at = start + Duration::hours(2);
        let closed = state.close_poll_at(closed_at).await.unwrap();
        assert_eq!(closed.archived, 3);
        assert_eq!(closed.closed_at, closed_at);

        let history = state.poll_history().await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|h| h.closed_at == closed_at));

        assert!(state.current_votes().await.unwrap().is_empty());

        // Start time survives the close
        let stored = state.poll_state().await.unwrap();
        assert!(!stored.is_open);
        assert_eq!(stored.start_time, Some(start));
    }

    #[tokio::test]
    async fn test_close_expired_poll_still_archives() {
        let state = test_state().await;
        let start = Utc::now() - Duration::hours(30);
        state.open_poll_at(start).await.unwrap();
        state
            .record_votes("+15550001", start, &Ballot::from_ranked(&[4]).unwrap())
            .await
            .unwrap();

        // Expired, but still marked open until closed
        assert!(state.poll_state().await.unwrap().is_open);

        let closed = state.close_poll().await.unwrap();
        assert_eq!(closed.archived, 1);
    }

    #[tokio::test]
    async fn test_reopen_starts_fresh() {
        let state = test_state().await;
        let first = Utc::now();
        state.open_poll_at(first).await.unwrap();
        state
            .record_votes("+15550001", first, &Ballot::from_ranked(&[10]).unwrap())
            .await
            .unwrap();
        state.close_poll_at(first + Duration::hours(1)).await.unwrap();

        let second = first + Duration::hours(2);
        state.open_poll_at(second).await.unwrap();

        assert!(state.current_votes().await.unwrap().is_empty());
        assert_eq!(state.poll_history().await.unwrap().len(), 1);
        assert_eq!(state.poll_state().await.unwrap().start_time, Some(second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("votes.db").display());
        let state = AppState::connect(&url, Duration::hours(24)).await.unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { state.open_poll().await })
            })
            .collect();

        let mut opened = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => opened += 1,
                Err(PollError::PollAlreadyOpen) => {}
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        assert_eq!(opened, 1);

        state.close_poll().await.unwrap();
        assert!(!state.poll_state().await.unwrap().is_open);
        state.close().await;
    }
}
