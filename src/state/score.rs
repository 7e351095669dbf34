use super::AppState;
use crate::error::{PollError, PollResult};
use crate::types::*;
use chrono::{DateTime, Utc};

impl AppState {
    /// Live standings of the poll that started at `poll_start_time`, top 5.
    ///
    /// Equal totals rank by jersey number ascending.
    pub async fn current_results(
        &self,
        poll_start_time: DateTime<Utc>,
    ) -> PollResult<Vec<JerseyTally>> {
        let rows = sqlx::query_as::<_, JerseyTally>(
            "SELECT jersey_number, SUM(points) AS points
             FROM votes
             WHERE poll_start_time = ?
             GROUP BY jersey_number
             ORDER BY SUM(points) DESC, jersey_number ASC
             LIMIT ?",
        )
        .bind(poll_start_time)
        .bind(CURRENT_RESULTS_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Final standings of the most recently closed poll, top 3
    pub async fn latest_closed_results(&self) -> PollResult<Vec<JerseyTally>> {
        let rows = sqlx::query_as::<_, JerseyTally>(
            "SELECT jersey_number, SUM(points) AS points
             FROM poll_history
             WHERE closed_at = (SELECT MAX(closed_at) FROM poll_history)
             GROUP BY jersey_number
             ORDER BY SUM(points) DESC, jersey_number ASC
             LIMIT ?",
        )
        .bind(CLOSED_RESULTS_LIMIT)
        .fetch_all(&self.db)
        .await?;

        if rows.is_empty() {
            return Err(PollError::NoClosedPolls);
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PollError;
    use crate::state::test_state;
    use crate::types::{Ballot, JerseyTally};
    use chrono::{Duration, Utc};

    fn tally(jersey_number: i64, points: i64) -> JerseyTally {
        JerseyTally {
            jersey_number,
            points,
        }
    }

    #[tokio::test]
    async fn test_current_results_empty() {
        let state = test_state().await;
        let start = state.open_poll().await.unwrap().start_time.unwrap();

        assert!(state.current_results(start).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_current_results_sums_points() {
        let state = test_state().await;
        let start = state.open_poll().await.unwrap().start_time.unwrap();

        state
            .record_votes("A", start, &Ballot::from_ranked(&[23, 7]).unwrap())
            .await
            .unwrap();
        state
            .record_votes("B", start, &Ballot::from_ranked(&[7]).unwrap())
            .await
            .unwrap();

        let results = state.current_results(start).await.unwrap();
        assert_eq!(results, vec![tally(7, 5), tally(23, 3)]);
    }

    #[tokio::test]
    async fn test_current_results_top_five_with_ties_by_jersey() {
        let state = test_state().await;
        let start = state.open_poll().await.unwrap().start_time.unwrap();

        // Six different jerseys, each first choice of one voter
        for (i, jersey) in [40, 10, 60, 20, 50, 30].iter().enumerate() {
            state
                .record_votes(&format!("voter{}", i), start, &Ballot::from_ranked(&[*jersey]).unwrap())
                .await
                .unwrap();
        }
        // One extra point for jersey 60
        state
            .record_votes("voter9", start, &Ballot::from_ranked(&[99, 98, 60]).unwrap())
            .await
            .unwrap();

        let results = state.current_results(start).await.unwrap();
        assert_eq!(
            results,
            vec![
                tally(60, 4),
                tally(10, 3),
                tally(20, 3),
                tally(30, 3),
                tally(40, 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_closed_polls() {
        let state = test_state().await;

        let result = state.latest_closed_results().await;
        assert!(matches!(result, Err(PollError::NoClosedPolls)));
    }

    #[tokio::test]
    async fn test_latest_closed_results_uses_newest_close() {
        let state = test_state().await;
        let first = Utc::now() - Duration::hours(10);

        state.open_poll_at(first).await.unwrap();
        state
            .record_votes("A", first, &Ballot::from_ranked(&[1, 2, 3]).unwrap())
            .await
            .unwrap();
        state.close_poll_at(first + Duration::hours(1)).await.unwrap();

        let second = first + Duration::hours(2);
        state.open_poll_at(second).await.unwrap();
        for (voter, jerseys) in [
            ("A", vec![8, 9, 10]),
            ("B", vec![9, 11]),
            ("C", vec![12, 8]),
        ] {
            state
                .record_votes(voter, second, &Ballot::from_ranked(&jerseys).unwrap())
                .await
                .unwrap();
        }
        state.close_poll_at(second + Duration::hours(1)).await.unwrap();

        // 9: 2+3, 8: 3+1, 12: 3, 11: 2, 10: 1
        let results = state.latest_closed_results().await.unwrap();
        assert_eq!(results, vec![tally(9, 5), tally(8, 4), tally(12, 3)]);
    }

    #[tokio::test]
    async fn test_closed_results_survive_new_poll() {
        let state = test_state().await;
        let start = state.open_poll().await.unwrap().start_time.unwrap();
        state
            .record_votes("A", start, &Ballot::from_ranked(&[5]).unwrap())
            .await
            .unwrap();
        state.close_poll().await.unwrap();

        state.open_poll().await.unwrap();

        let results = state.latest_closed_results().await.unwrap();
        assert_eq!(results, vec![tally(5, 3)]);
    }
}
