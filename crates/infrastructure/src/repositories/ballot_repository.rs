//! Ballot persistence.
//!
//! A ballot lands as one atomic batch: the completion flag flips first as a
//! guard against concurrent resubmission, then the vote rows insert; any
//! failure rolls the whole transaction back.

use crate::map_db_err;
use async_trait::async_trait;
use peerrank_application::ports::BallotRepository;
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::{AppResult, ConflictError};
use peerrank_domain::{AssignmentId, BallotEntry, BallotId, EventId, ParticipantId, ProposalId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`BallotRepository`].
pub struct PgBallotRepository {
    pool: PgPool,
}

impl PgBallotRepository {
    /// Create the repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &PgRow) -> BallotEntry {
    BallotEntry {
        id: BallotId::from(row.get::<Uuid, _>("id")),
        event_id: EventId::from(row.get::<Uuid, _>("event_id")),
        assignment_id: AssignmentId::from(row.get::<Uuid, _>("assignment_id")),
        voter_id: ParticipantId::from(row.get::<Uuid, _>("voter_id")),
        proposal_id: ProposalId::from(row.get::<Uuid, _>("proposal_id")),
        rank_position: row.get::<i32, _>("rank_position") as u32,
        voted_at: row.get("voted_at"),
    }
}

#[async_trait]
impl BallotRepository for PgBallotRepository {
    #[instrument(skip(self, entries), fields(assignment_id = %assignment_id, entries = entries.len()))]
    async fn create_batch(
        &self,
        assignment_id: AssignmentId,
        entries: &[BallotEntry],
    ) -> AppResult<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        // Flipping the flag first serialises concurrent submissions: the
        // second transaction sees zero affected rows and aborts.
        let completion = sqlx::query(
            r#"
            UPDATE assignments
            SET completed = TRUE, completed_at = now()
            WHERE id = $1 AND completed = FALSE
            "#,
        )
        .bind(assignment_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if completion.rows_affected() == 0 {
            tx.rollback().await.map_err(map_db_err)?;
            return Err(ConflictError::DuplicateBallot {
                event: first.event_id,
                voter: first.voter_id,
            }
            .into());
        }

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO votes (
                    id, event_id, assignment_id, voter_id,
                    proposal_id, rank_position, voted_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(entry.event_id.as_uuid())
            .bind(entry.assignment_id.as_uuid())
            .bind(entry.voter_id.as_uuid())
            .bind(entry.proposal_id.as_uuid())
            .bind(entry.rank_position as i32)
            .bind(entry.voted_at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;
        debug!("ballot batch committed");
        Ok(())
    }

    #[instrument(skip(self, params))]
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<BallotEntry>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;

        let rows = sqlx::query(
            "SELECT * FROM votes WHERE event_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(event_id.as_uuid())
        .bind(i64::from(params.limit()))
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let entries = rows.iter().map(row_to_entry).collect();
        Ok(PaginatedResult::new(entries, params, total as u64))
    }

    #[instrument(skip(self))]
    async fn list_by_voter(
        &self,
        event_id: EventId,
        voter_id: ParticipantId,
    ) -> AppResult<Vec<BallotEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM votes WHERE event_id = $1 AND voter_id = $2 ORDER BY rank_position",
        )
        .bind(event_id.as_uuid())
        .bind(voter_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    #[instrument(skip(self))]
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(count as u64)
    }
}
