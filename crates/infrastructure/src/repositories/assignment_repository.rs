//! Assignment persistence.

use crate::map_db_err;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peerrank_application::ports::AssignmentRepository;
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::AppResult;
use peerrank_domain::{Assignment, AssignmentId, EventId, ParticipantId, ProposalId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`AssignmentRepository`].
pub struct PgAssignmentRepository {
    pool: PgPool,
}

impl PgAssignmentRepository {
    /// Create the repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_assignment(row: &PgRow) -> Assignment {
    let proposal_ids: Vec<Uuid> = row.get("proposal_ids");
    Assignment {
        id: AssignmentId::from(row.get::<Uuid, _>("id")),
        event_id: EventId::from(row.get::<Uuid, _>("event_id")),
        participant_id: ParticipantId::from(row.get::<Uuid, _>("participant_id")),
        proposal_ids: proposal_ids.into_iter().map(ProposalId::from).collect(),
        completed: row.get("completed"),
        completed_at: row.get("completed_at"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl AssignmentRepository for PgAssignmentRepository {
    #[instrument(skip(self, assignments), fields(batch = assignments.len(), seed))]
    async fn create_batch(&self, seed: u64, assignments: &[Assignment]) -> AppResult<()> {
        let Some(first) = assignments.first() else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        for assignment in assignments {
            let ids: Vec<Uuid> = assignment
                .proposal_ids
                .iter()
                .map(|id| *id.as_uuid())
                .collect();
            sqlx::query(
                r#"
                INSERT INTO assignments (
                    id, event_id, participant_id, proposal_ids,
                    completed, completed_at, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(assignment.id.as_uuid())
            .bind(assignment.event_id.as_uuid())
            .bind(assignment.participant_id.as_uuid())
            .bind(&ids)
            .bind(assignment.completed)
            .bind(assignment.completed_at)
            .bind(assignment.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }

        // Record the seed on the configuration so the batch stays
        // reproducible for audit.
        sqlx::query(
            r#"
            UPDATE voting_configurations
            SET randomization_seed = $1, updated_at = now()
            WHERE event_id = $2
            "#,
        )
        .bind(seed as i64)
        .bind(first.event_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        debug!("assignment batch committed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_participant(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<Option<Assignment>> {
        let row = sqlx::query(
            "SELECT * FROM assignments WHERE event_id = $1 AND participant_id = $2",
        )
        .bind(event_id.as_uuid())
        .bind(participant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.as_ref().map(row_to_assignment))
    }

    #[instrument(skip(self, params))]
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Assignment>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM assignments WHERE event_id = $1")
                .bind(event_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_err)?;

        let rows = sqlx::query(
            "SELECT * FROM assignments WHERE event_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(event_id.as_uuid())
        .bind(i64::from(params.limit()))
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let assignments = rows.iter().map(row_to_assignment).collect();
        Ok(PaginatedResult::new(assignments, params, total as u64))
    }

    #[instrument(skip(self))]
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM assignments WHERE event_id = $1")
                .bind(event_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_err)?;

        Ok(count as u64)
    }

    #[instrument(skip(self))]
    async fn mark_completed(&self, id: AssignmentId, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE assignments SET completed = TRUE, completed_at = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }
}
