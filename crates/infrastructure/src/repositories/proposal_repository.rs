//! Proposal metadata persistence.

use crate::map_db_err;
use async_trait::async_trait;
use peerrank_application::ports::ProposalRepository;
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::{AppError, AppResult, ConflictError};
use peerrank_domain::{EventId, ParticipantId, Proposal, ProposalId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`ProposalRepository`].
pub struct PgProposalRepository {
    pool: PgPool,
}

impl PgProposalRepository {
    /// Create the repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_proposal(row: &PgRow) -> Proposal {
    Proposal {
        id: ProposalId::from(row.get::<Uuid, _>("id")),
        event_id: EventId::from(row.get::<Uuid, _>("event_id")),
        author_id: ParticipantId::from(row.get::<Uuid, _>("author_id")),
        filename: row.get("filename"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        uploaded_at: row.get("uploaded_at"),
    }
}

#[async_trait]
impl ProposalRepository for PgProposalRepository {
    #[instrument(skip(self, proposal), fields(proposal_id = %proposal.id))]
    async fn create(&self, proposal: &Proposal) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO proposals (
                id, event_id, author_id, filename, file_size, mime_type, uploaded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(proposal.id.as_uuid())
        .bind(proposal.event_id.as_uuid())
        .bind(proposal.author_id.as_uuid())
        .bind(&proposal.filename)
        .bind(proposal.file_size)
        .bind(&proposal.mime_type)
        .bind(proposal.uploaded_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("proposal row inserted");
                Ok(())
            }
            Err(err) => {
                let mapped = map_db_err(err);
                // The (event, author) unique index carries the domain meaning.
                if let AppError::Conflict(ConflictError::ConstraintViolation { code }) = &mapped {
                    if code == "proposals_event_author_key" {
                        return Err(ConflictError::DuplicateProposal {
                            event: proposal.event_id,
                            author: proposal.author_id,
                        }
                        .into());
                    }
                }
                Err(mapped)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, id: ProposalId) -> AppResult<Option<Proposal>> {
        let row = sqlx::query("SELECT * FROM proposals WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(row.as_ref().map(row_to_proposal))
    }

    #[instrument(skip(self))]
    async fn get_by_author(
        &self,
        event_id: EventId,
        author_id: ParticipantId,
    ) -> AppResult<Option<Proposal>> {
        let row = sqlx::query(
            "SELECT * FROM proposals WHERE event_id = $1 AND author_id = $2",
        )
        .bind(event_id.as_uuid())
        .bind(author_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.as_ref().map(row_to_proposal))
    }

    #[instrument(skip(self, params))]
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Proposal>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM proposals WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;

        let rows = sqlx::query(
            "SELECT * FROM proposals WHERE event_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(event_id.as_uuid())
        .bind(i64::from(params.limit()))
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let proposals = rows.iter().map(row_to_proposal).collect();
        Ok(PaginatedResult::new(proposals, params, total as u64))
    }

    #[instrument(skip(self))]
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM proposals WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(count as u64)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ProposalId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM proposals WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }
}
