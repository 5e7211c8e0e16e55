//! Participant persistence and event registration.

use crate::map_db_err;
use async_trait::async_trait;
use peerrank_application::ports::ParticipantRepository;
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::{AppError, AppResult, ConflictError};
use peerrank_domain::{EventId, Participant, ParticipantId, Role};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`ParticipantRepository`].
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    /// Create the repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_participant(row: &PgRow) -> AppResult<Participant> {
    let role: String = row.get("role");
    Ok(Participant {
        id: ParticipantId::from(row.get::<Uuid, _>("id")),
        name: row.get("name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        role: role
            .parse::<Role>()
            .map_err(|_| AppError::Internal(format!("stored role '{role}' is invalid")))?,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    #[instrument(skip(self, participant), fields(email = %participant.email))]
    async fn create(&self, participant: &Participant) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO participants (id, name, last_name, email, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(participant.id.as_uuid())
        .bind(&participant.name)
        .bind(&participant.last_name)
        .bind(&participant.email)
        .bind(participant.role.as_str())
        .bind(participant.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        debug!(participant_id = %participant.id, "participant row inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: ParticipantId) -> AppResult<Option<Participant>> {
        let row = sqlx::query("SELECT * FROM participants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.as_ref().map(row_to_participant).transpose()
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Participant>> {
        let row = sqlx::query("SELECT * FROM participants WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.as_ref().map(row_to_participant).transpose()
    }

    #[instrument(skip(self))]
    async fn register_for_event(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_participants (event_id, participant_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(participant_id.as_uuid())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let mapped = map_db_err(err);
                if matches!(
                    mapped,
                    AppError::Conflict(ConflictError::ConstraintViolation { .. })
                ) {
                    Err(ConflictError::DuplicateRegistration {
                        event: event_id,
                        participant: participant_id,
                    }
                    .into())
                } else {
                    Err(mapped)
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn is_registered(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM event_participants
                WHERE event_id = $1 AND participant_id = $2
            )
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(participant_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(exists)
    }

    #[instrument(skip(self, params))]
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Participant>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM event_participants WHERE event_id = $1",
        )
        .bind(event_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        let rows = sqlx::query(
            r#"
            SELECT p.*
            FROM participants p
            JOIN event_participants ep ON ep.participant_id = p.id
            WHERE ep.event_id = $1
            ORDER BY p.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(i64::from(params.limit()))
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let participants = rows
            .iter()
            .map(row_to_participant)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PaginatedResult::new(participants, params, total as u64))
    }

    #[instrument(skip(self))]
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM event_participants WHERE event_id = $1",
        )
        .bind(event_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(count as u64)
    }
}
