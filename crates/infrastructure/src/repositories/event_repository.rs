//! Event persistence.

use crate::map_db_err;
use async_trait::async_trait;
use peerrank_application::ports::EventRepository;
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::{AppError, AppResult};
use peerrank_domain::{Event, EventId, ParticipantId, Stage};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`EventRepository`].
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Create the repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: &PgRow) -> AppResult<Event> {
    let stage: String = row.get("stage");
    Ok(Event {
        id: EventId::from(row.get::<Uuid, _>("id")),
        name: row.get("name"),
        description: row.get("description"),
        author_id: ParticipantId::from(row.get::<Uuid, _>("author_id")),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        stage: stage
            .parse::<Stage>()
            .map_err(|_| AppError::Internal(format!("stored stage '{stage}' is invalid")))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl EventRepository for PgEventRepository {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn create(&self, event: &Event) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO events (
                id, name, description, author_id,
                start_date, end_date, stage, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.author_id.as_uuid())
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.stage.as_str())
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        debug!("event row inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: EventId) -> AppResult<Option<Event>> {
        let row = sqlx::query("SELECT * FROM events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.as_ref().map(row_to_event).transpose()
    }

    #[instrument(skip(self))]
    async fn update_stage(&self, id: EventId, stage: Stage) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE events SET stage = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(stage.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(peerrank_domain::errors::NotFoundError::Event(id).into());
        }
        Ok(())
    }

    #[instrument(skip(self, params))]
    async fn list(&self, params: &PaginationParams) -> AppResult<PaginatedResult<Event>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;

        let rows = sqlx::query(
            "SELECT * FROM events ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(params.limit()))
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let events = rows
            .iter()
            .map(row_to_event)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PaginatedResult::new(events, params, total as u64))
    }
}
