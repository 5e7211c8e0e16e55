//! Computed results persistence.
//!
//! Rankings and the quality map are stored as JSONB documents; the results
//! row upserts in place so `calculated_at` advances on every recomputation.

use crate::{map_db_err, map_json_err};
use async_trait::async_trait;
use peerrank_application::ports::ResultsRepository;
use peerrank_domain::errors::AppResult;
use peerrank_domain::{EventId, ResultsId, VotingResults};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`ResultsRepository`].
pub struct PgResultsRepository {
    pool: PgPool,
}

impl PgResultsRepository {
    /// Create the repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_results(row: &PgRow) -> AppResult<VotingResults> {
    Ok(VotingResults {
        id: ResultsId::from(row.get::<Uuid, _>("id")),
        event_id: EventId::from(row.get::<Uuid, _>("event_id")),
        global_ranking: serde_json::from_value(row.get("global_ranking")).map_err(map_json_err)?,
        participant_qualities: serde_json::from_value(row.get("participant_qualities"))
            .map_err(map_json_err)?,
        adjusted_ranking: serde_json::from_value(row.get("adjusted_ranking"))
            .map_err(map_json_err)?,
        excluded_evaluators: serde_json::from_value(row.get("excluded_evaluators"))
            .map_err(map_json_err)?,
        total_participants: row.get::<i32, _>("total_participants") as u32,
        attachments_per_evaluator: row.get::<i32, _>("attachments_per_evaluator") as u32,
        calculated_at: row.get("calculated_at"),
    })
}

#[async_trait]
impl ResultsRepository for PgResultsRepository {
    #[instrument(skip(self, results), fields(event_id = %results.event_id))]
    async fn upsert(&self, results: &VotingResults) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO voting_results (
                id, event_id, global_ranking, participant_qualities,
                adjusted_ranking, excluded_evaluators, total_participants,
                attachments_per_evaluator, calculated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (event_id) DO UPDATE SET
                global_ranking = EXCLUDED.global_ranking,
                participant_qualities = EXCLUDED.participant_qualities,
                adjusted_ranking = EXCLUDED.adjusted_ranking,
                excluded_evaluators = EXCLUDED.excluded_evaluators,
                total_participants = EXCLUDED.total_participants,
                attachments_per_evaluator = EXCLUDED.attachments_per_evaluator,
                calculated_at = EXCLUDED.calculated_at
            "#,
        )
        .bind(results.id.as_uuid())
        .bind(results.event_id.as_uuid())
        .bind(serde_json::to_value(&results.global_ranking).map_err(map_json_err)?)
        .bind(serde_json::to_value(&results.participant_qualities).map_err(map_json_err)?)
        .bind(serde_json::to_value(&results.adjusted_ranking).map_err(map_json_err)?)
        .bind(serde_json::to_value(&results.excluded_evaluators).map_err(map_json_err)?)
        .bind(results.total_participants as i32)
        .bind(results.attachments_per_evaluator as i32)
        .bind(results.calculated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        debug!("results row upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_event(&self, event_id: EventId) -> AppResult<Option<VotingResults>> {
        let row = sqlx::query("SELECT * FROM voting_results WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.as_ref().map(row_to_results).transpose()
    }
}
