//! Voting configuration persistence.

use crate::map_db_err;
use async_trait::async_trait;
use peerrank_application::ports::ConfigurationRepository;
use peerrank_domain::errors::{AppError, AppResult, ConflictError, NotFoundError};
use peerrank_domain::{ConfigId, EventId, VotingConfiguration};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of [`ConfigurationRepository`].
pub struct PgConfigurationRepository {
    pool: PgPool,
}

impl PgConfigurationRepository {
    /// Create the repository over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_config(row: &PgRow) -> VotingConfiguration {
    VotingConfiguration {
        id: ConfigId::from(row.get::<Uuid, _>("id")),
        event_id: EventId::from(row.get::<Uuid, _>("event_id")),
        attachments_per_evaluator: row.get::<i32, _>("attachments_per_evaluator") as u32,
        min_evaluations_per_file: row.get::<i32, _>("min_evaluations_per_file") as u32,
        quality_good_threshold: row.get("quality_good_threshold"),
        quality_bad_threshold: row.get("quality_bad_threshold"),
        adjustment_magnitude: row.get::<i32, _>("adjustment_magnitude") as u32,
        randomization_seed: row
            .get::<Option<i64>, _>("randomization_seed")
            .map(|seed| seed as u64),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl ConfigurationRepository for PgConfigurationRepository {
    #[instrument(skip(self, config), fields(event_id = %config.event_id))]
    async fn create(&self, config: &VotingConfiguration) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO voting_configurations (
                id, event_id, attachments_per_evaluator, min_evaluations_per_file,
                quality_good_threshold, quality_bad_threshold, adjustment_magnitude,
                randomization_seed, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(config.id.as_uuid())
        .bind(config.event_id.as_uuid())
        .bind(config.attachments_per_evaluator as i32)
        .bind(config.min_evaluations_per_file as i32)
        .bind(config.quality_good_threshold)
        .bind(config.quality_bad_threshold)
        .bind(config.adjustment_magnitude as i32)
        .bind(config.randomization_seed.map(|seed| seed as i64))
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("configuration row inserted");
                Ok(())
            }
            Err(err) => {
                let mapped = map_db_err(err);
                if let AppError::Conflict(ConflictError::ConstraintViolation { code }) = &mapped {
                    if code == "voting_configurations_event_key" {
                        return Err(ConflictError::ConfigurationExists(config.event_id).into());
                    }
                }
                Err(mapped)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_by_event(&self, event_id: EventId) -> AppResult<Option<VotingConfiguration>> {
        let row = sqlx::query("SELECT * FROM voting_configurations WHERE event_id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(row.as_ref().map(row_to_config))
    }

    #[instrument(skip(self, config), fields(event_id = %config.event_id))]
    async fn update(&self, config: &VotingConfiguration) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE voting_configurations
            SET attachments_per_evaluator = $2,
                min_evaluations_per_file = $3,
                quality_good_threshold = $4,
                quality_bad_threshold = $5,
                adjustment_magnitude = $6,
                randomization_seed = $7,
                updated_at = $8
            WHERE event_id = $1
            "#,
        )
        .bind(config.event_id.as_uuid())
        .bind(config.attachments_per_evaluator as i32)
        .bind(config.min_evaluations_per_file as i32)
        .bind(config.quality_good_threshold)
        .bind(config.quality_bad_threshold)
        .bind(config.adjustment_magnitude as i32)
        .bind(config.randomization_seed.map(|seed| seed as i64))
        .bind(config.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::Configuration(config.event_id).into());
        }
        Ok(())
    }
}
