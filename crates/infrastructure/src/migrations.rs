//! Embedded schema migrations.
//!
//! Migrations are ordered, each with an up and a down script, and a
//! `schema_migrations` ledger records what has been applied. The migrate CLI
//! drives [`run`] and [`rollback`].

use crate::map_db_err;
use peerrank_domain::errors::AppResult;
use sqlx::PgPool;
use tracing::info;

struct Migration {
    version: i64,
    name: &'static str,
    up: &'static str,
    down: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "core_tables",
        up: r#"
            CREATE TABLE events (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                author_id UUID NOT NULL,
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                stage TEXT NOT NULL DEFAULT 'creation',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );

            CREATE TABLE participants (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'participant',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE UNIQUE INDEX participants_email_key ON participants (LOWER(email));

            CREATE TABLE event_participants (
                event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                participant_id UUID NOT NULL REFERENCES participants(id),
                registered_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (event_id, participant_id)
            );
        "#,
        down: r#"
            DROP TABLE IF EXISTS event_participants;
            DROP TABLE IF EXISTS participants;
            DROP TABLE IF EXISTS events;
        "#,
    },
    Migration {
        version: 2,
        name: "voting_tables",
        up: r#"
            CREATE TABLE proposals (
                id UUID PRIMARY KEY,
                event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                author_id UUID NOT NULL REFERENCES participants(id),
                filename TEXT NOT NULL,
                file_size BIGINT NOT NULL,
                mime_type TEXT NOT NULL,
                uploaded_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT proposals_event_author_key UNIQUE (event_id, author_id)
            );

            CREATE TABLE voting_configurations (
                id UUID PRIMARY KEY,
                event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                attachments_per_evaluator INTEGER NOT NULL,
                min_evaluations_per_file INTEGER NOT NULL,
                quality_good_threshold DOUBLE PRECISION NOT NULL,
                quality_bad_threshold DOUBLE PRECISION NOT NULL,
                adjustment_magnitude INTEGER NOT NULL,
                randomization_seed BIGINT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT voting_configurations_event_key UNIQUE (event_id)
            );

            CREATE TABLE assignments (
                id UUID PRIMARY KEY,
                event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                participant_id UUID NOT NULL REFERENCES participants(id),
                proposal_ids UUID[] NOT NULL,
                completed BOOLEAN NOT NULL DEFAULT FALSE,
                completed_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT assignments_event_participant_key UNIQUE (event_id, participant_id)
            );

            CREATE TABLE votes (
                id UUID PRIMARY KEY,
                event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                assignment_id UUID NOT NULL REFERENCES assignments(id) ON DELETE CASCADE,
                voter_id UUID NOT NULL REFERENCES participants(id),
                proposal_id UUID NOT NULL REFERENCES proposals(id) ON DELETE CASCADE,
                rank_position INTEGER NOT NULL,
                voted_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT votes_voter_proposal_key UNIQUE (event_id, voter_id, proposal_id),
                CONSTRAINT votes_rank_positive CHECK (rank_position >= 1)
            );

            CREATE TABLE voting_results (
                id UUID PRIMARY KEY,
                event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                global_ranking JSONB NOT NULL,
                participant_qualities JSONB NOT NULL,
                adjusted_ranking JSONB NOT NULL,
                excluded_evaluators JSONB NOT NULL DEFAULT '[]',
                total_participants INTEGER NOT NULL,
                attachments_per_evaluator INTEGER NOT NULL,
                calculated_at TIMESTAMPTZ NOT NULL,
                CONSTRAINT voting_results_event_key UNIQUE (event_id)
            );
        "#,
        down: r#"
            DROP TABLE IF EXISTS voting_results;
            DROP TABLE IF EXISTS votes;
            DROP TABLE IF EXISTS assignments;
            DROP TABLE IF EXISTS voting_configurations;
            DROP TABLE IF EXISTS proposals;
        "#,
    },
    Migration {
        version: 3,
        name: "indexes",
        up: r#"
            CREATE INDEX proposals_event_idx ON proposals (event_id);
            CREATE INDEX assignments_event_idx ON assignments (event_id);
            CREATE INDEX votes_event_idx ON votes (event_id);
            CREATE INDEX votes_voter_idx ON votes (event_id, voter_id);
            CREATE INDEX event_participants_event_idx ON event_participants (event_id);
        "#,
        down: r#"
            DROP INDEX IF EXISTS event_participants_event_idx;
            DROP INDEX IF EXISTS votes_voter_idx;
            DROP INDEX IF EXISTS votes_event_idx;
            DROP INDEX IF EXISTS assignments_event_idx;
            DROP INDEX IF EXISTS proposals_event_idx;
        "#,
    },
];

async fn ensure_ledger(pool: &PgPool) -> AppResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(map_db_err)?;
    Ok(())
}

async fn applied_versions(pool: &PgPool) -> AppResult<Vec<i64>> {
    let versions: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
            .fetch_all(pool)
            .await
            .map_err(map_db_err)?;
    Ok(versions)
}

/// Apply every pending migration in order.
pub async fn run(pool: &PgPool) -> AppResult<()> {
    ensure_ledger(pool).await?;
    let applied = applied_versions(pool).await?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }

        let mut tx = pool.begin().await.map_err(map_db_err)?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        tx.commit().await.map_err(map_db_err)?;

        info!(version = migration.version, name = migration.name, "migration applied");
    }

    Ok(())
}

/// Roll back the most recently applied migration, if any.
pub async fn rollback(pool: &PgPool) -> AppResult<()> {
    ensure_ledger(pool).await?;
    let applied = applied_versions(pool).await?;

    let Some(&last) = applied.last() else {
        info!("no migrations to roll back");
        return Ok(());
    };
    let Some(migration) = MIGRATIONS.iter().find(|m| m.version == last) else {
        return Err(peerrank_domain::errors::AppError::Internal(format!(
            "applied migration {last} is unknown to this binary"
        )));
    };

    let mut tx = pool.begin().await.map_err(map_db_err)?;
    sqlx::raw_sql(migration.down)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;
    sqlx::query("DELETE FROM schema_migrations WHERE version = $1")
        .bind(migration.version)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;
    tx.commit().await.map_err(map_db_err)?;

    info!(version = migration.version, name = migration.name, "migration rolled back");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_strictly_increasing() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn test_every_migration_has_a_down_script() {
        for migration in MIGRATIONS {
            assert!(!migration.down.trim().is_empty());
        }
    }
}
