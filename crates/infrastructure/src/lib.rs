//! Infrastructure layer for PeerRank
//!
//! PostgreSQL implementations of the persistence contracts defined in the
//! application layer, plus the connection pool, the event-scoped advisory
//! lock, and the embedded schema migrations.
//!
//! No storage vocabulary leaks upwards: every public operation speaks in
//! domain types and domain errors.

pub mod database;
pub mod lock;
pub mod migrations;
pub mod repositories;

pub use database::{DatabaseConfig, DatabasePool};
pub use lock::PgEventLockManager;
pub use repositories::{
    PgAssignmentRepository, PgBallotRepository, PgConfigurationRepository, PgEventRepository,
    PgParticipantRepository, PgProposalRepository, PgResultsRepository,
};

use peerrank_domain::errors::{AppError, ConflictError, StorageError};

/// Map a sqlx error onto the domain error taxonomy.
///
/// Unique and referential violations become conflicts carrying the
/// constraint name as the machine-readable code; everything else is a
/// transient storage fault.
pub(crate) fn map_db_err(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            // 23505 unique_violation, 23503 foreign_key_violation
            if code == "23505" || code == "23503" {
                AppError::Conflict(ConflictError::ConstraintViolation {
                    code: db
                        .constraint()
                        .map(str::to_string)
                        .unwrap_or_else(|| code.clone()),
                })
            } else {
                AppError::Storage(StorageError::QueryFailed(db.to_string()))
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            AppError::Storage(StorageError::Unavailable(err.to_string()))
        }
        sqlx::Error::RowNotFound => {
            AppError::Storage(StorageError::QueryFailed("row not found".into()))
        }
        other => AppError::Storage(StorageError::QueryFailed(other.to_string())),
    }
}

/// Map a JSON (de)serialization failure of a stored document.
pub(crate) fn map_json_err(err: serde_json::Error) -> AppError {
    AppError::Storage(StorageError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_transient() {
        let err = map_db_err(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert_eq!(err.http_status(), 503);
    }
}
