//! Event-scoped exclusive locking via Postgres advisory locks.
//!
//! Assignment generation and result computation serialise per event on an
//! advisory lock keyed by a 64-bit fold of the event UUID. Acquisition is
//! non-blocking: a held lock surfaces as a conflict so concurrent
//! regeneration fails fast instead of queueing.

use async_trait::async_trait;
use peerrank_application::ports::{EventLock, EventLockManager};
use peerrank_domain::errors::{AppError, AppResult, ConflictError};
use peerrank_domain::EventId;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::debug;

use crate::map_db_err;

/// Fold the 128-bit UUID into the 64-bit advisory-lock keyspace.
fn lock_key(event_id: EventId) -> i64 {
    let bytes = event_id.into_uuid().into_bytes();
    let hi = u64::from_be_bytes(bytes[..8].try_into().expect("8 bytes"));
    let lo = u64::from_be_bytes(bytes[8..].try_into().expect("8 bytes"));
    (hi ^ lo) as i64
}

/// Advisory-lock based implementation of [`EventLockManager`].
pub struct PgEventLockManager {
    pool: PgPool,
}

impl PgEventLockManager {
    /// Create a lock manager over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLockManager for PgEventLockManager {
    async fn acquire(&self, event_id: EventId) -> AppResult<Box<dyn EventLock>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_err)?;
        let key = lock_key(event_id);

        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .map_err(map_db_err)?;

        if !locked {
            return Err(AppError::Conflict(ConflictError::ConstraintViolation {
                code: "event_lock_held".into(),
            }));
        }

        debug!(event_id = %event_id, key, "event lock acquired");
        Ok(Box::new(PgEventLock {
            conn: Some(conn),
            key,
        }))
    }
}

struct PgEventLock {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

#[async_trait]
impl EventLock for PgEventLock {
    async fn release(mut self: Box<Self>) -> AppResult<()> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
                .bind(self.key)
                .fetch_one(&mut *conn)
                .await
                .map_err(map_db_err)?;
            debug!(key = self.key, "event lock released");
        }
        Ok(())
    }
}

impl Drop for PgEventLock {
    fn drop(&mut self) {
        // Reached only when the holder was cancelled before release. The
        // connection must not return to the pool still holding the session
        // lock; detaching closes it and the server frees the lock.
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_stable() {
        let id = EventId::new();
        assert_eq!(lock_key(id), lock_key(id));
    }

    #[test]
    fn test_lock_key_differs_across_events() {
        assert_ne!(lock_key(EventId::new()), lock_key(EventId::new()));
    }
}
