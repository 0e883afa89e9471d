use chrono::{DateTime, Utc};
use tokio_postgres::GenericClient;

use crate::errors::Result;
use crate::models::engine_lock::ENGINE_LOCK_ID;
use crate::models::EngineLock;

fn row_to_lock(row: &tokio_postgres::Row) -> EngineLock {
    EngineLock {
        owner_id: row.get("owner_id"),
        expires_at: row.get("expires_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get<C: GenericClient>(client: &C, id: &str) -> Result<Option<EngineLock>> {
    let row = client
        .query_opt("SELECT * FROM engine_locks WHERE id = $1", &[&id])
        .await?;
    Ok(row.map(|r| row_to_lock(&r)))
}

/// Leader election (§4.6.1): atomically takes the singleton lock row if it
/// is unheld, expired, or already owned by `owner_id` (lease renewal). The
/// `ON CONFLICT` arm is the fencing step: a concurrent worker racing this
/// same predicate can win the insert only once per row.
pub async fn try_acquire<C: GenericClient>(
    client: &C,
    owner_id: &str,
    lease: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<bool> {
    let expires_at = now + lease;
    let rows = client
        .execute(
            "INSERT INTO engine_locks (id, owner_id, expires_at, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id, expires_at = EXCLUDED.expires_at, updated_at = EXCLUDED.updated_at
             WHERE engine_locks.expires_at < $4 OR engine_locks.owner_id = $2",
            &[&ENGINE_LOCK_ID, &owner_id, &expires_at, &now],
        )
        .await?;
    Ok(rows == 1)
}

/// Releases the lock early (graceful shutdown), predicated on still owning it.
pub async fn release<C: GenericClient>(client: &C, owner_id: &str, now: DateTime<Utc>) -> Result<()> {
    client
        .execute(
            "UPDATE engine_locks SET expires_at = $2
             WHERE id = $3 AND owner_id = $1",
            &[&owner_id, &now, &ENGINE_LOCK_ID],
        )
        .await?;
    Ok(())
}
