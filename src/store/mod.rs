pub mod auctions;
pub mod bids;
pub mod ledger;
pub mod locks;
pub mod migrations;
pub mod rounds;
pub mod users;

use std::future::Future;
use std::pin::Pin;

use log::{debug, warn};
use tokio_postgres::{Client, NoTls, Transaction};

use crate::errors::{AuctionError, Result};

/// Typed access to the six tables (SPEC_FULL §3 storage layout), built the
/// way `epoch_tracker::storage::epoch_storage::EpochStorage` wraps
/// `tokio_postgres` — a fresh connection per logical operation rather than a
/// pool, since nothing in this pack's dependency stack provides one.
pub struct Store {
    database_url: String,
}

const MAX_TXN_ATTEMPTS: u32 = 5;

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let store = Self {
            database_url: database_url.to_string(),
        };
        migrations::run(&store).await?;
        Ok(store)
    }

    /// Releases the engine's leader-election lock, if still held. Exposed as
    /// a `Store` method (rather than routed through `client()`) since it is
    /// the one store operation `main.rs` calls directly, from outside the
    /// library crate's `pub(crate)` boundary.
    pub async fn release_engine_lock(&self, owner_id: &str, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
        let client = self.client().await?;
        locks::release(&client, owner_id, now).await
    }

    pub(crate) async fn client(&self) -> Result<Client> {
        let (client, connection) = tokio_postgres::connect(&self.database_url, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("postgres connection error: {}", e);
            }
        });

        Ok(client)
    }

    /// Runs `op` inside one transaction with snapshot (`REPEATABLE READ`)
    /// isolation, retrying up to `MAX_TXN_ATTEMPTS` times on transient
    /// conflicts (SPEC_FULL §4.3, §5, §7). `op` is re-invoked from scratch on
    /// every retry — it must not carry over state from a failed attempt.
    pub async fn with_txn<T, F>(&self, mut op: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnMut(&'a Transaction<'a>) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut client = self.client().await?;
            let txn = client
                .build_transaction()
                .isolation_level(tokio_postgres::IsolationLevel::RepeatableRead)
                .start()
                .await?;

            match op(&txn).await {
                Ok(value) => {
                    txn.commit().await?;
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < MAX_TXN_ATTEMPTS => {
                    debug!("retrying transaction after transient conflict (attempt {})", attempt);
                    let _ = txn.rollback().await;
                    continue;
                }
                Err(e) => {
                    let _ = txn.rollback().await;
                    return Err(e);
                }
            }
        }
    }
}

pub(crate) fn require_one(rows_affected: u64, what: &'static str) -> Result<()> {
    if rows_affected != 1 {
        return Err(AuctionError::InvariantViolation(format!(
            "expected exactly one row affected by {what}, got {rows_affected}"
        )));
    }
    Ok(())
}
