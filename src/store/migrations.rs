//! Embedded SQL migration runner, adapted from
//! `epoch_tracker::storage::migrations::Migration`: a tiny hand-rolled
//! tracker table instead of reaching for a migration framework, because
//! nothing else in this dependency stack needs one.

use log::{debug, info};
use tokio_postgres::GenericClient;

use crate::errors::Result;
use crate::store::Store;

const SCRIPTS_UP: &[(&str, &str)] = &[(
    "00000000000000_initial_setup",
    include_str!("./migrations/00000000000000_initial_setup_up.sql"),
)];

pub async fn run(store: &Store) -> Result<()> {
    let mut client = store.client().await?;
    let txn = client.transaction().await?;
    create_tracker_table(&txn).await?;

    for (name, script) in SCRIPTS_UP {
        let version = parse_version(name);
        if !exists(&txn, &version).await? {
            debug!("running migration {}", name);
            txn.batch_execute(script).await?;
            insert_migration(&txn, &version).await?;
        }
    }

    txn.commit().await?;
    info!("migrations up to date");
    Ok(())
}

async fn create_tracker_table<C: GenericClient>(client: &C) -> Result<()> {
    client
        .batch_execute(
            r#"CREATE TABLE IF NOT EXISTS __schema_migrations (
                version VARCHAR(64) PRIMARY KEY NOT NULL,
                run_on TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
        )
        .await?;
    Ok(())
}

async fn exists<C: GenericClient>(client: &C, version: &str) -> Result<bool> {
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM __schema_migrations WHERE version = $1",
            &[&version],
        )
        .await?;
    let count: i64 = row.get(0);
    Ok(count > 0)
}

async fn insert_migration<C: GenericClient>(client: &C, version: &str) -> Result<()> {
    client
        .execute(
            "INSERT INTO __schema_migrations (version) VALUES ($1)",
            &[&version],
        )
        .await?;
    Ok(())
}

fn parse_version(name: &str) -> String {
    name.split('_').next().unwrap_or(name).replace('-', "")
}
