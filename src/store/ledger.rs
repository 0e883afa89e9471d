use tokio_postgres::GenericClient;

use crate::errors::Result;
use crate::models::{AuctionId, LedgerEntry, LedgerEntryId, LedgerEntryType, UserId};

fn row_to_entry(row: &tokio_postgres::Row) -> LedgerEntry {
    let entry_type: String = row.get("entry_type");
    LedgerEntry {
        id: LedgerEntryId(row.get("id")),
        created_at: row.get("created_at"),
        user_id: UserId(row.get("user_id")),
        entry_type: parse_entry_type(&entry_type),
        amount: row.get("amount"),
        auction_id: row.get::<_, Option<uuid::Uuid>>("auction_id").map(AuctionId),
        meta: row.get("meta"),
    }
}

fn parse_entry_type(s: &str) -> LedgerEntryType {
    use LedgerEntryType::*;
    match s {
        "topup" => Topup,
        "reserve" => Reserve,
        "unreserve" => Unreserve,
        "spend" => Spend,
        "refund" => Refund,
        other => panic!("unknown ledger entry type {other}"),
    }
}

fn entry_type_str(t: LedgerEntryType) -> &'static str {
    use LedgerEntryType::*;
    match t {
        Topup => "topup",
        Reserve => "reserve",
        Unreserve => "unreserve",
        Spend => "spend",
        Refund => "refund",
    }
}

/// The ledger is append-only (SPEC_FULL §3): every balance mutation records
/// one entry here in the same transaction that mutates `users`.
pub async fn append<C: GenericClient>(client: &C, entry: &LedgerEntry) -> Result<()> {
    client
        .execute(
            "INSERT INTO ledger_entries (id, created_at, user_id, entry_type, amount, auction_id, meta)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &entry.id.0,
                &entry.created_at,
                &entry.user_id.0,
                &entry_type_str(entry.entry_type),
                &entry.amount,
                &entry.auction_id.map(|a| a.0),
                &entry.meta,
            ],
        )
        .await?;
    Ok(())
}

pub async fn list_by_user<C: GenericClient>(client: &C, user_id: UserId) -> Result<Vec<LedgerEntry>> {
    let rows = client
        .query(
            "SELECT * FROM ledger_entries WHERE user_id = $1 ORDER BY created_at ASC",
            &[&user_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_entry).collect())
}

/// Used by the per-auction audit (§4.7) to reconcile ledger movements
/// against recorded revenue.
pub async fn list_by_auction<C: GenericClient>(client: &C, auction_id: AuctionId) -> Result<Vec<LedgerEntry>> {
    let rows = client
        .query(
            "SELECT * FROM ledger_entries WHERE auction_id = $1 ORDER BY created_at ASC",
            &[&auction_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_entry).collect())
}
