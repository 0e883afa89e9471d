use chrono::{DateTime, Utc};
use tokio_postgres::GenericClient;

use crate::errors::{AuctionError, Result};
use crate::models::{AuctionId, Bid, BidId, BidStatus, Settlement, UserId};
use crate::store::require_one;

fn row_to_bid(row: &tokio_postgres::Row) -> Bid {
    let status: String = row.get("status");
    let settlement: Option<serde_json::Value> = row.get("settlement");
    Bid {
        id: BidId(row.get("id")),
        auction_id: AuctionId(row.get("auction_id")),
        user_id: UserId(row.get("user_id")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        last_bid_at: row.get("last_bid_at"),
        amount: row.get("amount"),
        status: parse_status(&status),
        settlement: settlement.map(|v| serde_json::from_value(v).expect("settlement column is valid json")),
    }
}

fn parse_status(s: &str) -> BidStatus {
    match s {
        "active" => BidStatus::Active,
        "won" => BidStatus::Won,
        "lost" => BidStatus::Lost,
        "withdrawn" => BidStatus::Withdrawn,
        other => panic!("unknown bid status {other}"),
    }
}

fn status_str(s: BidStatus) -> &'static str {
    match s {
        BidStatus::Active => "active",
        BidStatus::Won => "won",
        BidStatus::Lost => "lost",
        BidStatus::Withdrawn => "withdrawn",
    }
}

pub async fn insert<C: GenericClient>(client: &C, bid: &Bid) -> Result<()> {
    client
        .execute(
            "INSERT INTO bids (id, auction_id, user_id, created_at, updated_at, last_bid_at, amount, status, settlement)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            &[
                &bid.id.0,
                &bid.auction_id.0,
                &bid.user_id.0,
                &bid.created_at,
                &bid.updated_at,
                &bid.last_bid_at,
                &bid.amount,
                &status_str(bid.status),
                &bid.settlement.map(|s| serde_json::to_value(s).unwrap()),
            ],
        )
        .await?;
    Ok(())
}

pub async fn get<C: GenericClient>(client: &C, id: BidId) -> Result<Bid> {
    let row = client
        .query_opt("SELECT * FROM bids WHERE id = $1", &[&id.0])
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("bid {id}")))?;
    Ok(row_to_bid(&row))
}

/// A user may hold at most one bid per auction (`bids_auction_user_uniq`);
/// this is how `placeBid`/`raiseBid` find the row to act on.
pub async fn get_by_auction_and_user<C: GenericClient>(
    client: &C,
    auction_id: AuctionId,
    user_id: UserId,
) -> Result<Option<Bid>> {
    let row = client
        .query_opt(
            "SELECT * FROM bids WHERE auction_id = $1 AND user_id = $2",
            &[&auction_id.0, &user_id.0],
        )
        .await?;
    Ok(row.map(|r| row_to_bid(&r)))
}

/// All bids still in play when a round closes, for ranking (§4.1, §4.6.3).
pub async fn list_active_by_auction<C: GenericClient>(client: &C, auction_id: AuctionId) -> Result<Vec<Bid>> {
    let rows = client
        .query(
            "SELECT * FROM bids WHERE auction_id = $1 AND status = 'active'",
            &[&auction_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_bid).collect())
}

/// `placeBid` on an existing `active` or `withdrawn` bid (§4.3 step 4):
/// bumps `amount`/`lastBidAt` and, for a `withdrawn` bid, transitions it
/// back to `active`. Predicated on the bid being in one of those two
/// states; returns `None` (`BID_NOT_ACTIVE`) for `won`/`lost`, which the
/// caller already rejects before reaching this call.
pub async fn raise<C: GenericClient>(client: &C, id: BidId, new_amount: i64, now: DateTime<Utc>) -> Result<Option<Bid>> {
    let row = client
        .query_opt(
            "UPDATE bids SET amount = $2, last_bid_at = $3, updated_at = $3, status = 'active'
             WHERE id = $1 AND status IN ('active', 'withdrawn')
             RETURNING *",
            &[&id.0, &new_amount, &now],
        )
        .await?;
    Ok(row.map(|r| row_to_bid(&r)))
}

/// `withdrawBid` (§4.4): active -> withdrawn. Returns `None`
/// (`BID_NOT_ACTIVE`) if the bid already settled or was withdrawn.
pub async fn withdraw<C: GenericClient>(client: &C, id: BidId, now: DateTime<Utc>) -> Result<Option<Bid>> {
    let row = client
        .query_opt(
            "UPDATE bids SET status = 'withdrawn', updated_at = $2
             WHERE id = $1 AND status = 'active'
             RETURNING *",
            &[&id.0, &now],
        )
        .await?;
    Ok(row.map(|r| row_to_bid(&r)))
}

/// Settlement of a winning bid (§4.6.3 step 6): active -> won, recording the
/// gift serial and per-user settlement breakdown.
pub async fn mark_won<C: GenericClient>(client: &C, id: BidId, settlement: Settlement, now: DateTime<Utc>) -> Result<()> {
    require_one(
        client
            .execute(
                "UPDATE bids SET status = 'won', gift_serial = $2, settlement = $3, updated_at = $4
                 WHERE id = $1 AND status = 'active'",
                &[
                    &id.0,
                    &settlement.gift_serial,
                    &serde_json::to_value(settlement).unwrap(),
                    &now,
                ],
            )
            .await?,
        "mark bid won",
    )
}

/// A bid that was active when a round closed but did not rank among the
/// winners (§4.6.3 step 7): active -> lost.
pub async fn mark_lost<C: GenericClient>(client: &C, id: BidId, now: DateTime<Utc>) -> Result<()> {
    require_one(
        client
            .execute(
                "UPDATE bids SET status = 'lost', updated_at = $2 WHERE id = $1 AND status = 'active'",
                &[&id.0, &now],
            )
            .await?,
        "mark bid lost",
    )
}
