use chrono::{DateTime, Utc};
use tokio_postgres::GenericClient;

use crate::errors::{AuctionError, Result};
use crate::models::{Auction, AuctionId, EndReason, RoundState};
use crate::store::require_one;

fn row_to_auction(row: &tokio_postgres::Row) -> Auction {
    let state: String = row.get("state");
    let round_state: Option<String> = row.get("round_state");
    let end_reason: Option<String> = row.get("end_reason");
    Auction {
        id: AuctionId(row.get("id")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        title: row.get("title"),
        state: parse_state(&state),
        total_quantity: row.get("total_quantity"),
        awarded_count: row.get("awarded_count"),
        revenue: row.get("revenue"),
        current_round: row.get("current_round"),
        consecutive_empty_rounds: row.get("consecutive_empty_rounds"),
        round_state: round_state.as_deref().map(parse_round_state),
        round_ends_at: row.get("round_ends_at"),
        ends_at: row.get("ends_at"),
        ended_at: row.get("ended_at"),
        end_reason: end_reason.as_deref().map(parse_end_reason),
        closing_token: row.get("closing_token"),
        closing_started_at: row.get("closing_started_at"),
        version: row.get("version"),
        config: serde_json::from_value(row.get("config")).expect("config column is valid json"),
    }
}

fn parse_state(s: &str) -> crate::models::AuctionState {
    use crate::models::AuctionState::*;
    match s {
        "draft" => Draft,
        "running" => Running,
        "ended" => Ended,
        "cancelled" => Cancelled,
        other => panic!("unknown auction state {other}"),
    }
}

fn state_str(s: crate::models::AuctionState) -> &'static str {
    use crate::models::AuctionState::*;
    match s {
        Draft => "draft",
        Running => "running",
        Ended => "ended",
        Cancelled => "cancelled",
    }
}

fn parse_round_state(s: &str) -> RoundState {
    match s {
        "open" => RoundState::Open,
        "closing" => RoundState::Closing,
        other => panic!("unknown round state {other}"),
    }
}

fn round_state_str(s: RoundState) -> &'static str {
    match s {
        RoundState::Open => "open",
        RoundState::Closing => "closing",
    }
}

fn parse_end_reason(s: &str) -> EndReason {
    use EndReason::*;
    match s {
        "soldOut" => SoldOut,
        "maxDuration" => MaxDuration,
        "emptyRounds" => EmptyRounds,
        "cancelled" => Cancelled,
        other => panic!("unknown end reason {other}"),
    }
}

fn end_reason_str(s: EndReason) -> &'static str {
    use EndReason::*;
    match s {
        SoldOut => "soldOut",
        MaxDuration => "maxDuration",
        EmptyRounds => "emptyRounds",
        Cancelled => "cancelled",
    }
}

pub async fn insert<C: GenericClient>(client: &C, auction: &Auction) -> Result<()> {
    client
        .execute(
            "INSERT INTO auctions (
                id, created_at, updated_at, title, state, total_quantity, awarded_count,
                revenue, current_round, consecutive_empty_rounds, round_state, round_ends_at,
                ends_at, ended_at, end_reason, closing_token, closing_started_at, version, config
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)",
            &[
                &auction.id.0,
                &auction.created_at,
                &auction.updated_at,
                &auction.title,
                &state_str(auction.state),
                &auction.total_quantity,
                &auction.awarded_count,
                &auction.revenue,
                &auction.current_round,
                &auction.consecutive_empty_rounds,
                &auction.round_state.map(round_state_str),
                &auction.round_ends_at,
                &auction.ends_at,
                &auction.ended_at,
                &auction.end_reason.map(end_reason_str),
                &auction.closing_token,
                &auction.closing_started_at,
                &auction.version,
                &serde_json::to_value(auction.config).unwrap(),
            ],
        )
        .await?;
    Ok(())
}

pub async fn get<C: GenericClient>(client: &C, id: AuctionId) -> Result<Auction> {
    let row = client
        .query_opt("SELECT * FROM auctions WHERE id = $1", &[&id.0])
        .await?
        .ok_or_else(|| AuctionError::NotFound(format!("auction {id}")))?;
    Ok(row_to_auction(&row))
}

pub async fn list<C: GenericClient>(client: &C) -> Result<Vec<Auction>> {
    let rows = client
        .query("SELECT * FROM auctions ORDER BY created_at DESC", &[])
        .await?;
    Ok(rows.iter().map(row_to_auction).collect())
}

/// `start` (§4.5): draft -> running, predicated on current state `draft`.
pub async fn start<C: GenericClient>(
    client: &C,
    id: AuctionId,
    round_ends_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Auction> {
    let row = client
        .query_opt(
            "UPDATE auctions SET
                state = 'running', current_round = 1, round_state = 'open',
                round_ends_at = $2, ends_at = $3, version = version + 1, updated_at = $4
             WHERE id = $1 AND state = 'draft'
             RETURNING *",
            &[&id.0, &round_ends_at, &ends_at, &now],
        )
        .await?
        .ok_or(AuctionError::NotStartable)?;
    Ok(row_to_auction(&row))
}

/// `cancel` (§4.5): draft|running -> cancelled.
pub async fn cancel<C: GenericClient>(client: &C, id: AuctionId, now: DateTime<Utc>) -> Result<Auction> {
    let row = client
        .query_opt(
            "UPDATE auctions SET
                state = 'cancelled', round_state = NULL, round_ends_at = NULL,
                closing_token = NULL, closing_started_at = NULL, end_reason = 'cancelled',
                ended_at = $2, version = version + 1, updated_at = $2
             WHERE id = $1 AND state IN ('draft', 'running')
             RETURNING *",
            &[&id.0, &now],
        )
        .await?
        .ok_or(AuctionError::NotCancellable)?;
    Ok(row_to_auction(&row))
}

/// Anti-snipe extension (§4.3 step 6): extends `round_ends_at` to
/// `max(current, candidate)`, clamped to `ends_at` when set, via a
/// store-level maximum-merge so concurrent placers only ever extend.
pub async fn extend_round_if_needed<C: GenericClient>(
    client: &C,
    id: AuctionId,
    candidate: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    require_one(
        client
            .execute(
                "UPDATE auctions SET
                    round_ends_at = LEAST(GREATEST(round_ends_at, $2), COALESCE(ends_at, $2)),
                    version = version + 1, updated_at = $3
                 WHERE id = $1",
                &[&id.0, &candidate, &now],
            )
            .await?,
        "anti-snipe extension",
    )
}

/// Bumps `version`/`updated_at` with no other change, used after a bid or
/// withdrawal that did not trigger an anti-snipe extension.
pub async fn touch<C: GenericClient>(client: &C, id: AuctionId, now: DateTime<Utc>) -> Result<()> {
    require_one(
        client
            .execute(
                "UPDATE auctions SET version = version + 1, updated_at = $2 WHERE id = $1",
                &[&id.0, &now],
            )
            .await?,
        "auction touch",
    )
}

/// §4.6.2(b): find up to `limit` auctions whose round or auction deadline is
/// due, with `grace` already subtracted from `now` by the caller.
pub async fn find_due_open<C: GenericClient>(
    client: &C,
    due_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<AuctionId>> {
    let rows = client
        .query(
            "SELECT id FROM auctions
             WHERE state = 'running' AND round_state = 'open'
               AND (round_ends_at <= $1 OR ends_at <= $1)
             LIMIT $2",
            &[&due_before, &limit],
        )
        .await?;
    Ok(rows.iter().map(|r| AuctionId(r.get(0))).collect())
}

/// §4.6.2(a): find up to `limit` auctions stuck mid-close with a surviving
/// `closingToken`, for crash recovery.
pub async fn find_interrupted_closings<C: GenericClient>(client: &C, limit: i64) -> Result<Vec<AuctionId>> {
    let rows = client
        .query(
            "SELECT id FROM auctions
             WHERE state = 'running' AND round_state = 'closing' AND closing_token IS NOT NULL
             LIMIT $1",
            &[&limit],
        )
        .await?;
    Ok(rows.iter().map(|r| AuctionId(r.get(0))).collect())
}

/// §4.6.2(b): atomic CAS of one due `open` auction into `closing`, fencing
/// settlement on a fresh `closingToken`. Returns `None` if another actor won
/// the race (0 rows updated).
pub async fn try_begin_closing<C: GenericClient>(
    client: &C,
    id: AuctionId,
    due_before: DateTime<Utc>,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<Auction>> {
    let row = client
        .query_opt(
            "UPDATE auctions SET
                round_state = 'closing', closing_token = $3, closing_started_at = $4,
                version = version + 1, updated_at = $4
             WHERE id = $1 AND state = 'running' AND round_state = 'open'
               AND (round_ends_at <= $2 OR ends_at <= $2)
             RETURNING *",
            &[&id.0, &due_before, &token, &now],
        )
        .await?;
    Ok(row.map(|r| row_to_auction(&r)))
}

/// §4.6.3 step 1: re-read the auction fenced on the settling worker's token.
/// Returns `None` if it no longer matches (another worker already settled
/// it, or the auction changed underneath).
pub async fn get_closing_with_token<C: GenericClient>(
    client: &C,
    id: AuctionId,
    token: &str,
) -> Result<Option<Auction>> {
    let row = client
        .query_opt(
            "SELECT * FROM auctions
             WHERE id = $1 AND state = 'running' AND round_state = 'closing' AND closing_token = $2",
            &[&id.0, &token],
        )
        .await?;
    Ok(row.map(|r| row_to_auction(&r)))
}

/// §4.6.3 step 9: roll to the next round.
#[allow(clippy::too_many_arguments)]
pub async fn roll_next_round<C: GenericClient>(
    client: &C,
    id: AuctionId,
    awarded_count: i32,
    revenue: i64,
    consecutive_empty_rounds: i32,
    round_ends_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    require_one(
        client
            .execute(
                "UPDATE auctions SET
                    current_round = current_round + 1, round_state = 'open',
                    round_ends_at = $2, closing_token = NULL, closing_started_at = NULL,
                    awarded_count = $3, revenue = $4, consecutive_empty_rounds = $5,
                    version = version + 1, updated_at = $6
                 WHERE id = $1",
                &[&id.0, &round_ends_at, &awarded_count, &revenue, &consecutive_empty_rounds, &now],
            )
            .await?,
        "roll to next round",
    )
}

/// §4.6.3 step 8: end the auction at the close of a settling round.
pub async fn end_auction<C: GenericClient>(
    client: &C,
    id: AuctionId,
    awarded_count: i32,
    revenue: i64,
    end_reason: EndReason,
    now: DateTime<Utc>,
) -> Result<()> {
    require_one(
        client
            .execute(
                "UPDATE auctions SET
                    state = 'ended', ended_at = $2, end_reason = $3,
                    awarded_count = $4, revenue = $5,
                    round_state = NULL, round_ends_at = NULL,
                    closing_token = NULL, closing_started_at = NULL,
                    version = version + 1, updated_at = $2
                 WHERE id = $1",
                &[&id.0, &now, &end_reason_str(end_reason), &awarded_count, &revenue],
            )
            .await?,
        "end auction",
    )
}
