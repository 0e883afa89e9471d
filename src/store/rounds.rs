use tokio_postgres::GenericClient;

use crate::errors::Result;
use crate::models::{AuctionId, Round, RoundId, RoundWinner};

fn row_to_round(row: &tokio_postgres::Row) -> Round {
    let winners: serde_json::Value = row.get("winners");
    Round {
        id: RoundId(row.get("id")),
        auction_id: AuctionId(row.get("auction_id")),
        round_number: row.get("round_number"),
        ended_at: row.get("ended_at"),
        clearing_price: row.get("clearing_price"),
        winners: serde_json::from_value::<Vec<RoundWinner>>(winners).expect("winners column is valid json"),
    }
}

/// Inserts the settled round record. The unique `(auction_id, round_number)`
/// index is the commit oracle for settlement idempotency (SPEC_FULL §4.6.3
/// step 2): a duplicate-key error here means another worker already
/// committed this round, and the caller treats it as a no-op retry signal
/// rather than an error.
pub async fn insert_if_absent<C: GenericClient>(client: &C, round: &Round) -> Result<bool> {
    let outcome = client
        .execute(
            "INSERT INTO rounds (id, auction_id, round_number, ended_at, clearing_price, winners)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (auction_id, round_number) DO NOTHING",
            &[
                &round.id.0,
                &round.auction_id.0,
                &round.round_number,
                &round.ended_at,
                &round.clearing_price,
                &serde_json::to_value(&round.winners).unwrap(),
            ],
        )
        .await?;
    Ok(outcome == 1)
}

pub async fn get<C: GenericClient>(client: &C, auction_id: AuctionId, round_number: i32) -> Result<Option<Round>> {
    let row = client
        .query_opt(
            "SELECT * FROM rounds WHERE auction_id = $1 AND round_number = $2",
            &[&auction_id.0, &round_number],
        )
        .await?;
    Ok(row.map(|r| row_to_round(&r)))
}

pub async fn list_by_auction<C: GenericClient>(client: &C, auction_id: AuctionId) -> Result<Vec<Round>> {
    let rows = client
        .query(
            "SELECT * FROM rounds WHERE auction_id = $1 ORDER BY round_number ASC",
            &[&auction_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_round).collect())
}
