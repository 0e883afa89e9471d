use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AuctionId, RoundId, UserId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundWinner {
    pub user_id: UserId,
    pub amount: i64,
    pub gift_serial: i32,
    pub paid: i64,
    pub refunded: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: RoundId,
    pub auction_id: AuctionId,
    pub round_number: i32,
    pub ended_at: DateTime<Utc>,
    pub clearing_price: i64,
    pub winners: Vec<RoundWinner>,
}
