use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AuctionId, BidId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BidStatus {
    Active,
    Won,
    Lost,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub won_round: i32,
    pub gift_serial: i32,
    pub clearing_price: i64,
    pub paid: i64,
    pub refunded: i64,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_bid_at: DateTime<Utc>,
    pub amount: i64,
    pub status: BidStatus,
    pub settlement: Option<Settlement>,
}

impl Bid {
    pub fn new(auction_id: AuctionId, user_id: UserId, amount: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: BidId::new(),
            auction_id,
            user_id,
            created_at: now,
            updated_at: now,
            last_bid_at: now,
            amount,
            status: BidStatus::Active,
            settlement: None,
        }
    }
}

/// The total order from SPEC_FULL §4.1: higher amount first, then earlier
/// `lastBidAt`, then lower `userId` lexicographically on its raw bytes.
pub fn ranking_key(bid: &Bid) -> (std::cmp::Reverse<i64>, DateTime<Utc>, [u8; 16]) {
    (
        std::cmp::Reverse(bid.amount),
        bid.last_bid_at,
        bid.user_id.ranking_key(),
    )
}
