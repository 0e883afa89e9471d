//! Read-only auction snapshot (SPEC_FULL §4.6.4). Best-effort: not fenced
//! against concurrent engine mutation, may race by up to one tick.

use chrono::Utc;
use serde::Serialize;

use crate::errors::Result;
use crate::models::bid::ranking_key;
use crate::models::{Auction, AuctionId, Bid, Round, UserId};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub auction: Auction,
    pub time_remaining_ms: Option<i64>,
    pub remaining_quantity: i32,
    pub leaderboard: Vec<Bid>,
    pub caller_bid: Option<Bid>,
    pub estimated_clearing_price: Option<i64>,
    pub recent_rounds: Vec<Round>,
}

const LEADERBOARD_DISPLAY_LIMIT: usize = 20;

pub async fn build(store: &Store, auction_id: AuctionId, caller: Option<UserId>) -> Result<Snapshot> {
    let client = store.client().await?;
    let auction = crate::store::auctions::get(&client, auction_id).await?;
    let now = Utc::now();

    let time_remaining_ms = if auction.is_open_for_bids(now) {
        auction.round_ends_at.map(|ends| (ends - now).num_milliseconds().max(0))
    } else {
        None
    };

    let mut active = crate::store::bids::list_active_by_auction(&client, auction_id).await?;
    active.sort_by(|a, b| ranking_key(a).cmp(&ranking_key(b)));

    let k = auction.config.winners_per_round.min(auction.remaining_quantity()) as usize;
    let estimated_clearing_price = if active.len() >= k && k > 0 {
        active.get(k - 1).map(|b| b.amount)
    } else {
        None
    };

    let caller_bid = match caller {
        Some(user_id) => crate::store::bids::get_by_auction_and_user(&client, auction_id, user_id).await?,
        None => None,
    };

    let leaderboard = active.into_iter().take(LEADERBOARD_DISPLAY_LIMIT).collect();

    let mut recent_rounds = crate::store::rounds::list_by_auction(&client, auction_id).await?;
    if recent_rounds.len() > 5 {
        recent_rounds = recent_rounds.split_off(recent_rounds.len() - 5);
    }

    Ok(Snapshot {
        auction: auction.clone(),
        time_remaining_ms,
        remaining_quantity: auction.remaining_quantity(),
        leaderboard,
        caller_bid,
        estimated_clearing_price,
        recent_rounds,
    })
}
