//! User, bid, and auction lifecycle operations (SPEC_FULL §4.2–§4.5):
//! everything a request handler calls directly, each wrapped in one
//! `Store::with_txn` retry loop.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::errors::{AuctionError, Result};
use crate::models::{
    Auction, AuctionConfig, AuctionId, Bid, BidId, BidStatus, LedgerEntryType, PartialAuctionConfig, User, UserId,
};
use crate::store::Store;

pub async fn create_user(store: &Store, now: DateTime<Utc>) -> Result<User> {
    store
        .with_txn(move |txn| {
            Box::pin(async move {
                let user = User::new(now);
                crate::store::users::insert(txn, &user).await?;
                Ok(user)
            })
        })
        .await
}

pub async fn get_user(store: &Store, user_id: UserId) -> Result<User> {
    let client = store.client().await?;
    crate::store::users::get(&client, user_id).await
}

/// `topup` (§4.2).
pub async fn topup(store: &Store, user_id: UserId, amount: i64, now: DateTime<Utc>) -> Result<User> {
    if amount <= 0 {
        return Err(AuctionError::InvalidInput("topup amount must be positive".into()));
    }
    store
        .with_txn(move |txn| {
            Box::pin(async move {
                let user = crate::store::users::apply_topup(txn, user_id, amount).await?;
                let entry = crate::models::LedgerEntry::new(user_id, LedgerEntryType::Topup, amount, None, None, now);
                crate::store::ledger::append(txn, &entry).await?;
                Ok(user)
            })
        })
        .await
}

pub async fn create_auction(
    store: &Store,
    title: String,
    total_quantity: i32,
    requested_config: PartialAuctionConfig,
    now: DateTime<Utc>,
) -> Result<Auction> {
    if total_quantity <= 0 {
        return Err(AuctionError::InvalidInput("totalQuantity must be positive".into()));
    }
    let config = AuctionConfig::clamped(requested_config, total_quantity);
    store
        .with_txn(move |txn| {
            let title = title.clone();
            Box::pin(async move {
                let auction = Auction::new(title, total_quantity, config, now);
                crate::store::auctions::insert(txn, &auction).await?;
                Ok(auction)
            })
        })
        .await
}

pub async fn get_auction(store: &Store, auction_id: AuctionId) -> Result<Auction> {
    let client = store.client().await?;
    crate::store::auctions::get(&client, auction_id).await
}

pub async fn list_auctions(store: &Store) -> Result<Vec<Auction>> {
    let client = store.client().await?;
    crate::store::auctions::list(&client).await
}

/// `start` (§4.5).
pub async fn start_auction(store: &Store, auction_id: AuctionId, now: DateTime<Utc>) -> Result<Auction> {
    store
        .with_txn(move |txn| {
            Box::pin(async move {
                let auction = crate::store::auctions::get(txn, auction_id).await?;
                let ends_at = if auction.config.max_duration_ms > 0 {
                    Some(now + chrono::Duration::milliseconds(auction.config.max_duration_ms))
                } else {
                    None
                };
                let candidate_round_end = now + chrono::Duration::milliseconds(auction.config.round_duration_ms);
                let round_ends_at = match ends_at {
                    Some(end) => candidate_round_end.min(end),
                    None => candidate_round_end,
                };
                crate::store::auctions::start(txn, auction_id, round_ends_at, ends_at, now).await
            })
        })
        .await
}

/// `cancel` (§4.5): flips the auction, then refunds every active bid.
pub async fn cancel_auction(store: &Store, auction_id: AuctionId, now: DateTime<Utc>) -> Result<Auction> {
    store
        .with_txn(move |txn| {
            Box::pin(async move {
                let auction = crate::store::auctions::cancel(txn, auction_id, now).await?;
                let active_bids = crate::store::bids::list_active_by_auction(txn, auction_id).await?;
                for bid in active_bids {
                    crate::store::bids::withdraw(txn, bid.id, now).await?;
                    crate::store::users::unreserve(txn, bid.user_id, bid.amount).await?;
                    let entry = crate::models::LedgerEntry::new(
                        bid.user_id,
                        LedgerEntryType::Unreserve,
                        bid.amount,
                        Some(auction_id),
                        Some(json!({"bidId": bid.id, "reason": "cancelled"})),
                        now,
                    );
                    crate::store::ledger::append(txn, &entry).await?;
                }
                Ok(auction)
            })
        })
        .await
}

/// `placeBid`/`raiseBid` (§4.3).
pub async fn place_bid(
    store: &Store,
    auction_id: AuctionId,
    user_id: UserId,
    new_amount: i64,
    now: DateTime<Utc>,
) -> Result<(Auction, Bid)> {
    if new_amount <= 0 {
        return Err(AuctionError::InvalidInput("bid amount must be positive".into()));
    }
    let result = store
        .with_txn(move |txn| {
            Box::pin(async move {
                let auction = crate::store::auctions::get(txn, auction_id).await?;
                ensure_open_for_bids(&auction, now)?;

                let existing = crate::store::bids::get_by_auction_and_user(txn, auction_id, user_id).await?;
                if let Some(ref bid) = existing {
                    if matches!(bid.status, BidStatus::Won | BidStatus::Lost) {
                        return Err(AuctionError::BidNotActive);
                    }
                }
                let old_amount = match &existing {
                    Some(bid) if bid.status == BidStatus::Active => bid.amount,
                    _ => 0,
                };
                if new_amount <= old_amount {
                    return Err(AuctionError::InvalidInput("newAmount must exceed the current bid".into()));
                }
                let delta = new_amount - old_amount;

                crate::store::users::try_reserve(txn, user_id, delta)
                    .await?
                    .ok_or(AuctionError::InsufficientFunds)?;

                let bid = match existing {
                    None => {
                        let bid = Bid::new(auction_id, user_id, new_amount, now);
                        crate::store::bids::insert(txn, &bid).await?;
                        bid
                    }
                    Some(bid) => crate::store::bids::raise(txn, bid.id, new_amount, now)
                        .await?
                        .ok_or(AuctionError::BidNotActive)?,
                };

                let entry = crate::models::LedgerEntry::new(
                    user_id,
                    LedgerEntryType::Reserve,
                    delta,
                    Some(auction_id),
                    Some(json!({"bidId": bid.id})),
                    now,
                );
                crate::store::ledger::append(txn, &entry).await?;

                let round_ends_at = auction.round_ends_at.expect("checked open_for_bids");
                let remaining_ms = (round_ends_at - now).num_milliseconds().max(0);
                if remaining_ms <= auction.config.anti_snipe_window_ms {
                    let mut candidate = now + chrono::Duration::milliseconds(auction.config.anti_snipe_extend_ms);
                    if let Some(ends_at) = auction.ends_at {
                        candidate = candidate.min(ends_at);
                    }
                    crate::store::auctions::extend_round_if_needed(txn, auction_id, candidate, now).await?;
                } else {
                    crate::store::auctions::touch(txn, auction_id, now).await?;
                }

                let updated_auction = crate::store::auctions::get(txn, auction_id).await?;
                Ok((updated_auction, bid))
            })
        })
        .await;
    if result.is_ok() {
        crate::metrics::BIDS_PLACED_TOTAL.inc();
    }
    result
}

/// `withdrawBid` (§4.4).
pub async fn withdraw_bid(store: &Store, auction_id: AuctionId, user_id: UserId, now: DateTime<Utc>) -> Result<Bid> {
    store
        .with_txn(move |txn| {
            Box::pin(async move {
                let auction = crate::store::auctions::get(txn, auction_id).await?;
                ensure_open_for_bids(&auction, now)?;

                let bid = crate::store::bids::get_by_auction_and_user(txn, auction_id, user_id)
                    .await?
                    .ok_or(AuctionError::BidNotActive)?;
                if bid.status != BidStatus::Active {
                    return Err(AuctionError::BidNotActive);
                }

                let withdrawn = crate::store::bids::withdraw(txn, bid.id, now)
                    .await?
                    .ok_or(AuctionError::BidNotActive)?;
                crate::store::users::unreserve(txn, user_id, bid.amount).await?;
                let entry = crate::models::LedgerEntry::new(
                    user_id,
                    LedgerEntryType::Unreserve,
                    bid.amount,
                    Some(auction_id),
                    Some(json!({"bidId": bid.id})),
                    now,
                );
                crate::store::ledger::append(txn, &entry).await?;
                crate::store::auctions::touch(txn, auction_id, now).await?;
                Ok(withdrawn)
            })
        })
        .await
}

pub async fn get_bid(store: &Store, bid_id: BidId) -> Result<Bid> {
    let client = store.client().await?;
    crate::store::bids::get(&client, bid_id).await
}

fn ensure_open_for_bids(auction: &Auction, now: DateTime<Utc>) -> Result<()> {
    use crate::models::{AuctionState, RoundState};
    if auction.state != AuctionState::Running || auction.round_state != Some(RoundState::Open) || auction.round_ends_at.is_none() {
        return Err(AuctionError::NotOpen);
    }
    if now >= auction.round_ends_at.unwrap() {
        return Err(AuctionError::RoundEnded);
    }
    Ok(())
}
