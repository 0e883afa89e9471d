//! The round engine: leader election plus the tick workflow that closes due
//! rounds and settles them (SPEC_FULL §4.6). Structured as one
//! `tokio::spawn`ed polling loop, the same shape as
//! `epoch_tracker::EpochTracker::run()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde_json::json;
use uuid::Uuid;

use crate::errors::{AuctionError, Result};
use crate::models::{AuctionId, EndReason, LedgerEntryType, RoundWinner};
use crate::ranking::select_winners;
use crate::store::Store;

const MAX_AUCTIONS_PER_TICK: i64 = 5;
const CLOSE_GRACE_MS: i64 = 250;

pub struct Engine {
    store: Arc<Store>,
    owner_id: String,
    poll_interval_ms: u64,
}

impl Engine {
    pub fn new(store: Arc<Store>, owner_id: String, poll_interval_ms: u64) -> Self {
        Self {
            store,
            owner_id,
            poll_interval_ms,
        }
    }

    fn lock_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.poll_interval_ms as i64 * 10).max(2_000))
    }

    /// Runs until `stopped` is set, the same cooperative-shutdown shape as
    /// `epoch_tracker`'s polling loop plus the teacher's signal handling.
    pub async fn run(self, stopped: Arc<AtomicBool>) {
        info!("round engine starting, owner_id={}", self.owner_id);
        let mut interval = tokio::time::interval(StdDuration::from_millis(self.poll_interval_ms));
        while !stopped.load(Ordering::SeqCst) {
            interval.tick().await;
            if stopped.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.tick().await {
                error!("engine tick failed: {}", e);
                crate::metrics::ENGINE_TICK_ERRORS_TOTAL.inc();
            }
        }
        info!("round engine stopped");
    }

    async fn tick(&self) -> Result<()> {
        let now = Utc::now();
        let client = self.store.client().await?;
        let became_leader =
            crate::store::locks::try_acquire(&client, &self.owner_id, self.lock_ttl(), now).await?;
        if !became_leader {
            debug!("not leader this tick");
            return Ok(());
        }

        crate::metrics::refresh_store_gauges(&self.store).await;

        let due_before = now - chrono::Duration::milliseconds(CLOSE_GRACE_MS);

        let interrupted = {
            let client = self.store.client().await?;
            crate::store::auctions::find_interrupted_closings(&client, MAX_AUCTIONS_PER_TICK).await?
        };
        for auction_id in interrupted {
            if let Err(e) = self.resume_closing(auction_id).await {
                error!("failed to resume closing auction {}: {}", auction_id, e);
            }
        }

        let due = {
            let client = self.store.client().await?;
            crate::store::auctions::find_due_open(&client, due_before, MAX_AUCTIONS_PER_TICK).await?
        };
        for auction_id in due {
            if let Err(e) = self.begin_and_settle(auction_id, due_before, now).await {
                error!("failed to settle auction {}: {}", auction_id, e);
            }
        }

        Ok(())
    }

    async fn resume_closing(&self, auction_id: AuctionId) -> Result<()> {
        let token = {
            let client = self.store.client().await?;
            match crate::store::auctions::get(&client, auction_id).await {
                Ok(auction) => auction.closing_token,
                Err(AuctionError::NotFound(_)) => None,
                Err(e) => return Err(e),
            }
        };
        if let Some(token) = token {
            settle_round(&self.store, auction_id, &token).await?;
        }
        Ok(())
    }

    async fn begin_and_settle(&self, auction_id: AuctionId, due_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        let token = Uuid::new_v4().to_string();
        let locked = {
            let client = self.store.client().await?;
            crate::store::auctions::try_begin_closing(&client, auction_id, due_before, &token, now).await?
        };
        if locked.is_none() {
            return Ok(());
        }
        settle_round(&self.store, auction_id, &token).await
    }
}

/// §4.6.3: settle one closing round, fenced on `token`. Idempotent via the
/// `(auctionId, roundNumber)` unique index — a duplicate-key on the Round
/// insert means a previous attempt already committed this round.
async fn settle_round(store: &Store, auction_id: AuctionId, token: &str) -> Result<()> {
    let token = token.to_string();
    store
        .with_txn(move |txn| {
            let token = token.clone();
            Box::pin(async move {
                let auction = match crate::store::auctions::get_closing_with_token(txn, auction_id, &token).await? {
                    Some(a) => a,
                    None => return Ok(()),
                };

                let remaining = (auction.total_quantity - auction.awarded_count).max(0);
                let k = remaining.min(auction.config.winners_per_round);

                let (winners, clearing_price) = if k > 0 {
                    let active = crate::store::bids::list_active_by_auction(txn, auction_id).await?;
                    select_winners(active, k)
                } else {
                    (Vec::new(), 0)
                };

                let now = Utc::now();
                let round_winners: Vec<RoundWinner> = winners
                    .iter()
                    .enumerate()
                    .map(|(i, bid)| {
                        let paid = clearing_price;
                        let refunded = bid.amount - clearing_price;
                        RoundWinner {
                            user_id: bid.user_id,
                            amount: bid.amount,
                            gift_serial: auction.awarded_count + i as i32 + 1,
                            paid,
                            refunded,
                        }
                    })
                    .collect();

                let round = crate::models::Round {
                    id: crate::models::RoundId::new(),
                    auction_id,
                    round_number: auction.current_round,
                    ended_at: now,
                    clearing_price,
                    winners: round_winners.clone(),
                };
                let inserted = crate::store::rounds::insert_if_absent(txn, &round).await?;
                if !inserted {
                    // Another worker already settled this round; nothing left to do.
                    return Ok(());
                }
                crate::metrics::ROUNDS_SETTLED_TOTAL.inc();

                for (bid, winner) in winners.iter().zip(round_winners.iter()) {
                    let settlement = crate::models::Settlement {
                        won_round: auction.current_round,
                        gift_serial: winner.gift_serial,
                        clearing_price,
                        paid: winner.paid,
                        refunded: winner.refunded,
                        settled_at: now,
                    };
                    crate::store::bids::mark_won(txn, bid.id, settlement, now).await?;
                    crate::store::users::settle_winner(txn, bid.user_id, bid.amount, winner.paid, winner.refunded)
                        .await?;

                    let spend_entry = crate::models::LedgerEntry::new(
                        bid.user_id,
                        LedgerEntryType::Spend,
                        winner.paid,
                        Some(auction_id),
                        Some(json!({"bidId": bid.id, "round": auction.current_round, "giftSerial": winner.gift_serial})),
                        now,
                    );
                    crate::store::ledger::append(txn, &spend_entry).await?;
                    if winner.refunded > 0 {
                        let refund_entry = crate::models::LedgerEntry::new(
                            bid.user_id,
                            LedgerEntryType::Refund,
                            winner.refunded,
                            Some(auction_id),
                            Some(json!({"bidId": bid.id, "round": auction.current_round})),
                            now,
                        );
                        crate::store::ledger::append(txn, &refund_entry).await?;
                    }
                }

                let new_awarded = auction.awarded_count + winners.len() as i32;
                let new_revenue = auction.revenue + round_winners.iter().map(|w| w.paid).sum::<i64>();

                let sold_out = new_awarded >= auction.total_quantity;
                let forced_by_duration = auction.ends_at.map(|ea| now >= ea).unwrap_or(false);
                let empty_round = remaining > 0 && winners.is_empty();
                let new_consecutive_empty = if empty_round { auction.consecutive_empty_rounds + 1 } else { 0 };
                let forced_by_empty = empty_round
                    && auction.config.max_consecutive_empty_rounds > 0
                    && new_consecutive_empty >= auction.config.max_consecutive_empty_rounds;
                let should_end = sold_out || forced_by_duration || forced_by_empty;

                if should_end {
                    let end_reason = if sold_out {
                        EndReason::SoldOut
                    } else if forced_by_duration {
                        EndReason::MaxDuration
                    } else {
                        EndReason::EmptyRounds
                    };
                    crate::store::auctions::end_auction(txn, auction_id, new_awarded, new_revenue, end_reason, now)
                        .await?;

                    let losers = crate::store::bids::list_active_by_auction(txn, auction_id).await?;
                    for bid in losers {
                        crate::store::bids::mark_lost(txn, bid.id, now).await?;
                        crate::store::users::unreserve(txn, bid.user_id, bid.amount).await?;
                        let entry = crate::models::LedgerEntry::new(
                            bid.user_id,
                            LedgerEntryType::Unreserve,
                            bid.amount,
                            Some(auction_id),
                            Some(json!({"bidId": bid.id, "reason": "auctionEnded"})),
                            now,
                        );
                        crate::store::ledger::append(txn, &entry).await?;
                    }
                } else {
                    let candidate_round_end = now + chrono::Duration::milliseconds(auction.config.round_duration_ms);
                    let round_ends_at = match auction.ends_at {
                        Some(ends) => candidate_round_end.min(ends),
                        None => candidate_round_end,
                    };
                    crate::store::auctions::roll_next_round(
                        txn,
                        auction_id,
                        new_awarded,
                        new_revenue,
                        new_consecutive_empty,
                        round_ends_at,
                        now,
                    )
                    .await?;
                }

                Ok(())
            })
        })
        .await
}
