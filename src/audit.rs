//! Financial invariant checks (SPEC_FULL §4.7, properties P1–P6). Read-only;
//! never mutates state.

use serde::Serialize;

use crate::errors::Result;
use crate::models::{AuctionId, LedgerEntryType};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAudit {
    pub money_conservation_ok: bool,
    pub reserved_matches_active_bids_ok: bool,
    pub negative_balances_ok: bool,
}

/// P1: `totalTopups = available + reserved + spent` summed over all users.
pub async fn global_audit(store: &Store) -> Result<GlobalAudit> {
    let client = store.client().await?;
    let (total_topups, available, reserved, spent, negative_count) =
        crate::store::users::global_conservation_sums(&client).await?;

    let reserved_active = {
        let auctions = crate::store::auctions::list(&client).await?;
        let mut sum = 0i64;
        for auction in &auctions {
            let active = crate::store::bids::list_active_by_auction(&client, auction.id).await?;
            sum += active.iter().map(|b| b.amount).sum::<i64>();
        }
        sum
    };

    Ok(GlobalAudit {
        money_conservation_ok: total_topups == available + reserved + spent,
        reserved_matches_active_bids_ok: reserved == reserved_active,
        negative_balances_ok: negative_count == 0,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionAudit {
    pub revenue_matches_spend_ledger_ok: bool,
    pub awarded_count_matches_won_bids_ok: bool,
    pub gift_serials_unique_and_dense_ok: bool,
    pub settlement_paid_matches_spend_ledger_ok: bool,
    pub settlement_refunded_matches_refund_ledger_ok: bool,
    pub no_active_bids_when_finished_ok: bool,
    pub reserve_conservation_ok: bool,
}

/// §4.7 per-auction checks (properties P2–P6).
pub async fn auction_audit(store: &Store, auction_id: AuctionId) -> Result<AuctionAudit> {
    let client = store.client().await?;
    let auction = crate::store::auctions::get(&client, auction_id).await?;
    let ledger = crate::store::ledger::list_by_auction(&client, auction_id).await?;

    let spend_sum: i64 = ledger.iter().filter(|e| e.entry_type == LedgerEntryType::Spend).map(|e| e.amount).sum();
    let refund_sum: i64 = ledger.iter().filter(|e| e.entry_type == LedgerEntryType::Refund).map(|e| e.amount).sum();
    let reserve_sum: i64 = ledger.iter().filter(|e| e.entry_type == LedgerEntryType::Reserve).map(|e| e.amount).sum();
    let unreserve_sum: i64 = ledger.iter().filter(|e| e.entry_type == LedgerEntryType::Unreserve).map(|e| e.amount).sum();

    let rounds = crate::store::rounds::list_by_auction(&client, auction_id).await?;
    let won_bids: Vec<_> = {
        let mut ids = Vec::new();
        for round in &rounds {
            for winner in &round.winners {
                ids.push(winner.gift_serial);
            }
        }
        ids
    };
    let mut serials = won_bids.clone();
    serials.sort_unstable();
    let serials_unique = {
        let mut dedup = serials.clone();
        dedup.dedup();
        dedup.len() == serials.len()
    };
    let serials_dense = serials.is_empty()
        || (serials.first() == Some(&1) && serials.last() == Some(&(serials.len() as i32)));

    let paid_sum: i64 = rounds.iter().flat_map(|r| r.winners.iter()).map(|w| w.paid).sum();
    let refunded_sum: i64 = rounds.iter().flat_map(|r| r.winners.iter()).map(|w| w.refunded).sum();

    let active_bids = crate::store::bids::list_active_by_auction(&client, auction_id).await?;
    let finished = matches!(
        auction.state,
        crate::models::AuctionState::Ended | crate::models::AuctionState::Cancelled
    );
    let active_amount_sum: i64 = active_bids.iter().map(|b| b.amount).sum();

    Ok(AuctionAudit {
        revenue_matches_spend_ledger_ok: auction.revenue == spend_sum,
        awarded_count_matches_won_bids_ok: auction.awarded_count as usize == won_bids.len(),
        gift_serials_unique_and_dense_ok: serials_unique && serials_dense,
        settlement_paid_matches_spend_ledger_ok: paid_sum == spend_sum,
        settlement_refunded_matches_refund_ledger_ok: refunded_sum == refund_sum,
        no_active_bids_when_finished_ok: !finished || active_bids.is_empty(),
        reserve_conservation_ok: reserve_sum - unreserve_sum - spend_sum - refund_sum == active_amount_sum,
    })
}
