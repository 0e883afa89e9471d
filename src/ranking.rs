//! Deterministic total order over active bids (SPEC_FULL §4.1).

use crate::models::bid::ranking_key;
use crate::models::Bid;

/// Returns the first `min(n, bids.len())` bids under the ranking order and,
/// if non-empty, the clearing price (the amount of the last returned bid).
/// `n <= 0` returns an empty winner list and a clearing price of 0.
pub fn select_winners(mut bids: Vec<Bid>, n: i32) -> (Vec<Bid>, i64) {
    if n <= 0 {
        return (Vec::new(), 0);
    }

    bids.sort_by(|a, b| ranking_key(a).cmp(&ranking_key(b)));
    bids.truncate(n as usize);

    let clearing_price = bids.last().map(|b| b.amount).unwrap_or(0);
    (bids, clearing_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn bid_at(amount: i64, offset_ms: i64, user_byte: u8) -> Bid {
        let now = Utc::now();
        let mut user_bytes = [0u8; 16];
        user_bytes[15] = user_byte;
        Bid {
            user_id: Uuid::from_bytes(user_bytes).into(),
            last_bid_at: now + Duration::milliseconds(offset_ms),
            ..Bid::new(
                crate::models::AuctionId::new(),
                Uuid::from_bytes(user_bytes).into(),
                amount,
                now,
            )
        }
    }

    #[test]
    fn orders_by_amount_descending() {
        let bids = vec![bid_at(90, 0, 1), bid_at(100, 0, 2), bid_at(80, 0, 3)];
        let (winners, price) = select_winners(bids, 3);
        assert_eq!(winners.iter().map(|b| b.amount).collect::<Vec<_>>(), vec![100, 90, 80]);
        assert_eq!(price, 80);
    }

    #[test]
    fn n_less_or_equal_zero_returns_empty() {
        let bids = vec![bid_at(100, 0, 1)];
        let (winners, price) = select_winners(bids, 0);
        assert!(winners.is_empty());
        assert_eq!(price, 0);
    }

    #[test]
    fn ties_break_on_earlier_last_bid_then_lower_user_id() {
        // S4: three bids of 100 with timestamps t, t, t-1 and user ids
        // ranking as "b","a","c" by byte value -> winners for k=3 are
        // [c, a, b]; for k=2, [c, a], clearing price 100.
        let mut c = bid_at(100, -1, 3); // earliest lastBidAt
        c.last_bid_at = Utc::now() - Duration::milliseconds(1);
        let mut a = bid_at(100, 0, 1);
        a.last_bid_at = Utc::now();
        let mut b = bid_at(100, 0, 2);
        b.last_bid_at = a.last_bid_at;

        let bids = vec![b.clone(), a.clone(), c.clone()];
        let (winners, price) = select_winners(bids.clone(), 3);
        assert_eq!(winners.len(), 3);
        assert_eq!(price, 100);
        assert_eq!(winners[0].user_id, c.user_id);

        let (winners2, price2) = select_winners(bids, 2);
        assert_eq!(winners2.len(), 2);
        assert_eq!(price2, 100);
        assert_eq!(winners2[0].user_id, c.user_id);
    }
}
