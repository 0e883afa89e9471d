use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AuctionId, LedgerEntryId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerEntryType {
    Topup,
    Reserve,
    Unreserve,
    Spend,
    Refund,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub entry_type: LedgerEntryType,
    pub amount: i64,
    pub auction_id: Option<AuctionId>,
    pub meta: Option<serde_json::Value>,
}

impl LedgerEntry {
    pub fn new(
        user_id: UserId,
        entry_type: LedgerEntryType,
        amount: i64,
        auction_id: Option<AuctionId>,
        meta: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            created_at: now,
            user_id,
            entry_type,
            amount,
            auction_id,
            meta,
        }
    }
}
