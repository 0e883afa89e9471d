//! Request/response bodies for the §6 HTTP table. Kept separate from the
//! domain models so wire shape can diverge from storage shape without
//! leaking `serde` attributes into the core types.

use serde::{Deserialize, Serialize};

use crate::models::{Auction, Balance, Bid, LedgerEntry, PartialAuctionConfig};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub balance: Balance,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailResponse {
    pub id: String,
    pub balance: Balance,
    pub total_topups: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct LedgerListResponse {
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionRequest {
    pub title: String,
    pub total_quantity: i32,
    #[serde(default)]
    pub config: PartialAuctionConfig,
}

#[derive(Debug, Serialize)]
pub struct AuctionResponse {
    pub auction: Auction,
}

#[derive(Debug, Serialize)]
pub struct AuctionCreatedResponse {
    pub id: String,
    pub auction: Auction,
}

#[derive(Debug, Serialize)]
pub struct AuctionListResponse {
    pub auctions: Vec<Auction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub user_id: String,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlaceBidResponse {
    pub auction: Auction,
    pub bid: Bid,
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub bid: Bid,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Body for the bot-simulator start route (SPEC_FULL §4.10), not part of
/// the §6 table proper — a peripheral demo/testing knob.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStartRequest {
    pub bot_count: u32,
}

#[derive(Debug, Serialize)]
pub struct BotStartResponse {
    pub started: bool,
}
