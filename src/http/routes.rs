//! Axum handlers implementing the §6 HTTP table, plus the §4.10
//! bot-simulator routes (explicitly out-of-table, justified inline below).

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::errors::{AuctionError, Result};
use crate::http::dto::*;
use crate::models::{AuctionId, UserId};
use crate::register::Register;

pub fn router(register: Arc<Register>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/users", post(create_user))
        .route("/api/users/:id", get(get_user))
        .route("/api/users/:id/topup", post(topup))
        .route("/api/users/:id/ledger", get(user_ledger))
        .route("/api/auctions", post(create_auction).get(list_auctions))
        .route("/api/auctions/:id", get(get_auction))
        .route("/api/auctions/:id/start", post(start_auction))
        .route("/api/auctions/:id/cancel", post(cancel_auction))
        .route("/api/auctions/:id/snapshot", get(auction_snapshot))
        .route("/api/auctions/:id/bids", post(place_bid))
        .route("/api/auctions/:id/withdraw", post(withdraw_bid))
        .route("/api/auctions/:id/audit", get(auction_audit))
        .route("/api/audit", get(global_audit))
        .route("/api/auctions/:id/bots", post(start_bots))
        .route("/api/auctions/:id/bots/stop", post(stop_bots))
        .with_state(register)
}

fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.parse().map_err(|_| AuctionError::InvalidId(format!("invalid {} id: {}", what, raw)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn create_user(State(register): State<Arc<Register>>) -> Result<Json<UserResponse>> {
    let user = crate::bidding::create_user(&register.store, Utc::now()).await?;
    Ok(Json(UserResponse {
        id: user.id.to_string(),
        balance: user.balance,
    }))
}

async fn get_user(State(register): State<Arc<Register>>, Path(id): Path<String>) -> Result<Json<UserDetailResponse>> {
    let user_id: UserId = parse_id(&id, "user")?;
    let user = crate::bidding::get_user(&register.store, user_id).await?;
    Ok(Json(UserDetailResponse {
        id: user.id.to_string(),
        balance: user.balance,
        total_topups: user.total_topups,
    }))
}

/// §6 table, §2 component 2: a user's full append-only ledger.
async fn user_ledger(
    State(register): State<Arc<Register>>,
    Path(id): Path<String>,
) -> Result<Json<LedgerListResponse>> {
    let user_id: UserId = parse_id(&id, "user")?;
    let client = register.store.client().await?;
    let entries = crate::store::ledger::list_by_user(&client, user_id).await?;
    Ok(Json(LedgerListResponse { entries }))
}

async fn topup(
    State(register): State<Arc<Register>>,
    Path(id): Path<String>,
    Json(body): Json<TopupRequest>,
) -> Result<Json<UserResponse>> {
    let user_id: UserId = parse_id(&id, "user")?;
    let user = crate::bidding::topup(&register.store, user_id, body.amount, Utc::now()).await?;
    Ok(Json(UserResponse {
        id: user.id.to_string(),
        balance: user.balance,
    }))
}

async fn create_auction(
    State(register): State<Arc<Register>>,
    Json(body): Json<CreateAuctionRequest>,
) -> Result<Json<AuctionCreatedResponse>> {
    let auction = crate::bidding::create_auction(&register.store, body.title, body.total_quantity, body.config, Utc::now()).await?;
    Ok(Json(AuctionCreatedResponse {
        id: auction.id.to_string(),
        auction,
    }))
}

async fn list_auctions(State(register): State<Arc<Register>>) -> Result<Json<AuctionListResponse>> {
    let auctions = crate::bidding::list_auctions(&register.store).await?;
    Ok(Json(AuctionListResponse { auctions }))
}

async fn get_auction(State(register): State<Arc<Register>>, Path(id): Path<String>) -> Result<Json<AuctionResponse>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    let auction = crate::bidding::get_auction(&register.store, auction_id).await?;
    Ok(Json(AuctionResponse { auction }))
}

async fn start_auction(State(register): State<Arc<Register>>, Path(id): Path<String>) -> Result<Json<AuctionResponse>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    let auction = crate::bidding::start_auction(&register.store, auction_id, Utc::now()).await?;
    Ok(Json(AuctionResponse { auction }))
}

async fn cancel_auction(State(register): State<Arc<Register>>, Path(id): Path<String>) -> Result<Json<AuctionResponse>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    let auction = crate::bidding::cancel_auction(&register.store, auction_id, Utc::now()).await?;
    Ok(Json(AuctionResponse { auction }))
}

async fn auction_snapshot(
    State(register): State<Arc<Register>>,
    Path(id): Path<String>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Json<crate::snapshot::Snapshot>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    let user_id = query.user_id.map(|raw| parse_id(&raw, "user")).transpose()?;
    let snapshot = crate::snapshot::build(&register.store, auction_id, user_id).await?;
    Ok(Json(snapshot))
}

async fn place_bid(
    State(register): State<Arc<Register>>,
    Path(id): Path<String>,
    Json(body): Json<PlaceBidRequest>,
) -> Result<Json<PlaceBidResponse>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    let user_id: UserId = parse_id(&body.user_id, "user")?;
    let (auction, bid) = crate::bidding::place_bid(&register.store, auction_id, user_id, body.amount, Utc::now()).await?;
    Ok(Json(PlaceBidResponse { auction, bid }))
}

async fn withdraw_bid(
    State(register): State<Arc<Register>>,
    Path(id): Path<String>,
    Json(body): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    let user_id: UserId = parse_id(&body.user_id, "user")?;
    let bid = crate::bidding::withdraw_bid(&register.store, auction_id, user_id, Utc::now()).await?;
    Ok(Json(WithdrawResponse { bid }))
}

async fn auction_audit(
    State(register): State<Arc<Register>>,
    Path(id): Path<String>,
) -> Result<Json<crate::audit::AuctionAudit>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    let audit = crate::audit::auction_audit(&register.store, auction_id).await?;
    Ok(Json(audit))
}

async fn global_audit(State(register): State<Arc<Register>>) -> Result<Json<crate::audit::GlobalAudit>> {
    let audit = crate::audit::global_audit(&register.store).await?;
    Ok(Json(audit))
}

/// SPEC_FULL §4.10: peripheral demo/testing knob, not part of the §6 table.
async fn start_bots(
    State(register): State<Arc<Register>>,
    Path(id): Path<String>,
    Json(body): Json<BotStartRequest>,
) -> Result<Json<BotStartResponse>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    register.bots.start(register.store.clone(), auction_id, body.bot_count).await?;
    Ok(Json(BotStartResponse { started: true }))
}

async fn stop_bots(State(register): State<Arc<Register>>, Path(id): Path<String>) -> Result<Json<BotStartResponse>> {
    let auction_id: AuctionId = parse_id(&id, "auction")?;
    register.bots.stop(auction_id);
    Ok(Json(BotStartResponse { started: false }))
}
