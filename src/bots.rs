//! Bot simulator (SPEC_FULL §4.10): a per-process registry of background
//! bidders, for manual testing and demos. Bots never bypass `placeBid`'s
//! validation — they drive the same entry point a real client would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, warn};
use rand::Rng;
use tokio::task::JoinHandle;

use crate::models::AuctionId;
use crate::store::Store;

struct BotGroup {
    stop: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Owned by `Register`, never a `static` (SPEC_FULL §9's injected-dependency
/// note applies here too). The handle map is a plain `Mutex`, never held
/// across an `.await`.
#[derive(Default)]
pub struct BotRegistry {
    groups: Mutex<HashMap<AuctionId, BotGroup>>,
}

const MIN_TICK_MS: u64 = 400;
const MAX_TICK_MS: u64 = 2_500;
const BOT_TOPUP_AMOUNT: i64 = 1_000_000;
const MAX_STEP_ABOVE_FLOOR: i64 = 50;

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, store: Arc<Store>, auction_id: AuctionId, bot_count: u32) -> crate::errors::Result<()> {
        self.stop_locked(auction_id);

        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks = Vec::with_capacity(bot_count as usize);

        for _ in 0..bot_count {
            let user = crate::bidding::create_user(&store, Utc::now()).await?;
            crate::bidding::topup(&store, user.id, BOT_TOPUP_AMOUNT, Utc::now()).await?;

            let store = store.clone();
            let stop = stop.clone();
            tasks.push(tokio::spawn(async move {
                run_bot(store, auction_id, user.id, stop).await;
            }));
        }

        self.groups.lock().unwrap().insert(auction_id, BotGroup { stop, tasks });
        Ok(())
    }

    pub fn stop(&self, auction_id: AuctionId) {
        self.stop_locked(auction_id);
    }

    fn stop_locked(&self, auction_id: AuctionId) {
        if let Some(group) = self.groups.lock().unwrap().remove(&auction_id) {
            group.stop.store(true, Ordering::SeqCst);
            for task in group.tasks {
                task.abort();
            }
        }
    }
}

async fn run_bot(store: Arc<Store>, auction_id: AuctionId, user_id: crate::models::UserId, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        let tick_ms = rand::thread_rng().gen_range(MIN_TICK_MS..=MAX_TICK_MS);
        tokio::time::sleep(std::time::Duration::from_millis(tick_ms)).await;
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let floor = match crate::bidding::get_auction(&store, auction_id).await {
            Ok(auction) if auction.is_open_for_bids(Utc::now()) => {
                let client = match store.client().await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("bot {} could not open a connection: {}", user_id, e);
                        continue;
                    }
                };
                match crate::store::bids::list_active_by_auction(&client, auction_id).await {
                    Ok(bids) => bids.iter().map(|b| b.amount).max().unwrap_or(0),
                    Err(_) => 0,
                }
            }
            Ok(_) => break,
            Err(_) => break,
        };

        let step = rand::thread_rng().gen_range(1..=MAX_STEP_ABOVE_FLOOR);
        let amount = floor + step;

        match crate::bidding::place_bid(&store, auction_id, user_id, amount, Utc::now()).await {
            Ok(_) => debug!("bot {} bid {} on auction {}", user_id, amount, auction_id),
            Err(crate::errors::AuctionError::RoundEnded) | Err(crate::errors::AuctionError::NotOpen) => break,
            Err(e) => debug!("bot {} bid failed: {}", user_id, e),
        }
    }
}
