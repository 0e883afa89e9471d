use chrono::{DateTime, Utc};

pub const ENGINE_LOCK_ID: &str = "auctionEngine";

#[derive(Debug, Clone)]
pub struct EngineLock {
    pub owner_id: String,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
