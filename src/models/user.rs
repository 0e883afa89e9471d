use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UserId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub available: i64,
    pub reserved: i64,
    pub spent: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub balance: Balance,
    pub total_topups: i64,
}

impl User {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            created_at: now,
            balance: Balance::default(),
            total_topups: 0,
        }
    }
}
