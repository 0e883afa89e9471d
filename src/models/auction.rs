use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::AuctionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuctionState {
    Draft,
    Running,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundState {
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    SoldOut,
    MaxDuration,
    EmptyRounds,
    Cancelled,
}

/// Clamp ranges from SPEC_FULL §4.9 / §6. `max_wins_per_user` is accepted and
/// echoed back but never consulted by the engine (§9 open question).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionConfig {
    pub round_duration_ms: i64,
    pub winners_per_round: i32,
    pub anti_snipe_window_ms: i64,
    pub anti_snipe_extend_ms: i64,
    pub max_duration_ms: i64,
    pub max_consecutive_empty_rounds: i32,
    pub max_wins_per_user: i32,
}

impl AuctionConfig {
    pub const ROUND_DURATION_MS_RANGE: (i64, i64) = (5_000, 3_600_000);
    pub const ANTI_SNIPE_WINDOW_MS_RANGE: (i64, i64) = (0, 60_000);
    pub const ANTI_SNIPE_EXTEND_MS_RANGE: (i64, i64) = (0, 60_000);
    pub const MAX_DURATION_MS_RANGE: (i64, i64) = (0, 7 * 24 * 3_600_000);
    pub const MAX_CONSECUTIVE_EMPTY_ROUNDS_RANGE: (i32, i32) = (0, 10_000);

    pub fn defaults(total_quantity: i32) -> Self {
        Self {
            round_duration_ms: 60_000,
            winners_per_round: 10.min(total_quantity.max(1)),
            anti_snipe_window_ms: 10_000,
            anti_snipe_extend_ms: 10_000,
            max_duration_ms: 0,
            max_consecutive_empty_rounds: 3,
            max_wins_per_user: 1,
        }
    }

    /// Apply the §6 clamp rules on top of caller-supplied overrides, merged
    /// over the defaults for this `total_quantity`.
    pub fn clamped(requested: PartialAuctionConfig, total_quantity: i32) -> Self {
        let defaults = Self::defaults(total_quantity);

        let round_duration_ms = clamp_i64(
            requested.round_duration_ms.unwrap_or(defaults.round_duration_ms),
            Self::ROUND_DURATION_MS_RANGE,
        );
        let winners_per_round = clamp_i32(
            requested.winners_per_round.unwrap_or(defaults.winners_per_round),
            (1, total_quantity.max(1)),
        );
        let anti_snipe_window_ms = clamp_i64(
            requested.anti_snipe_window_ms.unwrap_or(defaults.anti_snipe_window_ms),
            Self::ANTI_SNIPE_WINDOW_MS_RANGE,
        );
        let anti_snipe_extend_ms = clamp_i64(
            requested.anti_snipe_extend_ms.unwrap_or(defaults.anti_snipe_extend_ms),
            Self::ANTI_SNIPE_EXTEND_MS_RANGE,
        );
        let max_duration_ms = clamp_i64(
            requested.max_duration_ms.unwrap_or(defaults.max_duration_ms),
            Self::MAX_DURATION_MS_RANGE,
        );
        let max_consecutive_empty_rounds = clamp_i32(
            requested
                .max_consecutive_empty_rounds
                .unwrap_or(defaults.max_consecutive_empty_rounds),
            Self::MAX_CONSECUTIVE_EMPTY_ROUNDS_RANGE,
        );

        Self {
            round_duration_ms,
            winners_per_round,
            anti_snipe_window_ms,
            anti_snipe_extend_ms,
            max_duration_ms,
            max_consecutive_empty_rounds,
            // reserved, always 1 regardless of request (§9).
            max_wins_per_user: 1,
        }
    }
}

fn clamp_i64(v: i64, (lo, hi): (i64, i64)) -> i64 {
    v.clamp(lo, hi)
}

fn clamp_i32(v: i32, (lo, hi): (i32, i32)) -> i32 {
    v.clamp(lo, hi)
}

/// Caller-supplied overrides from `POST /api/auctions`; any field left unset
/// falls back to `AuctionConfig::defaults` before clamping.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAuctionConfig {
    pub round_duration_ms: Option<i64>,
    pub winners_per_round: Option<i32>,
    pub anti_snipe_window_ms: Option<i64>,
    pub anti_snipe_extend_ms: Option<i64>,
    pub max_duration_ms: Option<i64>,
    pub max_consecutive_empty_rounds: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: AuctionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub state: AuctionState,
    pub total_quantity: i32,
    pub awarded_count: i32,
    pub revenue: i64,
    pub current_round: i32,
    pub consecutive_empty_rounds: i32,
    pub round_state: Option<RoundState>,
    pub round_ends_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
    pub closing_token: Option<String>,
    pub closing_started_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub config: AuctionConfig,
}

impl Auction {
    pub fn new(title: String, total_quantity: i32, config: AuctionConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: AuctionId::new(),
            created_at: now,
            updated_at: now,
            title,
            state: AuctionState::Draft,
            total_quantity,
            awarded_count: 0,
            revenue: 0,
            current_round: 0,
            consecutive_empty_rounds: 0,
            round_state: None,
            round_ends_at: None,
            ends_at: None,
            ended_at: None,
            end_reason: None,
            closing_token: None,
            closing_started_at: None,
            version: 0,
            config,
        }
    }

    pub fn remaining_quantity(&self) -> i32 {
        (self.total_quantity - self.awarded_count).max(0)
    }

    pub fn is_open_for_bids(&self, now: DateTime<Utc>) -> bool {
        self.state == AuctionState::Running
            && self.round_state == Some(RoundState::Open)
            && self.round_ends_at.map(|ends| now < ends).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_round_duration_into_range() {
        let too_short = PartialAuctionConfig { round_duration_ms: Some(100), ..Default::default() };
        let cfg = AuctionConfig::clamped(too_short, 10);
        assert_eq!(cfg.round_duration_ms, AuctionConfig::ROUND_DURATION_MS_RANGE.0);

        let too_long = PartialAuctionConfig { round_duration_ms: Some(i64::MAX), ..Default::default() };
        let cfg = AuctionConfig::clamped(too_long, 10);
        assert_eq!(cfg.round_duration_ms, AuctionConfig::ROUND_DURATION_MS_RANGE.1);
    }

    /// B4: winnersPerRound > remainingQuantity at creation time clamps down
    /// to totalQuantity rather than being rejected.
    #[test]
    fn clamps_winners_per_round_to_total_quantity() {
        let cfg = AuctionConfig::clamped(
            PartialAuctionConfig { winners_per_round: Some(1000), ..Default::default() },
            5,
        );
        assert_eq!(cfg.winners_per_round, 5);
    }

    #[test]
    fn winners_per_round_floor_is_one() {
        let cfg = AuctionConfig::clamped(
            PartialAuctionConfig { winners_per_round: Some(0), ..Default::default() },
            5,
        );
        assert_eq!(cfg.winners_per_round, 1);
    }

    /// B3: anti-snipe window/extend are clamped independently of each other.
    #[test]
    fn clamps_anti_snipe_window_and_extend() {
        let cfg = AuctionConfig::clamped(
            PartialAuctionConfig {
                anti_snipe_window_ms: Some(-5),
                anti_snipe_extend_ms: Some(120_000),
                ..Default::default()
            },
            10,
        );
        assert_eq!(cfg.anti_snipe_window_ms, 0);
        assert_eq!(cfg.anti_snipe_extend_ms, AuctionConfig::ANTI_SNIPE_EXTEND_MS_RANGE.1);
    }

    /// §9 open question, settled: maxWinsPerUser is always 1 regardless of
    /// what the caller requests (the field isn't even accepted on the wire).
    #[test]
    fn max_wins_per_user_is_always_one() {
        let cfg = AuctionConfig::clamped(PartialAuctionConfig::default(), 10);
        assert_eq!(cfg.max_wins_per_user, 1);
    }

    #[test]
    fn remaining_quantity_never_negative() {
        let mut auction = Auction::new("t".into(), 5, AuctionConfig::defaults(5), Utc::now());
        auction.awarded_count = 7;
        assert_eq!(auction.remaining_quantity(), 0);
    }
}
