use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Domain error kinds with stable codes (SPEC_FULL §7), the same shape as the
/// teacher's `EpochTrackerError`/`EpochStorageError` but fanned out to cover
/// every failure the bidding state machine and round engine can raise.
#[derive(Error, Debug)]
pub enum AuctionError {
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("auction is not startable")]
    NotStartable,

    #[error("auction is not cancellable")]
    NotCancellable,

    #[error("auction round is not open")]
    NotOpen,

    #[error("round has already ended")]
    RoundEnded,

    #[error("bid is not active")]
    BidNotActive,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("store error: {0}")]
    Store(#[from] tokio_postgres::Error),
}

impl AuctionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "INVALID_ID",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotStartable => "NOT_STARTABLE",
            Self::NotCancellable => "NOT_CANCELLABLE",
            Self::NotOpen => "NOT_OPEN",
            Self::RoundEnded => "ROUND_ENDED",
            Self::BidNotActive => "BID_NOT_ACTIVE",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Store(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidId(_) | Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::NotStartable
            | Self::NotCancellable
            | Self::NotOpen
            | Self::RoundEnded
            | Self::BidNotActive
            | Self::InsufficientFunds => 409,
            Self::InvariantViolation(_) | Self::Store(_) => 500,
        }
    }

    /// A transient conflict the caller (the transaction-retry helper in
    /// `store::with_txn`) should retry rather than surface. Duplicate-key
    /// violations are included here too: the only plain `INSERT` in this
    /// crate that can race into one is a first-time bid placement (the
    /// `(auctionId, userId)` unique index), and SPEC_FULL §5 calls for that
    /// case to be retried, not surfaced — the retried attempt finds the
    /// now-existing bid row and raises it instead of re-inserting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => {
                e.code() == Some(&tokio_postgres::error::SqlState::T_R_SERIALIZATION_FAILURE)
                    || e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
            }
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// The one place domain errors become wire format (SPEC_FULL §4.8), the
/// HTTP analogue of how the teacher turns `EpochTrackerError` into a log line.
impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AuctionError>;
