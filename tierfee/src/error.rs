// src/error.rs
// Error taxonomy for the tiered fee market

use crate::coins::Coins;
use crate::keeper::BlockPhase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TierFeeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TierFeeError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("invalid fee tier {tier}: only {num_tiers} tier(s) configured")]
    InvalidTier { tier: u32, num_tiers: usize },

    #[error("insufficient fee: got {provided}, required one of {required}")]
    InsufficientFee { provided: Coins, required: Coins },

    #[error("malformed transaction: {0}")]
    MalformedTx(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state corruption: {0}")]
    StateCorruption(String),

    #[error("lifecycle violation: expected block phase {expected:?}, found {actual:?}")]
    InvalidPhase {
        expected: BlockPhase,
        actual: BlockPhase,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl TierFeeError {
    /// True for errors that only reject the transaction at hand; the block
    /// itself can keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TierFeeError::InvalidTier { .. }
                | TierFeeError::InsufficientFee { .. }
                | TierFeeError::MalformedTx(_)
        )
    }
}

impl From<rocksdb::Error> for TierFeeError {
    fn from(e: rocksdb::Error) -> Self {
        TierFeeError::Store(e.to_string())
    }
}

impl From<bincode::Error> for TierFeeError {
    fn from(e: bincode::Error) -> Self {
        TierFeeError::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for TierFeeError {
    fn from(e: serde_json::Error) -> Self {
        TierFeeError::Codec(e.to_string())
    }
}
