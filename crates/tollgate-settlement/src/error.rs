use rust_decimal::Decimal;

use crate::traits::ChainTransaction;

/// Settlement-layer errors.
///
/// `Clone` so that cached lookup verdicts can be replayed to duplicate
/// callers without re-querying the network.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettlementError {
    #[error("malformed transaction reference: {0}")]
    InvalidReference(String),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("transaction not found on network: {0}")]
    TransactionNotFound(String),

    #[error("transaction reverted on the network: {0}")]
    TransactionFailed(String),

    #[error("settled value {observed} below expected {expected}")]
    InsufficientAmount {
        expected: Decimal,
        observed: Decimal,
        /// The observed transaction, returned for audit.
        transaction: Box<ChainTransaction>,
    },

    #[error("transaction recipient {observed} does not match expected {expected}")]
    RecipientMismatch { expected: String, observed: String },

    #[error("transaction currency {observed} does not match expected {expected}")]
    CurrencyMismatch { expected: String, observed: String },

    #[error("no transactions to settle")]
    EmptyBatch,

    #[error("settlement network error: {0}")]
    Upstream(String),
}

impl SettlementError {
    /// Machine-readable error code crossing the component boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReference(_) => "INVALID_REFERENCE",
            Self::UnsupportedNetwork(_) => "UNSUPPORTED_NETWORK",
            Self::TransactionNotFound(_) => "VERIFICATION_FAILED",
            Self::TransactionFailed(_) => "VERIFICATION_FAILED",
            Self::InsufficientAmount { .. } => "INSUFFICIENT_AMOUNT",
            Self::RecipientMismatch { .. } => "VERIFICATION_FAILED",
            Self::CurrencyMismatch { .. } => "VERIFICATION_FAILED",
            Self::EmptyBatch => "EMPTY_BATCH",
            Self::Upstream(_) => "VERIFICATION_ERROR",
        }
    }
}
