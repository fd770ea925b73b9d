use tollgate_core::error::CoreError;
use tollgate_core::types::ChallengeId;
use tollgate_settlement::error::SettlementError;

/// Gateway-boundary errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("payment not found: {0}")]
    PaymentNotFound(ChallengeId),

    #[error("payment challenge expired: {0}")]
    PaymentExpired(ChallengeId),

    #[error("payment already completed: {0}")]
    AlreadyCompleted(ChallengeId),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error(transparent)]
    Verification(#[from] SettlementError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GatewayError {
    /// Machine-readable error code crossing the gateway boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::PaymentExpired(_) => "PAYMENT_EXPIRED",
            Self::AlreadyCompleted(_) => "VERIFICATION_FAILED",
            Self::UnsupportedNetwork(_) => "UNSUPPORTED_NETWORK",
            Self::Verification(inner) => inner.code(),
            Self::Core(CoreError::InvalidAmount(_)) => "INVALID_AMOUNT",
            Self::Core(CoreError::InvalidChallengeId(_)) => "INVALID_REQUEST",
            Self::Core(_) => "VERIFICATION_FAILED",
        }
    }
}
