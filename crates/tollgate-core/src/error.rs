use crate::state_machine::ChallengeStatus;

/// Core-layer errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: ChallengeStatus,
        to: ChallengeStatus,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid challenge id: {0}")]
    InvalidChallengeId(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("validation failed: {0}")]
    ValidationError(String),
}
