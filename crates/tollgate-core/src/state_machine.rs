use std::fmt;

use crate::error::CoreError;

/// The 3 states of a payment-challenge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    /// Challenge issued, awaiting proof of payment.
    Pending,
    /// Proof of payment verified — challenge is final.
    Completed,
    /// Deadline passed without a verified payment. Final state.
    Expired,
}

impl ChallengeStatus {
    /// Whether this is a final (terminal) state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired)
    }

    /// Wire code used in API payloads and the durable store.
    pub fn code(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Events that trigger state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeEvent {
    /// A settlement-network proof was verified against the challenge.
    PaymentVerified,
    /// The payment deadline passed.
    TimedOut,
}

/// Manages challenge state transitions.
///
/// Valid transitions:
/// - Pending → Completed (PaymentVerified)
/// - Pending → Expired (TimedOut)
///
/// Completed and Expired are terminal and mutually exclusive; a record
/// never re-enters Pending.
pub struct ChallengeStateMachine;

impl ChallengeStateMachine {
    /// Attempt a state transition based on an event.
    /// Returns the new state on success, or an error for invalid transitions.
    pub fn transition(
        current: ChallengeStatus,
        event: ChallengeEvent,
    ) -> Result<ChallengeStatus, CoreError> {
        let new_state = match (current, event) {
            (ChallengeStatus::Pending, ChallengeEvent::PaymentVerified) => {
                ChallengeStatus::Completed
            }
            (ChallengeStatus::Pending, ChallengeEvent::TimedOut) => ChallengeStatus::Expired,

            // All other transitions are invalid
            _ => {
                let target = match event {
                    ChallengeEvent::PaymentVerified => ChallengeStatus::Completed,
                    ChallengeEvent::TimedOut => ChallengeStatus::Expired,
                };
                return Err(CoreError::InvalidStateTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "challenge state transition"
        );

        Ok(new_state)
    }

    /// Check if a transition is valid without performing it.
    pub fn can_transition(current: ChallengeStatus, event: ChallengeEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
