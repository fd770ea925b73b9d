//! Tollgate core layer.
//!
//! Shared types, the fee schedule, and the payment-challenge state machine.
//! Everything in this crate is pure: no I/O, no clocks other than the
//! timestamps callers pass in.

pub mod config;
pub mod error;
pub mod fees;
pub mod state_machine;
pub mod types;

pub use config::GatewayConfig;
pub use error::CoreError;
pub use fees::{FeeBreakdown, FeeSchedule};
pub use state_machine::{ChallengeEvent, ChallengeStateMachine, ChallengeStatus};
pub use types::{ChallengeId, Currency, MarketSegment, PaymentChallenge};
