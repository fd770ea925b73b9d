//! Tollgate gateway layer.
//!
//! The payment-challenge gateway: issues time-bounded challenges with a
//! one-time fee quote, verifies proof-of-payment through the settlement
//! layer, and owns every challenge record for its entire life.

pub mod error;
pub mod gateway;
pub mod store;

pub use error::GatewayError;
pub use gateway::{
    ChallengeRequest, GatewayStatistics, PaymentGateway, SettlementOutcome, SweepReport,
};
pub use store::{ChallengeStore, MemoryStore, RocksStore};
