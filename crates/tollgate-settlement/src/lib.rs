//! Tollgate settlement layer.
//!
//! Network profiles, the settlement verifier (proof-of-payment checks
//! against an external ledger), the Merkle batch aggregator, and the
//! production network-client adapters.

pub mod adapters;
pub mod batch;
pub mod error;
pub mod network;
pub mod traits;
pub mod verifier;

pub use batch::{BatchCostEstimate, BatchId, BatchSettlement, BatchTransaction};
pub use error::SettlementError;
pub use network::{NetworkProfile, NetworkRegistry, ReferenceGrammar, TransactionType};
pub use traits::{ChainTransaction, ExecutionStatus, NetworkClient};
pub use verifier::{ConfirmationStatus, ExpectedPayment, SettlementVerifier, Verification};
