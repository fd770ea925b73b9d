use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::types::Currency;

use crate::error::SettlementError;
use crate::network::NetworkProfile;

/// Execution outcome reported by the settlement network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Included in a block and executed successfully.
    Confirmed,
    /// Known to the network but not yet included in a block.
    Pending,
    /// Included but reverted.
    Failed,
}

/// Normalized view of an on-network transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainTransaction {
    /// The proof-of-payment reference this record was fetched for.
    pub reference: String,
    /// Funds originator address.
    pub sender: String,
    /// Funds destination address.
    pub recipient: String,
    /// Settled value in display units.
    pub value: Decimal,
    /// Currency of the settled value, when the network reports one.
    /// Native-value adapters report `None`.
    pub currency: Option<Currency>,
    /// Block the transaction was included in, if mined.
    pub block_number: Option<u64>,
    /// Hash of that block.
    pub block_hash: Option<String>,
    /// Confirmation depth at fetch time.
    pub confirmations: u32,
    /// Consensus timestamp, when the network reports one.
    pub timestamp: Option<DateTime<Utc>>,
    /// Execution outcome.
    pub status: ExecutionStatus,
}

/// Capability to query a settlement network for a transaction's state.
///
/// This is the hard external dependency of the verifier: production
/// adapters speak to a real ledger, and test doubles implement the same
/// contract from test code. Implementations must be idempotent — fetching
/// the same reference twice returns the same settled facts (confirmation
/// depth may grow).
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Fetch the current state of `reference` on the profile's network.
    async fn fetch_transaction(
        &self,
        profile: &NetworkProfile,
        reference: &str,
    ) -> Result<ChainTransaction, SettlementError>;
}
