use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tollgate_core::types::Currency;

use crate::error::SettlementError;
use crate::network::{NetworkProfile, NetworkRegistry};
use crate::traits::{ChainTransaction, ExecutionStatus, NetworkClient};

/// How long a network-lookup verdict is replayed before re-querying.
const CACHE_TTL_SECS: i64 = 300;

/// Parameters a settled transaction must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedPayment {
    /// Address that must have received the funds.
    pub recipient: String,
    /// Minimum settled value.
    pub amount: Decimal,
    /// Settlement unit the payer was quoted in.
    pub currency: Currency,
}

/// A successful proof-of-payment verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// The observed transaction.
    pub transaction: ChainTransaction,
    /// Human-readable explorer link for the proof.
    pub explorer_url: String,
    /// When the verification was performed.
    pub verified_at: DateTime<Utc>,
}

/// Confirmation-depth report for a settled transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationStatus {
    /// Whether the observed depth meets the required threshold.
    pub confirmed: bool,
    /// Observed confirmation depth.
    pub confirmations: u32,
    /// Threshold the depth was compared against.
    pub required_confirmations: u32,
    /// The observed transaction.
    pub transaction: ChainTransaction,
    /// Human-readable explorer link.
    pub explorer_url: String,
}

struct CachedLookup {
    verdict: Result<ChainTransaction, SettlementError>,
    cached_at: DateTime<Utc>,
}

/// Verifies proof-of-payment references against configured settlement
/// networks.
///
/// Network lookups — successful and unsuccessful alike — are cached for a
/// bounded window keyed by `(network, reference)`, so duplicate
/// verification calls are absorbed without re-querying the ledger. Entries
/// expire by timestamp, checked on read and by [`sweep_cache`]; no
/// scheduled-callback eviction.
///
/// [`sweep_cache`]: SettlementVerifier::sweep_cache
pub struct SettlementVerifier {
    networks: Arc<NetworkRegistry>,
    client: Arc<dyn NetworkClient>,
    cache: DashMap<(String, String), CachedLookup>,
}

impl SettlementVerifier {
    /// Create a verifier over a network registry and a client adapter.
    pub fn new(networks: Arc<NetworkRegistry>, client: Arc<dyn NetworkClient>) -> Self {
        Self {
            networks,
            client,
            cache: DashMap::new(),
        }
    }

    /// The registry this verifier resolves networks against.
    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    /// Verify that `reference` settles `expected` on `network_id`.
    ///
    /// Fails with `INVALID_REFERENCE` before any network I/O when the
    /// reference does not match the network's grammar. An underpaid
    /// settlement fails with `INSUFFICIENT_AMOUNT` but still carries the
    /// observed transaction for audit.
    pub async fn verify(
        &self,
        network_id: &str,
        reference: &str,
        expected: &ExpectedPayment,
    ) -> Result<Verification, SettlementError> {
        let profile = self.profile(network_id)?;

        if !profile.reference_grammar.matches(reference) {
            return Err(SettlementError::InvalidReference(reference.to_string()));
        }

        let transaction = self.lookup(&profile, reference).await?;
        self.cross_check(&transaction, expected)?;

        tracing::info!(
            network = %network_id,
            reference = %reference,
            value = %transaction.value,
            "proof of payment verified"
        );

        Ok(Verification {
            explorer_url: profile.explorer_tx_url(reference),
            transaction,
            verified_at: Utc::now(),
        })
    }

    /// Report whether `reference` has reached the required confirmation
    /// depth, defaulting the threshold to the network profile's value.
    pub async fn monitor_confirmations(
        &self,
        network_id: &str,
        reference: &str,
        required_override: Option<u32>,
    ) -> Result<ConfirmationStatus, SettlementError> {
        let profile = self.profile(network_id)?;

        if !profile.reference_grammar.matches(reference) {
            return Err(SettlementError::InvalidReference(reference.to_string()));
        }

        let required = required_override.unwrap_or(profile.required_confirmations);
        let transaction = self.lookup(&profile, reference).await?;

        Ok(ConfirmationStatus {
            confirmed: transaction.confirmations >= required,
            confirmations: transaction.confirmations,
            required_confirmations: required,
            explorer_url: profile.explorer_tx_url(reference),
            transaction,
        })
    }

    /// Drop expired cache entries. Returns the number removed.
    pub fn sweep_cache(&self, now: DateTime<Utc>) -> usize {
        let before = self.cache.len();
        self.cache
            .retain(|_, entry| now - entry.cached_at < Duration::seconds(CACHE_TTL_SECS));
        before - self.cache.len()
    }

    /// Number of live cache entries.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn profile(&self, network_id: &str) -> Result<NetworkProfile, SettlementError> {
        self.networks
            .get(network_id)
            .cloned()
            .ok_or_else(|| SettlementError::UnsupportedNetwork(network_id.to_string()))
    }

    /// Fetch a transaction, replaying a cached verdict when fresh.
    async fn lookup(
        &self,
        profile: &NetworkProfile,
        reference: &str,
    ) -> Result<ChainTransaction, SettlementError> {
        let key = (profile.id.clone(), reference.to_string());
        let now = Utc::now();

        if let Some(entry) = self.cache.get(&key) {
            if now - entry.cached_at < Duration::seconds(CACHE_TTL_SECS) {
                tracing::debug!(network = %profile.id, reference = %reference, "lookup cache hit");
                return entry.verdict.clone();
            }
        }
        // Entry absent or stale; stale entries are overwritten below.

        let verdict = self.client.fetch_transaction(profile, reference).await;
        self.cache.insert(
            key,
            CachedLookup {
                verdict: verdict.clone(),
                cached_at: now,
            },
        );
        verdict
    }

    fn cross_check(
        &self,
        transaction: &ChainTransaction,
        expected: &ExpectedPayment,
    ) -> Result<(), SettlementError> {
        if transaction.status == ExecutionStatus::Failed {
            return Err(SettlementError::TransactionFailed(
                transaction.reference.clone(),
            ));
        }

        if !transaction
            .recipient
            .eq_ignore_ascii_case(&expected.recipient)
        {
            return Err(SettlementError::RecipientMismatch {
                expected: expected.recipient.clone(),
                observed: transaction.recipient.clone(),
            });
        }

        if let Some(currency) = transaction.currency {
            if currency != expected.currency {
                return Err(SettlementError::CurrencyMismatch {
                    expected: expected.currency.to_string(),
                    observed: currency.to_string(),
                });
            }
        }

        if transaction.value < expected.amount {
            return Err(SettlementError::InsufficientAmount {
                expected: expected.amount,
                observed: transaction.value,
                transaction: Box::new(transaction.clone()),
            });
        }

        Ok(())
    }
}
