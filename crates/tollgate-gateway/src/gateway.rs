use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use tollgate_core::config::GatewayConfig;
use tollgate_core::fees::FeeSchedule;
use tollgate_core::state_machine::{ChallengeEvent, ChallengeStateMachine, ChallengeStatus};
use tollgate_core::types::{ChallengeId, Currency, MarketSegment, PaymentChallenge};
use tollgate_settlement::verifier::{ExpectedPayment, SettlementVerifier};

use crate::error::GatewayError;
use crate::store::ChallengeStore;

/// Parameters for issuing a new payment challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// What is being paid for.
    pub resource: String,
    /// Gross amount requested.
    pub amount: Decimal,
    /// Settlement unit.
    pub currency: Currency,
    /// Target settlement network.
    pub network: String,
    /// Discount segment, if any.
    pub segment: Option<MarketSegment>,
    /// Free-form resource description.
    pub description: Option<String>,
}

/// Outcome of a successful payment verification.
///
/// Monetary figures come from the challenge's original fee quote, never a
/// recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub challenge_id: ChallengeId,
    pub transaction_reference: String,
    /// Amount the resource owner nets, from the original quote.
    pub net_amount: Decimal,
    /// Fee actually charged, from the original quote.
    pub fee_charged: Decimal,
    pub verified_at: DateTime<Utc>,
    pub explorer_url: String,
    pub confirmations: u32,
}

/// Aggregate figures over completed challenges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatistics {
    pub total_payments: usize,
    /// Gross volume, display precision.
    pub total_volume: Decimal,
    /// Fees collected, settlement-unit precision.
    pub total_fees: Decimal,
    /// Discounts given, settlement-unit precision.
    pub total_savings: Decimal,
    /// Mean gross amount, display precision.
    pub average_transaction: Decimal,
    pub pending_payments: usize,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepReport {
    /// Pending records transitioned to expired.
    pub expired: usize,
    /// Terminal records evicted past the retention window.
    pub evicted: usize,
}

/// The payment-challenge gateway.
///
/// Exclusively owns every challenge record. Verification is a
/// read-modify-write (expiry check, network query, transition), so calls
/// for the same challenge are serialized through a per-identifier lock;
/// different challenges verify fully in parallel. Expiry is enforced
/// lazily on access and by [`sweep`], both through the same
/// `now > expires_at` predicate.
///
/// [`sweep`]: PaymentGateway::sweep
pub struct PaymentGateway {
    config: GatewayConfig,
    fee_schedule: FeeSchedule,
    store: Arc<dyn ChallengeStore>,
    verifier: Arc<SettlementVerifier>,
    verify_locks: DashMap<ChallengeId, Arc<Mutex<()>>>,
}

impl PaymentGateway {
    /// Create a gateway over a challenge store and a settlement verifier.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn ChallengeStore>,
        verifier: Arc<SettlementVerifier>,
    ) -> Self {
        let fee_schedule = config.fee_schedule();
        Self {
            config,
            fee_schedule,
            store,
            verifier,
            verify_locks: DashMap::new(),
        }
    }

    /// The fee schedule quoted to new challenges.
    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fee_schedule
    }

    /// Gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Issue a new time-bounded payment challenge.
    ///
    /// The fee breakdown is computed here, once; later fee-schedule changes
    /// never alter an issued quote.
    pub fn issue_challenge(
        &self,
        request: ChallengeRequest,
    ) -> Result<PaymentChallenge, GatewayError> {
        if request.amount <= Decimal::ZERO || request.amount > self.config.max_payment_amount {
            return Err(GatewayError::InvalidAmount(format!(
                "amount must be in (0, {}], got {}",
                self.config.max_payment_amount, request.amount
            )));
        }

        if self.verifier.networks().get(&request.network).is_none() {
            return Err(GatewayError::UnsupportedNetwork(request.network));
        }

        let fee_breakdown = self.fee_schedule.calculate(request.amount, request.segment)?;

        let now = Utc::now();
        let challenge = PaymentChallenge {
            id: ChallengeId::new(),
            resource: request.resource,
            amount: request.amount,
            currency: request.currency,
            network: request.network,
            recipient_address: self.config.recipient_address.clone(),
            fee_breakdown,
            market_segment: request.segment,
            description: request.description,
            status: ChallengeStatus::Pending,
            created_at: now,
            expires_at: now + Duration::seconds(self.config.payment_timeout_secs as i64),
            transaction_reference: None,
            verified_at: None,
            payer: None,
        };

        self.store.put(challenge.clone());
        tracing::info!(
            challenge_id = %challenge.id,
            resource = %challenge.resource,
            amount = %challenge.amount,
            network = %challenge.network,
            expires_at = %challenge.expires_at,
            "payment challenge issued"
        );

        Ok(challenge)
    }

    /// Verify a proof-of-payment reference against a pending challenge.
    ///
    /// A verifier failure leaves the record pending so a corrected
    /// reference may be retried; a success transitions it to completed
    /// exactly once.
    pub async fn verify_payment(
        &self,
        id: ChallengeId,
        reference: &str,
        payer: Option<String>,
    ) -> Result<SettlementOutcome, GatewayError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let challenge = self
            .store
            .get(&id)
            .ok_or(GatewayError::PaymentNotFound(id))?;

        match challenge.status {
            ChallengeStatus::Pending => {}
            ChallengeStatus::Completed => return Err(GatewayError::AlreadyCompleted(id)),
            ChallengeStatus::Expired => return Err(GatewayError::PaymentExpired(id)),
        }

        let now = Utc::now();
        if challenge.is_expired(now) {
            self.expire(challenge);
            return Err(GatewayError::PaymentExpired(id));
        }

        let expected = ExpectedPayment {
            recipient: challenge.recipient_address.clone(),
            amount: challenge.amount,
            currency: challenge.currency,
        };
        let verification = self
            .verifier
            .verify(&challenge.network, reference, &expected)
            .await?;

        // Re-read after the network round-trip: a sweep may have expired
        // the record while the query was in flight. The state machine is
        // the arbiter; a terminal record is never completed again.
        let current = self
            .store
            .get(&id)
            .ok_or(GatewayError::PaymentNotFound(id))?;
        let next = match ChallengeStateMachine::transition(
            current.status,
            ChallengeEvent::PaymentVerified,
        ) {
            Ok(next) => next,
            Err(_) => {
                return Err(match current.status {
                    ChallengeStatus::Expired => GatewayError::PaymentExpired(id),
                    _ => GatewayError::AlreadyCompleted(id),
                });
            }
        };

        let mut completed = current;
        completed.status = next;
        completed.transaction_reference = Some(reference.to_string());
        completed.verified_at = Some(verification.verified_at);
        completed.payer = payer;
        self.store.put(completed.clone());
        self.verify_locks.remove(&id);

        tracing::info!(
            challenge_id = %id,
            reference = %reference,
            net_amount = %completed.fee_breakdown.net_amount,
            "payment verified and settled"
        );

        Ok(SettlementOutcome {
            challenge_id: id,
            transaction_reference: reference.to_string(),
            net_amount: completed.fee_breakdown.net_amount,
            fee_charged: completed.fee_breakdown.net_fee,
            verified_at: verification.verified_at,
            explorer_url: verification.explorer_url,
            confirmations: verification.transaction.confirmations,
        })
    }

    /// Current snapshot of a challenge.
    ///
    /// A pending record past its deadline is transitioned to expired here,
    /// so a caller querying after the wall-clock deadline never observes
    /// `pending`.
    pub async fn status(&self, id: &ChallengeId) -> Option<PaymentChallenge> {
        let challenge = self.store.get(id)?;
        if challenge.status != ChallengeStatus::Pending || !challenge.is_expired(Utc::now()) {
            return Some(challenge);
        }

        let lock = self.lock_for(*id);
        let _guard = lock.lock().await;
        let current = self.store.get(id)?;
        if current.status == ChallengeStatus::Pending && current.is_expired(Utc::now()) {
            return Some(self.expire(current));
        }
        Some(current)
    }

    /// Capability check: true only for a completed challenge.
    pub fn is_authorized(&self, id: &ChallengeId) -> bool {
        self.store
            .get(id)
            .map(|challenge| challenge.status == ChallengeStatus::Completed)
            .unwrap_or(false)
    }

    /// Aggregate statistics over completed challenges.
    pub fn statistics(&self) -> GatewayStatistics {
        let now = Utc::now();
        let mut total_payments = 0usize;
        let mut total_volume = Decimal::ZERO;
        let mut total_fees = Decimal::ZERO;
        let mut total_savings = Decimal::ZERO;
        let mut pending_payments = 0usize;

        for challenge in self.store.all() {
            match challenge.status {
                ChallengeStatus::Completed => {
                    total_payments += 1;
                    total_volume += challenge.amount;
                    total_fees += challenge.fee_breakdown.net_fee;
                    total_savings += challenge.fee_breakdown.discount_amount;
                }
                // A pending record past its deadline is already expired
                // from the caller's point of view.
                ChallengeStatus::Pending if !challenge.is_expired(now) => {
                    pending_payments += 1;
                }
                _ => {}
            }
        }

        let average_transaction = if total_payments > 0 {
            (total_volume / Decimal::from(total_payments as u64))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        } else {
            Decimal::ZERO
        };

        GatewayStatistics {
            total_payments,
            total_volume: total_volume
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            total_fees: total_fees
                .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero),
            total_savings: total_savings
                .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero),
            average_transaction,
            pending_payments,
        }
    }

    /// Expire overdue pending records and evict terminal records past the
    /// retention window. Driven externally on a periodic schedule; shares
    /// the lazy path's expiry predicate.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut expired = 0usize;
        for challenge in self.store.all() {
            if challenge.status != ChallengeStatus::Pending || !challenge.is_expired(now) {
                continue;
            }
            let lock = self.lock_for(challenge.id);
            let _guard = lock.lock().await;
            // Re-read under the lock; an in-flight verification may have
            // completed the record since the snapshot.
            if let Some(current) = self.store.get(&challenge.id) {
                if current.status == ChallengeStatus::Pending && current.is_expired(now) {
                    self.expire(current);
                    expired += 1;
                }
            }
        }

        let retention = Duration::seconds(self.config.retention_secs as i64);
        let evicted = self.store.sweep_expired(now - retention);

        if expired > 0 || evicted > 0 {
            tracing::info!(expired, evicted, "challenge sweep complete");
        }

        SweepReport { expired, evicted }
    }

    fn lock_for(&self, id: ChallengeId) -> Arc<Mutex<()>> {
        self.verify_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Transition a pending record to expired and store it.
    fn expire(&self, challenge: PaymentChallenge) -> PaymentChallenge {
        let mut expired = challenge;
        // Pending → Expired is always a legal transition.
        expired.status =
            ChallengeStateMachine::transition(expired.status, ChallengeEvent::TimedOut)
                .unwrap_or(ChallengeStatus::Expired);
        self.store.put(expired.clone());
        self.verify_locks.remove(&expired.id);
        tracing::info!(challenge_id = %expired.id, "payment challenge expired");
        expired
    }
}
