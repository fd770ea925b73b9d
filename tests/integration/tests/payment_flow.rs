//! Integration test: full payment-challenge lifecycle across crates.
//!
//! Exercises issuance → verification → authorization using
//! tollgate-gateway, tollgate-settlement, and tollgate-core together, with
//! a scripted network client standing in for the settlement ledger.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tollgate_core::config::GatewayConfig;
use tollgate_core::state_machine::ChallengeStatus;
use tollgate_core::types::{ChallengeId, Currency, MarketSegment};
use tollgate_gateway::{
    ChallengeRequest, ChallengeStore, GatewayError, MemoryStore, PaymentGateway,
};
use tollgate_settlement::network::{NetworkProfile, NetworkRegistry};
use tollgate_settlement::traits::{ChainTransaction, ExecutionStatus, NetworkClient};
use tollgate_settlement::{SettlementError, SettlementVerifier};

const HASH_A: &str = "0x4e3a3754410177e6937ef1f84bba68ea139e8d1a2258c5f85db9f1cd715a1bdd";
const HASH_B: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Scripted settlement ledger: every reference settles `value` to the
/// gateway's recipient address.
struct Ledger {
    value: Decimal,
}

#[async_trait]
impl NetworkClient for Ledger {
    async fn fetch_transaction(
        &self,
        _profile: &NetworkProfile,
        reference: &str,
    ) -> Result<ChainTransaction, SettlementError> {
        Ok(ChainTransaction {
            reference: reference.to_string(),
            sender: "0x00112233445566778899aabbccddeeff00112233".into(),
            recipient: GatewayConfig::default().recipient_address,
            value: self.value,
            currency: Some(Currency::Usdt),
            block_number: Some(4_200_000),
            block_hash: Some(
                "0x9b5f3a2e4f1c6d8a0b7e5d3c1f9a8b6c4d2e0f1a3b5c7d9e1f2a4b6c8d0e2f40".into(),
            ),
            confirmations: 2,
            timestamp: Some(Utc::now()),
            status: ExecutionStatus::Confirmed,
        })
    }
}

/// Helper: gateway over a fresh memory store and a ledger paying `value`.
fn gateway_paying(value: Decimal) -> PaymentGateway {
    gateway_with_config(GatewayConfig::default(), value)
}

fn gateway_with_config(config: GatewayConfig, value: Decimal) -> PaymentGateway {
    let verifier = Arc::new(SettlementVerifier::new(
        Arc::new(NetworkRegistry::builtin()),
        Arc::new(Ledger { value }),
    ));
    PaymentGateway::new(config, Arc::new(MemoryStore::new()), verifier)
}

fn request(amount: Decimal, segment: Option<MarketSegment>) -> ChallengeRequest {
    ChallengeRequest {
        resource: "report-download".into(),
        amount,
        currency: Currency::Usdt,
        network: "base-sepolia".into(),
        segment,
        description: Some("Quarterly market report".into()),
    }
}

// =========================================================================
// Happy path: issue → verify → authorize
// =========================================================================

#[tokio::test]
async fn test_full_payment_lifecycle() {
    let gateway = gateway_paying(dec!(10));

    let challenge = gateway
        .issue_challenge(request(dec!(10.0), Some(MarketSegment::IndiaFarmers)))
        .expect("issuance should succeed");

    // The quote matches the documented schedule: 0.1% with a 0.7 discount.
    assert_eq!(challenge.status, ChallengeStatus::Pending);
    assert_eq!(challenge.fee_breakdown.base_fee, dec!(0.01));
    assert_eq!(challenge.fee_breakdown.net_fee, dec!(0.003));
    assert_eq!(challenge.fee_breakdown.discount_amount, dec!(0.007));
    assert_eq!(challenge.fee_breakdown.net_amount, dec!(9.997));

    assert!(!gateway.is_authorized(&challenge.id));

    let outcome = gateway
        .verify_payment(challenge.id, HASH_A, Some("user-7".into()))
        .await
        .expect("verification should succeed");

    // Settled figures come from the original quote.
    assert_eq!(outcome.net_amount, dec!(9.997));
    assert_eq!(outcome.fee_charged, dec!(0.003));
    assert!(outcome.explorer_url.contains(HASH_A));

    let snapshot = gateway.status(&challenge.id).await.expect("record exists");
    assert_eq!(snapshot.status, ChallengeStatus::Completed);
    assert_eq!(snapshot.transaction_reference.as_deref(), Some(HASH_A));
    assert!(snapshot.verified_at.is_some());
    assert!(gateway.is_authorized(&challenge.id));
}

#[tokio::test]
async fn test_verify_unknown_id_not_found() {
    let gateway = gateway_paying(dec!(10));
    let result = gateway.verify_payment(ChallengeId::new(), HASH_A, None).await;
    assert!(matches!(result, Err(GatewayError::PaymentNotFound(_))));

    let missing = gateway.status(&ChallengeId::new()).await;
    assert!(missing.is_none());
}

// =========================================================================
// Failure paths leave the challenge retryable
// =========================================================================

#[tokio::test]
async fn test_underpayment_then_corrected_reference() {
    // First reference underpays; the challenge stays pending and a second
    // reference settles it. A failed reference does not consume the
    // challenge.
    let registry = Arc::new(NetworkRegistry::builtin());
    let underpaying = Arc::new(SettlementVerifier::new(
        Arc::clone(&registry),
        Arc::new(Ledger { value: dec!(3) }),
    ));
    let store: Arc<dyn ChallengeStore> = Arc::new(MemoryStore::new());
    let gateway = PaymentGateway::new(
        GatewayConfig::default(),
        Arc::clone(&store),
        underpaying,
    );

    let challenge = gateway.issue_challenge(request(dec!(10), None)).unwrap();

    let err = gateway
        .verify_payment(challenge.id, HASH_A, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_AMOUNT");
    match err {
        GatewayError::Verification(SettlementError::InsufficientAmount {
            transaction, ..
        }) => {
            // The observed transaction is returned for audit.
            assert_eq!(transaction.value, dec!(3));
        }
        other => panic!("expected InsufficientAmount, got {other:?}"),
    }

    let snapshot = gateway.status(&challenge.id).await.unwrap();
    assert_eq!(snapshot.status, ChallengeStatus::Pending);

    // Same store, now backed by a ledger that pays in full.
    let paying = Arc::new(SettlementVerifier::new(
        registry,
        Arc::new(Ledger { value: dec!(10) }),
    ));
    let gateway = PaymentGateway::new(GatewayConfig::default(), store, paying);
    let outcome = gateway
        .verify_payment(challenge.id, HASH_B, None)
        .await
        .expect("corrected reference should settle");
    assert_eq!(outcome.transaction_reference, HASH_B);
}

#[tokio::test]
async fn test_malformed_reference_rejected_before_lookup() {
    let gateway = gateway_paying(dec!(10));
    let challenge = gateway.issue_challenge(request(dec!(10), None)).unwrap();

    let err = gateway
        .verify_payment(challenge.id, "not-a-hash", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_REFERENCE");

    // Still pending — a corrected reference may follow.
    let snapshot = gateway.status(&challenge.id).await.unwrap();
    assert_eq!(snapshot.status, ChallengeStatus::Pending);
}

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test]
async fn test_expired_challenge_terminal_via_both_paths() {
    let mut config = GatewayConfig::default();
    config.payment_timeout_secs = 0;
    let gateway = gateway_with_config(config, dec!(10));

    let challenge = gateway.issue_challenge(request(dec!(10), None)).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    // Lazy path: verification observes the deadline and reports expiry.
    let err = gateway
        .verify_payment(challenge.id, HASH_A, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_EXPIRED");

    // The record is terminal afterwards — never pending again.
    let snapshot = gateway.status(&challenge.id).await.unwrap();
    assert_eq!(snapshot.status, ChallengeStatus::Expired);

    // And a later proof cannot resurrect it.
    let err = gateway
        .verify_payment(challenge.id, HASH_B, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_EXPIRED");
    assert!(!gateway.is_authorized(&challenge.id));
}

#[tokio::test]
async fn test_sweep_agrees_with_lazy_expiry() {
    let mut config = GatewayConfig::default();
    config.payment_timeout_secs = 0;
    let gateway = gateway_with_config(config, dec!(10));

    let a = gateway.issue_challenge(request(dec!(10), None)).unwrap();
    let b = gateway.issue_challenge(request(dec!(20), None)).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let report = gateway.sweep(Utc::now()).await;
    assert_eq!(report.expired, 2);

    for id in [a.id, b.id] {
        let snapshot = gateway.status(&id).await.unwrap();
        assert_eq!(snapshot.status, ChallengeStatus::Expired);
    }

    // Statistics count no overdue record as pending.
    assert_eq!(gateway.statistics().pending_payments, 0);
}

// =========================================================================
// Quotes and statistics
// =========================================================================

#[tokio::test]
async fn test_unknown_segment_quotes_full_fee() {
    let gateway = gateway_paying(dec!(10));
    // Segment strings are parsed upstream; an unknown one arrives as None.
    let challenge = gateway.issue_challenge(request(dec!(10), None)).unwrap();
    assert_eq!(
        challenge.fee_breakdown.net_fee,
        challenge.fee_breakdown.base_fee
    );
    assert_eq!(challenge.fee_breakdown.discount_amount, dec!(0));
}

#[tokio::test]
async fn test_statistics_track_only_completions() {
    let gateway = gateway_paying(dec!(1000));

    let discounted = gateway
        .issue_challenge(request(dec!(10), Some(MarketSegment::MigrantWorkers)))
        .unwrap();
    let plain = gateway.issue_challenge(request(dec!(30), None)).unwrap();
    let _open = gateway.issue_challenge(request(dec!(500), None)).unwrap();

    gateway
        .verify_payment(discounted.id, HASH_A, None)
        .await
        .unwrap();
    gateway.verify_payment(plain.id, HASH_B, None).await.unwrap();

    let stats = gateway.statistics();
    assert_eq!(stats.total_payments, 2);
    assert_eq!(stats.total_volume, dec!(40.00));
    // 0.002 (80% discount on 0.01) + 0.03
    assert_eq!(stats.total_fees, dec!(0.032));
    assert_eq!(stats.total_savings, dec!(0.008));
    assert_eq!(stats.average_transaction, dec!(20.00));
    assert_eq!(stats.pending_payments, 1);
}
