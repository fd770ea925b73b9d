//! Integration test: batch settlement commitments and cost amortization
//! against the built-in network profiles.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tollgate_settlement::batch::{build_batch, BatchTransaction};
use tollgate_settlement::network::{NetworkRegistry, TransactionType};
use tollgate_settlement::SettlementError;

fn tx(id: &str, amount: Decimal, nonce: u64) -> BatchTransaction {
    BatchTransaction {
        id: id.into(),
        amount,
        nonce,
    }
}

fn leaf(id: &str, amount: Decimal, nonce: u64) -> [u8; 32] {
    *blake3::hash(format!("{id}{}{nonce}", amount.normalize()).as_bytes()).as_bytes()
}

fn interior(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}

#[test]
fn test_reference_batch_vector() {
    // Three transactions: root = H(H(leafA, leafB), leafC).
    let batch = build_batch(vec![
        tx("a", dec!(5), 1),
        tx("b", dec!(3), 2),
        tx("c", dec!(2), 3),
    ])
    .expect("non-empty batch");

    assert_eq!(batch.transaction_count, 3);
    assert_eq!(batch.total_amount, dec!(10));

    let expected = interior(
        &interior(&leaf("a", dec!(5), 1), &leaf("b", dec!(3), 2)),
        &leaf("c", dec!(2), 3),
    );
    assert_eq!(batch.merkle_root, format!("0x{}", hex::encode(expected)));
}

#[test]
fn test_single_transaction_commitment_is_leaf() {
    let batch = build_batch(vec![tx("only", dec!(7.25), 42)]).unwrap();
    assert_eq!(
        batch.merkle_root,
        format!("0x{}", hex::encode(leaf("only", dec!(7.25), 42)))
    );
}

#[test]
fn test_empty_batch_is_an_error() {
    assert!(matches!(build_batch(vec![]), Err(SettlementError::EmptyBatch)));
}

#[test]
fn test_reordering_changes_commitment() {
    let forward = build_batch(vec![tx("a", dec!(5), 1), tx("b", dec!(3), 2)]).unwrap();
    let reversed = build_batch(vec![tx("b", dec!(3), 2), tx("a", dec!(5), 1)]).unwrap();
    assert_ne!(forward.merkle_root, reversed.merkle_root);
}

#[test]
fn test_amortization_against_network_profile() {
    // Settling a channel batch on hedera-testnet: 0.001 * 2.5 = 0.0025
    // flat, amortized over the batch.
    let registry = NetworkRegistry::builtin();
    let hedera = registry.get("hedera-testnet").expect("builtin profile");
    let flat = hedera.estimate_settlement_cost(TransactionType::ChannelSettle);
    assert_eq!(flat, dec!(0.0025));

    let batch = build_batch(vec![
        tx("a", dec!(1), 1),
        tx("b", dec!(2), 2),
        tx("c", dec!(3), 3),
        tx("d", dec!(4), 4),
        tx("e", dec!(5), 5),
    ])
    .unwrap();

    let estimate = batch.amortize(flat);
    assert_eq!(estimate.cost_per_transaction, dec!(0.0005));
    assert_eq!(estimate.savings_vs_individual, dec!(0.002));
    // The two figures always reassemble the flat cost exactly.
    assert_eq!(
        estimate.cost_per_transaction + estimate.savings_vs_individual,
        flat
    );
}

#[test]
fn test_amortization_sums_exactly_for_awkward_divisors() {
    let batch = build_batch(vec![
        tx("a", dec!(1), 1),
        tx("b", dec!(1), 2),
        tx("c", dec!(1), 3),
    ])
    .unwrap();

    // 0.1 / 3 does not terminate; the rounded share and the savings must
    // still sum back to the flat cost.
    let estimate = batch.amortize(dec!(0.1));
    assert_eq!(
        estimate.cost_per_transaction + estimate.savings_vs_individual,
        dec!(0.1)
    );
}
