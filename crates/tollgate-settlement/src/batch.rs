use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SettlementError;

/// Unique identifier for a settlement batch (UUID v7 — time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Create a new random batch ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One offline-recorded transaction entering a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTransaction {
    /// Transaction identifier within the channel.
    pub id: String,
    /// Transferred amount.
    pub amount: Decimal,
    /// Channel sequence number.
    pub nonce: u64,
}

impl BatchTransaction {
    /// Leaf hash over the canonical `{id}{amount}{nonce}` concatenation.
    ///
    /// The amount is normalized first so `5` and `5.00` commit identically.
    fn leaf_hash(&self) -> [u8; 32] {
        let canonical = format!("{}{}{}", self.id, self.amount.normalize(), self.nonce);
        *blake3::hash(canonical.as_bytes()).as_bytes()
    }
}

/// Per-transaction amortization of a flat settlement cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCostEstimate {
    /// Flat network cost of settling the whole batch once.
    pub network_fee: Decimal,
    /// `network_fee / count`, 8 dp.
    pub cost_per_transaction: Decimal,
    /// Marginal cost avoided versus settling each transaction
    /// individually at the same flat cost. Always sums with
    /// `cost_per_transaction` to exactly `network_fee`.
    pub savings_vs_individual: Decimal,
}

/// A tamper-evident commitment over a set of offline transactions.
///
/// Produced once from an input list; stateless beyond construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettlement {
    /// Batch identifier.
    pub batch_id: BatchId,
    /// Merkle root over the transaction set, `0x`-prefixed hex.
    pub merkle_root: String,
    /// Number of committed transactions.
    pub transaction_count: usize,
    /// Sum of all amounts — summed exactly, then rounded once to 8 dp.
    pub total_amount: Decimal,
    /// The committed transaction set, in commitment order.
    pub transactions: Vec<BatchTransaction>,
    /// When the commitment was built.
    pub created_at: DateTime<Utc>,
}

impl BatchSettlement {
    /// Amortize a flat settlement cost across this batch.
    pub fn amortize(&self, network_fee: Decimal) -> BatchCostEstimate {
        let count = Decimal::from(self.transaction_count as u64);
        let cost_per_transaction = (network_fee / count)
            .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero);
        BatchCostEstimate {
            network_fee,
            cost_per_transaction,
            // Derived by subtraction so the two figures always sum to the
            // exact flat cost regardless of rounding.
            savings_vs_individual: network_fee - cost_per_transaction,
        }
    }
}

/// Build a batch commitment over a non-empty ordered transaction set.
///
/// The commitment is a binary Merkle tree: adjacent leaf pairs are hashed
/// together level by level; an odd trailing node is promoted unchanged to
/// the next level. A single-transaction batch's root equals that
/// transaction's own leaf hash. The commitment is order-sensitive.
pub fn build_batch(
    transactions: Vec<BatchTransaction>,
) -> Result<BatchSettlement, SettlementError> {
    if transactions.is_empty() {
        return Err(SettlementError::EmptyBatch);
    }

    let root = merkle_root(&transactions);
    let total: Decimal = transactions.iter().map(|tx| tx.amount).sum();

    let batch = BatchSettlement {
        batch_id: BatchId::new(),
        merkle_root: format!("0x{}", hex::encode(root)),
        transaction_count: transactions.len(),
        total_amount: total.round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero),
        transactions,
        created_at: Utc::now(),
    };

    tracing::info!(
        batch_id = %batch.batch_id,
        transaction_count = batch.transaction_count,
        merkle_root = %batch.merkle_root,
        "batch commitment built"
    );

    Ok(batch)
}

fn merkle_root(transactions: &[BatchTransaction]) -> [u8; 32] {
    let mut level: Vec<[u8; 32]> = transactions.iter().map(BatchTransaction::leaf_hash).collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => {
                    let mut hasher = blake3::Hasher::new();
                    hasher.update(left);
                    hasher.update(right);
                    next.push(*hasher.finalize().as_bytes());
                }
                // Odd trailing node is promoted unchanged.
                [single] => next.push(*single),
                _ => unreachable!("chunks(2) yields one- or two-element slices"),
            }
        }
        level = next;
    }

    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tx(id: &str, amount: Decimal, nonce: u64) -> BatchTransaction {
        BatchTransaction {
            id: id.into(),
            amount,
            nonce,
        }
    }

    fn interior(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(left);
        hasher.update(right);
        *hasher.finalize().as_bytes()
    }

    #[test]
    fn test_empty_batch_rejected() {
        let result = build_batch(vec![]);
        assert!(matches!(result, Err(SettlementError::EmptyBatch)));
    }

    #[test]
    fn test_single_transaction_root_is_leaf_hash() {
        let t = tx("a", dec!(5), 1);
        let leaf = t.leaf_hash();
        let batch = build_batch(vec![t]).unwrap();
        assert_eq!(batch.merkle_root, format!("0x{}", hex::encode(leaf)));
        assert_eq!(batch.transaction_count, 1);
    }

    #[test]
    fn test_three_transaction_root_structure() {
        // root = H(H(leafA, leafB), leafC) — trailing leaf promoted.
        let a = tx("a", dec!(5), 1);
        let b = tx("b", dec!(3), 2);
        let c = tx("c", dec!(2), 3);
        let expected = interior(&interior(&a.leaf_hash(), &b.leaf_hash()), &c.leaf_hash());

        let batch = build_batch(vec![a, b, c]).unwrap();
        assert_eq!(batch.merkle_root, format!("0x{}", hex::encode(expected)));
        assert_eq!(batch.transaction_count, 3);
        assert_eq!(batch.total_amount, dec!(10));
    }

    #[test]
    fn test_commitment_is_deterministic() {
        let txs = vec![tx("a", dec!(5), 1), tx("b", dec!(3), 2), tx("c", dec!(2), 3)];
        let first = build_batch(txs.clone()).unwrap();
        let second = build_batch(txs).unwrap();
        assert_eq!(first.merkle_root, second.merkle_root);
        // Batch ids remain distinct per build.
        assert_ne!(first.batch_id, second.batch_id);
    }

    #[test]
    fn test_commitment_is_order_sensitive() {
        let forward = build_batch(vec![tx("a", dec!(5), 1), tx("b", dec!(3), 2)]).unwrap();
        let reversed = build_batch(vec![tx("b", dec!(3), 2), tx("a", dec!(5), 1)]).unwrap();
        assert_ne!(forward.merkle_root, reversed.merkle_root);
    }

    #[test]
    fn test_amount_normalization_in_leaf() {
        let plain = build_batch(vec![tx("a", dec!(5), 1)]).unwrap();
        let trailing_zeros = build_batch(vec![tx("a", dec!(5.00), 1)]).unwrap();
        assert_eq!(plain.merkle_root, trailing_zeros.merkle_root);
    }

    #[test]
    fn test_four_transactions_balanced_tree() {
        let txs = vec![
            tx("a", dec!(1), 1),
            tx("b", dec!(2), 2),
            tx("c", dec!(3), 3),
            tx("d", dec!(4), 4),
        ];
        let leaves: Vec<[u8; 32]> = txs.iter().map(BatchTransaction::leaf_hash).collect();
        let expected = interior(
            &interior(&leaves[0], &leaves[1]),
            &interior(&leaves[2], &leaves[3]),
        );

        let batch = build_batch(txs).unwrap();
        assert_eq!(batch.merkle_root, format!("0x{}", hex::encode(expected)));
        assert_eq!(batch.total_amount, dec!(10));
    }

    #[test]
    fn test_total_summed_before_rounding() {
        // Each amount is below the 8 dp granularity; the exact sum is not.
        let txs: Vec<BatchTransaction> = (0..10)
            .map(|n| tx(&format!("t{n}"), dec!(0.000000004), n))
            .collect();
        let batch = build_batch(txs).unwrap();
        // Round-then-sum would give 0; sum-then-round gives 0.00000004.
        assert_eq!(batch.total_amount, dec!(0.00000004));
    }

    #[test]
    fn test_amortization_sums_to_cost() {
        for count in 1..=7usize {
            let txs: Vec<BatchTransaction> =
                (0..count).map(|n| tx(&format!("t{n}"), dec!(1), n as u64)).collect();
            let batch = build_batch(txs).unwrap();
            let estimate = batch.amortize(dec!(0.1));
            assert_eq!(
                estimate.cost_per_transaction + estimate.savings_vs_individual,
                dec!(0.1),
                "count={count}"
            );
        }
    }

    #[test]
    fn test_amortization_figures() {
        let txs = vec![
            tx("a", dec!(5), 1),
            tx("b", dec!(3), 2),
            tx("c", dec!(2), 3),
            tx("d", dec!(1), 4),
        ];
        let batch = build_batch(txs).unwrap();
        let estimate = batch.amortize(dec!(0.025));
        assert_eq!(estimate.network_fee, dec!(0.025));
        assert_eq!(estimate.cost_per_transaction, dec!(0.00625));
        assert_eq!(estimate.savings_vs_individual, dec!(0.01875));
    }

    #[test]
    fn test_single_transaction_amortization_saves_nothing() {
        let batch = build_batch(vec![tx("a", dec!(5), 1)]).unwrap();
        let estimate = batch.amortize(dec!(0.5));
        assert_eq!(estimate.cost_per_transaction, dec!(0.5));
        assert_eq!(estimate.savings_vs_individual, dec!(0));
    }
}
