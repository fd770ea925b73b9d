use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::MarketSegment;

/// Settlement-unit precision: monetary outputs are rounded to 8 decimals.
const UNIT_DP: u32 = 8;
/// Human-display precision for the net amount.
const DISPLAY_DP: u32 = 2;
/// Precision of the effective rate.
const RATE_DP: u32 = 4;

fn round_unit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// The fee quote attached to a challenge at creation time.
///
/// `net_amount` carries settlement-unit precision (8 dp) while
/// `net_amount_display` is the 2 dp human-display figure; the two precisions
/// are not interchangeable and both are exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Fee before any discount.
    pub base_fee: Decimal,
    /// Fee actually charged after the segment discount.
    pub net_fee: Decimal,
    /// `base_fee - net_fee`.
    pub discount_amount: Decimal,
    /// `amount - net_fee`, settlement-unit precision.
    pub net_amount: Decimal,
    /// `amount - net_fee`, display precision.
    pub net_amount_display: Decimal,
    /// Percentage rate after the discount.
    pub effective_rate: Decimal,
}

/// Fee schedule: a default percentage rate plus per-segment discounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Default fee rate, in percent of the gross amount.
    pub default_rate_percent: Decimal,
    /// Discount fractions in `[0, 1)` per market segment.
    pub discounts: HashMap<MarketSegment, Decimal>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        let mut discounts = HashMap::new();
        discounts.insert(MarketSegment::IndiaFarmers, Decimal::new(7, 1)); // 0.7
        discounts.insert(MarketSegment::CanadaIndigenous, Decimal::new(5, 1)); // 0.5
        discounts.insert(MarketSegment::MigrantWorkers, Decimal::new(8, 1)); // 0.8
        Self {
            default_rate_percent: Decimal::new(1, 1), // 0.1%
            discounts,
        }
    }
}

impl FeeSchedule {
    /// Compute the fee breakdown for a gross amount.
    ///
    /// Pure and deterministic. A segment absent from the discount table
    /// yields a zero discount, never an error; the only failure mode is a
    /// non-positive amount.
    pub fn calculate(
        &self,
        amount: Decimal,
        segment: Option<MarketSegment>,
    ) -> Result<FeeBreakdown, CoreError> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "amount must be positive, got {amount}"
            )));
        }

        let base_fee = amount * self.default_rate_percent / Decimal::ONE_HUNDRED;
        let discount = segment
            .and_then(|s| self.discounts.get(&s).copied())
            .unwrap_or(Decimal::ZERO);

        let net_fee = base_fee * (Decimal::ONE - discount);
        let base_fee = round_unit(base_fee);
        let net_fee = round_unit(net_fee);
        let net_amount = round_unit(amount - net_fee);

        Ok(FeeBreakdown {
            base_fee,
            net_fee,
            discount_amount: round_unit(base_fee - net_fee),
            net_amount,
            net_amount_display: net_amount
                .round_dp_with_strategy(DISPLAY_DP, RoundingStrategy::MidpointAwayFromZero),
            effective_rate: (self.default_rate_percent * (Decimal::ONE - discount))
                .round_dp_with_strategy(RATE_DP, RoundingStrategy::MidpointAwayFromZero),
        })
    }
}
