use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fees::FeeSchedule;
use crate::types::MarketSegment;

/// Configuration for the payment-challenge gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Settlement-network address that must receive funds.
    #[serde(default = "default_recipient_address")]
    pub recipient_address: String,
    /// Seconds a challenge stays payable after issuance.
    #[serde(default = "default_payment_timeout_secs")]
    pub payment_timeout_secs: u64,
    /// Upper bound on a single challenge amount.
    #[serde(default = "default_max_payment_amount")]
    pub max_payment_amount: Decimal,
    /// Default fee rate, in percent of the gross amount.
    #[serde(default = "default_fee_rate_percent")]
    pub default_fee_rate_percent: Decimal,
    /// Per-segment discount fractions.
    #[serde(default)]
    pub discounts: DiscountConfig,
    /// Seconds a terminal record is retained before eviction.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

fn default_recipient_address() -> String {
    "0x209693bc6afc0c5328ba36faf03c514ef312287c".into()
}

fn default_payment_timeout_secs() -> u64 {
    300
}

fn default_max_payment_amount() -> Decimal {
    Decimal::new(10000, 1) // 1000.0
}

fn default_fee_rate_percent() -> Decimal {
    Decimal::new(1, 1) // 0.1%
}

fn default_retention_secs() -> u64 {
    3600
}

/// Discount fractions in `[0, 1)` per market segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountConfig {
    pub india_farmers: Decimal,
    pub canada_indigenous: Decimal,
    pub migrant_workers: Decimal,
}

impl Default for DiscountConfig {
    fn default() -> Self {
        Self {
            india_farmers: Decimal::new(7, 1),
            canada_indigenous: Decimal::new(5, 1),
            migrant_workers: Decimal::new(8, 1),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            recipient_address: default_recipient_address(),
            payment_timeout_secs: default_payment_timeout_secs(),
            max_payment_amount: default_max_payment_amount(),
            default_fee_rate_percent: default_fee_rate_percent(),
            discounts: DiscountConfig::default(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl GatewayConfig {
    /// Build the fee schedule quoted to new challenges.
    pub fn fee_schedule(&self) -> FeeSchedule {
        let mut schedule = FeeSchedule {
            default_rate_percent: self.default_fee_rate_percent,
            discounts: Default::default(),
        };
        schedule
            .discounts
            .insert(MarketSegment::IndiaFarmers, self.discounts.india_farmers);
        schedule.discounts.insert(
            MarketSegment::CanadaIndigenous,
            self.discounts.canada_indigenous,
        );
        schedule
            .discounts
            .insert(MarketSegment::MigrantWorkers, self.discounts.migrant_workers);
        schedule
    }
}
