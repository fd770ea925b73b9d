use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::fees::FeeBreakdown;
use crate::state_machine::ChallengeStatus;

/// Unique identifier for a payment challenge (UUID v7 — time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(pub Uuid);

impl ChallengeId {
    /// Create a new random challenge ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChallengeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::InvalidChallengeId(s.to_string()))
    }
}

/// Stable-value settlement units accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Usdt,
    Usdc,
}

impl Currency {
    /// Currency symbol.
    pub fn code(&self) -> &str {
        match self {
            Self::Usdt => "USDT",
            Self::Usdc => "USDC",
        }
    }

    /// Number of decimal places in the smallest settlement unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Usdt | Self::Usdc => 6,
        }
    }

    /// Parse from a currency code, case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "USDT" => Some(Self::Usdt),
            "USDC" => Some(Self::Usdc),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Market segments granted a fee discount.
///
/// An unknown segment code parses to `None` and is treated as "no segment"
/// (zero discount) everywhere — never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketSegment {
    IndiaFarmers,
    CanadaIndigenous,
    MigrantWorkers,
}

impl MarketSegment {
    /// Wire code for this segment.
    pub fn code(&self) -> &str {
        match self {
            Self::IndiaFarmers => "india_farmers",
            Self::CanadaIndigenous => "canada_indigenous",
            Self::MigrantWorkers => "migrant_workers",
        }
    }

    /// Parse from a wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "india_farmers" => Some(Self::IndiaFarmers),
            "canada_indigenous" => Some(Self::CanadaIndigenous),
            "migrant_workers" => Some(Self::MigrantWorkers),
            _ => None,
        }
    }
}

impl fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A quoted, time-bounded payment obligation.
///
/// The fee breakdown is computed once at creation and never recomputed, so
/// the quoted price is honored even if the fee schedule changes afterwards.
/// The gateway exclusively owns the record for its entire life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentChallenge {
    /// Opaque unique identifier.
    pub id: ChallengeId,
    /// What is being paid for.
    pub resource: String,
    /// Gross amount requested, fixed at creation.
    pub amount: Decimal,
    /// Settlement unit.
    pub currency: Currency,
    /// Target settlement network identifier.
    pub network: String,
    /// Address that must receive the funds.
    pub recipient_address: String,
    /// Fee quote, immutable after creation.
    pub fee_breakdown: FeeBreakdown,
    /// Segment the quote was issued under, if any.
    pub market_segment: Option<MarketSegment>,
    /// Free-form resource description for the 402 response.
    pub description: Option<String>,
    /// Lifecycle state.
    pub status: ChallengeStatus,
    /// When the challenge was issued.
    pub created_at: DateTime<Utc>,
    /// Absolute deadline for payment.
    pub expires_at: DateTime<Utc>,
    /// Settlement-network proof, set only on completion.
    pub transaction_reference: Option<String>,
    /// Set only on completion.
    pub verified_at: Option<DateTime<Utc>>,
    /// Payer identifier submitted at verification time, if any.
    pub payer: Option<String>,
}

impl PaymentChallenge {
    /// The single expiry predicate shared by lazy checks and the sweep.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
