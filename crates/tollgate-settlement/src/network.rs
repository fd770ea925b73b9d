use std::collections::HashMap;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use tollgate_core::types::Currency;

/// Accepted proof-of-payment reference formats, dispatched per network
/// profile rather than by inspecting the network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceGrammar {
    /// `0x` followed by 64 hexadecimal characters.
    EvmHex,
    /// `shard.realm@seconds.nanos` consensus-timestamp references.
    /// Networks using this style expose EVM-style hashes through their
    /// relay as well, so both forms are accepted.
    ConsensusTimestamp,
}

impl ReferenceGrammar {
    /// Whether `reference` is well-formed under this grammar.
    pub fn matches(&self, reference: &str) -> bool {
        match self {
            Self::EvmHex => is_evm_hash(reference),
            Self::ConsensusTimestamp => {
                is_consensus_timestamp(reference) || is_evm_hash(reference)
            }
        }
    }
}

fn is_evm_hash(s: &str) -> bool {
    s.len() == 66
        && s.starts_with("0x")
        && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_consensus_timestamp(s: &str) -> bool {
    let mut parts = s.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(entity), Some(instant), None) => {
            is_dotted_decimal(entity) && is_dotted_decimal(instant)
        }
        _ => false,
    }
}

fn is_dotted_decimal(s: &str) -> bool {
    let mut parts = s.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => {
            !a.is_empty()
                && !b.is_empty()
                && a.bytes().all(|c| c.is_ascii_digit())
                && b.bytes().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Settlement operation classes with distinct network-cost multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    TokenTransfer,
    ChannelCreate,
    ChannelSettle,
    CredentialMint,
}

impl TransactionType {
    /// Cost multiplier relative to a plain transfer.
    pub fn multiplier(&self) -> Decimal {
        match self {
            Self::Transfer => Decimal::new(10, 1),       // 1.0
            Self::TokenTransfer => Decimal::new(15, 1),  // 1.5
            Self::ChannelCreate => Decimal::new(20, 1),  // 2.0
            Self::ChannelSettle => Decimal::new(25, 1),  // 2.5
            Self::CredentialMint => Decimal::new(18, 1), // 1.8
        }
    }

    /// Wire code for this operation class.
    pub fn code(&self) -> &str {
        match self {
            Self::Transfer => "transfer",
            Self::TokenTransfer => "token_transfer",
            Self::ChannelCreate => "channel_create",
            Self::ChannelSettle => "channel_settle",
            Self::CredentialMint => "credential_mint",
        }
    }

    /// Parse from a wire code. Unknown codes fall back to `Transfer`
    /// (multiplier 1.0) rather than failing the estimate.
    pub fn from_code(code: &str) -> Self {
        match code {
            "token_transfer" => Self::TokenTransfer,
            "channel_create" => Self::ChannelCreate,
            "channel_settle" => Self::ChannelSettle,
            "credential_mint" => Self::CredentialMint,
            _ => Self::Transfer,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Read-only per-network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Network identifier, e.g. "base-sepolia".
    pub id: String,
    /// RPC endpoint the network client talks to.
    pub rpc_url: String,
    /// Base URL of the human-readable explorer.
    pub explorer_url: String,
    /// Confirmation depth treated as final.
    pub required_confirmations: u32,
    /// Flat cost estimate (USD) for one plain settlement.
    pub base_settlement_cost: Decimal,
    /// Proof-of-payment reference format accepted by this network.
    pub reference_grammar: ReferenceGrammar,
    /// Stable-value units settleable on this network.
    pub supported_currencies: Vec<Currency>,
}

impl NetworkProfile {
    /// Explorer link for a transaction reference.
    pub fn explorer_tx_url(&self, reference: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, reference)
    }

    /// Flat settlement-cost estimate for an operation class, 8 dp.
    pub fn estimate_settlement_cost(&self, tx_type: TransactionType) -> Decimal {
        (self.base_settlement_cost * tx_type.multiplier())
            .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Lookup table of configured settlement networks.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    profiles: HashMap<String, NetworkProfile>,
}

impl NetworkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in network profiles.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for profile in [
            NetworkProfile {
                id: "hedera-testnet".into(),
                rpc_url: "https://testnet.hashio.io/api".into(),
                explorer_url: "https://hashscan.io/testnet".into(),
                required_confirmations: 1,
                base_settlement_cost: Decimal::new(1, 3), // 0.001
                reference_grammar: ReferenceGrammar::ConsensusTimestamp,
                supported_currencies: vec![Currency::Usdt, Currency::Usdc],
            },
            NetworkProfile {
                id: "base-sepolia".into(),
                rpc_url: "https://sepolia.base.org".into(),
                explorer_url: "https://sepolia.basescan.org".into(),
                required_confirmations: 1,
                base_settlement_cost: Decimal::new(1, 2), // 0.01
                reference_grammar: ReferenceGrammar::EvmHex,
                supported_currencies: vec![Currency::Usdt, Currency::Usdc],
            },
            NetworkProfile {
                id: "ethereum-sepolia".into(),
                rpc_url: "https://rpc.sepolia.org".into(),
                explorer_url: "https://sepolia.etherscan.io".into(),
                required_confirmations: 3,
                base_settlement_cost: Decimal::new(50, 2), // 0.50
                reference_grammar: ReferenceGrammar::EvmHex,
                supported_currencies: vec![Currency::Usdt, Currency::Usdc],
            },
            NetworkProfile {
                id: "polygon-mumbai".into(),
                rpc_url: "https://rpc-mumbai.maticvigil.com".into(),
                explorer_url: "https://mumbai.polygonscan.com".into(),
                required_confirmations: 2,
                base_settlement_cost: Decimal::new(5, 2), // 0.05
                reference_grammar: ReferenceGrammar::EvmHex,
                supported_currencies: vec![Currency::Usdt, Currency::Usdc],
            },
        ] {
            registry.register(profile);
        }
        registry
    }

    /// Register (or replace) a network profile, keyed by its id.
    pub fn register(&mut self, profile: NetworkProfile) {
        tracing::debug!(network = %profile.id, "registering network profile");
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Look up a profile by network identifier.
    pub fn get(&self, id: &str) -> Option<&NetworkProfile> {
        self.profiles.get(id)
    }

    /// All configured profiles, sorted by id for stable listings.
    pub fn profiles(&self) -> Vec<&NetworkProfile> {
        let mut all: Vec<&NetworkProfile> = self.profiles.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of configured networks.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no networks are configured.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
