use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::error::SettlementError;
use crate::network::NetworkProfile;
use crate::traits::{ChainTransaction, ExecutionStatus, NetworkClient};

/// Decimal places of the native unit on EVM networks (wei per coin).
const NATIVE_DECIMALS: u32 = 18;

/// JSON-RPC network client for EVM-style settlement networks.
///
/// Reports native-value transfers; the observed currency is left unset
/// because token-transfer log decoding is out of scope for this adapter.
/// All upstream failures surface as [`SettlementError::Upstream`].
pub struct EvmRpcClient {
    http: reqwest::Client,
}

impl EvmRpcClient {
    /// Create a client with default HTTP settings.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    async fn call(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, SettlementError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SettlementError::Upstream(format!("{method}: {e}")))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SettlementError::Upstream(format!("{method}: malformed response: {e}")))?;

        if let Some(error) = payload.get("error") {
            return Err(SettlementError::Upstream(format!("{method}: {error}")));
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

impl Default for EvmRpcClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkClient for EvmRpcClient {
    async fn fetch_transaction(
        &self,
        profile: &NetworkProfile,
        reference: &str,
    ) -> Result<ChainTransaction, SettlementError> {
        let tx = self
            .call(&profile.rpc_url, "eth_getTransactionByHash", json!([reference]))
            .await?;
        if tx.is_null() {
            return Err(SettlementError::TransactionNotFound(reference.to_string()));
        }

        let receipt = self
            .call(&profile.rpc_url, "eth_getTransactionReceipt", json!([reference]))
            .await?;
        let head = self.call(&profile.rpc_url, "eth_blockNumber", json!([])).await?;
        let head = parse_quantity(&head)?;

        let sender = str_field(&tx, "from")?;
        let recipient = str_field(&tx, "to")?;
        let value = wei_to_decimal(&str_field(&tx, "value")?)?;

        let block_number = match tx.get("blockNumber") {
            Some(Value::String(s)) => Some(parse_hex_u64(s)?),
            _ => None,
        };
        let block_hash = match tx.get("blockHash") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };

        let confirmations = match block_number {
            Some(mined_at) => (head.saturating_sub(mined_at) + 1)
                .min(u32::MAX as u64) as u32,
            None => 0,
        };

        let status = if receipt.is_null() {
            ExecutionStatus::Pending
        } else {
            match receipt.get("status").and_then(Value::as_str) {
                Some("0x0") => ExecutionStatus::Failed,
                _ => ExecutionStatus::Confirmed,
            }
        };

        tracing::debug!(
            network = %profile.id,
            reference = %reference,
            confirmations,
            ?status,
            "fetched transaction state"
        );

        Ok(ChainTransaction {
            reference: reference.to_string(),
            sender,
            recipient,
            value,
            currency: None,
            block_number,
            block_hash,
            confirmations,
            timestamp: None,
            status,
        })
    }
}

fn str_field(value: &Value, field: &str) -> Result<String, SettlementError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SettlementError::Upstream(format!("transaction missing field '{field}'")))
}

fn parse_quantity(value: &Value) -> Result<u64, SettlementError> {
    match value.as_str() {
        Some(s) => parse_hex_u64(s),
        None => Err(SettlementError::Upstream(format!(
            "expected hex quantity, got {value}"
        ))),
    }
}

fn parse_hex_u64(s: &str) -> Result<u64, SettlementError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|_| SettlementError::Upstream(format!("invalid hex quantity: {s}")))
}

/// Convert a hex wei quantity into a native-unit decimal (18 dp).
fn wei_to_decimal(s: &str) -> Result<Decimal, SettlementError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let wei = u128::from_str_radix(digits, 16)
        .map_err(|_| SettlementError::Upstream(format!("invalid wei quantity: {s}")))?;
    let wei = i128::try_from(wei)
        .map_err(|_| SettlementError::Upstream(format!("wei quantity out of range: {s}")))?;
    Decimal::try_from_i128_with_scale(wei, NATIVE_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|_| SettlementError::Upstream(format!("wei quantity out of range: {s}")))
}
