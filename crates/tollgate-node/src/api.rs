//! HTTP API server for the Tollgate node.
//!
//! Exposes the HTTP 402 payment-challenge surface: challenge issuance,
//! proof-of-payment verification, status, batch settlement, fee estimation,
//! and gateway statistics.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use tollgate_core::types::{ChallengeId, Currency, MarketSegment, PaymentChallenge};
use tollgate_gateway::{ChallengeRequest, GatewayError, GatewayStatistics};
use tollgate_settlement::{batch, BatchTransaction, NetworkProfile, TransactionType};

use crate::state::AppState;

// --- Request types ---

#[derive(Deserialize)]
pub struct IssueChallengeRequest {
    pub resource: Option<String>,
    pub amount: Option<Decimal>,
    /// Defaults to USDT.
    pub currency: Option<String>,
    /// Defaults to base-sepolia.
    pub network: Option<String>,
    /// Unknown segments are accepted and yield no discount.
    pub segment: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub payment_id: Option<String>,
    pub transaction_hash: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct BatchSettlementRequest {
    pub transactions: Option<Vec<BatchTransaction>>,
    /// Defaults to hedera-testnet.
    pub network: Option<String>,
}

#[derive(Deserialize)]
pub struct EstimateFeeRequest {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub segment: Option<String>,
    /// Defaults to base-sepolia.
    pub network: Option<String>,
    /// Defaults to a plain transfer.
    pub transaction_type: Option<String>,
}

// --- Response types ---

#[derive(Serialize)]
pub struct ChallengeResponse {
    pub payment_id: String,
    pub resource: String,
    pub amount: Decimal,
    pub currency: String,
    pub network: String,
    pub recipient_address: String,
    pub fee_info: tollgate_core::fees::FeeBreakdown,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<PaymentChallenge> for ChallengeResponse {
    fn from(challenge: PaymentChallenge) -> Self {
        Self {
            payment_id: challenge.id.to_string(),
            resource: challenge.resource,
            amount: challenge.amount,
            currency: challenge.currency.to_string(),
            network: challenge.network,
            recipient_address: challenge.recipient_address,
            fee_info: challenge.fee_breakdown,
            status: challenge.status.to_string(),
            created_at: challenge.created_at,
            expires_at: challenge.expires_at,
            description: challenge.description,
        }
    }
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub payment_id: String,
    pub transaction_hash: String,
    pub net_amount: Decimal,
    pub processing_fee: Decimal,
    pub verified_at: DateTime<Utc>,
    pub explorer_url: String,
    pub confirmations: u32,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub payment_id: String,
    pub status: String,
    pub resource: String,
    pub amount: Decimal,
    pub currency: String,
    pub network: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

#[derive(Serialize)]
pub struct BatchSettlementResponse {
    pub success: bool,
    pub batch_id: String,
    pub merkle_root: String,
    pub transaction_count: usize,
    pub total_amount: Decimal,
    pub network: String,
    pub estimated_network_fee: Decimal,
    pub cost_per_transaction: Decimal,
    pub savings_vs_individual: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct EstimateFeeResponse {
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_segment: Option<String>,
    pub network: String,
    pub fee_breakdown: EstimateFeeBreakdown,
    pub net_amount: Decimal,
    pub effective_rate: Decimal,
}

#[derive(Serialize)]
pub struct EstimateFeeBreakdown {
    pub base_fee: Decimal,
    pub net_fee: Decimal,
    pub discount_amount: Decimal,
    pub settlement_cost: Decimal,
    pub total_fee: Decimal,
}

#[derive(Serialize)]
pub struct NetworksResponse {
    pub networks: Vec<NetworkProfile>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API-boundary error: an HTTP status plus the machine-readable code.
pub struct ApiError {
    status: StatusCode,
    error: String,
    code: &'static str,
}

impl ApiError {
    fn bad_request(code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            code,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let code = err.code();
        let status = match code {
            "PAYMENT_NOT_FOUND" => StatusCode::NOT_FOUND,
            "VERIFICATION_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            error: err.to_string(),
            code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.error,
                code: self.code.to_string(),
            }),
        )
            .into_response()
    }
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/v1/payment/challenge` — issue a challenge and answer
/// 402 Payment Required with machine-readable payment headers.
async fn handle_issue_challenge(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IssueChallengeRequest>,
) -> Result<Response, ApiError> {
    let (resource, amount) = match (req.resource, req.amount) {
        (Some(resource), Some(amount)) if !resource.is_empty() => (resource, amount),
        _ => {
            return Err(ApiError::bad_request(
                "INVALID_REQUEST",
                "missing required fields: resource, amount",
            ));
        }
    };

    let currency = parse_currency(req.currency.as_deref())?;
    let segment = req.segment.as_deref().and_then(MarketSegment::from_code);

    let challenge = state.gateway.issue_challenge(ChallengeRequest {
        resource,
        amount,
        currency,
        network: req.network.unwrap_or_else(|| "base-sepolia".into()),
        segment,
        description: req.description,
    })?;

    let realm = challenge
        .description
        .clone()
        .unwrap_or_else(|| challenge.resource.clone());
    let payment_headers = [
        ("WWW-Authenticate", format!("Bearer realm=\"{realm}\"")),
        (
            "Payment-Required",
            format!("x402-{}", challenge.currency.code().to_lowercase()),
        ),
        ("Payment-Amount", challenge.amount.to_string()),
        ("Payment-Address", challenge.recipient_address.clone()),
        ("Payment-Network", challenge.network.clone()),
    ];

    let mut response = (
        StatusCode::PAYMENT_REQUIRED,
        Json(ChallengeResponse::from(challenge)),
    )
        .into_response();
    for (name, value) in payment_headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
    Ok(response)
}

/// `POST /api/v1/payment/verify` — verify a settlement-network proof
/// against a pending challenge.
async fn handle_verify_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let (payment_id, transaction_hash) = match (req.payment_id, req.transaction_hash) {
        (Some(id), Some(hash)) if !id.is_empty() && !hash.is_empty() => (id, hash),
        _ => {
            return Err(ApiError::bad_request(
                "INVALID_REQUEST",
                "missing required fields: payment_id, transaction_hash",
            ));
        }
    };

    let id: ChallengeId = payment_id
        .parse()
        .map_err(|_| ApiError::bad_request("INVALID_REQUEST", "malformed payment_id"))?;

    let outcome = state
        .gateway
        .verify_payment(id, &transaction_hash, req.user_id)
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        payment_id: outcome.challenge_id.to_string(),
        transaction_hash: outcome.transaction_reference,
        net_amount: outcome.net_amount,
        processing_fee: outcome.fee_charged,
        verified_at: outcome.verified_at,
        explorer_url: outcome.explorer_url,
        confirmations: outcome.confirmations,
    }))
}

/// `GET /api/v1/payment/status/{id}` — lifecycle snapshot.
async fn handle_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id: ChallengeId = id
        .parse()
        .map_err(|_| ApiError::bad_request("INVALID_REQUEST", "malformed payment id"))?;

    let challenge = state
        .gateway
        .status(&id)
        .await
        .ok_or_else(|| ApiError::from(GatewayError::PaymentNotFound(id)))?;

    Ok(Json(StatusResponse {
        payment_id: challenge.id.to_string(),
        status: challenge.status.to_string(),
        resource: challenge.resource,
        amount: challenge.amount,
        currency: challenge.currency.to_string(),
        network: challenge.network,
        created_at: challenge.created_at,
        expires_at: challenge.expires_at,
        verified_at: challenge.verified_at,
        transaction_hash: challenge.transaction_reference,
    }))
}

/// `POST /api/v1/payment/settlement/batch` — commit a batch of offline
/// transactions and amortize the settlement cost.
async fn handle_batch_settlement(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchSettlementRequest>,
) -> Result<Json<BatchSettlementResponse>, ApiError> {
    let transactions = req.transactions.ok_or_else(|| {
        ApiError::bad_request("INVALID_REQUEST", "missing required field: transactions")
    })?;

    let network_id = req.network.unwrap_or_else(|| "hedera-testnet".into());
    let profile = state.networks.get(&network_id).ok_or_else(|| {
        ApiError::from(GatewayError::UnsupportedNetwork(network_id.clone()))
    })?;

    let settlement = batch::build_batch(transactions)
        .map_err(|e| ApiError::from(GatewayError::Verification(e)))?;
    let network_fee = profile.estimate_settlement_cost(TransactionType::ChannelSettle);
    let estimate = settlement.amortize(network_fee);

    Ok(Json(BatchSettlementResponse {
        success: true,
        batch_id: settlement.batch_id.to_string(),
        merkle_root: settlement.merkle_root,
        transaction_count: settlement.transaction_count,
        total_amount: settlement.total_amount,
        network: network_id,
        estimated_network_fee: estimate.network_fee,
        cost_per_transaction: estimate.cost_per_transaction,
        savings_vs_individual: estimate.savings_vs_individual,
        created_at: settlement.created_at,
    }))
}

/// `GET /api/v1/payment/statistics` — aggregates over completed payments.
async fn handle_statistics(State(state): State<Arc<AppState>>) -> Json<GatewayStatistics> {
    Json(state.gateway.statistics())
}

/// `GET /api/v1/payment/networks` — configured settlement networks.
async fn handle_networks(State(state): State<Arc<AppState>>) -> Json<NetworksResponse> {
    let networks: Vec<NetworkProfile> =
        state.networks.profiles().into_iter().cloned().collect();
    let count = networks.len();
    Json(NetworksResponse { networks, count })
}

/// `POST /api/v1/payment/estimate-fee` — quote fees without creating a
/// challenge.
async fn handle_estimate_fee(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EstimateFeeRequest>,
) -> Result<Json<EstimateFeeResponse>, ApiError> {
    let amount = req.amount.ok_or_else(|| {
        ApiError::bad_request("INVALID_REQUEST", "missing required field: amount")
    })?;
    let currency = parse_currency(req.currency.as_deref())?;
    let segment = req.segment.as_deref().and_then(MarketSegment::from_code);

    let network_id = req.network.unwrap_or_else(|| "base-sepolia".into());
    let profile = state.networks.get(&network_id).ok_or_else(|| {
        ApiError::from(GatewayError::UnsupportedNetwork(network_id.clone()))
    })?;

    let fees = state
        .gateway
        .fee_schedule()
        .calculate(amount, segment)
        .map_err(|e| ApiError::from(GatewayError::Core(e)))?;

    let tx_type = TransactionType::from_code(req.transaction_type.as_deref().unwrap_or("transfer"));
    let settlement_cost = profile.estimate_settlement_cost(tx_type);
    let total_fee = round8(fees.net_fee + settlement_cost);

    Ok(Json(EstimateFeeResponse {
        amount,
        currency: currency.to_string(),
        market_segment: segment.map(|s| s.to_string()),
        network: network_id,
        fee_breakdown: EstimateFeeBreakdown {
            base_fee: fees.base_fee,
            net_fee: fees.net_fee,
            discount_amount: fees.discount_amount,
            settlement_cost,
            total_fee,
        },
        net_amount: round8(amount - fees.net_fee - settlement_cost),
        effective_rate: fees.effective_rate,
    }))
}

fn parse_currency(code: Option<&str>) -> Result<Currency, ApiError> {
    match code {
        None => Ok(Currency::Usdt),
        Some(code) => Currency::from_code(code).ok_or_else(|| {
            ApiError::bad_request("INVALID_REQUEST", format!("unsupported currency: {code}"))
        }),
    }
}

fn round8(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero)
}

// --- Server ---

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/payment/challenge", post(handle_issue_challenge))
        .route("/api/v1/payment/verify", post(handle_verify_payment))
        .route("/api/v1/payment/status/{id}", get(handle_status))
        .route(
            "/api/v1/payment/settlement/batch",
            post(handle_batch_settlement),
        )
        .route("/api/v1/payment/statistics", get(handle_statistics))
        .route("/api/v1/payment/networks", get(handle_networks))
        .route("/api/v1/payment/estimate-fee", post(handle_estimate_fee))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
