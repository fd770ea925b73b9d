//! Shared state handed to API handlers.

use std::sync::Arc;

use tollgate_gateway::PaymentGateway;
use tollgate_settlement::NetworkRegistry;

/// Everything the HTTP surface needs, shared via `Arc`.
pub struct AppState {
    /// The payment-challenge gateway.
    pub gateway: Arc<PaymentGateway>,
    /// Configured settlement networks.
    pub networks: Arc<NetworkRegistry>,
}
