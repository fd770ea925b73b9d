//! Production network-client adapters.

pub mod evm_rpc;

pub use evm_rpc::EvmRpcClient;
