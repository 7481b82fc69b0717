pub mod aptos;
pub mod evm;
pub mod solana;

use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use thiserror::Error;

use crate::model::{NetworkConfig, NetworkFamily};

/// Errors crossing the chain-adapter boundary.
///
/// The engine performs no retries on these; a retry policy belongs to the
/// adapter itself or to the caller.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("confirmation timed out after {0}s")]
    ConfirmationTimeout(u64),

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("invalid account secret: {0}")]
    InvalidSecret(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("{0}")]
    Unsupported(String),
}

/// Per network-family primitives, uniform across families.
///
/// Every submission blocks until confirmation (or a bounded timeout); no
/// fire-and-forget, because later steps depend on earlier effects being
/// final. All amounts are smallest units.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn family(&self) -> NetworkFamily;

    async fn read_balance(&self, address: &str) -> Result<U256, AdapterError>;

    /// Submit a native-asset transfer and wait for confirmation.
    /// `secret` is the unsealed account secret; it never touches the store.
    async fn submit_transfer(&self, secret: &str, to: &str, amount: U256)
    -> Result<String, AdapterError>;

    /// Current fee rate in the family's native fee unit.
    async fn read_fee_rate(&self) -> Result<U256, AdapterError>;

    /// Minimum-viable funding amount for the gas-only cascade mode.
    /// Live fee query where available, constant fallback otherwise.
    async fn gas_funding_amount(&self) -> U256;

    /// Request test funds for an address. Returns a tx id where the faucet
    /// produces one.
    async fn request_faucet(&self, address: &str) -> Result<Option<String>, AdapterError>;
}

/// Build the adapter matching a network's family, pointed at its endpoint.
pub fn for_network(network: &NetworkConfig) -> Arc<dyn ChainAdapter> {
    match network.family {
        NetworkFamily::Evm => Arc::new(evm::EvmAdapter::new(&network.rpc_url)),
        NetworkFamily::Solana => Arc::new(solana::SolanaAdapter::new(&network.rpc_url)),
        NetworkFamily::Aptos => Arc::new(aptos::AptosAdapter::new(&network.rpc_url, network.is_testnet)),
    }
}

/// Injection seam: the runner and CLI resolve adapters through this so tests
/// can substitute mocks.
pub type AdapterFactory = Arc<dyn Fn(&NetworkConfig) -> Arc<dyn ChainAdapter> + Send + Sync>;

pub fn default_factory() -> AdapterFactory {
    Arc::new(for_network)
}
