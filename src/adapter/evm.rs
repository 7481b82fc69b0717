use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::debug;

use crate::adapter::{AdapterError, ChainAdapter};
use crate::model::NetworkFamily;

const CONFIRMATION_TIMEOUT_SECS: u64 = 120;
// 21000 gas for a plain transfer, x3 buffer
const TRANSFER_GAS: u64 = 21_000;
const GAS_BUFFER: u64 = 3;
// 0.001 native, the fallback when the fee query fails
const FALLBACK_GAS_FUNDING_WEI: u128 = 1_000_000_000_000_000;

/// Adapter for account-based EVM networks, built on alloy.
pub struct EvmAdapter {
    rpc_url: String,
    confirmation_timeout: Duration,
}

impl EvmAdapter {
    pub fn new(rpc_url: &str) -> EvmAdapter {
        EvmAdapter {
            rpc_url: rpc_url.to_string(),
            confirmation_timeout: Duration::from_secs(CONFIRMATION_TIMEOUT_SECS),
        }
    }

    fn read_provider(&self) -> Result<impl Provider + Clone, AdapterError> {
        let url = self
            .rpc_url
            .parse()
            .map_err(|e| AdapterError::Rpc(format!("invalid rpc url: {e}")))?;
        Ok(ProviderBuilder::new().connect_http(url))
    }

    fn signing_provider(&self, secret: &str) -> Result<(impl Provider + Clone, Address), AdapterError> {
        let signer: PrivateKeySigner = secret
            .parse()
            .map_err(|e| AdapterError::InvalidSecret(format!("{e}")))?;
        let from = signer.address();
        let wallet = EthereumWallet::from(signer);
        let url = self
            .rpc_url
            .parse()
            .map_err(|e| AdapterError::Rpc(format!("invalid rpc url: {e}")))?;
        Ok((ProviderBuilder::new().wallet(wallet).connect_http(url), from))
    }

    fn parse_address(address: &str) -> Result<Address, AdapterError> {
        address
            .parse()
            .map_err(|_| AdapterError::InvalidAddress(address.to_string()))
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn family(&self) -> NetworkFamily {
        NetworkFamily::Evm
    }

    async fn read_balance(&self, address: &str) -> Result<U256, AdapterError> {
        let provider = self.read_provider()?;
        let addr = Self::parse_address(address)?;
        provider
            .get_balance(addr)
            .await
            .map_err(|e| AdapterError::Rpc(format!("getBalance: {e}")))
    }

    async fn submit_transfer(
        &self,
        secret: &str,
        to: &str,
        amount: U256,
    ) -> Result<String, AdapterError> {
        let (provider, from) = self.signing_provider(secret)?;
        let to_addr = Self::parse_address(to)?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to_addr)
            .with_value(amount);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| AdapterError::Submission(format!("{e}")))?;

        let receipt = tokio::time::timeout(self.confirmation_timeout, pending.get_receipt())
            .await
            .map_err(|_| AdapterError::ConfirmationTimeout(self.confirmation_timeout.as_secs()))?
            .map_err(|e| AdapterError::Submission(format!("awaiting receipt: {e}")))?;

        if !receipt.status() {
            return Err(AdapterError::Submission(format!(
                "transfer reverted (hash: {:?})",
                receipt.transaction_hash
            )));
        }
        debug!(tx = ?receipt.transaction_hash, "transfer confirmed");
        Ok(format!("{:?}", receipt.transaction_hash))
    }

    async fn read_fee_rate(&self) -> Result<U256, AdapterError> {
        let provider = self.read_provider()?;
        let price = provider
            .get_gas_price()
            .await
            .map_err(|e| AdapterError::Rpc(format!("gasPrice: {e}")))?;
        Ok(U256::from(price))
    }

    async fn gas_funding_amount(&self) -> U256 {
        match self.read_fee_rate().await {
            Ok(gas_price) => gas_price * U256::from(TRANSFER_GAS) * U256::from(GAS_BUFFER),
            Err(_) => U256::from(FALLBACK_GAS_FUNDING_WEI),
        }
    }

    async fn request_faucet(&self, _address: &str) -> Result<Option<String>, AdapterError> {
        Err(AdapterError::Unsupported(
            "EVM faucets need a faucet contract address; this cannot be automated generically".into(),
        ))
    }
}
