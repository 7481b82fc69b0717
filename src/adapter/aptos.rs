use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::{AdapterError, ChainAdapter};
use crate::model::NetworkFamily;

const COIN_STORE: &str = "0x1::coin::CoinStore%3C0x1::aptos_coin::AptosCoin%3E";
const TESTNET_FAUCET_URL: &str = "https://faucet.testnet.aptoslabs.com";
// 1 APT per faucet request
const FAUCET_OCTAS: u64 = 100_000_000;
// Minimum-viable fee funding, in octas
const GAS_FUNDING_OCTAS: u64 = 1_000;

/// Adapter for Aptos-style networks over the fullnode REST API.
///
/// Like the Solana adapter, this covers reads, fees and the faucet;
/// submission signing belongs to the external Aptos adapter library.
pub struct AptosAdapter {
    rest_url: String,
    is_testnet: bool,
    http: reqwest::Client,
}

impl AptosAdapter {
    pub fn new(rest_url: &str, is_testnet: bool) -> AptosAdapter {
        AptosAdapter {
            rest_url: rest_url.trim_end_matches('/').to_string(),
            is_testnet,
            http: reqwest::Client::new(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, AdapterError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AdapterError::Rpc(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(AdapterError::Rpc(format!("GET {url}: HTTP {}", resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| AdapterError::Rpc(format!("GET {url}: bad response: {e}")))
    }
}

#[async_trait]
impl ChainAdapter for AptosAdapter {
    fn family(&self) -> NetworkFamily {
        NetworkFamily::Aptos
    }

    async fn read_balance(&self, address: &str) -> Result<U256, AdapterError> {
        let url = format!("{}/accounts/{}/resource/{}", self.rest_url, address, COIN_STORE);
        let resource = self.get_json(&url).await?;
        let octas = resource
            .pointer("/data/coin/value")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::Rpc("coin store: missing value".into()))?;
        U256::from_str_radix(octas, 10)
            .map_err(|_| AdapterError::Rpc(format!("coin store: bad value `{octas}`")))
    }

    async fn submit_transfer(
        &self,
        _secret: &str,
        _to: &str,
        _amount: U256,
    ) -> Result<String, AdapterError> {
        Err(AdapterError::Unsupported(
            "Aptos transfers require the external Aptos signing adapter".into(),
        ))
    }

    async fn read_fee_rate(&self) -> Result<U256, AdapterError> {
        let url = format!("{}/estimate_gas_price", self.rest_url);
        let estimate = self.get_json(&url).await?;
        let rate = estimate
            .get("gas_estimate")
            .and_then(Value::as_u64)
            .ok_or_else(|| AdapterError::Rpc("estimate_gas_price: missing gas_estimate".into()))?;
        Ok(U256::from(rate))
    }

    async fn gas_funding_amount(&self) -> U256 {
        U256::from(GAS_FUNDING_OCTAS)
    }

    async fn request_faucet(&self, address: &str) -> Result<Option<String>, AdapterError> {
        if !self.is_testnet {
            return Err(AdapterError::Unsupported(
                "the Aptos faucet only exists on testnet".into(),
            ));
        }
        let url = format!(
            "{}/mint?amount={}&address={}",
            TESTNET_FAUCET_URL, FAUCET_OCTAS, address
        );
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Rpc(format!("faucet: {e}")))?;
        if !resp.status().is_success() {
            return Err(AdapterError::Rpc(format!("faucet: HTTP {}", resp.status())));
        }
        Ok(None)
    }
}
