use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::adapter::{AdapterError, ChainAdapter};
use crate::model::NetworkFamily;

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
// Base fee per signature; Solana keeps this fixed in practice
const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
// 0.005 SOL per funded account
const GAS_FUNDING_LAMPORTS: u64 = 5_000_000;
// 1 SOL airdrop, the devnet faucet maximum
const AIRDROP_LAMPORTS: u64 = LAMPORTS_PER_SOL;

/// Adapter for Solana-style networks over plain JSON-RPC.
///
/// Covers the read, fee and faucet capabilities. Transaction signing for
/// this family lives in an external signing adapter; submissions here
/// report that boundary instead of guessing.
pub struct SolanaAdapter {
    rpc_url: String,
    http: reqwest::Client,
}

impl SolanaAdapter {
    pub fn new(rpc_url: &str) -> SolanaAdapter {
        SolanaAdapter {
            rpc_url: rpc_url.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let resp: Value = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Rpc(format!("{method}: {e}")))?
            .json()
            .await
            .map_err(|e| AdapterError::Rpc(format!("{method}: bad response: {e}")))?;

        if let Some(err) = resp.get("error") {
            return Err(AdapterError::Rpc(format!("{method}: {err}")));
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| AdapterError::Rpc(format!("{method}: missing result")))
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn family(&self) -> NetworkFamily {
        NetworkFamily::Solana
    }

    async fn read_balance(&self, address: &str) -> Result<U256, AdapterError> {
        let result = self.rpc("getBalance", json!([address])).await?;
        let lamports = result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| AdapterError::Rpc("getBalance: missing value".into()))?;
        Ok(U256::from(lamports))
    }

    async fn submit_transfer(
        &self,
        _secret: &str,
        _to: &str,
        _amount: U256,
    ) -> Result<String, AdapterError> {
        Err(AdapterError::Unsupported(
            "Solana transfers require the external Solana signing adapter".into(),
        ))
    }

    async fn read_fee_rate(&self) -> Result<U256, AdapterError> {
        Ok(U256::from(LAMPORTS_PER_SIGNATURE))
    }

    async fn gas_funding_amount(&self) -> U256 {
        U256::from(GAS_FUNDING_LAMPORTS)
    }

    async fn request_faucet(&self, address: &str) -> Result<Option<String>, AdapterError> {
        let result = self
            .rpc("requestAirdrop", json!([address, AIRDROP_LAMPORTS]))
            .await?;
        let signature = result
            .as_str()
            .ok_or_else(|| AdapterError::Rpc("requestAirdrop: missing signature".into()))?;
        Ok(Some(signature.to_string()))
    }
}
