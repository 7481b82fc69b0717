use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;

use taskchain::adapter::{AdapterError, ChainAdapter};
use taskchain::exec::funding::cascade_fund;
use taskchain::model::{CascadeFundingRequest, FundingMode, NetworkFamily};

/// Scripted adapter: a fixed source balance, and transfers that fail for
/// any target listed in `failing`.
struct ScriptedAdapter {
    balance: U256,
    gas_amount: U256,
    failing: Vec<String>,
    transfers: Mutex<Vec<(String, U256)>>,
}

impl ScriptedAdapter {
    fn new(balance: u64) -> ScriptedAdapter {
        ScriptedAdapter {
            balance: U256::from(balance),
            gas_amount: U256::from(63_000u64),
            failing: Vec::new(),
            transfers: Mutex::new(Vec::new()),
        }
    }

    fn transfers(&self) -> Vec<(String, U256)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainAdapter for ScriptedAdapter {
    fn family(&self) -> NetworkFamily {
        NetworkFamily::Evm
    }

    async fn read_balance(&self, _address: &str) -> Result<U256, AdapterError> {
        Ok(self.balance)
    }

    async fn submit_transfer(
        &self,
        _secret: &str,
        to: &str,
        amount: U256,
    ) -> Result<String, AdapterError> {
        if self.failing.iter().any(|f| f == to) {
            return Err(AdapterError::Submission("nonce too low".into()));
        }
        self.transfers.lock().unwrap().push((to.to_string(), amount));
        Ok(format!("0xtx-{to}"))
    }

    async fn read_fee_rate(&self) -> Result<U256, AdapterError> {
        Ok(U256::from(1u64))
    }

    async fn gas_funding_amount(&self) -> U256 {
        self.gas_amount
    }

    async fn request_faucet(&self, _address: &str) -> Result<Option<String>, AdapterError> {
        Err(AdapterError::Unsupported("no faucet".into()))
    }
}

fn request(mode: FundingMode, total: Option<u64>, per: Option<u64>, targets: &[&str]) -> CascadeFundingRequest {
    CascadeFundingRequest {
        owner: "alice".into(),
        source_address: "0xsource".into(),
        mode,
        amount_per_target: per.map(U256::from),
        total_amount: total.map(U256::from),
        targets: targets.iter().map(|t| t.to_string()).collect(),
    }
}

#[tokio::test]
async fn equal_mode_splits_with_floor_and_keeps_remainder() {
    let adapter = ScriptedAdapter::new(1_000);
    let req = request(FundingMode::Equal, Some(100), None, &["a", "b", "c"]);

    let results = cascade_fund(&adapter, "sk", &req, 18, "ETH", Duration::ZERO).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));
    let transfers = adapter.transfers();
    assert_eq!(transfers.len(), 3);
    // 100 / 3 floors to 33; the remainder of 1 stays with the source
    assert!(transfers.iter().all(|(_, amount)| *amount == U256::from(33)));
}

#[tokio::test]
async fn preflight_shortfall_submits_nothing() {
    // needs 3 * 50 = 150, has 149
    let adapter = ScriptedAdapter::new(149);
    let req = request(FundingMode::Fixed, None, Some(50), &["a", "b", "c"]);

    let results = cascade_fund(&adapter, "sk", &req, 18, "ETH", Duration::ZERO).await;

    assert_eq!(results.len(), 1);
    let batch = &results[0];
    assert!(!batch.success);
    assert!(batch.target_address.is_none());
    assert!(batch.message.contains("insufficient balance"));
    assert!(adapter.transfers().is_empty());
}

#[tokio::test]
async fn one_failed_target_does_not_stop_the_cascade() {
    let mut adapter = ScriptedAdapter::new(1_000);
    adapter.failing.push("b".into());
    let req = request(FundingMode::Fixed, None, Some(10), &["a", "b", "c"]);

    let results = cascade_fund(&adapter, "sk", &req, 18, "ETH", Duration::ZERO).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(results[1].message.contains("transfer failed"));
    assert!(results[2].success);
    // the failed target got no transfer, the other two did, in order
    let transfers = adapter.transfers();
    assert_eq!(
        transfers.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(),
        vec!["a", "c"]
    );
}

#[tokio::test]
async fn gas_only_uses_the_adapter_amount() {
    let adapter = ScriptedAdapter::new(1_000_000);
    let req = request(FundingMode::GasOnly, None, None, &["a", "b"]);

    let results = cascade_fund(&adapter, "sk", &req, 18, "ETH", Duration::ZERO).await;

    assert!(results.iter().all(|r| r.success));
    assert!(adapter
        .transfers()
        .iter()
        .all(|(_, amount)| *amount == U256::from(63_000u64)));
}

#[tokio::test]
async fn equal_mode_without_total_is_a_single_failure() {
    let adapter = ScriptedAdapter::new(1_000);
    let req = request(FundingMode::Equal, None, None, &["a"]);

    let results = cascade_fund(&adapter, "sk", &req, 18, "ETH", Duration::ZERO).await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert!(adapter.transfers().is_empty());
}
