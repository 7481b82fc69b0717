use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;

use taskchain::adapter::AdapterError;
use taskchain::exec::mint::{
    MINT_SIGNATURES, MintAttempt, MintClient, MintExecutor, MintSignature, NameRegistrar,
    PRICE_ACCESSORS,
};
use taskchain::model::NetworkConfig;

/// Scripted contract: a price behind one accessor, and a single signature
/// that works. Everything before it is rejected; an optional erroring
/// signature aborts the probe.
struct ScriptedContract {
    price_accessor: Option<&'static str>,
    price: U256,
    accepts: Option<MintSignature>,
    errors_on: Option<MintSignature>,
    attempts: Mutex<Vec<MintSignature>>,
}

impl ScriptedContract {
    fn accepting(signature: MintSignature) -> ScriptedContract {
        ScriptedContract {
            price_accessor: None,
            price: U256::ZERO,
            accepts: Some(signature),
            errors_on: None,
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> Vec<MintSignature> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MintClient for ScriptedContract {
    async fn read_price(&self, accessor: &str) -> Option<U256> {
        (self.price_accessor == Some(accessor)).then_some(self.price)
    }

    async fn submit_mint(
        &self,
        signature: MintSignature,
        _quantity: u64,
        _value: U256,
    ) -> Result<MintAttempt, AdapterError> {
        self.attempts.lock().unwrap().push(signature);
        if self.errors_on == Some(signature) {
            return Err(AdapterError::Rpc("connection reset".into()));
        }
        if self.accepts == Some(signature) {
            return Ok(MintAttempt::Confirmed("0xminted".into()));
        }
        Ok(MintAttempt::NotApplicable)
    }

    async fn submit_named(
        &self,
        _function: &str,
        _quantity: u64,
        _value: U256,
    ) -> Result<String, AdapterError> {
        Ok("0xnamed".into())
    }
}

fn network() -> NetworkConfig {
    NetworkConfig::builtin("1").unwrap()
}

#[tokio::test]
async fn probes_signatures_in_order_and_stops_at_first_match() {
    let contract = ScriptedContract::accepting(MintSignature::PublicMintNoArg);
    let result = MintExecutor::default()
        .mint_collectible(&contract, None, 1, &network())
        .await;

    assert!(result.success);
    assert_eq!(result.tx_id.as_deref(), Some("0xminted"));
    // everything before publicMint() was tried, nothing after it
    assert_eq!(contract.attempts(), MINT_SIGNATURES[..3].to_vec());
}

#[tokio::test]
async fn transport_error_aborts_instead_of_probing_on() {
    let mut contract = ScriptedContract::accepting(MintSignature::ClaimNoArg);
    contract.errors_on = Some(MintSignature::MintQuantity);

    let result = MintExecutor::default()
        .mint_collectible(&contract, None, 1, &network())
        .await;

    assert!(!result.success);
    assert!(result.message.contains("mint aborted at mint(uint256)"));
    // probe stopped at the error, never reaching the accepting signature
    assert_eq!(contract.attempts().len(), 2);
}

#[tokio::test]
async fn no_matching_signature_is_a_clean_failure() {
    let contract = ScriptedContract {
        accepts: None,
        ..ScriptedContract::accepting(MintSignature::MintNoArg)
    };
    let result = MintExecutor::default()
        .mint_collectible(&contract, None, 1, &network())
        .await;

    assert!(!result.success);
    assert!(result.message.contains("no known mint entry point"));
    assert_eq!(contract.attempts().len(), MINT_SIGNATURES.len());
}

#[tokio::test]
async fn price_detection_follows_the_accessor_ranking() {
    let mut contract = ScriptedContract::accepting(MintSignature::MintNoArg);
    contract.price_accessor = Some("cost");
    contract.price = U256::from(42u64);

    let executor = MintExecutor::default();
    assert_eq!(executor.detect_price(&contract).await, U256::from(42u64));

    // nothing answers: free mint
    contract.price_accessor = None;
    assert_eq!(executor.detect_price(&contract).await, U256::ZERO);

    assert_eq!(PRICE_ACCESSORS[0], "price");
}

#[tokio::test]
async fn explicit_entry_point_skips_the_probe() {
    let contract = ScriptedContract::accepting(MintSignature::MintNoArg);
    let result = MintExecutor::default()
        .mint_collectible(&contract, Some("mintTo"), 2, &network())
        .await;

    assert!(result.success);
    assert_eq!(result.tx_id.as_deref(), Some("0xnamed"));
    // the configured name goes straight through, no signature probing
    assert!(contract.attempts().is_empty());
}

#[tokio::test]
async fn unreachable_minting_api_is_a_clean_failure() {
    let result = MintExecutor::default()
        .mint_chain_native(
            &reqwest::Client::new(),
            "http://127.0.0.1:1/mint",
            "machine-1",
            "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
        )
        .await;

    assert!(!result.success);
    assert!(result.tx_id.is_none());
    assert!(result.message.contains("not yet supported"));
}

// ── Name registration ───────────────────────────────────────────────

struct ScriptedRegistrar {
    available: bool,
    calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl NameRegistrar for ScriptedRegistrar {
    async fn available(&self, _name: &str) -> Result<bool, AdapterError> {
        self.calls.lock().unwrap().push("available");
        Ok(self.available)
    }

    async fn rent_price(&self, _name: &str, _duration_secs: u64) -> Option<U256> {
        Some(U256::from(1_000u64))
    }

    async fn commit(
        &self,
        _name: &str,
        _duration_secs: u64,
        _secret: [u8; 32],
    ) -> Result<String, AdapterError> {
        self.calls.lock().unwrap().push("commit");
        Ok("0xcommit".into())
    }

    async fn register(
        &self,
        _name: &str,
        _duration_secs: u64,
        _secret: [u8; 32],
        _value: U256,
    ) -> Result<String, AdapterError> {
        self.calls.lock().unwrap().push("register");
        Ok("0xregister".into())
    }
}

#[tokio::test]
async fn registration_commits_then_registers() {
    let registrar = ScriptedRegistrar { available: true, calls: Mutex::new(Vec::new()) };
    let executor = MintExecutor { commit_delay: Duration::ZERO };

    let result = executor.register_name(&registrar, "alice", 1).await;

    assert!(result.success);
    assert_eq!(result.tx_id.as_deref(), Some("0xregister"));
    assert_eq!(*registrar.calls.lock().unwrap(), vec!["available", "commit", "register"]);
}

#[tokio::test]
async fn unavailable_name_submits_nothing() {
    let registrar = ScriptedRegistrar { available: false, calls: Mutex::new(Vec::new()) };
    let executor = MintExecutor { commit_delay: Duration::ZERO };

    let result = executor.register_name(&registrar, "alice", 1).await;

    assert!(!result.success);
    assert!(result.message.contains("not available"));
    assert_eq!(*registrar.calls.lock().unwrap(), vec!["available"]);
}
