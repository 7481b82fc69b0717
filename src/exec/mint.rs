use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, U256, keccak256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info};

use crate::adapter::AdapterError;
use crate::exec::{ActionResult, swap::confirm};
use crate::model::NetworkConfig;
use crate::model::amount::format_units;

/// Replay-protection window of the name registrar, plus slack.
pub const COMMIT_DELAY: Duration = Duration::from_secs(65);
const SECONDS_PER_YEAR: u64 = 365 * 24 * 3600;
// 0.01 native, when the registrar refuses to quote
const FALLBACK_RENT_WEI: u128 = 10_000_000_000_000_000;

/// What is being minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintKind {
    /// ERC721-style collectible.
    Collectible,
    /// ERC1155-style multi-token.
    MultiToken,
    /// Chain-native NFT minted through an external API (e.g. candy machine).
    ChainNative,
    /// Commit/wait/register name registration.
    NameRegistration,
}

impl MintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MintKind::Collectible => "collectible",
            MintKind::MultiToken => "multi_token",
            MintKind::ChainNative => "chain_native",
            MintKind::NameRegistration => "name_registration",
        }
    }
}

impl std::str::FromStr for MintKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collectible" => Ok(MintKind::Collectible),
            "multi_token" => Ok(MintKind::MultiToken),
            "chain_native" => Ok(MintKind::ChainNative),
            "name_registration" => Ok(MintKind::NameRegistration),
            other => Err(format!("unknown mint kind `{other}`")),
        }
    }
}

// ── Candidate entry points ──────────────────────────────────────────

/// Known mint entry-point signatures, probed in this exact order. Lower
/// index wins; some signatures are behavioral prefixes of later ones, so
/// the ordering is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintSignature {
    MintNoArg,
    MintQuantity,
    PublicMintNoArg,
    PublicMintQuantity,
    ClaimNoArg,
    ClaimQuantity,
    SafeMintTo,
}

impl MintSignature {
    pub fn label(&self) -> &'static str {
        match self {
            MintSignature::MintNoArg => "mint()",
            MintSignature::MintQuantity => "mint(uint256)",
            MintSignature::PublicMintNoArg => "publicMint()",
            MintSignature::PublicMintQuantity => "publicMint(uint256)",
            MintSignature::ClaimNoArg => "claim()",
            MintSignature::ClaimQuantity => "claim(uint256)",
            MintSignature::SafeMintTo => "safeMint(address)",
        }
    }
}

pub const MINT_SIGNATURES: &[MintSignature] = &[
    MintSignature::MintNoArg,
    MintSignature::MintQuantity,
    MintSignature::PublicMintNoArg,
    MintSignature::PublicMintQuantity,
    MintSignature::ClaimNoArg,
    MintSignature::ClaimQuantity,
    MintSignature::SafeMintTo,
];

/// Known price accessors, ranked. First one that answers wins.
pub const PRICE_ACCESSORS: &[&str] = &["price", "mintPrice", "cost", "PRICE", "MINT_PRICE"];

/// Outcome of trying one candidate entry point.
pub enum MintAttempt {
    /// Confirmed on-chain; carries the transaction id.
    Confirmed(String),
    /// The contract rejected this signature; definitely not this one,
    /// try the next candidate.
    NotApplicable,
}

/// One NFT contract as seen by the probing executor. The EVM client below
/// is the production implementation; tests substitute their own.
#[async_trait]
pub trait MintClient: Send + Sync {
    /// Read one ranked price accessor. `None` when the accessor is absent
    /// or reverts.
    async fn read_price(&self, accessor: &str) -> Option<U256>;

    /// Try one candidate entry point, paying `value`, and wait for
    /// confirmation. Transport and configuration errors are `Err`, never
    /// `NotApplicable`; they abort the probe instead of masking it.
    async fn submit_mint(
        &self,
        signature: MintSignature,
        quantity: u64,
        value: U256,
    ) -> Result<MintAttempt, AdapterError>;

    /// Call an explicitly configured entry point by name.
    async fn submit_named(
        &self,
        function: &str,
        quantity: u64,
        value: U256,
    ) -> Result<String, AdapterError>;
}

/// The two-phase name registrar.
#[async_trait]
pub trait NameRegistrar: Send + Sync {
    async fn available(&self, name: &str) -> Result<bool, AdapterError>;
    async fn rent_price(&self, name: &str, duration_secs: u64) -> Option<U256>;
    async fn commit(&self, name: &str, duration_secs: u64, secret: [u8; 32])
    -> Result<String, AdapterError>;
    async fn register(
        &self,
        name: &str,
        duration_secs: u64,
        secret: [u8; 32],
        value: U256,
    ) -> Result<String, AdapterError>;
}

// ── Executor ────────────────────────────────────────────────────────

pub struct MintExecutor {
    pub commit_delay: Duration,
}

impl Default for MintExecutor {
    fn default() -> Self {
        MintExecutor { commit_delay: COMMIT_DELAY }
    }
}

impl MintExecutor {
    /// Ranked price detection: first accessor that answers, else free.
    pub async fn detect_price(&self, client: &dyn MintClient) -> U256 {
        for accessor in PRICE_ACCESSORS {
            if let Some(price) = client.read_price(accessor).await {
                return price;
            }
        }
        U256::ZERO
    }

    /// Mint a collectible or multi-token. With an explicit entry point
    /// configured the call goes straight there; otherwise the ranked
    /// signature list is probed in order, first success wins.
    pub async fn mint_collectible(
        &self,
        client: &dyn MintClient,
        explicit_function: Option<&str>,
        quantity: u64,
        network: &NetworkConfig,
    ) -> ActionResult {
        let price = self.detect_price(client).await;
        let total = price * U256::from(quantity);

        if let Some(function) = explicit_function {
            return match client.submit_named(function, quantity, total).await {
                Ok(tx) => ActionResult::ok_with_tx(
                    tx,
                    format!(
                        "minted {}x via {} (cost {} {})",
                        quantity,
                        function,
                        format_units(total, network.decimals),
                        network.native_symbol
                    ),
                ),
                Err(e) => ActionResult::fail(format!("mint via {function} failed: {e}")),
            };
        }

        for signature in MINT_SIGNATURES {
            debug!(signature = signature.label(), "probing mint entry point");
            match client.submit_mint(*signature, quantity, total).await {
                Ok(MintAttempt::Confirmed(tx)) => {
                    info!(signature = signature.label(), tx = %tx, "mint succeeded");
                    return ActionResult::ok_with_tx(
                        tx,
                        format!(
                            "minted {}x via {} (cost {} {})",
                            quantity,
                            signature.label(),
                            format_units(total, network.decimals),
                            network.native_symbol
                        ),
                    );
                }
                Ok(MintAttempt::NotApplicable) => continue,
                Err(e) => {
                    return ActionResult::fail(format!(
                        "mint aborted at {}: {e}",
                        signature.label()
                    ));
                }
            }
        }

        ActionResult::fail(
            "no known mint entry point matched this contract; provide its mint function name",
        )
    }

    /// Chain-native NFT mint through an external minting API. No partial
    /// state: a missing or unsuccessful response is a clean failure.
    pub async fn mint_chain_native(
        &self,
        http: &reqwest::Client,
        api_url: &str,
        machine_id: &str,
        minter_address: &str,
    ) -> ActionResult {
        let body = serde_json::json!({ "machineId": machine_id, "minter": minter_address });
        let resp = match http.post(api_url).json(&body).send().await {
            Ok(r) => r,
            Err(_) => {
                return ActionResult::fail(
                    "chain-native NFT minting needs the external minting API, which is unreachable; not yet supported here",
                );
            }
        };
        if !resp.status().is_success() {
            return ActionResult::fail(
                "the external minting API declined this mint; chain-native minting is not yet supported here",
            );
        }
        match resp.json::<serde_json::Value>().await.ok().and_then(|v| {
            v.get("signature").and_then(|s| s.as_str()).map(String::from)
        }) {
            Some(tx) => ActionResult::ok_with_tx(tx, "chain-native NFT minted"),
            None => ActionResult::fail("minting API returned no transaction id"),
        }
    }

    /// Two-phase commit/wait/register. An unavailable name short-circuits
    /// with no transactions submitted.
    pub async fn register_name(
        &self,
        registrar: &dyn NameRegistrar,
        name: &str,
        duration_years: u64,
    ) -> ActionResult {
        let duration_secs = duration_years.max(1) * SECONDS_PER_YEAR;

        match registrar.available(name).await {
            Ok(true) => {}
            Ok(false) => return ActionResult::fail(format!("name `{name}` is not available")),
            Err(e) => return ActionResult::fail(format!("availability check failed: {e}")),
        }

        let price = registrar
            .rent_price(name, duration_secs)
            .await
            .unwrap_or(U256::from(FALLBACK_RENT_WEI));

        use rand::Rng;
        let secret: [u8; 32] = rand::rng().random();

        let commit_tx = match registrar.commit(name, duration_secs, secret).await {
            Ok(tx) => tx,
            Err(e) => return ActionResult::fail(format!("commit failed: {e}")),
        };
        debug!(%commit_tx, "commitment confirmed, waiting out the registrar window");
        tokio::time::sleep(self.commit_delay).await;

        match registrar.register(name, duration_secs, secret, price).await {
            Ok(tx) => ActionResult::ok_with_tx(tx, format!("registered name `{name}`")),
            Err(e) => ActionResult::fail(format!("register failed: {e}")),
        }
    }
}

// ── EVM implementations ─────────────────────────────────────────────

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IMintNoArg { function mint() external payable; }
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IMintQuantity { function mint(uint256 quantity) external payable; }
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IPublicMintNoArg { function publicMint() external payable; }
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IPublicMintQuantity { function publicMint(uint256 quantity) external payable; }
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IClaimNoArg { function claim() external payable; }
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IClaimQuantity { function claim(uint256 quantity) external payable; }
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract ISafeMintTo { function safeMint(address to) external payable; }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IPriceViews {
        function price() external view returns (uint256);
        function mintPrice() external view returns (uint256);
        function cost() external view returns (uint256);
        function PRICE() external view returns (uint256);
        function MINT_PRICE() external view returns (uint256);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IRegistrar {
        function available(string calldata name) external view returns (bool);
        function rentPrice(string calldata name, uint256 duration) external view returns (uint256);
        function makeCommitment(string calldata name, address owner, uint256 duration, bytes32 secret) external pure returns (bytes32);
        function commit(bytes32 commitment) external;
        function register(string calldata name, address owner, uint256 duration, bytes32 secret) external payable;
    }
}

/// `MintClient` over a live EVM contract. The signing provider is cheap to
/// assemble, so one is built per call from the stored wallet.
pub struct EvmMintClient {
    contract: Address,
    minter: Address,
    wallet: EthereumWallet,
    rpc_url: Url,
}

impl EvmMintClient {
    pub fn new(network: &NetworkConfig, secret: &str, contract: &str) -> Result<EvmMintClient> {
        let signer: PrivateKeySigner = secret
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid account secret: {e}"))?;
        let minter = signer.address();
        let wallet = EthereumWallet::from(signer);
        let rpc_url: Url = network.rpc_url.parse().context("rpc url")?;
        let contract: Address = contract.parse().context("contract address")?;
        Ok(EvmMintClient { contract, minter, wallet, rpc_url })
    }

    fn provider(&self) -> impl Provider + Clone + use<> {
        ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .connect_http(self.rpc_url.clone())
    }
}

/// Calldata for `function(uint256)` by name, for configured entry points
/// outside the built-in signature list.
fn quantity_call_data(function: &str, quantity: u64) -> Vec<u8> {
    let selector = keccak256(format!("{function}(uint256)").as_bytes());
    let mut data = selector[..4].to_vec();
    data.extend_from_slice(&U256::from(quantity).to_be_bytes::<32>());
    data
}

/// Map a send error to "wrong signature" or a real failure. Reverts and
/// unrecognized selectors mean "not this one"; anything else aborts.
fn classify_send_error(e: impl std::fmt::Display) -> Result<MintAttempt, AdapterError> {
    let text = e.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("revert") || lowered.contains("selector") || lowered.contains("execution") {
        Ok(MintAttempt::NotApplicable)
    } else {
        Err(AdapterError::Submission(text))
    }
}

#[async_trait]
impl MintClient for EvmMintClient {
    async fn read_price(&self, accessor: &str) -> Option<U256> {
        let provider = self.provider();
        let views = IPriceViews::new(self.contract, &provider);
        match accessor {
            "price" => views.price().call().await.ok(),
            "mintPrice" => views.mintPrice().call().await.ok(),
            "cost" => views.cost().call().await.ok(),
            "PRICE" => views.PRICE().call().await.ok(),
            "MINT_PRICE" => views.MINT_PRICE().call().await.ok(),
            _ => None,
        }
    }

    async fn submit_mint(
        &self,
        signature: MintSignature,
        quantity: u64,
        value: U256,
    ) -> Result<MintAttempt, AdapterError> {
        let qty = U256::from(quantity);
        let provider = self.provider();
        let sent = match signature {
            MintSignature::MintNoArg => {
                IMintNoArg::new(self.contract, &provider).mint().value(value).send().await
            }
            MintSignature::MintQuantity => {
                IMintQuantity::new(self.contract, &provider).mint(qty).value(value).send().await
            }
            MintSignature::PublicMintNoArg => {
                IPublicMintNoArg::new(self.contract, &provider).publicMint().value(value).send().await
            }
            MintSignature::PublicMintQuantity => {
                IPublicMintQuantity::new(self.contract, &provider).publicMint(qty).value(value).send().await
            }
            MintSignature::ClaimNoArg => {
                IClaimNoArg::new(self.contract, &provider).claim().value(value).send().await
            }
            MintSignature::ClaimQuantity => {
                IClaimQuantity::new(self.contract, &provider).claim(qty).value(value).send().await
            }
            MintSignature::SafeMintTo => {
                ISafeMintTo::new(self.contract, &provider).safeMint(self.minter).value(value).send().await
            }
        };

        let pending = match sent {
            Ok(p) => p,
            Err(e) => return classify_send_error(e),
        };
        match confirm(pending).await {
            Ok(tx) => Ok(MintAttempt::Confirmed(tx)),
            Err(e) => classify_send_error(format!("{e:#}")),
        }
    }

    async fn submit_named(
        &self,
        function: &str,
        quantity: u64,
        value: U256,
    ) -> Result<String, AdapterError> {
        // Known names go through the typed interfaces; anything else is
        // called directly with a uint256 quantity argument.
        if let Some(signature) = MINT_SIGNATURES
            .iter()
            .find(|s| s.label().starts_with(&format!("{function}(")))
            .copied()
        {
            return match self.submit_mint(signature, quantity, value).await? {
                MintAttempt::Confirmed(tx) => Ok(tx),
                MintAttempt::NotApplicable => Err(AdapterError::Submission(format!(
                    "configured mint function `{function}` reverted"
                ))),
            };
        }

        let provider = self.provider();
        let tx = TransactionRequest::default()
            .with_from(self.minter)
            .with_to(self.contract)
            .with_value(value)
            .with_input(quantity_call_data(function, quantity));
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| AdapterError::Submission(format!("{function}: {e}")))?;
        confirm(pending)
            .await
            .map_err(|e| AdapterError::Submission(format!("{e:#}")))
    }
}

/// `NameRegistrar` over a live EVM registrar contract.
pub struct EvmNameRegistrar {
    registrar: Address,
    owner_addr: Address,
    wallet: EthereumWallet,
    rpc_url: Url,
}

impl EvmNameRegistrar {
    pub fn new(network: &NetworkConfig, secret: &str, registrar: &str) -> Result<EvmNameRegistrar> {
        let signer: PrivateKeySigner = secret
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid account secret: {e}"))?;
        let owner_addr = signer.address();
        let wallet = EthereumWallet::from(signer);
        let rpc_url: Url = network.rpc_url.parse().context("rpc url")?;
        let registrar: Address = registrar.parse().context("registrar address")?;
        Ok(EvmNameRegistrar { registrar, owner_addr, wallet, rpc_url })
    }

    fn provider(&self) -> impl Provider + Clone + use<> {
        ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .connect_http(self.rpc_url.clone())
    }
}

#[async_trait]
impl NameRegistrar for EvmNameRegistrar {
    async fn available(&self, name: &str) -> Result<bool, AdapterError> {
        let provider = self.provider();
        IRegistrar::new(self.registrar, &provider)
            .available(name.to_string())
            .call()
            .await
            .map_err(|e| AdapterError::Rpc(format!("available(): {e}")))
    }

    async fn rent_price(&self, name: &str, duration_secs: u64) -> Option<U256> {
        let provider = self.provider();
        IRegistrar::new(self.registrar, &provider)
            .rentPrice(name.to_string(), U256::from(duration_secs))
            .call()
            .await
            .ok()
    }

    async fn commit(
        &self,
        name: &str,
        duration_secs: u64,
        secret: [u8; 32],
    ) -> Result<String, AdapterError> {
        let provider = self.provider();
        let contract = IRegistrar::new(self.registrar, &provider);
        let commitment = contract
            .makeCommitment(
                name.to_string(),
                self.owner_addr,
                U256::from(duration_secs),
                B256::from(secret),
            )
            .call()
            .await
            .map_err(|e| AdapterError::Rpc(format!("makeCommitment: {e}")))?;
        let pending = contract
            .commit(commitment)
            .send()
            .await
            .map_err(|e| AdapterError::Submission(format!("commit: {e}")))?;
        confirm(pending)
            .await
            .map_err(|e| AdapterError::Submission(format!("{e:#}")))
    }

    async fn register(
        &self,
        name: &str,
        duration_secs: u64,
        secret: [u8; 32],
        value: U256,
    ) -> Result<String, AdapterError> {
        let provider = self.provider();
        let pending = IRegistrar::new(self.registrar, &provider)
            .register(
                name.to_string(),
                self.owner_addr,
                U256::from(duration_secs),
                B256::from(secret),
            )
            .value(value)
            .send()
            .await
            .map_err(|e| AdapterError::Submission(format!("register: {e}")))?;
        confirm(pending)
            .await
            .map_err(|e| AdapterError::Submission(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_call_data_is_selector_plus_one_word() {
        // mint(uint256) has the well-known selector a0712d68
        let data = quantity_call_data("mint", 3);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0xa0, 0x71, 0x2d, 0x68]);
        assert!(data[4..35].iter().all(|b| *b == 0));
        assert_eq!(data[35], 3);
    }
}
