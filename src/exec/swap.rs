use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::exec::{ActionResult, router};
use crate::model::amount::parse_units;
use crate::model::{NetworkConfig, NetworkFamily};
use crate::store::Store;

pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;
const DEADLINE_SECS: i64 = 20 * 60;
const CONFIRMATION_TIMEOUT_SECS: u64 = 120;

// ── Router + token interfaces ───────────────────────────────────────

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IV2Router {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
        function swapExactETHForTokens(uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external payable returns (uint256[] memory amounts);
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

// ── Trade shape ─────────────────────────────────────────────────────

/// Either the network's native asset or a token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRef {
    Native,
    Token(Address),
}

impl AssetRef {
    /// Parse an asset reference from task text. The native sentinels cover
    /// the common ways people write "the gas asset".
    pub fn parse(s: &str) -> Result<AssetRef> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" | "native" | "eth" | "bnb" | "matic" => Ok(AssetRef::Native),
            _ => {
                let addr: Address = s
                    .parse()
                    .with_context(|| format!("`{s}` is neither `native` nor a token address"))?;
                Ok(AssetRef::Token(addr))
            }
        }
    }
}

/// Minimum acceptable output under a slippage tolerance, integer-only:
/// `floor(amount_out * (10000 - slippage_bps) / 10000)`.
pub fn amount_out_min(amount_out: U256, slippage_bps: u32) -> U256 {
    let bps = slippage_bps.min(10_000);
    amount_out * U256::from(10_000 - bps) / U256::from(10_000u32)
}

// ── Executor ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub from: AssetRef,
    pub to: AssetRef,
    /// Human decimal units of the input asset.
    pub amount_in: String,
    pub slippage_bps: u32,
}

/// Builds and submits token trades through the network's resolved V2
/// router. Token→token always hops through the wrapped-native asset; no
/// wider path search is attempted.
pub struct SwapExecutor<'a> {
    store: &'a Store,
    network: &'a NetworkConfig,
    owner: &'a str,
}

impl<'a> SwapExecutor<'a> {
    pub fn new(store: &'a Store, network: &'a NetworkConfig, owner: &'a str) -> SwapExecutor<'a> {
        SwapExecutor { store, network, owner }
    }

    pub async fn swap(&self, secret: &str, request: &SwapRequest) -> ActionResult {
        if self.network.family != NetworkFamily::Evm {
            return ActionResult::fail(format!(
                "swaps on the {} family go through its external adapter and are not automatable here yet",
                self.network.family
            ));
        }

        let router_cfg = match router::resolve(self.store, self.owner, &self.network.network_id).await {
            Ok(Some(cfg)) => cfg,
            Ok(None) => {
                return ActionResult::needs_router(format!(
                    "no router known for network {}; provide a router address to proceed",
                    self.network.network_id
                ));
            }
            Err(e) => return ActionResult::fail(format!("router lookup failed: {e:#}")),
        };

        match self.try_swap(secret, request, &router_cfg.router_address, &router_cfg.wrapped_native_address).await {
            Ok((tx, detail)) => ActionResult::ok_with_tx(
                tx,
                format!("swapped {} via {}", detail, router_cfg.name),
            ),
            Err(e) => ActionResult::fail(format!("swap failed: {e:#}")),
        }
    }

    async fn try_swap(
        &self,
        secret: &str,
        request: &SwapRequest,
        router_address: &str,
        wrapped_native: &str,
    ) -> Result<(String, String)> {
        let router_addr: Address = router_address.parse().context("router address")?;
        let wrapped: Address = wrapped_native.parse().context("wrapped-native address")?;

        let signer: PrivateKeySigner = secret.parse().map_err(|e| anyhow::anyhow!("invalid account secret: {e}"))?;
        let recipient = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.network.rpc_url.parse().context("rpc url")?);

        let router = IV2Router::new(router_addr, &provider);
        let deadline = U256::from(Utc::now().timestamp() + DEADLINE_SECS);

        match (request.from, request.to) {
            (AssetRef::Native, AssetRef::Native) => {
                bail!("both sides are the native asset; nothing to swap")
            }

            // ── native → token ──
            (AssetRef::Native, AssetRef::Token(to_token)) => {
                let amount_in = parse_units(&request.amount_in, self.network.decimals)?;
                let path = vec![wrapped, to_token];
                let amounts = router
                    .getAmountsOut(amount_in, path.clone())
                    .call()
                    .await
                    .context("quote unavailable for native→token path")?;
                let out = *amounts.last().context("empty quote")?;
                let min_out = amount_out_min(out, request.slippage_bps);

                let pending = router
                    .swapExactETHForTokens(min_out, path, recipient, deadline)
                    .value(amount_in)
                    .send()
                    .await
                    .context("swapExactETHForTokens")?;
                let tx = confirm(pending).await?;
                Ok((tx, format!("{} {} → token", request.amount_in, self.network.native_symbol)))
            }

            // ── token → native ──
            (AssetRef::Token(from_token), AssetRef::Native) => {
                let (amount_in, _) =
                    self.token_amount(&provider, from_token, &request.amount_in).await?;
                self.ensure_allowance(&provider, from_token, recipient, router_addr, amount_in)
                    .await?;

                let path = vec![from_token, wrapped];
                let amounts = router
                    .getAmountsOut(amount_in, path.clone())
                    .call()
                    .await
                    .context("quote unavailable for token→native path")?;
                let out = *amounts.last().context("empty quote")?;
                let min_out = amount_out_min(out, request.slippage_bps);

                let pending = router
                    .swapExactTokensForETH(amount_in, min_out, path, recipient, deadline)
                    .send()
                    .await
                    .context("swapExactTokensForETH")?;
                let tx = confirm(pending).await?;
                Ok((tx, format!("{} token → {}", request.amount_in, self.network.native_symbol)))
            }

            // ── token → token, forced wrapped-native hop ──
            (AssetRef::Token(from_token), AssetRef::Token(to_token)) => {
                let (amount_in, _) =
                    self.token_amount(&provider, from_token, &request.amount_in).await?;
                self.ensure_allowance(&provider, from_token, recipient, router_addr, amount_in)
                    .await?;

                let path = vec![from_token, wrapped, to_token];
                let amounts = router
                    .getAmountsOut(amount_in, path.clone())
                    .call()
                    .await
                    .context("quote unavailable for token→token path")?;
                let out = *amounts.last().context("empty quote")?;
                let min_out = amount_out_min(out, request.slippage_bps);

                let pending = router
                    .swapExactTokensForTokens(amount_in, min_out, path, recipient, deadline)
                    .send()
                    .await
                    .context("swapExactTokensForTokens")?;
                let tx = confirm(pending).await?;
                Ok((tx, format!("{} token → token", request.amount_in)))
            }
        }
    }

    /// Scale the human amount by the token's own decimals.
    async fn token_amount<P: Provider + Clone>(
        &self,
        provider: &P,
        token: Address,
        human: &str,
    ) -> Result<(U256, u8)> {
        let erc20 = IERC20::new(token, provider.clone());
        let decimals = erc20.decimals().call().await.context("token decimals")?;
        let amount = parse_units(human, decimals)?;
        Ok((amount, decimals))
    }

    /// Raise the router's allowance to unbounded when it cannot cover the
    /// input, so repeat swaps of the same token skip the approval.
    async fn ensure_allowance<P: Provider + Clone>(
        &self,
        provider: &P,
        token: Address,
        holder: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        let erc20 = IERC20::new(token, provider.clone());
        let allowance = erc20
            .allowance(holder, spender)
            .call()
            .await
            .context("allowance")?;
        if allowance >= amount {
            return Ok(());
        }
        info!(token = %token, "raising router allowance");
        let pending = erc20
            .approve(spender, U256::MAX)
            .send()
            .await
            .context("approve")?;
        confirm(pending).await?;
        Ok(())
    }
}

/// Bounded wait for confirmation; a stuck submission fails this one action
/// rather than hanging the batch.
pub(crate) async fn confirm(
    pending: PendingTransactionBuilder<alloy::network::Ethereum>,
) -> Result<String> {
    let receipt = tokio::time::timeout(
        Duration::from_secs(CONFIRMATION_TIMEOUT_SECS),
        pending.get_receipt(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("confirmation timed out after {CONFIRMATION_TIMEOUT_SECS}s"))?
    .context("awaiting receipt")?;
    if !receipt.status() {
        bail!("transaction reverted (hash: {:?})", receipt.transaction_hash);
    }
    Ok(format!("{:?}", receipt.transaction_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_out_is_integer_floor() {
        assert_eq!(amount_out_min(U256::from(1000), 100), U256::from(990));
        assert_eq!(amount_out_min(U256::from(999), 100), U256::from(989));
        assert_eq!(amount_out_min(U256::from(1000), 0), U256::from(1000));
        assert_eq!(amount_out_min(U256::from(1000), 10_000), U256::ZERO);
        // clamped rather than underflowing
        assert_eq!(amount_out_min(U256::from(1000), 20_000), U256::ZERO);
    }

    #[test]
    fn asset_ref_parsing() {
        assert_eq!(AssetRef::parse("native").unwrap(), AssetRef::Native);
        assert_eq!(AssetRef::parse("ETH").unwrap(), AssetRef::Native);
        assert_eq!(AssetRef::parse("").unwrap(), AssetRef::Native);
        assert!(matches!(
            AssetRef::parse("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").unwrap(),
            AssetRef::Token(_)
        ));
        assert!(AssetRef::parse("not-an-address").is_err());
    }
}
