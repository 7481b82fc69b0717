use serde::{Deserialize, Serialize};

/// A V2-style exchange router on one network.
///
/// Built-in entries are global and keyed by network id; custom entries are
/// keyed by `(owner, network_id)` in the store, at most one per pair.
/// There is no per-exchange ABI descriptor: every entry, custom ones
/// included, must expose the Uniswap V2 router interface (`getAmountsOut`
/// plus the `swapExact*` family). A router with a different ABI fails at
/// call time rather than at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub network_id: String,
    /// Exchange name, for human-facing messages.
    pub name: String,
    /// Router contract address.
    pub router_address: String,
    /// Wrapped-native asset address, used as the forced intermediate hop.
    pub wrapped_native_address: String,
    /// None for built-in entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl RouterConfig {
    fn global(network_id: &str, name: &str, router: &str, wrapped: &str) -> RouterConfig {
        RouterConfig {
            network_id: network_id.to_string(),
            name: name.to_string(),
            router_address: router.to_string(),
            wrapped_native_address: wrapped.to_string(),
            owner: None,
        }
    }

    /// The fixed built-in router table. Any V2 fork only needs a router
    /// address plus the wrapped-native address.
    pub fn builtin(network_id: &str) -> Option<RouterConfig> {
        Some(match network_id {
            "1" => Self::global("1", "Uniswap V2", "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            "56" => Self::global("56", "PancakeSwap V2", "0x10ED43C718714eb63d5aA57B78B54704E256024E", "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
            "137" => Self::global("137", "QuickSwap", "0xa5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff", "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
            "42161" => Self::global("42161", "Uniswap V2 Arbitrum", "0x4752ba5DBc23f44D87826276BF6Fd6b1C372aD24", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
            "8453" => Self::global("8453", "Uniswap V2 Base", "0x4752ba5DBc23f44D87826276BF6Fd6b1C372aD24", "0x4200000000000000000000000000000000000006"),
            "10" => Self::global("10", "Uniswap V2 Optimism", "0x4A7b5Da61326A6379179b40d00F57E5bbDC962c2", "0x4200000000000000000000000000000000000006"),
            "97" => Self::global("97", "PancakeSwap Testnet", "0xD99D1c33F9fC3444f8101754aBC46c52416550D1", "0xae13d989daC2f0dEbFf460aC112a837C89BAa7cd"),
            "11155111" => Self::global("11155111", "Uniswap V2 Sepolia", "0xC532a74256D3Db42D0Bf7a0400fEFDbad7694008", "0x7b79995e5f793A07Bc00c21412e50Ecae098E7f9"),
            "80001" => Self::global("80001", "QuickSwap Mumbai", "0xa5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff", "0x9c3C9283D3e44854697Cd22D3Faa240Cfb032889"),
            _ => return None,
        })
    }
}
