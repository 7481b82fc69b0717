use serde::{Deserialize, Serialize};

/// A class of ledgers sharing an execution/account model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFamily {
    Evm,
    Solana,
    Aptos,
}

impl NetworkFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkFamily::Evm => "evm",
            NetworkFamily::Solana => "solana",
            NetworkFamily::Aptos => "aptos",
        }
    }
}

impl std::str::FromStr for NetworkFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "evm" => Ok(NetworkFamily::Evm),
            "solana" => Ok(NetworkFamily::Solana),
            "aptos" => Ok(NetworkFamily::Aptos),
            other => Err(format!("unknown network family `{other}`")),
        }
    }
}

impl std::fmt::Display for NetworkFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A network the engine can act on.
///
/// Either a fixed built-in entry or a per-owner custom entry. Read-only to
/// the engine; task sets hold a frozen snapshot of these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Stable identifier. EVM networks use the decimal chain id ("1",
    /// "8453", ...); other families use a named id ("solana-mainnet").
    pub network_id: String,
    /// Human-readable name.
    pub name: String,
    /// JSON-RPC (EVM/Solana) or REST (Aptos) endpoint.
    pub rpc_url: String,
    /// Native asset ticker.
    pub native_symbol: String,
    /// Decimal places of the native asset.
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub is_testnet: bool,
    pub family: NetworkFamily,
}

impl NetworkConfig {
    /// Look up a built-in network by id. Custom networks live in the store.
    pub fn builtin(network_id: &str) -> Option<NetworkConfig> {
        let cfg = |name: &str, rpc: &str, symbol: &str, decimals: u8, explorer: &str, testnet: bool, family: NetworkFamily| NetworkConfig {
            network_id: network_id.to_string(),
            name: name.to_string(),
            rpc_url: rpc.to_string(),
            native_symbol: symbol.to_string(),
            decimals,
            explorer_url: Some(explorer.to_string()),
            is_testnet: testnet,
            family,
        };
        use NetworkFamily::*;
        Some(match network_id {
            "1" => cfg("Ethereum Mainnet", "https://eth.llamarpc.com", "ETH", 18, "https://etherscan.io", false, Evm),
            "56" => cfg("BNB Smart Chain", "https://bsc-dataseed.binance.org", "BNB", 18, "https://bscscan.com", false, Evm),
            "137" => cfg("Polygon", "https://polygon.llamarpc.com", "MATIC", 18, "https://polygonscan.com", false, Evm),
            "42161" => cfg("Arbitrum One", "https://arb1.arbitrum.io/rpc", "ETH", 18, "https://arbiscan.io", false, Evm),
            "8453" => cfg("Base", "https://mainnet.base.org", "ETH", 18, "https://basescan.org", false, Evm),
            "10" => cfg("Optimism", "https://mainnet.optimism.io", "ETH", 18, "https://optimistic.etherscan.io", false, Evm),
            "11155111" => cfg("Sepolia Testnet", "https://rpc.sepolia.org", "ETH", 18, "https://sepolia.etherscan.io", true, Evm),
            "97" => cfg("BSC Testnet", "https://data-seed-prebsc-1-s1.binance.org:8545", "tBNB", 18, "https://testnet.bscscan.com", true, Evm),
            "80001" => cfg("Polygon Mumbai", "https://rpc-mumbai.maticvigil.com", "MATIC", 18, "https://mumbai.polygonscan.com", true, Evm),
            "solana-mainnet" => cfg("Solana Mainnet", "https://api.mainnet-beta.solana.com", "SOL", 9, "https://solscan.io", false, Solana),
            "solana-devnet" => cfg("Solana Devnet", "https://api.devnet.solana.com", "SOL", 9, "https://solscan.io/?cluster=devnet", true, Solana),
            "aptos-mainnet" => cfg("Aptos Mainnet", "https://fullnode.mainnet.aptoslabs.com/v1", "APT", 8, "https://explorer.aptoslabs.com", false, Aptos),
            "aptos-testnet" => cfg("Aptos Testnet", "https://fullnode.testnet.aptoslabs.com/v1", "APT", 8, "https://explorer.aptoslabs.com?network=testnet", true, Aptos),
            _ => return None,
        })
    }

    /// Ids of every built-in network.
    pub fn builtin_ids() -> &'static [&'static str] {
        &[
            "1", "56", "137", "42161", "8453", "10",
            "11155111", "97", "80001",
            "solana-mainnet", "solana-devnet",
            "aptos-mainnet", "aptos-testnet",
        ]
    }

    /// EVM chain id, when this network is an EVM network.
    pub fn chain_id(&self) -> Option<u64> {
        match self.family {
            NetworkFamily::Evm => self.network_id.parse().ok(),
            _ => None,
        }
    }

    /// Explorer link for a transaction, when an explorer is configured.
    pub fn tx_link(&self, tx_id: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), tx_id))
    }
}

impl std::fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.network_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_complete() {
        for id in NetworkConfig::builtin_ids() {
            let cfg = NetworkConfig::builtin(id).expect("builtin id must resolve");
            assert_eq!(cfg.network_id, *id);
            assert!(!cfg.rpc_url.is_empty());
        }
        assert!(NetworkConfig::builtin("999999").is_none());
    }

    #[test]
    fn chain_id_only_for_evm() {
        assert_eq!(NetworkConfig::builtin("8453").unwrap().chain_id(), Some(8453));
        assert_eq!(NetworkConfig::builtin("solana-mainnet").unwrap().chain_id(), None);
    }
}
