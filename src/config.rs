use std::path::PathBuf;

use anyhow::{Context, Result};

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Sqlite database path. `TASKCHAIN_DB`, default `taskchain.db`.
    pub db_path: PathBuf,
    /// Vault passphrase for sealing account secrets. `TASKCHAIN_PASSPHRASE`,
    /// required; there is no default for key material.
    pub passphrase: String,
    /// Owner namespace for CLI operations. `TASKCHAIN_OWNER`, default
    /// `default`.
    pub owner: String,
    /// Optional webhook for progress notifications. `TASKCHAIN_WEBHOOK_URL`.
    pub webhook_url: Option<String>,
}

/// Endpoint of the external minting API used for chain-native NFTs.
/// `TASKCHAIN_MINT_API_URL`; unset means chain-native mints are unsupported.
pub fn mint_api_url() -> Option<String> {
    std::env::var("TASKCHAIN_MINT_API_URL").ok().filter(|s| !s.is_empty())
}

impl RuntimeConfig {
    pub fn from_env() -> Result<RuntimeConfig> {
        let db_path = std::env::var("TASKCHAIN_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("taskchain.db"));
        let passphrase = std::env::var("TASKCHAIN_PASSPHRASE")
            .context("TASKCHAIN_PASSPHRASE must be set; it protects sealed account secrets")?;
        let owner = std::env::var("TASKCHAIN_OWNER").unwrap_or_else(|_| "default".to_string());
        let webhook_url = std::env::var("TASKCHAIN_WEBHOOK_URL").ok().filter(|s| !s.is_empty());
        Ok(RuntimeConfig { db_path, passphrase, owner, webhook_url })
    }
}
