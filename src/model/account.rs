use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::network::NetworkFamily;

/// An owned on-chain account.
///
/// `sealed_secret` is opaque to the engine and is unsealed only at the
/// moment of submission. Immutable after creation except for `label`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub owner: String,
    pub family: NetworkFamily,
    pub address: String,
    pub sealed_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_seed_phrase: Option<String>,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Shortened address for human-facing messages.
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

pub fn short_address(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..8], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}
