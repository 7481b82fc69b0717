use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// How the per-target amount is computed for a cascade funding batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingMode {
    /// Split `total_amount` equally (floor division) across all targets.
    Equal,
    /// Send `amount_per_target` to each target.
    Fixed,
    /// Send a network-family-specific minimum-viable-fee amount.
    GasOnly,
}

/// Transient request for one cascade funding orchestration.
///
/// Invariant: the source address is never among the targets, and all
/// targets share the source's network family.
#[derive(Debug, Clone)]
pub struct CascadeFundingRequest {
    pub owner: String,
    pub source_address: String,
    pub mode: FundingMode,
    /// Smallest units. Required for `Fixed`.
    pub amount_per_target: Option<U256>,
    /// Smallest units. Required for `Equal`.
    pub total_amount: Option<U256>,
    /// Funded in this order.
    pub targets: Vec<String>,
}

/// Per-target outcome of a cascade funding batch. A whole-batch pre-flight
/// failure is a single result with no target address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_address: Option<String>,
    pub success: bool,
    /// Smallest units actually sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    pub message: String,
}
