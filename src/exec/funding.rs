use std::time::Duration;

use alloy::primitives::U256;
use tracing::{info, warn};

use crate::adapter::ChainAdapter;
use crate::model::amount::format_units;
use crate::model::{CascadeFundingRequest, FundingMode, FundingResult};

/// Pause between consecutive transfers, skipped after the last one.
pub const DEFAULT_INTER_TRANSFER_DELAY: Duration = Duration::from_secs(2);

/// Compute the per-target amount without touching the chain (gas-only mode
/// queries the adapter before calling this).
///
/// Errors are user-facing messages; no transfer has happened yet when one
/// is returned.
pub fn plan_amount(
    mode: FundingMode,
    amount_per_target: Option<U256>,
    total_amount: Option<U256>,
    gas_only_amount: U256,
    target_count: usize,
) -> Result<U256, String> {
    if target_count == 0 {
        return Err("no funding targets given".into());
    }
    match mode {
        FundingMode::Equal => {
            let total = total_amount.ok_or("equal mode needs a total amount")?;
            if total.is_zero() {
                return Err("total amount must be greater than zero".into());
            }
            // Floor division; the remainder stays with the source.
            Ok(total / U256::from(target_count as u64))
        }
        FundingMode::Fixed => {
            let amount = amount_per_target.ok_or("fixed mode needs an amount per target")?;
            if amount.is_zero() {
                return Err("amount per target must be greater than zero".into());
            }
            Ok(amount)
        }
        FundingMode::GasOnly => Ok(gas_only_amount),
    }
}

/// Fund each target from the source, sequentially and in order.
///
/// A pre-flight balance check covers the whole batch: when the source
/// cannot fund every target, nothing is submitted and the single aggregate
/// result says so. Past pre-flight, each target is isolated: one failed
/// transfer is recorded and the cascade moves on.
pub async fn cascade_fund(
    adapter: &dyn ChainAdapter,
    secret: &str,
    request: &CascadeFundingRequest,
    decimals: u8,
    symbol: &str,
    inter_transfer_delay: Duration,
) -> Vec<FundingResult> {
    let gas_only_amount = adapter.gas_funding_amount().await;
    let per_target = match plan_amount(
        request.mode,
        request.amount_per_target,
        request.total_amount,
        gas_only_amount,
        request.targets.len(),
    ) {
        Ok(amount) => amount,
        Err(message) => {
            return vec![FundingResult {
                target_address: None,
                success: false,
                amount: None,
                tx_id: None,
                message,
            }];
        }
    };
    if per_target.is_zero() {
        return vec![FundingResult {
            target_address: None,
            success: false,
            amount: None,
            tx_id: None,
            message: format!(
                "total amount too small to split across {} targets",
                request.targets.len()
            ),
        }];
    }

    let needed = per_target * U256::from(request.targets.len() as u64);
    let balance = match adapter.read_balance(&request.source_address).await {
        Ok(b) => b,
        Err(e) => {
            return vec![FundingResult {
                target_address: None,
                success: false,
                amount: None,
                tx_id: None,
                message: format!("could not read source balance: {e}"),
            }];
        }
    };
    if balance < needed {
        return vec![FundingResult {
            target_address: None,
            success: false,
            amount: None,
            tx_id: None,
            message: format!(
                "insufficient balance: have {} {symbol}, need {} {symbol} for {} targets",
                format_units(balance, decimals),
                format_units(needed, decimals),
                request.targets.len()
            ),
        }];
    }

    let mut results = Vec::with_capacity(request.targets.len());
    let last = request.targets.len() - 1;
    for (i, target) in request.targets.iter().enumerate() {
        match adapter.submit_transfer(secret, target, per_target).await {
            Ok(tx_id) => {
                info!(target = %target, tx = %tx_id, "funding transfer confirmed");
                results.push(FundingResult {
                    target_address: Some(target.clone()),
                    success: true,
                    amount: Some(per_target),
                    tx_id: Some(tx_id),
                    message: format!(
                        "sent {} {symbol}",
                        format_units(per_target, decimals)
                    ),
                });
            }
            Err(e) => {
                warn!(target = %target, error = %e, "funding transfer failed, continuing");
                results.push(FundingResult {
                    target_address: Some(target.clone()),
                    success: false,
                    amount: None,
                    tx_id: None,
                    message: format!("transfer failed: {e}"),
                });
            }
        }
        if i < last {
            tokio::time::sleep(inter_transfer_delay).await;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_split_is_floor_division() {
        let per = plan_amount(
            FundingMode::Equal,
            None,
            Some(U256::from(100)),
            U256::ZERO,
            3,
        )
        .unwrap();
        assert_eq!(per, U256::from(33));
    }

    #[test]
    fn fixed_requires_amount() {
        let err = plan_amount(FundingMode::Fixed, None, None, U256::ZERO, 2).unwrap_err();
        assert!(err.contains("amount per target"));
    }

    #[test]
    fn gas_only_uses_adapter_amount() {
        let per = plan_amount(
            FundingMode::GasOnly,
            None,
            None,
            U256::from(21_000u64 * 3),
            4,
        )
        .unwrap();
        assert_eq!(per, U256::from(63_000u64));
    }

    #[test]
    fn zero_targets_rejected() {
        assert!(plan_amount(FundingMode::GasOnly, None, None, U256::ONE, 0).is_err());
    }
}
