//! The `Estimate` operation and the supplemental fee-update subscription: turns raw
//! `baseFeePerGas` / `eth_feeHistory` reads into a [`FeeEstimate`] with a confidence
//! score, and can keep emitting fresh ones as blocks advance.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::U256;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::interval;

use super::Eip155AdapterConfig;
use super::fee_math::{self, FALLBACK_BASE_FEE_GWEI, FALLBACK_PRIORITY_FEE_GWEI, GWEI};
use crate::chain::FeeStream;
use crate::errors::Result;
use crate::rpc::RpcClient;
use crate::types::{FeeEstimate, TransactionRequest};
use crate::util::parse_hex_u256;

const POLL_INTERVAL: Duration = Duration::from_secs(12);
const FEE_HISTORY_BLOCK_COUNT: u64 = 10;
const FEE_HISTORY_PERCENTILE: f64 = 50.0;
const DEFAULT_GAS_LIMIT: u64 = 21_000;

/// Raw fee inputs read from the network, with their reason for falling back (if any)
/// folded in by the caller.
pub struct FeeReads {
    pub base_fee: U256,
    pub priority_fee: U256,
    pub used_fallback: bool,
}

/// Reads current base fee and priority fee, falling back to fixed rates on any RPC
/// failure. Never returns `Err` — a chain this function cannot read from still gets a
/// (less confident) estimate rather than a hard failure.
pub async fn network_fee_reads(rpc: &RpcClient) -> FeeReads {
    let mut used_fallback = false;

    let base_fee = match read_base_fee(rpc).await {
        Ok(fee) => fee,
        Err(_) => {
            used_fallback = true;
            U256::from(FALLBACK_BASE_FEE_GWEI * GWEI)
        }
    };
    let priority_fee = match read_priority_fee(rpc).await {
        Ok(fee) => fee,
        Err(_) => {
            used_fallback = true;
            U256::from(FALLBACK_PRIORITY_FEE_GWEI * GWEI)
        }
    };

    FeeReads {
        base_fee,
        priority_fee,
        used_fallback,
    }
}

async fn read_base_fee(rpc: &RpcClient) -> Result<U256> {
    let block = rpc
        .call("eth_getBlockByNumber", ("latest".to_string(), false))
        .await?;
    let base_fee = block
        .get("baseFeePerGas")
        .ok_or_else(|| crate::errors::AdapterError::RpcParse("block has no baseFeePerGas".into()))?;
    parse_hex_u256(base_fee)
}

async fn read_priority_fee(rpc: &RpcClient) -> Result<U256> {
    let history = rpc
        .call(
            "eth_feeHistory",
            (
                format!("0x{FEE_HISTORY_BLOCK_COUNT:x}"),
                "latest".to_string(),
                vec![FEE_HISTORY_PERCENTILE],
            ),
        )
        .await?;
    let rewards = history
        .get("reward")
        .and_then(Value::as_array)
        .ok_or_else(|| crate::errors::AdapterError::RpcParse("feeHistory has no reward array".into()))?;
    if rewards.is_empty() {
        return Err(crate::errors::AdapterError::RpcParse("feeHistory reward array is empty".into()));
    }

    let mut total = U256::ZERO;
    let mut count = 0u64;
    for block_rewards in rewards {
        let first = block_rewards
            .as_array()
            .and_then(|a| a.first())
            .ok_or_else(|| crate::errors::AdapterError::RpcParse("malformed feeHistory reward row".into()))?;
        total += parse_hex_u256(first)?;
        count += 1;
    }
    Ok(total / U256::from(count))
}

/// Produces a [`FeeEstimate`] for `request.fee_speed` without building a full
/// transaction: gas limit comes from an explicit `chain_specific` override or the
/// default transfer gas cost, never from `eth_estimateGas`.
pub async fn estimate(
    rpc: &RpcClient,
    config: &Eip155AdapterConfig,
    request: &TransactionRequest,
) -> Result<FeeEstimate> {
    let gas_limit = request.chain_specific_u64("gas_limit").unwrap_or(DEFAULT_GAS_LIMIT);
    estimate_with_gas_limit(rpc, config, request, gas_limit).await
}

/// Produces a [`FeeEstimate`] for `request.fee_speed` using a caller-supplied
/// `gas_limit` instead of the `chain_specific` override or the default transfer cost —
/// for callers who already know the gas a transaction will consume (e.g. a contract
/// call whose calldata has already been estimated elsewhere) and want fee bounds priced
/// against that exact figure rather than a 21,000-gas transfer guess.
pub async fn estimate_with_gas_limit(
    rpc: &RpcClient,
    config: &Eip155AdapterConfig,
    request: &TransactionRequest,
    gas_limit: u64,
) -> Result<FeeEstimate> {
    let reads = network_fee_reads(rpc).await;

    let (max_fee_per_gas, _) = fee_math::fee_caps(reads.base_fee, reads.priority_fee, request.fee_speed);
    let recommended = fee_math::total_fee(max_fee_per_gas, gas_limit);
    let (min_fee, max_fee) = fee_math::fee_bounds(recommended);

    let (confidence, reason) = if reads.used_fallback {
        (50u8, "Using fallback estimates (RPC unavailable)".to_string())
    } else {
        let base_fee_gwei = gwei_f64(reads.base_fee);
        let priority_fee_gwei = gwei_f64(reads.priority_fee);
        (
            fee_math::confidence(base_fee_gwei, priority_fee_gwei),
            "Derived from current network base fee and recent priority fee history".to_string(),
        )
    };

    Ok(FeeEstimate {
        chain_id_label: config.chain_id.to_string(),
        timestamp: unix_now(),
        min_fee,
        recommended,
        max_fee,
        confidence,
        reason,
        estimated_blocks: fee_math::estimated_blocks(request.fee_speed),
        base_fee: Some(reads.base_fee),
    })
}

fn gwei_f64(value: U256) -> f64 {
    let wei: u128 = value.to::<u128>();
    wei as f64 / GWEI as f64
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Polls for fresh fee estimates, emitting one each time the chain's head block number
/// advances. Silent on transient RPC failure (the next tick tries again); closes when
/// the caller drops the returned receiver.
pub fn subscribe_fee_updates(
    rpc: Arc<RpcClient>,
    config: Arc<Eip155AdapterConfig>,
    request: TransactionRequest,
) -> FeeStream {
    let (tx, rx) = mpsc::channel(10);
    tokio::spawn(async move {
        let mut ticker = interval(POLL_INTERVAL);
        let mut last_block: Option<u64> = None;
        loop {
            ticker.tick().await;
            let Ok(block_number) = current_block_number(&rpc).await else { continue };
            if last_block == Some(block_number) {
                continue;
            }
            last_block = Some(block_number);
            match estimate(&rpc, &config, &request).await {
                Ok(fee_estimate) => {
                    if tx.send(fee_estimate).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "fee subscription tick failed, will retry");
                }
            }
        }
    });
    rx
}

async fn current_block_number(rpc: &RpcClient) -> Result<u64> {
    let value = rpc.call("eth_blockNumber", ()).await?;
    crate::util::parse_hex_u64(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_reads_yield_confidence_fifty() {
        let reads = FeeReads {
            base_fee: U256::from(FALLBACK_BASE_FEE_GWEI * GWEI),
            priority_fee: U256::from(FALLBACK_PRIORITY_FEE_GWEI * GWEI),
            used_fallback: true,
        };
        assert!(reads.used_fallback);
    }

    #[test]
    fn estimated_blocks_matches_worked_example() {
        assert_eq!(fee_math::estimated_blocks(crate::types::FeeSpeed::Fast), 1);
        assert_eq!(fee_math::estimated_blocks(crate::types::FeeSpeed::Normal), 3);
        assert_eq!(fee_math::estimated_blocks(crate::types::FeeSpeed::Slow), 6);
    }

    #[test]
    fn gwei_conversion_round_trips() {
        assert_eq!(gwei_f64(U256::from(30u64 * GWEI)), 30.0);
    }

    #[tokio::test]
    async fn estimate_with_gas_limit_prices_against_the_supplied_limit() {
        let rpc = RpcClient::new(vec![]);
        let config = Eip155AdapterConfig::ethereum_mainnet();
        let request = TransactionRequest {
            from: "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            to: "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB".into(),
            asset: "ETH".into(),
            amount: U256::from(1u64),
            memo: None,
            fee_speed: crate::types::FeeSpeed::Normal,
            chain_specific: Default::default(),
        };

        let default_estimate = estimate(&rpc, &config, &request).await.unwrap();
        let doubled = estimate_with_gas_limit(&rpc, &config, &request, DEFAULT_GAS_LIMIT * 2)
            .await
            .unwrap();
        assert_eq!(doubled.recommended, default_estimate.recommended * U256::from(2u64));
    }
}
