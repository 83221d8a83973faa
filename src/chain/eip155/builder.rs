//! The `Build` operation: validates a chain-agnostic request, reads the network state
//! needed to construct an EIP-1559 transaction, and produces a deterministic signing
//! payload.

use std::collections::HashMap;
use std::time::SystemTime;

use alloy_consensus::{SignableTransaction, TxEip1559};
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Bytes, TxKind, U256};
use serde_json::json;

use super::Eip155AdapterConfig;
use super::address::validate_address;
use super::fee::network_fee_reads;
use super::fee_math::{self, GWEI};
use crate::errors::{AdapterError, Result};
use crate::rpc::RpcClient;
use crate::types::{FeeSpeed, HumanReadable, TransactionRequest, UnsignedTransaction};
use crate::util::to_hex_u64;

const DEFAULT_GAS_LIMIT: u64 = 21_000;
const GAS_INFLATION_NUMERATOR: u64 = 110;
const GAS_INFLATION_DENOMINATOR: u64 = 100;
/// The block tag `fetch_nonce` always queries — using anything else would let two
/// concurrent builds race on the same nonce.
const NONCE_BLOCK_TAG: &str = "pending";

/// Builds a deterministic, unsigned EIP-1559 transaction for `request`.
///
/// Network reads (`eth_getTransactionCount`, `eth_estimateGas`, `eth_getBlockByNumber`,
/// `eth_feeHistory`) each have a documented fallback, so a fully offline RPC set still
/// yields a usable (if conservative) unsigned transaction rather than a hard failure.
pub async fn build(
    rpc: &RpcClient,
    config: &Eip155AdapterConfig,
    request: &TransactionRequest,
) -> Result<UnsignedTransaction> {
    let from = validate_address(&request.from)?;
    let to = validate_address(&request.to)?;

    if request.asset != config.native_asset_symbol {
        return Err(AdapterError::UnsupportedAsset(format!(
            "{} is not supported on {} (expected {})",
            request.asset, config.chain_id, config.native_asset_symbol
        )));
    }
    if request.amount == U256::ZERO {
        return Err(AdapterError::InvalidAmount("amount must be greater than zero".into()));
    }
    if let Some(memo) = &request.memo
        && memo.len() > config.max_memo_length
    {
        return Err(AdapterError::InvalidPayload(format!(
            "memo is {} bytes, exceeds the {}-byte limit",
            memo.len(),
            config.max_memo_length
        )));
    }

    let from_str = from.to_checksum(None);
    let to_str = to.to_checksum(None);

    let nonce = match request.chain_specific_u64("nonce") {
        Some(explicit) => explicit,
        None => fetch_nonce(rpc, &from_str).await?,
    };

    let gas_limit = match request.chain_specific_u64("gas_limit") {
        Some(explicit) => explicit,
        None => estimate_gas_limit(rpc, &from_str, &to_str, request).await,
    };

    let reads = network_fee_reads(rpc).await;
    let (max_fee_per_gas, max_priority_fee_per_gas) =
        fee_math::fee_caps(reads.base_fee, reads.priority_fee, request.fee_speed);
    let fee = fee_math::total_fee(max_fee_per_gas, gas_limit);

    let input: Bytes = request.memo.clone().unwrap_or_default().into();
    let tx = TxEip1559 {
        chain_id: config.network_id,
        nonce,
        gas_limit,
        max_fee_per_gas: max_fee_per_gas.to::<u128>(),
        max_priority_fee_per_gas: max_priority_fee_per_gas.to::<u128>(),
        to: TxKind::Call(to),
        value: request.amount,
        access_list: AccessList::default(),
        input,
    };
    let signature_hash = tx.signature_hash();
    let id = format!("0x{}", hex::encode(signature_hash.as_slice()));

    let mut chain_specific = HashMap::new();
    chain_specific.insert("network_id".to_string(), json!(config.network_id));
    chain_specific.insert("nonce".to_string(), json!(to_hex_u64(nonce)));
    chain_specific.insert("gas_limit".to_string(), json!(to_hex_u64(gas_limit)));
    chain_specific.insert(
        "max_fee_per_gas".to_string(),
        json!(max_fee_per_gas.to_string()),
    );
    chain_specific.insert(
        "max_priority_fee_per_gas".to_string(),
        json!(max_priority_fee_per_gas.to_string()),
    );
    chain_specific.insert("type".to_string(), json!("eip1559"));

    Ok(UnsignedTransaction {
        id,
        chain_id: config.chain_id.clone(),
        from: from_str.clone(),
        to: to_str.clone(),
        amount: request.amount,
        fee,
        nonce: Some(nonce),
        signing_payload: signature_hash.to_vec(),
        human_readable: HumanReadable {
            summary: format!(
                "Send {} {} from {} to {}",
                format_amount(request.amount),
                request.asset,
                from_str,
                to_str
            ),
            from: from_str,
            to: to_str,
            amount: format_amount(request.amount),
            fee: format_amount(fee),
        },
        chain_specific,
        created_at: SystemTime::now(),
    })
}

async fn fetch_nonce(rpc: &RpcClient, address: &str) -> Result<u64> {
    let result = rpc
        .call("eth_getTransactionCount", (address.to_string(), NONCE_BLOCK_TAG.to_string()))
        .await?;
    crate::util::parse_hex_u64(&result)
}

async fn estimate_gas_limit(
    rpc: &RpcClient,
    from: &str,
    to: &str,
    request: &TransactionRequest,
) -> u64 {
    let call_object = json!({
        "from": from,
        "to": to,
        "value": format!("0x{:x}", request.amount),
    });
    let estimated = match rpc.call("eth_estimateGas", [call_object]).await {
        Ok(value) => crate::util::parse_hex_u64(&value).unwrap_or(DEFAULT_GAS_LIMIT),
        Err(_) => DEFAULT_GAS_LIMIT,
    };
    estimated
        .saturating_mul(GAS_INFLATION_NUMERATOR)
        .div_ceil(GAS_INFLATION_DENOMINATOR)
}

fn format_amount(amount: U256) -> String {
    amount.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_inflation_matches_worked_example() {
        // Scenario 1: eth_estimateGas returns 21000, inflated by 10% -> 23100.
        let inflated = 21_000u64
            .saturating_mul(GAS_INFLATION_NUMERATOR)
            .div_ceil(GAS_INFLATION_DENOMINATOR);
        assert_eq!(inflated, 23_100);
    }

    #[test]
    fn fee_cap_matches_worked_example() {
        let base_fee = U256::from(30u64 * GWEI);
        let priority_fee = U256::from(2u64 * GWEI);
        let (max_fee, _) = fee_math::fee_caps(base_fee, priority_fee, FeeSpeed::Normal);
        assert_eq!(max_fee, U256::from(62u64 * GWEI));
    }

    #[test]
    fn p8_nonce_is_always_requested_against_the_pending_block() {
        assert_eq!(NONCE_BLOCK_TAG, "pending");
    }

    #[test]
    fn p1_build_is_deterministic_for_fixed_inputs() {
        let to = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        let make = || TxEip1559 {
            chain_id: 1,
            nonce: 5,
            gas_limit: 23_100,
            max_fee_per_gas: 62_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            to: TxKind::Call(to),
            value: U256::from(1_000_000_000_000_000_000u64),
            access_list: AccessList::default(),
            input: Bytes::new(),
        };
        assert_eq!(make().signature_hash(), make().signature_hash());
    }
}
