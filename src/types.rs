//! The chain-agnostic data model: everything that flows between `Build`, `Sign`,
//! `Broadcast`, and `QueryStatus`.

use std::collections::HashMap;
use std::time::SystemTime;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::ChainId;

/// Caller-selected speed/cost tradeoff for fee estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeSpeed {
    Slow,
    Normal,
    Fast,
}

/// Chain-agnostic transaction request: the engine's sole input.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    pub asset: String,
    pub amount: U256,
    pub memo: Option<Vec<u8>>,
    pub fee_speed: FeeSpeed,
    /// Opaque chain-specific overrides, e.g. an explicit `gas_limit`.
    pub chain_specific: HashMap<String, Value>,
}

impl TransactionRequest {
    /// Reads a `u64` override out of [`TransactionRequest::chain_specific`], if present.
    pub fn chain_specific_u64(&self, key: &str) -> Option<u64> {
        self.chain_specific.get(key).and_then(Value::as_u64)
    }
}

/// Structured, human-presentable summary of an [`UnsignedTransaction`] for user
/// confirmation before signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanReadable {
    pub summary: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub fee: String,
}

/// Deterministic output of `Build`: the exact bytes a signer must sign, plus enough
/// context to reconstruct and broadcast the transaction once signed.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    /// The chain's canonical pre-signature hash, hex-encoded with a `0x` prefix.
    pub id: String,
    pub chain_id: ChainId,
    pub from: String,
    pub to: String,
    pub amount: U256,
    /// Recommended total fee, in the chain's smallest unit.
    pub fee: U256,
    pub nonce: Option<u64>,
    /// The exact bytes the signer must sign (for EIP-1559, the 32-byte Keccak-256
    /// digest of the canonical RLP preimage).
    pub signing_payload: Vec<u8>,
    pub human_readable: HumanReadable,
    pub chain_specific: HashMap<String, Value>,
    pub created_at: SystemTime,
}

/// Output of a fee estimation pass: bounds plus a confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub chain_id_label: String,
    pub timestamp: u64,
    pub min_fee: U256,
    pub recommended: U256,
    pub max_fee: U256,
    /// `0..=100`.
    pub confidence: u8,
    pub reason: String,
    pub estimated_blocks: u64,
    /// Chain-specific base fee (e.g. EIP-1559 `baseFeePerGas`), where applicable.
    pub base_fee: Option<U256>,
}

/// Output of `Sign`: an audit trail plus wire-ready bytes.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub unsigned_tx: UnsignedTransaction,
    pub signature: Vec<u8>,
    pub signed_by: String,
    /// The final hash as it will appear on chain, hex-encoded with a `0x` prefix.
    pub tx_hash: String,
    pub serialized_tx: Vec<u8>,
    pub signed_at: SystemTime,
}

/// Output of `Broadcast`: stable across idempotent retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReceipt {
    pub tx_hash: String,
    pub chain_id: ChainId,
    pub submitted_at: SystemTime,
}

/// Lifecycle state of a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Finalized,
    Failed,
}

/// Error detail attached to a [`TransactionStatus`] when `status == Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusError {
    pub code: String,
    pub message: String,
}

/// A point-in-time confirmation status for a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub tx_hash: String,
    pub status: TxStatus,
    pub confirmations: u64,
    pub block_number: Option<u64>,
    pub block_hash: Option<String>,
    pub updated_at: SystemTime,
    pub error: Option<StatusError>,
}

impl TransactionStatus {
    /// The `(status, confirmations)` tuple subscription streams dedupe on.
    pub fn dedup_key(&self) -> (TxStatus, u64) {
        (self.status, self.confirmations)
    }
}
