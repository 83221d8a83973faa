//! The error envelope every public operation returns.
//!
//! Mirrors the classification in the chain-adapter interface: a stable short `code`, a
//! `retryable` flag, an optional `retry_after` hint, and an optional wrapped `cause`.
//! Non-retryable errors surface immediately; retryable ones are safe for callers to
//! resubmit (the broadcast path additionally guarantees idempotency across retries).

use std::time::Duration;

/// Stable short identifier for an [`AdapterError`] variant, used in logs and by callers
/// that branch on error class without matching the full enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    InvalidAddress,
    InvalidAmount,
    UnsupportedAsset,
    InvalidPayload,
    ChainMismatch,
    SigningFailed,
    HashMismatch,
    TxNotFound,
    TxReverted,
    RpcParse,
    RpcUnavailable,
    BroadcastFailed,
    TxAlreadyBroadcast,
}

impl ErrorCode {
    /// The stable string form used on the wire / in logs (e.g. `ERR_INVALID_ADDRESS`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAddress => "ERR_INVALID_ADDRESS",
            ErrorCode::InvalidAmount => "ERR_INVALID_AMOUNT",
            ErrorCode::UnsupportedAsset => "ERR_UNSUPPORTED_ASSET",
            ErrorCode::InvalidPayload => "ERR_INVALID_PAYLOAD",
            ErrorCode::ChainMismatch => "ERR_CHAIN_MISMATCH",
            ErrorCode::SigningFailed => "ERR_SIGNING_FAILED",
            ErrorCode::HashMismatch => "ERR_HASH_MISMATCH",
            ErrorCode::TxNotFound => "ERR_TX_NOT_FOUND",
            ErrorCode::TxReverted => "ERR_TX_REVERTED",
            ErrorCode::RpcParse => "ERR_RPC_PARSE",
            ErrorCode::RpcUnavailable => "ERR_RPC_UNAVAILABLE",
            ErrorCode::BroadcastFailed => "ERR_BROADCAST_FAILED",
            ErrorCode::TxAlreadyBroadcast => "ERR_TX_ALREADY_BROADCAST",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The error type returned by every public chain-adapter operation.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("invalid signing payload: {0}")]
    InvalidPayload(String),

    #[error("chain mismatch: unsigned tx is for {unsigned}, adapter is {adapter}")]
    ChainMismatch { unsigned: String, adapter: String },

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("broadcast returned hash {actual}, expected {expected}")]
    HashMismatch { expected: String, actual: String },

    #[error("transaction not found: {0}")]
    TxNotFound(String),

    #[error("transaction reverted")]
    TxReverted,

    #[error("malformed RPC response: {0}")]
    RpcParse(String),

    #[error("RPC unavailable: {message}")]
    RpcUnavailable {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("transaction already broadcast: {0}")]
    TxAlreadyBroadcast(String),
}

impl AdapterError {
    /// The stable error code for this variant.
    pub fn code(&self) -> ErrorCode {
        match self {
            AdapterError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            AdapterError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            AdapterError::UnsupportedAsset(_) => ErrorCode::UnsupportedAsset,
            AdapterError::InvalidPayload(_) => ErrorCode::InvalidPayload,
            AdapterError::ChainMismatch { .. } => ErrorCode::ChainMismatch,
            AdapterError::SigningFailed(_) => ErrorCode::SigningFailed,
            AdapterError::HashMismatch { .. } => ErrorCode::HashMismatch,
            AdapterError::TxNotFound(_) => ErrorCode::TxNotFound,
            AdapterError::TxReverted => ErrorCode::TxReverted,
            AdapterError::RpcParse(_) => ErrorCode::RpcParse,
            AdapterError::RpcUnavailable { .. } => ErrorCode::RpcUnavailable,
            AdapterError::BroadcastFailed(_) => ErrorCode::BroadcastFailed,
            AdapterError::TxAlreadyBroadcast(_) => ErrorCode::TxAlreadyBroadcast,
        }
    }

    /// Whether a caller may safely retry the operation that produced this error.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::RpcUnavailable { .. }
                | AdapterError::BroadcastFailed(_)
                | AdapterError::TxAlreadyBroadcast(_)
        )
    }

    /// Advisory wait before retrying, if known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AdapterError::RpcUnavailable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn rpc_unavailable(message: impl Into<String>) -> Self {
        AdapterError::RpcUnavailable {
            message: message.into(),
            retry_after: Some(Duration::from_secs(1)),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
