//! A chain-agnostic transaction lifecycle engine: Build, Estimate, Sign, Broadcast,
//! QueryStatus, and SubscribeStatus over a narrow [`chain::ChainAdapter`] trait.
//!
//! The only implementation shipped here is [`chain::eip155`], covering EIP-1559
//! account-based chains (Ethereum and its forks). A UTXO or other account-model chain
//! would add a sibling module implementing the same trait.
//!
//! This crate never holds private key material — signing is delegated to a
//! caller-supplied [`chain::Signer`] implementation.

pub mod chain;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod rpc;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod util;

pub use chain::{ChainAdapter, ChainId, ChainRegistry, Signer};
pub use errors::{AdapterError, ErrorCode, Result};
pub use types::{
    BroadcastReceipt, FeeEstimate, FeeSpeed, SignedTransaction, TransactionRequest,
    TransactionStatus, TxStatus, UnsignedTransaction,
};
