//! Chain-adapter polymorphism: the narrow, capability-bearing interface every
//! per-chain adapter implements, plus the registry that routes a [`ChainId`] to its
//! adapter.
//!
//! There is no inheritance hierarchy here — each adapter is a plain struct composing a
//! builder, a fee estimator, an RPC client, and a reference to a shared state store. The
//! EIP-1559 account-based implementation lives in [`eip155`]; a UTXO-chain adapter would
//! implement the same trait with a different internal coin-selection algorithm.

pub mod eip155;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::{
    FeeEstimate, SignedTransaction, TransactionRequest, TransactionStatus, UnsignedTransaction,
};

/// A chain identifier: a lowercase slug, e.g. `"ethereum"`, `"ethereum-goerli"`,
/// `"ethereum-sepolia"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(slug: impl Into<String>) -> Self {
        ChainId(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        ChainId::new(value)
    }
}

/// Feature flags and limits a chain adapter advertises. Immutable for the lifetime of the
/// adapter instance; callers must consult these before exercising optional features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub chain_id: ChainId,
    pub interface_version: &'static str,
    pub supports_eip1559: bool,
    pub supports_memo: bool,
    pub supports_multi_sig: bool,
    pub supports_fee_delegation: bool,
    pub supports_websocket: bool,
    pub supports_rbf: bool,
    pub max_memo_length: usize,
    pub min_confirmations: u64,
}

/// Interface version advertised by every adapter shipped in this crate.
pub const INTERFACE_VERSION: &str = "1.0.0";

/// A streaming update emitted by [`ChainAdapter::subscribe_status`] or
/// [`ChainAdapter::subscribe_fee_updates`]; `Err` carries a transient failure that the
/// stream absorbs into its backoff ladder rather than terminating on.
pub type StatusStream = mpsc::Receiver<TransactionStatus>;
pub type FeeStream = mpsc::Receiver<FeeEstimate>;

/// The six-operation transaction lifecycle every chain adapter implements, plus the two
/// synchronous accessors below.
///
/// Implementations must be safe to call concurrently: all mutable state lives in the
/// RPC client, health tracker, and state store the adapter composes, never in the
/// adapter's own fields after construction.
#[async_trait::async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The chain this adapter instance serves.
    fn chain_id(&self) -> &ChainId;

    /// Feature flags and limits for this adapter.
    fn capabilities(&self) -> &Capabilities;

    /// Validate `request` and produce a deterministic unsigned payload for offline
    /// signing.
    async fn build(&self, request: &TransactionRequest) -> Result<UnsignedTransaction>;

    /// Produce a current fee estimate for `request` without building a full transaction.
    async fn estimate(&self, request: &TransactionRequest) -> Result<FeeEstimate>;

    /// Verify `signer` controls `unsigned.from`, then produce a [`SignedTransaction`].
    async fn sign(
        &self,
        unsigned: &UnsignedTransaction,
        signer: &dyn Signer,
    ) -> Result<SignedTransaction>;

    /// Submit `signed` with at-most-once semantics, consulting the shared state store for
    /// idempotency.
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<crate::types::BroadcastReceipt>;

    /// On-demand status lookup for a previously broadcast transaction hash.
    async fn query_status(&self, tx_hash: &str) -> Result<TransactionStatus>;

    /// A lazily-polled stream of status updates for `tx_hash`. Emits distinct
    /// `(status, confirmations)` tuples only; closes on cancellation or when the caller
    /// drops the receiver.
    async fn subscribe_status(&self, tx_hash: &str) -> Result<StatusStream>;
}

/// The external signing capability the engine depends on but never implements: key
/// derivation, storage, and hardware-wallet protocols all live outside this crate.
pub trait Signer: Send + Sync {
    /// The address this signer controls, in the adapter's native address format.
    fn get_address(&self) -> String;

    /// Sign `payload` (the adapter's canonical signing payload) on behalf of `address`,
    /// which is always equal to [`Signer::get_address`].
    fn sign(&self, payload: &[u8], address: &str) -> std::result::Result<Vec<u8>, String>;
}

/// Maps a [`ChainId`] to the adapter instance that serves it.
///
/// The registry itself holds no chain state; it is a lookup table populated once at
/// startup and read concurrently thereafter.
#[derive(Default, Clone)]
pub struct ChainRegistry {
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) {
        self.adapters.insert(adapter.chain_id().clone(), adapter);
    }

    pub fn get(&self, chain_id: &ChainId) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters.get(chain_id).cloned()
    }

    pub fn chain_ids(&self) -> impl Iterator<Item = &ChainId> {
        self.adapters.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_displays_as_slug() {
        let id = ChainId::new("ethereum-sepolia");
        assert_eq!(id.to_string(), "ethereum-sepolia");
        assert_eq!(id.as_str(), "ethereum-sepolia");
    }

    #[test]
    fn registry_round_trips_empty_lookup() {
        let registry = ChainRegistry::new();
        assert!(registry.get(&ChainId::new("ethereum")).is_none());
        assert_eq!(registry.chain_ids().count(), 0);
    }
}
