//! The EIP-1559 account-based adapter: Ethereum and its EIP-1559-compatible forks.
//!
//! Composes a stateless transaction builder, a fee estimator, a multi-endpoint
//! [`RpcClient`], and a shared [`StateStore`] behind the [`ChainAdapter`] trait. Every
//! sub-module is a free function taking the pieces it needs rather than a method on a
//! god object, so each step can be unit tested against a fake RPC client in isolation.

pub mod address;
pub mod broadcast;
pub mod builder;
pub mod fee;
pub mod fee_math;
pub mod signer;
pub mod status;

use std::sync::Arc;

use crate::chain::{Capabilities, ChainAdapter, ChainId, FeeStream, Signer, StatusStream};
use crate::errors::Result;
use crate::rpc::RpcClient;
use crate::store::StateStore;
use crate::types::{
    BroadcastReceipt, FeeEstimate, SignedTransaction, TransactionRequest, TransactionStatus,
    UnsignedTransaction,
};

/// Static configuration for one EIP-1559 adapter instance. One instance per chain (e.g.
/// Ethereum mainnet and Ethereum Sepolia are two separate adapters, each with its own
/// `network_id` and RPC endpoint set).
#[derive(Debug, Clone)]
pub struct Eip155AdapterConfig {
    pub chain_id: ChainId,
    /// The chain id used for EIP-155 replay protection, e.g. `1` for mainnet.
    pub network_id: u64,
    pub native_asset_symbol: String,
    pub max_memo_length: usize,
    pub min_confirmations: u64,
}

impl Eip155AdapterConfig {
    /// Ethereum mainnet defaults: 12 confirmations (~2.5 minutes at 12s blocks), native
    /// asset `ETH`, no memo field support at the protocol level (input data is used
    /// instead, capped to a generous but bounded size).
    pub fn ethereum_mainnet() -> Self {
        Eip155AdapterConfig {
            chain_id: ChainId::new("ethereum"),
            network_id: 1,
            native_asset_symbol: "ETH".to_string(),
            max_memo_length: 256,
            min_confirmations: 12,
        }
    }
}

/// The EIP-1559 implementation of [`ChainAdapter`].
pub struct Eip155Adapter {
    config: Arc<Eip155AdapterConfig>,
    rpc: Arc<RpcClient>,
    store: Arc<dyn StateStore>,
    capabilities: Capabilities,
}

impl Eip155Adapter {
    pub fn new(config: Eip155AdapterConfig, rpc: RpcClient, store: Arc<dyn StateStore>) -> Self {
        let capabilities = Capabilities {
            chain_id: config.chain_id.clone(),
            interface_version: crate::chain::INTERFACE_VERSION,
            supports_eip1559: true,
            supports_memo: true,
            supports_multi_sig: false,
            supports_fee_delegation: false,
            supports_websocket: false,
            // Replace-by-fee is a UTXO mempool-policy concept; an EIP-1559 account chain
            // achieves the same end (a stuck transaction) by resubmitting the same nonce
            // with higher fees, which this adapter does not automate.
            supports_rbf: false,
            max_memo_length: config.max_memo_length,
            min_confirmations: config.min_confirmations,
        };
        Eip155Adapter {
            config: Arc::new(config),
            rpc: Arc::new(rpc),
            store,
            capabilities,
        }
    }

    /// Supplemental to the core lifecycle: a live feed of fee estimates for `request`,
    /// useful for a wallet UI that wants to keep its displayed fee current without
    /// polling `estimate` on its own schedule.
    pub fn subscribe_fee_updates(&self, request: TransactionRequest) -> FeeStream {
        fee::subscribe_fee_updates(self.rpc.clone(), self.config.clone(), request)
    }

    /// Supplemental to the core lifecycle: prices `request` against a caller-supplied
    /// `gas_limit` instead of the default transfer cost, for callers who already know
    /// how much gas the transaction will consume.
    pub async fn estimate_with_gas_limit(
        &self,
        request: &TransactionRequest,
        gas_limit: u64,
    ) -> Result<FeeEstimate> {
        fee::estimate_with_gas_limit(&self.rpc, &self.config, request, gas_limit).await
    }
}

#[async_trait::async_trait]
impl ChainAdapter for Eip155Adapter {
    fn chain_id(&self) -> &ChainId {
        &self.config.chain_id
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[tracing::instrument(skip_all, err, fields(chain_id = %self.config.chain_id))]
    async fn build(&self, request: &TransactionRequest) -> Result<UnsignedTransaction> {
        builder::build(&self.rpc, &self.config, request).await
    }

    #[tracing::instrument(skip_all, err, fields(chain_id = %self.config.chain_id))]
    async fn estimate(&self, request: &TransactionRequest) -> Result<FeeEstimate> {
        fee::estimate(&self.rpc, &self.config, request).await
    }

    #[tracing::instrument(skip_all, err, fields(chain_id = %self.config.chain_id))]
    async fn sign(
        &self,
        unsigned: &UnsignedTransaction,
        signer: &dyn Signer,
    ) -> Result<SignedTransaction> {
        signer::sign(unsigned, signer, self.config.network_id)
    }

    #[tracing::instrument(skip_all, err, fields(chain_id = %self.config.chain_id, tx_hash = %signed.tx_hash))]
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<BroadcastReceipt> {
        broadcast::broadcast(&self.rpc, self.store.as_ref(), &self.config, signed).await
    }

    #[tracing::instrument(skip_all, err, fields(chain_id = %self.config.chain_id))]
    async fn query_status(&self, tx_hash: &str) -> Result<TransactionStatus> {
        status::query_status(&self.rpc, &self.config, tx_hash).await
    }

    async fn subscribe_status(&self, tx_hash: &str) -> Result<StatusStream> {
        status::subscribe_status(self.rpc.clone(), self.config.clone(), tx_hash.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;

    #[test]
    fn capabilities_reflect_eip1559_and_no_rbf() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let adapter = Eip155Adapter::new(
            Eip155AdapterConfig::ethereum_mainnet(),
            RpcClient::new(vec![]),
            store,
        );
        let caps = adapter.capabilities();
        assert!(caps.supports_eip1559);
        assert!(!caps.supports_rbf);
        assert_eq!(caps.min_confirmations, 12);
        assert_eq!(adapter.chain_id().as_str(), "ethereum");
    }
}
