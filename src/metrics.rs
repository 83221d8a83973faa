//! Operation-level metrics recording, decoupled from any particular backend.
//!
//! The engine only emits typed events through [`MetricsRecorder`]; wiring them to
//! Prometheus, StatsD, or an OTLP metrics pipeline is left to the embedding
//! application, matching this crate's non-goal of shipping a metrics backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::chain::{Capabilities, ChainAdapter, ChainId, Signer, StatusStream};
use crate::errors::Result;
use crate::types::{
    BroadcastReceipt, FeeEstimate, SignedTransaction, TransactionRequest, TransactionStatus,
    UnsignedTransaction,
};

/// Outcome tag attached to every recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Sink for per-operation timing and outcome. Implementations must be cheap to call on
/// every adapter operation and must never block meaningfully — they sit on the hot path.
pub trait MetricsRecorder: Send + Sync {
    fn record_build(&self, chain_id: &ChainId, duration: Duration, outcome: Outcome);
    fn record_estimate(&self, chain_id: &ChainId, duration: Duration, outcome: Outcome);
    fn record_sign(&self, chain_id: &ChainId, duration: Duration, outcome: Outcome);
    fn record_broadcast(&self, chain_id: &ChainId, duration: Duration, outcome: Outcome);
    fn record_query_status(&self, chain_id: &ChainId, duration: Duration, outcome: Outcome);
    /// Called by the RPC client itself, not by the adapter wrapper, since a single
    /// logical adapter call can involve several RPC calls across failover attempts.
    fn record_rpc_call(&self, method: &str, duration: Duration, outcome: Outcome);
}

/// Discards every recorded event. The default when no metrics backend is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsRecorder;

impl MetricsRecorder for NoopMetricsRecorder {
    fn record_build(&self, _chain_id: &ChainId, _duration: Duration, _outcome: Outcome) {}
    fn record_estimate(&self, _chain_id: &ChainId, _duration: Duration, _outcome: Outcome) {}
    fn record_sign(&self, _chain_id: &ChainId, _duration: Duration, _outcome: Outcome) {}
    fn record_broadcast(&self, _chain_id: &ChainId, _duration: Duration, _outcome: Outcome) {}
    fn record_query_status(&self, _chain_id: &ChainId, _duration: Duration, _outcome: Outcome) {}
    fn record_rpc_call(&self, _method: &str, _duration: Duration, _outcome: Outcome) {}
}

/// Wraps a [`ChainAdapter`] and records timing/outcome for each of its operations
/// through a [`MetricsRecorder`], delegating the actual work unchanged.
pub struct Metered<A: ChainAdapter> {
    inner: A,
    recorder: Box<dyn MetricsRecorder>,
}

impl<A: ChainAdapter> Metered<A> {
    pub fn new(inner: A, recorder: Box<dyn MetricsRecorder>) -> Self {
        Metered { inner, recorder }
    }
}

fn outcome_of<T>(result: &Result<T>) -> Outcome {
    if result.is_ok() { Outcome::Success } else { Outcome::Failure }
}

#[async_trait]
impl<A: ChainAdapter> ChainAdapter for Metered<A> {
    fn chain_id(&self) -> &ChainId {
        self.inner.chain_id()
    }

    fn capabilities(&self) -> &Capabilities {
        self.inner.capabilities()
    }

    async fn build(&self, request: &TransactionRequest) -> Result<UnsignedTransaction> {
        let started = Instant::now();
        let result = self.inner.build(request).await;
        self.recorder
            .record_build(self.chain_id(), started.elapsed(), outcome_of(&result));
        result
    }

    async fn estimate(&self, request: &TransactionRequest) -> Result<FeeEstimate> {
        let started = Instant::now();
        let result = self.inner.estimate(request).await;
        self.recorder
            .record_estimate(self.chain_id(), started.elapsed(), outcome_of(&result));
        result
    }

    async fn sign(
        &self,
        unsigned: &UnsignedTransaction,
        signer: &dyn Signer,
    ) -> Result<SignedTransaction> {
        let started = Instant::now();
        let result = self.inner.sign(unsigned, signer).await;
        self.recorder
            .record_sign(self.chain_id(), started.elapsed(), outcome_of(&result));
        result
    }

    async fn broadcast(&self, signed: &SignedTransaction) -> Result<BroadcastReceipt> {
        let started = Instant::now();
        let result = self.inner.broadcast(signed).await;
        self.recorder
            .record_broadcast(self.chain_id(), started.elapsed(), outcome_of(&result));
        result
    }

    async fn query_status(&self, tx_hash: &str) -> Result<TransactionStatus> {
        let started = Instant::now();
        let result = self.inner.query_status(tx_hash).await;
        self.recorder
            .record_query_status(self.chain_id(), started.elapsed(), outcome_of(&result));
        result
    }

    async fn subscribe_status(&self, tx_hash: &str) -> Result<StatusStream> {
        self.inner.subscribe_status(tx_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_recorder_accepts_every_call_without_panicking() {
        let recorder = NoopMetricsRecorder;
        let chain_id = ChainId::new("ethereum");
        recorder.record_build(&chain_id, Duration::from_millis(1), Outcome::Success);
        recorder.record_rpc_call("eth_call", Duration::from_millis(1), Outcome::Failure);
    }
}
