//! The broadcast idempotency ledger: one [`TxState`] row per transaction hash.
//!
//! The in-memory variant here is adequate for a single-process deployment; production
//! deployments substitute a durable KV store behind the same [`StateStore`] trait.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::chain::ChainId;
use crate::errors::Result;
use crate::types::TxStatus;

/// One row of the idempotency ledger, keyed by `tx_hash` (case-insensitive —
/// canonicalized to lowercase on write).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxState {
    pub tx_hash: String,
    pub chain_id: ChainId,
    pub raw_tx: Vec<u8>,
    pub retry_count: u64,
    pub first_seen: SystemTime,
    pub last_retry: SystemTime,
    pub status: TxStatus,
}

/// Per-`tx_hash` idempotency ledger. `Set` on an existing key is a replace; callers
/// (the broadcast path) are responsible for read-then-write semantics — this trait makes
/// no atomicity promises across a `Get` followed by a `Set`.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, tx_hash: &str) -> Result<Option<TxState>>;
    async fn set(&self, tx_hash: &str, state: TxState) -> Result<()>;
    /// Number of rows currently held. For operator tooling; not used by the core
    /// lifecycle.
    async fn count(&self) -> Result<usize>;
    /// All rows currently held, in unspecified order. For operator tooling.
    async fn list(&self) -> Result<Vec<TxState>>;
    /// Removes a row. The core lifecycle never calls this — rows are never deleted by
    /// normal operation — but operators may need it to clear test fixtures or
    /// permanently-failed entries.
    async fn delete(&self, tx_hash: &str) -> Result<bool>;
}

fn canonical_key(tx_hash: &str) -> String {
    tx_hash.to_ascii_lowercase()
}

/// A `Mutex`-guarded in-memory [`StateStore`]. Single-writer semantics per key;
/// concurrent writers to distinct keys do not block each other beyond the coarse lock
/// (acceptable at the scale this store targets — a single dashboard process, not a
/// sharded production ledger).
#[derive(Default)]
pub struct InMemoryStateStore {
    rows: Mutex<HashMap<String, TxState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, tx_hash: &str) -> Result<Option<TxState>> {
        let rows = self.rows.lock().expect("state store mutex poisoned");
        Ok(rows.get(&canonical_key(tx_hash)).cloned())
    }

    async fn set(&self, tx_hash: &str, state: TxState) -> Result<()> {
        let mut rows = self.rows.lock().expect("state store mutex poisoned");
        rows.insert(canonical_key(tx_hash), state);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.lock().expect("state store mutex poisoned").len())
    }

    async fn list(&self) -> Result<Vec<TxState>> {
        Ok(self
            .rows
            .lock()
            .expect("state store mutex poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn delete(&self, tx_hash: &str) -> Result<bool> {
        let mut rows = self.rows.lock().expect("state store mutex poisoned");
        Ok(rows.remove(&canonical_key(tx_hash)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(hash: &str) -> TxState {
        TxState {
            tx_hash: hash.to_string(),
            chain_id: ChainId::new("ethereum"),
            raw_tx: vec![0x02, 0xf8],
            retry_count: 1,
            first_seen: SystemTime::now(),
            last_retry: SystemTime::now(),
            status: TxStatus::Pending,
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStateStore::new();
        store.set("0xABCD", sample_state("0xABCD")).await.unwrap();
        let fetched = store.get("0xabcd").await.unwrap().unwrap();
        assert_eq!(fetched.retry_count, 1);
    }

    #[tokio::test]
    async fn key_lookup_is_case_insensitive() {
        let store = InMemoryStateStore::new();
        store.set("0xAbCd", sample_state("0xAbCd")).await.unwrap();
        assert!(store.get("0xabcd").await.unwrap().is_some());
        assert!(store.get("0xABCD").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn set_on_existing_key_replaces() {
        let store = InMemoryStateStore::new();
        store.set("0xabcd", sample_state("0xabcd")).await.unwrap();
        let mut replacement = sample_state("0xabcd");
        replacement.retry_count = 5;
        store.set("0xabcd", replacement).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("0xabcd").await.unwrap().unwrap().retry_count, 5);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let store = InMemoryStateStore::new();
        store.set("0xabcd", sample_state("0xabcd")).await.unwrap();
        assert!(store.delete("0xabcd").await.unwrap());
        assert!(store.get("0xabcd").await.unwrap().is_none());
        assert!(!store.delete("0xabcd").await.unwrap());
    }
}
