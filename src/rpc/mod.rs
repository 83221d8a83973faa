//! Multi-endpoint JSON-RPC client with health-aware failover and batching.
//!
//! Mirrors the transport layering `x402-rs` builds on Alloy (`RpcClient` over an HTTP
//! transport per endpoint), but adds the failover, health scoring, and circuit breaker
//! spec.md §4.1 calls for — none of which Alloy's own fallback layer exposes as
//! inspectable state.

pub mod health;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use alloy_rpc_client::RpcClient as AlloyRpcClient;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::errors::{AdapterError, Result};
use health::HealthTracker;

struct Endpoint {
    url: Url,
    transport: AlloyRpcClient,
}

/// A multi-endpoint JSON-RPC client. Cheap to clone (endpoints and health state are
/// behind `Arc`s internally via [`AlloyRpcClient`] and [`HealthTracker`]).
pub struct RpcClient {
    endpoints: Vec<Endpoint>,
    health: HealthTracker,
    cursor: AtomicUsize,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Builds a client from an ordered list of HTTP(S) JSON-RPC endpoint URLs.
    pub fn new(urls: Vec<Url>) -> Self {
        let endpoints = urls
            .into_iter()
            .map(|url| Endpoint {
                transport: AlloyRpcClient::new_http(url.clone()),
                url,
            })
            .collect();
        RpcClient {
            endpoints,
            health: HealthTracker::new(),
            cursor: AtomicUsize::new(0),
            request_id: AtomicU64::new(1),
        }
    }

    /// A read-only handle onto this client's health tracker, for operator tooling.
    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    fn attempt_order(&self) -> Vec<usize> {
        let n = self.endpoints.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n.max(1);
        (0..n).map(|i| (start + i) % n).collect()
    }

    /// Calls `method` with `params`, routing across endpoints with failover.
    ///
    /// Iterates at most once through every endpoint not yet attempted for this call,
    /// skipping endpoints the health tracker reports unhealthy unless every endpoint is
    /// unhealthy (in which case all are tried anyway, to let a probe through). Returns
    /// the last error, wrapped as retryable, if every attempt fails.
    pub async fn call<P: Serialize + Send + Sync + Clone>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Value> {
        if self.endpoints.is_empty() {
            return Err(AdapterError::rpc_unavailable("no RPC endpoints configured"));
        }

        let order = self.attempt_order();
        let mut healthy_first: Vec<usize> = Vec::with_capacity(order.len());
        let mut unhealthy: Vec<usize> = Vec::new();
        for idx in order {
            if self.health.is_healthy(&self.endpoints[idx].url.to_string()).await {
                healthy_first.push(idx);
            } else {
                unhealthy.push(idx);
            }
        }
        let attempt_order = if healthy_first.is_empty() {
            unhealthy
        } else {
            healthy_first
        };

        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let mut last_error: Option<AdapterError> = None;
        for idx in attempt_order {
            let endpoint = &self.endpoints[idx];
            let url_str = endpoint.url.to_string();
            let started = Instant::now();
            tracing::debug!(rpc.method = method, rpc.id = id, endpoint = %url_str, "rpc call");
            match endpoint.transport.request::<_, Value>(method.to_string(), params.clone()).await {
                Ok(value) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.health.record_success(&url_str, latency_ms).await;
                    return Ok(value);
                }
                Err(err) => {
                    self.health.record_failure(&url_str).await;
                    tracing::warn!(endpoint = %url_str, error = %err, "rpc call failed");
                    last_error = Some(classify_transport_error(&err.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AdapterError::rpc_unavailable("all endpoints exhausted")))
    }

    /// Calls a batch of `(method, params)` requests, preserving input order. Each entry
    /// independently resolves to `None` on failure; the call as a whole only errors if
    /// the entire batch's transport fails.
    pub async fn call_batch(&self, requests: Vec<(String, Value)>) -> Result<Vec<Option<Value>>> {
        if self.endpoints.is_empty() {
            return Err(AdapterError::rpc_unavailable("no RPC endpoints configured"));
        }
        let order = self.attempt_order();
        let healthy: Vec<usize> = {
            let mut v = Vec::new();
            for idx in &order {
                if self.health.is_healthy(&self.endpoints[*idx].url.to_string()).await {
                    v.push(*idx);
                }
            }
            if v.is_empty() { order } else { v }
        };

        let mut last_error: Option<AdapterError> = None;
        for idx in healthy {
            let endpoint = &self.endpoints[idx];
            let url_str = endpoint.url.to_string();
            let started = Instant::now();
            let mut batch = endpoint.transport.new_batch();
            let mut waiters = Vec::with_capacity(requests.len());
            let mut build_failed = false;
            for (method, params) in &requests {
                match batch.add_call::<_, Value>(method, params) {
                    Ok(waiter) => waiters.push(waiter),
                    Err(_) => {
                        build_failed = true;
                        break;
                    }
                }
            }
            if build_failed {
                continue;
            }
            match batch.send().await {
                Ok(()) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.health.record_success(&url_str, latency_ms).await;
                    let mut results = Vec::with_capacity(waiters.len());
                    for waiter in waiters {
                        results.push(waiter.await.ok());
                    }
                    return Ok(results);
                }
                Err(err) => {
                    self.health.record_failure(&url_str).await;
                    last_error = Some(classify_transport_error(&err.to_string()));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AdapterError::rpc_unavailable("all endpoints exhausted")))
    }

    /// Releases underlying HTTP resources. The Alloy HTTP transport is connectionless
    /// (plain `reqwest`/`hyper` pooled client), so this is a no-op kept for interface
    /// symmetry with chains whose transports hold persistent sockets (e.g. websocket).
    pub fn close(&self) {}
}

/// All transport, HTTP-non-200, and JSON-RPC error-object failures are retryable;
/// malformed responses are not.
fn classify_transport_error(message: &str) -> AdapterError {
    if message.contains("parse") || message.contains("deserializ") {
        AdapterError::RpcParse(message.to_string())
    } else {
        AdapterError::rpc_unavailable(message.to_string())
    }
}
