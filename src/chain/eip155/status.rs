//! The `QueryStatus` and `SubscribeStatus` operations: turns `eth_getTransactionByHash`
//! / `eth_getTransactionReceipt` / `eth_blockNumber` reads into a confirmation count and
//! keeps a subscriber updated as that count changes.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::sleep;

use super::Eip155AdapterConfig;
use crate::chain::StatusStream;
use crate::errors::{AdapterError, Result};
use crate::rpc::RpcClient;
use crate::types::{StatusError, TransactionStatus, TxStatus};
use crate::util::parse_hex_u64;

const POLL_INTERVAL: Duration = Duration::from_secs(12);
const BACKOFF_FLOOR: Duration = Duration::from_secs(3);
const BACKOFF_CEILING: Duration = Duration::from_secs(60);

/// Looks up the current confirmation status of a previously broadcast `tx_hash`.
pub async fn query_status(
    rpc: &RpcClient,
    config: &Eip155AdapterConfig,
    tx_hash: &str,
) -> Result<TransactionStatus> {
    let tx = rpc.call("eth_getTransactionByHash", [tx_hash.to_string()]).await?;
    if tx.is_null() {
        return Err(AdapterError::TxNotFound(tx_hash.to_string()));
    }

    let receipt = rpc.call("eth_getTransactionReceipt", [tx_hash.to_string()]).await?;
    if receipt.is_null() {
        return Ok(TransactionStatus {
            tx_hash: tx_hash.to_string(),
            status: TxStatus::Pending,
            confirmations: 0,
            block_number: None,
            block_hash: None,
            updated_at: SystemTime::now(),
            error: None,
        });
    }

    let status_field = receipt
        .get("status")
        .ok_or_else(|| AdapterError::RpcParse("receipt has no status field".into()))?;
    let reverted = parse_hex_u64(status_field)? == 0;
    let block_number = parse_hex_u64(
        receipt
            .get("blockNumber")
            .ok_or_else(|| AdapterError::RpcParse("receipt has no blockNumber".into()))?,
    )?;
    let block_hash = receipt.get("blockHash").and_then(|v| v.as_str()).map(str::to_string);

    if reverted {
        return Ok(TransactionStatus {
            tx_hash: tx_hash.to_string(),
            status: TxStatus::Failed,
            confirmations: 0,
            block_number: Some(block_number),
            block_hash,
            updated_at: SystemTime::now(),
            error: Some(StatusError {
                code: "ERR_TX_REVERTED".to_string(),
                message: "transaction reverted".to_string(),
            }),
        });
    }

    let (status, confirmations) = match current_block_number(rpc).await {
        Ok(current) => {
            let confirmations = current.saturating_sub(block_number);
            (status_for_confirmations(confirmations, config.min_confirmations), confirmations)
        }
        Err(_) => (TxStatus::Confirmed, 1),
    };

    Ok(TransactionStatus {
        tx_hash: tx_hash.to_string(),
        status,
        confirmations,
        block_number: Some(block_number),
        block_hash,
        updated_at: SystemTime::now(),
        error: None,
    })
}

async fn current_block_number(rpc: &RpcClient) -> Result<u64> {
    let value = rpc.call("eth_blockNumber", ()).await?;
    parse_hex_u64(&value)
}

/// A mined, non-reverted transaction is `Confirmed` below `min_confirmations` and
/// `Finalized` once it reaches that depth. Split out of [`query_status`] so the
/// confirmation-depth decision can be tested without a live chain.
fn status_for_confirmations(confirmations: u64, min_confirmations: u64) -> TxStatus {
    if confirmations >= min_confirmations {
        TxStatus::Finalized
    } else {
        TxStatus::Confirmed
    }
}

/// Polls [`query_status`] and emits only on a change of `(status, confirmations)`.
/// Backs off from 3s to a 60s ceiling on consecutive errors, resetting to 3s on the next
/// success; once a terminal status (`Finalized` or `Failed`) is reached the poll
/// interval drops permanently to the 60s ceiling, since nothing further can change.
/// Closes when the caller drops the returned receiver.
///
/// The first lookup runs synchronously, before any channel is created: if it fails, this
/// factory call itself returns `Err` rather than handing back a stream that would only
/// ever emit nothing. Once the first lookup succeeds, its result is emitted as the
/// stream's first item and the background poll loop continues from there.
pub async fn subscribe_status(
    rpc: Arc<RpcClient>,
    config: Arc<Eip155AdapterConfig>,
    tx_hash: String,
) -> Result<StatusStream> {
    let initial = query_status(&rpc, &config, &tx_hash).await?;
    let initial_key = initial.dedup_key();
    let initial_terminal = matches!(initial.status, TxStatus::Finalized | TxStatus::Failed);

    let (tx, rx) = mpsc::channel(10);
    tokio::spawn(async move {
        if tx.send(initial).await.is_err() {
            return;
        }
        sleep(if initial_terminal { BACKOFF_CEILING } else { POLL_INTERVAL }).await;

        let mut last_key = Some(initial_key);
        let mut backoff = BACKOFF_FLOOR;

        loop {
            match query_status(&rpc, &config, &tx_hash).await {
                Ok(status) => {
                    backoff = BACKOFF_FLOOR;
                    let key = status.dedup_key();
                    let is_terminal = matches!(status.status, TxStatus::Finalized | TxStatus::Failed);
                    if last_key != Some(key) {
                        last_key = Some(key);
                        if tx.send(status).await.is_err() {
                            break;
                        }
                    }
                    let wait = if is_terminal { BACKOFF_CEILING } else { POLL_INTERVAL };
                    sleep(wait).await;
                }
                Err(err) => {
                    tracing::debug!(tx_hash = %tx_hash, error = %err, backoff_secs = backoff.as_secs(), "status poll failed, backing off");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_CEILING);
                }
            }
        }
    });
    Ok(rx)
}
