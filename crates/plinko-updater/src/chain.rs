//! Chain-driven batch source
//!
//! Batch numbers follow the head of an Ethereum JSON-RPC node
//! (`eth_blockNumber`). The change set of each block is still the
//! deterministic simulation from [`simulated_updates`].

use std::future::Future;
use std::time::Duration;

use plinko_core::{Database, DbUpdate};
use serde_json::{json, Value};

use crate::source::{simulated_updates, UpdateSource};

/// Reports the current chain head
pub trait ChainHead: Send + Sync {
    fn block_number(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

/// Chain head over an Ethereum JSON-RPC endpoint
pub struct RpcChainHead {
    client: reqwest::Client,
    url: String,
}

impl RpcChainHead {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChainHead for RpcChainHead {
    async fn block_number(&self) -> anyhow::Result<u64> {
        let response: Value = self
            .client
            .post(&self.url)
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "eth_blockNumber", "params": []}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            anyhow::bail!("eth_blockNumber failed: {error}");
        }
        let quantity = response
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("eth_blockNumber returned no result"))?;
        parse_block_number(quantity)
    }
}

/// Parse a hex JSON-RPC block number (`"0x2a"`)
pub fn parse_block_number(quantity: &str) -> anyhow::Result<u64> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("block number {quantity:?} lacks 0x prefix"))?;
    if digits.is_empty() {
        anyhow::bail!("empty block number");
    }
    Ok(u64::from_str_radix(digits, 16)?)
}

/// Query the head until it answers, at most `attempts` times
///
/// Returns the first block number seen. Fails once every attempt failed.
pub async fn connect_with_retry<H: ChainHead>(
    head: &H,
    attempts: u32,
    interval: Duration,
) -> anyhow::Result<u64> {
    let mut last_error = None;
    for attempt in 1..=attempts {
        match head.block_number().await {
            Ok(block) => {
                tracing::info!(attempt, block, "Connected to chain");
                return Ok(block);
            }
            Err(e) => {
                tracing::warn!(attempt, attempts, error = %e, "Chain not reachable, retrying");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
    match last_error {
        Some(e) => Err(e.context(format!("chain unreachable after {attempts} attempts"))),
        None => anyhow::bail!("no connection attempts made"),
    }
}

/// Batches numbered by chain blocks, contents simulated
pub struct ChainSource<H> {
    head: H,
    changes_per_block: u64,
}

impl<H: ChainHead> ChainSource<H> {
    pub fn new(head: H, changes_per_block: u64) -> Self {
        Self {
            head,
            changes_per_block,
        }
    }

    pub fn head(&self) -> &H {
        &self.head
    }
}

impl<H: ChainHead> UpdateSource for ChainSource<H> {
    async fn latest_batch(&self) -> anyhow::Result<u64> {
        self.head.block_number().await
    }

    async fn fetch_batch(&self, number: u64, database: &Database) -> anyhow::Result<Vec<DbUpdate>> {
        Ok(simulated_updates(number, self.changes_per_block, database))
    }
}
