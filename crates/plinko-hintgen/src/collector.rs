//! Initial balance collection
//!
//! Queries one balance per address with a bounded number of requests in
//! flight, sorts the accounts by address and writes `database.bin` plus
//! `address-mapping.bin`.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use plinko_core::source::{encode_balances, Address, AddressMapping};
use serde::Deserialize;
use serde_json::json;

/// Default number of balance requests in flight
pub const DEFAULT_CONCURRENCY: usize = 256;

/// First generated address: `0x1000...0000`
const ADDRESS_BASE_PREFIX: u8 = 0x10;

/// `address -> balance` lookup
pub trait BalanceOracle: Send + Sync {
    fn balance(&self, address: &Address) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

/// Account row produced by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub balance: u64,
}

/// Deterministic, sortable addresses `0x1000...0000 + i`
pub fn sequential_addresses(count: u64) -> Vec<Address> {
    (0..count)
        .map(|i| {
            let mut address = [0u8; 20];
            address[0] = ADDRESS_BASE_PREFIX;
            address[12..].copy_from_slice(&i.to_be_bytes());
            address
        })
        .collect()
}

/// Query every balance with at most `concurrency` requests in flight.
///
/// Each result lands in the slot of its own address. A failed lookup is
/// logged and recorded as zero. The output is sorted by address.
pub async fn collect_balances<O: BalanceOracle>(
    oracle: &O,
    addresses: &[Address],
    concurrency: usize,
) -> Vec<Account> {
    let mut balances = vec![0u64; addresses.len()];

    let pb = ProgressBar::new(addresses.len() as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style);
    }

    let mut results = stream::iter(addresses.iter().enumerate())
        .map(|(i, address)| async move { (i, oracle.balance(address).await) })
        .buffer_unordered(concurrency.max(1));

    while let Some((i, result)) = results.next().await {
        match result {
            Ok(balance) => balances[i] = balance,
            Err(e) => {
                tracing::warn!(address = %hex::encode(addresses[i]), error = %e, "Balance query failed");
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Balances collected");

    let mut accounts: Vec<Account> = addresses
        .iter()
        .zip(balances)
        .map(|(&address, balance)| Account { address, balance })
        .collect();
    accounts.sort_by(|a, b| a.address.cmp(&b.address));
    accounts
}

/// Write `database.bin` and `address-mapping.bin` for sorted accounts
pub fn write_source_artifacts(
    accounts: &[Account],
    database_path: &Path,
    mapping_path: &Path,
) -> anyhow::Result<()> {
    let balances: Vec<u64> = accounts.iter().map(|a| a.balance).collect();
    std::fs::write(database_path, encode_balances(&balances))?;

    let addresses: Vec<Address> = accounts.iter().map(|a| a.address).collect();
    std::fs::write(mapping_path, AddressMapping::from_sorted(&addresses).to_bytes())?;

    tracing::info!(
        accounts = accounts.len(),
        database = %database_path.display(),
        mapping = %mapping_path.display(),
        "Wrote source artifacts"
    );
    Ok(())
}

/// Balance oracle over an Ethereum JSON-RPC endpoint (`eth_getBalance`)
pub struct RpcOracle {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<serde_json::Value>,
}

impl RpcOracle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> anyhow::Result<String> {
        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            anyhow::bail!("{method} failed: {error}");
        }
        response
            .result
            .ok_or_else(|| anyhow::anyhow!("{method} returned no result"))
    }

    /// Poll `eth_blockNumber` until the node answers
    pub async fn wait_ready(&self, attempts: u32, interval: Duration) -> anyhow::Result<()> {
        for attempt in 1..=attempts {
            match self.call("eth_blockNumber", json!([])).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::info!(attempt, attempts, error = %e, "Waiting for RPC node");
                    tokio::time::sleep(interval).await;
                }
            }
        }
        anyhow::bail!("RPC node at {} did not become ready", self.url)
    }
}

impl BalanceOracle for RpcOracle {
    async fn balance(&self, address: &Address) -> anyhow::Result<u64> {
        let address = format!("0x{}", hex::encode(address));
        let quantity = self.call("eth_getBalance", json!([address, "latest"])).await?;
        parse_quantity_low64(&quantity)
    }
}

/// Low 64 bits of a hex JSON-RPC quantity (`"0x1bc16d674ec80000"`)
pub fn parse_quantity_low64(quantity: &str) -> anyhow::Result<u64> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| anyhow::anyhow!("quantity {quantity:?} lacks 0x prefix"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        anyhow::bail!("invalid quantity {quantity:?}");
    }
    let low = &digits[digits.len().saturating_sub(16)..];
    Ok(u64::from_str_radix(low, 16)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Balance is the low byte of the address; addresses ending in 0x07 fail
    struct FakeOracle;

    impl BalanceOracle for FakeOracle {
        async fn balance(&self, address: &Address) -> anyhow::Result<u64> {
            if address[19] == 0x07 {
                anyhow::bail!("connection reset");
            }
            Ok(address[19] as u64 * 100)
        }
    }

    #[test]
    fn test_sequential_addresses() {
        let addresses = sequential_addresses(3);
        assert_eq!(hex::encode(addresses[0]), format!("10{}", "0".repeat(38)));
        assert_eq!(addresses[2][19], 2);
        assert!(addresses.windows(2).all(|w| w[0] < w[1]));

        let far = sequential_addresses(0x1_0001);
        assert_eq!(&far[0x1_0000][17..], &[1, 0, 0]);
    }

    #[tokio::test]
    async fn test_collect_balances_sorted_with_failures_as_zero() {
        let mut addresses = sequential_addresses(10);
        addresses.reverse();

        let accounts = collect_balances(&FakeOracle, &addresses, 3).await;

        assert_eq!(accounts.len(), 10);
        assert!(accounts.windows(2).all(|w| w[0].address < w[1].address));
        for (i, account) in accounts.iter().enumerate() {
            let expected = if i == 7 { 0 } else { i as u64 * 100 };
            assert_eq!(account.balance, expected);
        }
    }

    #[test]
    fn test_write_source_artifacts() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("database.bin");
        let map_path = dir.path().join("address-mapping.bin");

        let accounts: Vec<Account> = sequential_addresses(4)
            .into_iter()
            .enumerate()
            .map(|(i, address)| Account { address, balance: i as u64 + 1 })
            .collect();
        write_source_artifacts(&accounts, &db_path, &map_path).unwrap();

        let balances = plinko_core::source::load_balances(&db_path).unwrap();
        assert_eq!(balances, vec![1, 2, 3, 4]);

        let mapping = AddressMapping::load(&map_path).unwrap();
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping.lookup(&accounts[3].address), Some(3));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity_low64("0x0").unwrap(), 0);
        assert_eq!(parse_quantity_low64("0x1bc16d674ec80000").unwrap(), 2_000_000_000_000_000_000);
        // 10000 ETH in wei exceeds 64 bits; only the low word is kept
        let wei: u128 = 10_000 * 10u128.pow(18);
        let quantity = format!("0x{wei:x}");
        assert_eq!(parse_quantity_low64(&quantity).unwrap(), wei as u64);

        assert!(parse_quantity_low64("12").is_err());
        assert!(parse_quantity_low64("0x").is_err());
        assert!(parse_quantity_low64("0xzz").is_err());
    }
}
