//! Plinko update service
//!
//! Loads the database from hint.bin, builds the index-to-hint cache, then
//! turns every simulated block into a delta file under the deltas directory.
//! With `--rpc-url`, block numbers follow the chain head of that node.
//!
//! Usage:
//!   plinko-updater --hint-path /data/hint.bin --deltas-dir /data/deltas
//!   plinko-updater --rpc-url http://eth-mock:8545

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use plinko_core::readiness::wait_for_file;
use plinko_core::{HintSnapshot, UpdateManager};
use plinko_updater::{
    connect_with_retry, health_router, ChainSource, DeltaWriter, RpcChainHead, SimulatedSource,
    UpdateService,
};
use tracing_subscriber::EnvFilter;

const RPC_RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "plinko-updater")]
#[command(about = "Apply database updates and publish hint deltas")]
struct Args {
    /// Hint snapshot to load the database from
    #[arg(long, env = "PLINKO_HINT_PATH", default_value = "/data/hint.bin")]
    hint_path: PathBuf,

    /// Directory receiving delta-NNNNNN.bin files
    #[arg(long, env = "PLINKO_DELTAS_DIR", default_value = "/data/deltas")]
    deltas_dir: PathBuf,

    /// Health endpoint listen address
    #[arg(long, env = "PLINKO_HEALTH_LISTEN", default_value = "0.0.0.0:3001")]
    health_listen: SocketAddr,

    /// Seconds to wait for the hint snapshot to appear
    #[arg(long, default_value = "120")]
    wait_secs: u32,

    /// Block polling interval in milliseconds
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Simulated block time in milliseconds
    #[arg(long, env = "PLINKO_BLOCK_INTERVAL_MS", default_value = "12000")]
    block_interval_ms: u64,

    /// Simulated account changes per block
    #[arg(long, env = "PLINKO_CHANGES_PER_BLOCK", default_value = "2000")]
    changes_per_block: u64,

    /// Ethereum JSON-RPC endpoint whose head numbers the blocks
    #[arg(long, env = "PLINKO_RPC_URL")]
    rpc_url: Option<String>,

    /// Connection attempts against the RPC endpoint before giving up
    #[arg(long, default_value = "10")]
    rpc_attempts: u32,

    /// Skip blocks already on chain at startup
    #[arg(long)]
    from_head: bool,

    /// Route updates through the iPRF directly instead of the precomputed table
    #[arg(long)]
    no_cache: bool,

    /// Expose Prometheus metrics at /metrics on the health listener
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    tracing::info!(
        changes_per_block = args.changes_per_block,
        cache = !args.no_cache,
        "Plinko update service"
    );

    let hint_path = args.hint_path.clone();
    let wait_secs = args.wait_secs;
    let found = tokio::task::spawn_blocking(move || {
        wait_for_file(&hint_path, wait_secs, Duration::from_secs(1))
    })
    .await?;
    if !found {
        anyhow::bail!("timed out waiting for {}", args.hint_path.display());
    }

    let snapshot = HintSnapshot::load(&args.hint_path)
        .with_context(|| format!("failed to load {}", args.hint_path.display()))?;
    let params = snapshot.params();
    tracing::info!(
        db_size = params.db_size,
        chunk_size = params.chunk_size,
        set_size = params.set_size,
        "Loaded database"
    );

    let database = Arc::new(snapshot.into_database());
    let mut manager = UpdateManager::new(database, params.chunk_size, params.set_size);
    if !args.no_cache {
        let elapsed = tokio::task::block_in_place(|| manager.enable_cache_mode());
        tracing::info!(
            elapsed_ms = elapsed.as_millis() as u64,
            memory_mb = params.db_size * 8 / 1024 / 1024,
            "Update cache ready"
        );
    }

    let writer = DeltaWriter::new(&args.deltas_dir);
    writer.ensure_dir()?;
    if let Some(block) = writer.latest_block()? {
        tracing::info!(block, "Existing delta files found; regenerating from block 1");
    }

    let metrics = if args.metrics {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let health = health_router(args.deltas_dir.clone(), metrics);
    let listener = tokio::net::TcpListener::bind(args.health_listen).await?;
    tracing::info!(addr = %args.health_listen, "Health server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health).await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let poll_interval = Duration::from_millis(args.poll_interval_ms);
    match args.rpc_url {
        Some(url) => {
            let head = RpcChainHead::new(url);
            tracing::info!(url = head.url(), "Connecting to chain");
            let block = connect_with_retry(&head, args.rpc_attempts, RPC_RETRY_INTERVAL).await?;
            let start = if args.from_head { block } else { 0 };
            UpdateService::new(manager, ChainSource::new(head, args.changes_per_block), writer)
                .starting_after(start)
                .run(poll_interval)
                .await;
        }
        None => {
            let source = SimulatedSource::new(
                args.changes_per_block,
                Duration::from_millis(args.block_interval_ms),
            );
            UpdateService::new(manager, source, writer).run(poll_interval).await;
        }
    }

    Ok(())
}
