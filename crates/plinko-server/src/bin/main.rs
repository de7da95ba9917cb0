//! Plinko PIR query server
//!
//! Usage:
//!   plinko-server --hint-path /data/hint.bin --listen 0.0.0.0:3000
//!   plinko-server --deltas-dir /data/deltas   # also run the update service in process

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use plinko_core::readiness::wait_for_file;
use plinko_core::UpdateManager;
use plinko_server::{create_router, create_router_with_metrics, init_prometheus_recorder, ServerContext};
use plinko_updater::{DeltaWriter, SimulatedSource, UpdateService};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plinko-server")]
#[command(about = "Serve Plinko PIR queries")]
struct Args {
    /// Hint snapshot to serve
    #[arg(long, env = "PLINKO_HINT_PATH", default_value = "/data/hint.bin")]
    hint_path: PathBuf,

    /// Listen address
    #[arg(long, env = "PLINKO_LISTEN", default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// Seconds to wait for the hint snapshot to appear
    #[arg(long, default_value = "120")]
    wait_secs: u32,

    /// Run the update service in process, writing deltas here
    #[arg(long, env = "PLINKO_DELTAS_DIR")]
    deltas_dir: Option<PathBuf>,

    /// Block polling interval of the in-process updater, in milliseconds
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Simulated block time of the in-process updater, in milliseconds
    #[arg(long, env = "PLINKO_BLOCK_INTERVAL_MS", default_value = "12000")]
    block_interval_ms: u64,

    /// Simulated account changes per block
    #[arg(long, env = "PLINKO_CHANGES_PER_BLOCK", default_value = "2000")]
    changes_per_block: u64,

    /// Skip building the update cache
    #[arg(long)]
    no_cache: bool,

    /// Expose Prometheus metrics at /metrics
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let hint_path = args.hint_path.clone();
    let wait_secs = args.wait_secs;
    let found = tokio::task::spawn_blocking(move || {
        wait_for_file(&hint_path, wait_secs, Duration::from_secs(1))
    })
    .await?;
    if !found {
        anyhow::bail!("timed out waiting for {}", args.hint_path.display());
    }

    tracing::info!(path = %args.hint_path.display(), "Loading database");
    let context = ServerContext::load(&args.hint_path)
        .with_context(|| format!("failed to load {}", args.hint_path.display()))?;
    let params = *context.params();
    tracing::info!(
        db_size = params.db_size,
        chunk_size = params.chunk_size,
        set_size = params.set_size,
        size_mb = params.db_size * 8 / 1024 / 1024,
        "Database loaded"
    );

    if let Some(deltas_dir) = &args.deltas_dir {
        let mut manager = UpdateManager::new(context.database(), params.chunk_size, params.set_size);
        if !args.no_cache {
            let elapsed = tokio::task::block_in_place(|| manager.enable_cache_mode());
            tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "Update cache ready");
        }

        let writer = DeltaWriter::new(deltas_dir);
        writer.ensure_dir()?;
        let source = SimulatedSource::new(
            args.changes_per_block,
            Duration::from_millis(args.block_interval_ms),
        );
        let service = UpdateService::new(manager, source, writer);
        tokio::spawn(service.run(Duration::from_millis(args.poll_interval_ms)));
        tracing::info!(deltas_dir = %deltas_dir.display(), "In-process updater started");
    }

    let context = Arc::new(context);
    let app = if args.metrics {
        create_router_with_metrics(context, init_prometheus_recorder()?)
    } else {
        create_router(context)
    };

    tracing::info!(addr = %args.listen, "Plinko PIR server listening");
    tracing::info!("Privacy mode: queried indices and PRF keys are never logged");

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
