//! Plinko hint generator
//!
//! Usage:
//!   plinko-hintgen collect --rpc-url http://eth-mock:8545 --accounts 8388608
//!   plinko-hintgen build --database /data/database.bin --hint /data/hint.bin
//!   plinko-hintgen all

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use plinko_core::readiness::wait_for_file;
use plinko_hintgen::collector::DEFAULT_CONCURRENCY;
use plinko_hintgen::{
    collect_balances, generate_hint, sequential_addresses, write_source_artifacts, RpcOracle,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plinko-hintgen")]
#[command(about = "Collect balances and build the Plinko PIR hint snapshot")]
struct Cli {
    /// Balances file (u64 little-endian per account, sorted by address)
    #[arg(long, global = true, env = "PLINKO_DATABASE_PATH", default_value = "/data/database.bin")]
    database: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query balances and write database.bin + address-mapping.bin
    Collect(CollectArgs),
    /// Build hint.bin from database.bin
    Build(BuildArgs),
    /// Collect (unless database.bin exists), then build
    All {
        #[command(flatten)]
        collect: CollectArgs,
        #[command(flatten)]
        build: BuildArgs,
    },
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// JSON-RPC endpoint answering eth_getBalance
    #[arg(long, env = "PLINKO_RPC_URL", default_value = "http://eth-mock:8545")]
    rpc_url: String,

    /// Number of accounts to collect
    #[arg(long, env = "PLINKO_ACCOUNTS", default_value = "8388608")]
    accounts: u64,

    /// Balance requests in flight
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Address mapping output
    #[arg(long, env = "PLINKO_MAPPING_PATH", default_value = "/data/address-mapping.bin")]
    mapping: PathBuf,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Hint snapshot output
    #[arg(long, env = "PLINKO_HINT_PATH", default_value = "/data/hint.bin")]
    hint: PathBuf,

    /// Seconds to wait for database.bin to appear
    #[arg(long, default_value = "60")]
    wait_secs: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Collect(collect) => run_collect(&collect, &cli.database).await,
        Command::Build(build) => run_build(&build, &cli.database).await,
        Command::All { collect, build } => {
            run_collect(&collect, &cli.database).await?;
            run_build(&build, &cli.database).await
        }
    }
}

async fn run_collect(args: &CollectArgs, database: &Path) -> anyhow::Result<()> {
    if database.exists() {
        tracing::info!(path = %database.display(), "Database already exists, skipping collection");
        return Ok(());
    }

    let started = Instant::now();
    let oracle = RpcOracle::new(&args.rpc_url);
    oracle.wait_ready(30, Duration::from_secs(2)).await?;
    tracing::info!(url = %args.rpc_url, "Connected to RPC node");

    let addresses = sequential_addresses(args.accounts);
    tracing::info!(
        accounts = args.accounts,
        concurrency = args.concurrency,
        "Querying balances"
    );
    let accounts = collect_balances(&oracle, &addresses, args.concurrency).await;

    write_source_artifacts(&accounts, database, &args.mapping)?;
    tracing::info!(
        elapsed_s = started.elapsed().as_secs(),
        "Database generation complete"
    );
    Ok(())
}

async fn run_build(args: &BuildArgs, database: &Path) -> anyhow::Result<()> {
    let path = database.to_path_buf();
    let wait_secs = args.wait_secs;
    let found = tokio::task::spawn_blocking(move || {
        wait_for_file(&path, wait_secs, Duration::from_secs(1))
    })
    .await?;
    if !found {
        anyhow::bail!("timed out waiting for {}", database.display());
    }

    let database = database.to_path_buf();
    let hint = args.hint.clone();
    tokio::task::spawn_blocking(move || generate_hint(&database, &hint)).await??;
    Ok(())
}
