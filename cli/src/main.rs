//! blocksync CLI — run the sync daemon, query indexed data, verify and repair.
//!
//! Usage:
//! ```bash
//! blocksync run                    # sync all configured chains until Ctrl-C
//! blocksync run btc                # sync a single chain
//! blocksync index eth 18000000     # index one height on demand
//! blocksync status                 # cursors and row counts per chain
//! blocksync verify btc             # check recent blocks for gaps / missing txs
//! blocksync repair btc 800123      # delete + re-index one block
//! ```
//!
//! Configuration is environment-driven:
//! ```text
//! BLOCKSYNC_DB        SQLite path            (default ./blocksync.db)
//! MEMPOOL_API_URL     Bitcoin REST base URL  (default https://mempool.space/api)
//! ETH_RPC_URL         Ethereum RPC endpoint  (required for ethereum commands)
//! BLOCKSYNC_BTC_BATCH / BLOCKSYNC_ETH_BATCH            batch override
//! BLOCKSYNC_BTC_INTERVAL_SECS / BLOCKSYNC_ETH_INTERVAL_SECS  poll override
//! RUST_LOG            log filter             (default info)
//! ```

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use blocksync_bitcoin::BitcoinRestAdapter;
use blocksync_core::{Chain, ChainAdapter, IndexOutcome, Scheduler, SyncConfig, SyncEngine};
use blocksync_core::store::BlockStore;
use blocksync_evm::EvmRpcAdapter;
use blocksync_storage::SqliteStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "run" => cmd_run(args.get(2).map(String::as_str)).await,
        "index" => cmd_index(arg_chain(&args, 2)?, arg_height(&args, 3)?).await,
        "status" => cmd_status().await,
        "verify" => cmd_verify(arg_chain(&args, 2)?).await,
        "repair" => cmd_repair(arg_chain(&args, 2)?, arg_height(&args, 3)?).await,
        "version" | "--version" | "-V" => {
            println!("blocksync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("blocksync {}", env!("CARGO_PKG_VERSION"));
    println!("Incremental Bitcoin + Ethereum block indexer\n");
    println!("USAGE:");
    println!("    blocksync <COMMAND>\n");
    println!("COMMANDS:");
    println!("    run [chain]             Sync continuously (all chains, or one)");
    println!("    index <chain> <height>  Index a single height on demand");
    println!("    status                  Show cursors and row counts");
    println!("    verify <chain>          Check recent blocks for gaps and missing txs");
    println!("    repair <chain> <height> Delete and re-index one block");
    println!("    version                 Print version");
    println!("    help                    Print this help");
}

// ─── Argument / environment helpers ──────────────────────────────────────────

fn arg_chain(args: &[String], idx: usize) -> Result<Chain> {
    let raw = args
        .get(idx)
        .with_context(|| format!("missing <chain> argument (position {idx})"))?;
    Chain::parse(raw).with_context(|| format!("unknown chain {raw:?} (use btc or eth)"))
}

fn arg_height(args: &[String], idx: usize) -> Result<u64> {
    let raw = args
        .get(idx)
        .with_context(|| format!("missing <height> argument (position {idx})"))?;
    raw.parse()
        .with_context(|| format!("invalid height {raw:?}"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("{key} must be an integer, got {raw:?}")),
        Err(_) => Ok(None),
    }
}

async fn open_store() -> Result<Arc<SqliteStore>> {
    let path = env_or("BLOCKSYNC_DB", "./blocksync.db");
    let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("opening store at {path}"))?;
    Ok(Arc::new(store))
}

fn adapter_for(chain: Chain) -> Result<Arc<dyn ChainAdapter>> {
    match chain {
        Chain::Bitcoin => {
            let base = env_or("MEMPOOL_API_URL", "https://mempool.space/api");
            Ok(Arc::new(BitcoinRestAdapter::default_for(base)))
        }
        Chain::Ethereum => {
            let endpoint = env::var("ETH_RPC_URL")
                .context("ETH_RPC_URL must be set for ethereum commands")?;
            Ok(Arc::new(EvmRpcAdapter::default_for(endpoint)))
        }
    }
}

fn config_for(chain: Chain) -> Result<SyncConfig> {
    let (batch_key, interval_key) = match chain {
        Chain::Bitcoin => ("BLOCKSYNC_BTC_BATCH", "BLOCKSYNC_BTC_INTERVAL_SECS"),
        Chain::Ethereum => ("BLOCKSYNC_ETH_BATCH", "BLOCKSYNC_ETH_INTERVAL_SECS"),
    };

    let mut cfg = SyncConfig::for_chain(chain);
    if let Some(batch) = env_u64(batch_key)? {
        cfg = cfg.max_batch_per_cycle(batch);
    }
    if let Some(secs) = env_u64(interval_key)? {
        cfg = cfg.poll_interval(Duration::from_secs(secs));
    }
    Ok(cfg)
}

fn engine_for(chain: Chain, store: Arc<SqliteStore>) -> Result<Arc<SyncEngine>> {
    let config = config_for(chain)?;
    let adapter = adapter_for(chain)?;
    Ok(Arc::new(SyncEngine::new(config, adapter, store)))
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_run(only: Option<&str>) -> Result<()> {
    let chains: Vec<Chain> = match only {
        Some(raw) => {
            vec![Chain::parse(raw).with_context(|| format!("unknown chain {raw:?}"))?]
        }
        None => vec![Chain::Bitcoin, Chain::Ethereum],
    };

    let store = open_store().await?;
    let mut handles = Vec::with_capacity(chains.len());
    for chain in chains {
        let engine = engine_for(chain, store.clone())?;
        let interval = engine.config().poll_interval;
        tracing::info!(
            %chain,
            batch = engine.config().max_batch_per_cycle,
            interval_secs = interval.as_secs(),
            "starting scheduler"
        );
        handles.push(Scheduler::spawn(engine, interval));
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received, stopping schedulers");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn cmd_index(chain: Chain, height: u64) -> Result<()> {
    let store = open_store().await?;
    let engine = engine_for(chain, store)?;

    match engine.index_height(height).await? {
        IndexOutcome::Indexed {
            transactions_stored,
        } => println!("{chain} block {height}: indexed ({transactions_stored} transactions)"),
        IndexOutcome::AlreadyIndexed => println!("{chain} block {height}: already indexed"),
        // index_height surfaces fetch failures as errors.
        IndexOutcome::FetchFailed(err) => bail!("fetch failed: {err}"),
    }
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let store = open_store().await?;

    for chain in [Chain::Bitcoin, Chain::Ethereum] {
        let cursor = store.highest_indexed(chain).await?;
        let blocks = store.block_count(chain).await?;
        let txs = store.transaction_count(chain).await?;

        println!("{chain}:");
        match cursor {
            Some(h) => println!("  cursor:       {h}"),
            None => println!("  cursor:       (nothing indexed)"),
        }
        println!("  blocks:       {blocks}");
        println!("  transactions: {txs}");
        if let Some(latest) = store.latest_block(chain).await? {
            println!("  latest hash:  {}", latest.hash);
            let when = chrono::DateTime::from_timestamp(latest.timestamp, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| latest.timestamp.to_string());
            println!("  latest time:  {when}");
        }
    }
    Ok(())
}

/// How many blocks below the cursor `verify` inspects.
const VERIFY_DEPTH: u64 = 10;

async fn cmd_verify(chain: Chain) -> Result<()> {
    let store = open_store().await?;

    let Some(cursor) = store.highest_indexed(chain).await? else {
        println!("{chain}: nothing indexed yet");
        return Ok(());
    };

    let from = cursor.saturating_sub(VERIFY_DEPTH - 1).max(1);
    let mut problems = 0u32;

    for height in from..=cursor {
        let Some(block) = store.block_by_height(chain, height).await? else {
            println!("{chain} block {height}: MISSING (gap below cursor)");
            problems += 1;
            continue;
        };
        let stored = store.transactions_for_block(chain, height).await?.len() as u32;
        if stored != block.tx_count {
            println!(
                "{chain} block {height}: INCOMPLETE ({stored}/{} transactions stored)",
                block.tx_count
            );
            problems += 1;
        }
    }

    if problems == 0 {
        println!("{chain}: blocks {from}..={cursor} verified, no problems");
        Ok(())
    } else {
        println!("{chain}: {problems} problem(s) found — run `blocksync repair {chain} <height>`");
        process::exit(1);
    }
}

async fn cmd_repair(chain: Chain, height: u64) -> Result<()> {
    let store = open_store().await?;
    let engine = engine_for(chain, store.clone())?;

    if store.delete_block(chain, height).await? {
        println!("{chain} block {height}: deleted stale row");
    } else {
        println!("{chain} block {height}: no existing row");
    }

    match engine.index_height(height).await? {
        IndexOutcome::Indexed {
            transactions_stored,
        } => println!("{chain} block {height}: re-indexed ({transactions_stored} transactions)"),
        IndexOutcome::AlreadyIndexed => println!("{chain} block {height}: already indexed"),
        IndexOutcome::FetchFailed(err) => bail!("fetch failed: {err}"),
    }
    Ok(())
}
