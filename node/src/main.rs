// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AFAN Ledger Node
//!
//! Entry point for the `afan-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and serves the HTTP API in front of the transaction
//! engine and the pending pool.
//!
//! The binary supports four subcommands:
//!
//! - `run`     — start the node
//! - `keygen`  — generate a secp256k1 keypair
//! - `sign`    — sign a transaction body offline
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use afan_protocol::crypto::LedgerKeypair;
use afan_protocol::network::TransactionPool;
use afan_protocol::transaction::{Transaction, TracingSink, TxEngine};

use cli::{AfanNodeCli, Commands};
use metrics::NodeMetrics;

/// How often stale pool entries are swept.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AfanNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen => keygen(),
        Commands::Sign(args) => sign(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: API server, metrics endpoint, and the pool sweeper.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format)
        .context("failed to initialize logging")?;

    let node_address = match args.node_address {
        Some(address) => address.to_string(),
        None => {
            tracing::warn!("no node address configured, using an ephemeral one");
            LedgerKeypair::generate().address().to_string()
        }
    };

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        %node_address,
        "starting afan-node"
    );

    // --- Engine & pool ---
    let engine = TxEngine::new(Arc::new(TracingSink));
    let pool_config = args.pool_config();
    tracing::info!(?pool_config, "transaction pool configured");
    let pool = Arc::new(TransactionPool::with_engine(pool_config, engine.clone()));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            afan_protocol::config::PROTOCOL_VERSION,
        ),
        node_address,
        engine,
        pool: Arc::clone(&pool),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Pool expiry ---
    let sweeper_pool = Arc::clone(&pool);
    let sweeper_metrics = Arc::clone(&node_metrics);
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let expired = sweeper_pool.expire_old();
            sweeper_metrics
                .transactions_in_pool
                .set(sweeper_pool.size() as i64);
            if expired > 0 {
                tracing::info!(expired, "swept stale transactions");
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sweeper.abort();
    tracing::info!(pending = pool.size(), "afan-node stopped");
    Ok(())
}

/// Prints a fresh keypair as JSON.
fn keygen() -> Result<()> {
    let keypair = LedgerKeypair::generate();
    let out = json!({
        "secret_key": keypair.secret_hex(),
        "public_key": format!("0x{}", hex::encode(keypair.public_key_bytes())),
        "address": keypair.address().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Signs a body with the given key and prints the wire form, ready for
/// `POST /transactions`.
fn sign(args: cli::SignArgs) -> Result<()> {
    let keypair = LedgerKeypair::from_hex(&args.key).context("invalid secret key")?;

    let text = match (args.body, args.body_file) {
        (Some(inline), _) => inline,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read body from {}", path.display()))?,
        (None, None) => anyhow::bail!("either --body or --body-file is required"),
    };
    let body: Value = serde_json::from_str(&text).context("body is not valid JSON")?;

    let tx = Transaction::create(&keypair, &body).context("failed to create transaction")?;
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("afan-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", afan_protocol::config::PROTOCOL_VERSION);
    println!("signing   {}", afan_protocol::config::SIGNING_ALGORITHM);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
