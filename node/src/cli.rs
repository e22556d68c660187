//! # CLI Interface
//!
//! Defines the command-line argument structure for `afan-node` using
//! `clap` derive. Supports four subcommands: `run`, `keygen`, `sign`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use afan_protocol::config::{
    DEFAULT_METRICS_PORT, DEFAULT_POOL_EXPIRY, DEFAULT_POOL_MAX_PER_ADDRESS, DEFAULT_POOL_MAX_SIZE,
    DEFAULT_RPC_PORT,
};
use afan_protocol::crypto::Address;
use afan_protocol::network::PoolConfig;

use crate::logging::LogFormat;

/// AFAN ledger node.
///
/// Accepts signed transactions over HTTP, verifies them, and holds them in
/// the pending pool until block inclusion.
#[derive(Parser, Debug)]
#[command(
    name = "afan-node",
    about = "AFAN ledger node",
    version,
    propagate_version = true
)]
pub struct AfanNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate a fresh secp256k1 keypair and print it as JSON.
    Keygen,
    /// Sign a transaction body and print the wire form.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the HTTP API.
    #[arg(long, env = "AFAN_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "AFAN_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Identity address reported in `/status` and the logs. The node never
    /// signs, so it takes an address rather than a secret key.
    ///
    /// An ephemeral address is generated when omitted.
    #[arg(long, env = "AFAN_NODE_ADDRESS")]
    pub node_address: Option<Address>,

    /// Log output format.
    #[arg(long, env = "AFAN_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Maximum number of pending transactions.
    #[arg(long, env = "AFAN_POOL_MAX_SIZE", default_value_t = DEFAULT_POOL_MAX_SIZE)]
    pub pool_max_size: usize,

    /// Maximum pending transactions per address.
    #[arg(long, env = "AFAN_POOL_MAX_PER_ADDRESS", default_value_t = DEFAULT_POOL_MAX_PER_ADDRESS)]
    pub pool_max_per_address: usize,

    /// Seconds before a pending transaction expires.
    #[arg(long, env = "AFAN_POOL_EXPIRY_SECONDS", default_value_t = DEFAULT_POOL_EXPIRY.as_secs())]
    pub pool_expiry_seconds: u64,
}

impl RunArgs {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: self.pool_max_size,
            max_per_address: self.pool_max_per_address,
            expiry_seconds: self.pool_expiry_seconds,
        }
    }
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Hex-encoded secp256k1 secret key.
    #[arg(long, env = "AFAN_SIGNING_KEY", hide_env_values = true)]
    pub key: String,

    /// Transaction body as inline JSON.
    #[arg(long, conflicts_with = "body_file", required_unless_present = "body_file")]
    pub body: Option<String>,

    /// Path to a file holding the transaction body JSON.
    #[arg(long)]
    pub body_file: Option<PathBuf>,
}
