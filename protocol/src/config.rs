//! # Protocol Configuration & Constants
//!
//! Every fixed size and default the engine and the node rely on lives here.
//! The cryptographic lengths are consensus-critical: changing any of them
//! changes which transactions other nodes consider valid.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// secp256k1 ECDSA with a recovery byte, Keccak-256 hashing.
pub const SIGNING_ALGORITHM: &str = "secp256k1-recoverable";

/// Secret key length in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Transaction hash length in bytes (Keccak-256 output).
pub const HASH_LENGTH: usize = 32;

/// Recoverable signature length: `r ‖ s ‖ v`.
pub const RECOVERABLE_SIGNATURE_LENGTH: usize = 65;

/// Account address length in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Offset added to the recovery id in the `v` byte of legacy signatures.
pub const RECOVERY_ID_OFFSET: u8 = 27;

// ---------------------------------------------------------------------------
// Network Parameters
// ---------------------------------------------------------------------------

/// Default HTTP API port, matching the original server.
pub const DEFAULT_RPC_PORT: u16 = 8080;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9742;

// ---------------------------------------------------------------------------
// Transaction Pool
// ---------------------------------------------------------------------------

/// Maximum number of transactions the pool holds by default.
pub const DEFAULT_POOL_MAX_SIZE: usize = 10_000;

/// Maximum pending transactions per signer address by default.
pub const DEFAULT_POOL_MAX_PER_ADDRESS: usize = 100;

/// Pool entries older than this are eligible for expiry.
pub const DEFAULT_POOL_EXPIRY: Duration = Duration::from_secs(3600);
