//! # Transaction Module
//!
//! Canonicalization, hashing, assembly and verification of ledger
//! transactions. A transaction carries either a single [`Operation`] against
//! the state tree or a `tx_list` of nested transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — OperationType, GetOp/SetOp, Operation, TransactionBody
//! canonical.rs    — Required-field check and per-type field whitelisting
//! builder.rs      — Transaction assembly (signed and trusted) and BodyBuilder
//! verification.rs — The verify predicate and parallel batch verification
//! diagnostics.rs  — Injectable sink for construction/verification events
//! engine.rs       — TxEngine facade bundling the above with a sink
//! error.rs        — Structural construction errors
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** — Assemble a raw body, e.g. with [`BodyBuilder`].
//! 2. **Create** — [`Transaction::create`] stamps the time and signs.
//! 3. **Transmit** — [`Transaction::to_wire`] on one side,
//!    [`Transaction::from_signed`] on the other.
//! 4. **Verify** — [`verify_transaction`] before pool or block acceptance.
//!
//! ## Design Decisions
//!
//! - The hash is `keccak256(keccak256(..))` of the key-sorted JSON of the
//!   canonical body. Unknown fields never reach it.
//! - Construction fails only on structural problems. Bad signatures are
//!   reported by verification, as `false`.
//! - Custom addresses and `skip_verif` are reachable only through the
//!   trusted constructors. Wire input cannot engage them.

pub mod builder;
pub mod canonical;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod types;
pub mod verification;

pub use builder::{BodyBuilder, Origin, Transaction, TrustedOrigin};
pub use canonical::{canonicalize, envelope_body};
pub use diagnostics::{Diagnostic, DiagnosticSink, NoopSink, TracingSink};
pub use engine::TxEngine;
pub use error::TransactionError;
pub use types::{Body, GetOp, Operation, OperationType, SetOp, TransactionBody};
pub use verification::{verify_all, verify_transaction, verify_transaction_with};
