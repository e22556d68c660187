//! # Network Module
//!
//! Node-side collaborators of the transaction engine. Only the pending
//! transaction pool lives here; HTTP serving happens in the node binary via
//! axum, so the protocol crate stays transport-agnostic.
//!
//! ## Design Decisions
//!
//! - The pool is protected by `parking_lot::RwLock` rather than
//!   `tokio::Mutex`: reads vastly outnumber writes and no lock is held
//!   across an await point.
//! - The pool verifies every transaction itself before accepting it, so
//!   callers cannot forget the gate.

pub mod mempool;

pub use mempool::{PoolConfig, PoolError, TransactionPool};
