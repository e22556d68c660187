// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # AFAN Protocol — Transaction Engine
//!
//! The part of a permissioned ledger node that decides what a transaction
//! *is*: which fields survive, what its hash is, who signed it, and whether
//! the signature holds. Everything else in the node (pool, blocks, gossip)
//! trusts the answers this crate gives.
//!
//! secp256k1 with recoverable signatures and Keccak-256 hashing, so
//! addresses look and checksum exactly like the ones wallets already show.
//!
//! ## Architecture
//!
//! - **crypto** — Keccak hashing, secp256k1 keys, address recovery.
//! - **transaction** — Canonicalization, assembly, verification.
//! - **network** — The pending transaction pool.
//! - **config** — Protocol constants and defaults.
//!
//! ## Design Philosophy
//!
//! 1. Structural errors are `Err`; authenticity failures are `false`.
//! 2. Unknown fields never reach the hash.
//! 3. Pure functions all the way down. Logging is opt-in through a sink.

pub mod config;
pub mod crypto;
pub mod network;
pub mod transaction;
