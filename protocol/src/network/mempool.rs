//! Pending-transaction pool.
//!
//! Holds verified transactions awaiting block inclusion, keyed by hash.
//! Selection order is `(timestamp, nonce, hash)`, so proposers see the
//! oldest transactions first and the order is total. Per-address tracking
//! prevents any single signer from monopolizing capacity.
//!
//! ## Design
//!
//! - `DashMap` gives concurrent reads on the hot path (API lookups,
//!   duplicate detection).
//! - `parking_lot::RwLock<BTreeMap>` protects the ordering index. Writers
//!   (new transactions, removals after block inclusion) are rare compared to
//!   readers scanning the front of the queue.
//! - Admission checks (duplicate, per-address limit, capacity) and the
//!   insert happen under one `parking_lot::Mutex`, so concurrent submissions
//!   of the same hash or from the same signer cannot overshoot a limit.
//!   Signature verification runs before the lock is taken.
//! - A full pool first expires stale entries, then refuses new ones. Nothing
//!   is evicted on arrival.
//! - Admission verifies through a [`TxEngine`], so whatever sink the engine
//!   carries sees the pool's decisions too.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{DEFAULT_POOL_EXPIRY, DEFAULT_POOL_MAX_PER_ADDRESS, DEFAULT_POOL_MAX_SIZE};
use crate::transaction::{Transaction, TxEngine};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable parameters for pool behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of transactions the pool will hold.
    pub max_size: usize,

    /// Maximum pending transactions allowed per address.
    pub max_per_address: usize,

    /// Seconds after which an entry is eligible for
    /// [`TransactionPool::expire_old`].
    pub expiry_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_POOL_MAX_SIZE,
            max_per_address: DEFAULT_POOL_MAX_PER_ADDRESS,
            expiry_seconds: DEFAULT_POOL_EXPIRY.as_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    timestamp: u64,
    nonce: i64,
    hash: String,
}

impl OrderKey {
    fn of(tx: &Transaction) -> Self {
        Self {
            timestamp: tx.timestamp(),
            nonce: tx.nonce(),
            hash: tx.hash().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct PoolEntry {
    transaction: Transaction,
    /// Unix seconds at insertion.
    added_at: u64,
}

// ---------------------------------------------------------------------------
// PoolError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("transaction {hash} is already pooled")]
    Duplicate { hash: String },

    #[error("transaction {hash} failed verification")]
    VerificationFailed { hash: String },

    #[error("address {address} exceeded the per-address limit of {limit}")]
    AddressLimitExceeded { address: String, limit: usize },

    #[error("transaction pool is full ({size} transactions)")]
    PoolFull { size: usize },
}

// ---------------------------------------------------------------------------
// TransactionPool
// ---------------------------------------------------------------------------

pub struct TransactionPool {
    transactions: DashMap<String, PoolEntry>,
    order: RwLock<BTreeMap<OrderKey, String>>,
    address_counts: DashMap<String, usize>,
    /// Serializes the check-then-insert section of [`TransactionPool::add`].
    admission: Mutex<()>,
    engine: TxEngine,
    config: PoolConfig,
}

impl fmt::Debug for TransactionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionPool")
            .field("size", &self.transactions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl TransactionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_engine(config, TxEngine::default())
    }

    pub fn with_engine(config: PoolConfig, engine: TxEngine) -> Self {
        Self {
            transactions: DashMap::new(),
            order: RwLock::new(BTreeMap::new()),
            address_counts: DashMap::new(),
            admission: Mutex::new(()),
            engine,
            config,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Adds a transaction after checking, in order:
    ///
    /// 1. **Duplicate** — same hash already pooled.
    /// 2. **Verification** — [`TxEngine::verify`] must pass.
    /// 3. **Per-address limit** — `config.max_per_address`.
    /// 4. **Capacity** — stale entries are expired first; if the pool is
    ///    still full the transaction is refused.
    pub fn add(&self, tx: Transaction) -> Result<(), PoolError> {
        self.add_at(tx, current_timestamp_secs())
    }

    fn add_at(&self, tx: Transaction, now: u64) -> Result<(), PoolError> {
        let hash = tx.hash().to_string();
        if self.transactions.contains_key(&hash) {
            return Err(PoolError::Duplicate { hash });
        }

        if !self.engine.verify(&tx) {
            return Err(PoolError::VerificationFailed { hash });
        }

        let _admission = self.admission.lock();
        if self.transactions.contains_key(&hash) {
            return Err(PoolError::Duplicate { hash });
        }

        let address = tx.address().to_string();
        let count = self.address_counts.get(&address).map(|c| *c).unwrap_or(0);
        if count >= self.config.max_per_address {
            return Err(PoolError::AddressLimitExceeded {
                address,
                limit: self.config.max_per_address,
            });
        }

        if self.transactions.len() >= self.config.max_size {
            self.expire_at(now);
            if self.transactions.len() >= self.config.max_size {
                return Err(PoolError::PoolFull {
                    size: self.config.max_size,
                });
            }
        }

        // The entry becomes visible last, so a concurrent `remove` always
        // finds the count and index it has to undo.
        *self.address_counts.entry(address.clone()).or_insert(0) += 1;
        let key = OrderKey::of(&tx);
        self.order.write().insert(key, hash.clone());
        match self.transactions.entry(hash.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(PoolEntry {
                    transaction: tx,
                    added_at: now,
                });
            }
            Entry::Occupied(_) => {
                // Only reachable if an insert bypassed `admission`.
                self.order.write().remove(&OrderKey::of(&tx));
                self.decrement_address_count(&address);
                return Err(PoolError::Duplicate { hash });
            }
        }

        tracing::debug!(%hash, %address, size = self.transactions.len(), "transaction pooled");
        Ok(())
    }

    pub fn get(&self, hash: &str) -> Option<Transaction> {
        self.transactions.get(hash).map(|e| e.transaction.clone())
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.transactions.contains_key(hash)
    }

    pub fn remove(&self, hash: &str) -> Option<Transaction> {
        let (_, entry) = self.transactions.remove(hash)?;
        self.order.write().remove(&OrderKey::of(&entry.transaction));
        self.decrement_address_count(entry.transaction.address());
        Some(entry.transaction)
    }

    /// Removes transactions included in a block. Unknown hashes are ignored.
    pub fn remove_batch(&self, hashes: &[String]) {
        for hash in hashes {
            self.remove(hash);
        }
    }

    /// Up to `max_count` transactions in `(timestamp, nonce, hash)` order.
    pub fn select_transactions(&self, max_count: usize) -> Vec<Transaction> {
        let order = self.order.read();
        order
            .values()
            .filter_map(|hash| self.transactions.get(hash).map(|e| e.transaction.clone()))
            .take(max_count)
            .collect()
    }

    /// Every pooled transaction, in selection order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.select_transactions(usize::MAX)
    }

    pub fn pending_for_address(&self, address: &str) -> Vec<Transaction> {
        let mut pending: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|e| e.value().transaction.address().eq_ignore_ascii_case(address))
            .map(|e| e.value().transaction.clone())
            .collect();
        pending.sort_by_key(OrderKey::of);
        pending
    }

    pub fn size(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn clear(&self) {
        let _admission = self.admission.lock();
        self.transactions.clear();
        self.order.write().clear();
        self.address_counts.clear();
    }

    /// Removes entries pooled longer than `config.expiry_seconds` ago and
    /// returns how many were dropped.
    pub fn expire_old(&self) -> usize {
        self.expire_at(current_timestamp_secs())
    }

    fn expire_at(&self, now: u64) -> usize {
        let cutoff = now.saturating_sub(self.config.expiry_seconds);

        // Collect first; removing while iterating a DashMap can deadlock.
        let expired: Vec<String> = self
            .transactions
            .iter()
            .filter(|e| e.value().added_at < cutoff)
            .map(|e| e.key().clone())
            .collect();

        for hash in &expired {
            self.remove(hash);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired stale transactions");
        }
        expired.len()
    }

    fn decrement_address_count(&self, address: &str) {
        if let Some(mut count) = self.address_counts.get_mut(address) {
            if *count <= 1 {
                drop(count);
                self.address_counts.remove(address);
            } else {
                *count -= 1;
            }
        }
    }
}

impl Default for TransactionPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

fn current_timestamp_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
