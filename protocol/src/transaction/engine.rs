//! [`TxEngine`]: the four external operations bundled with a sink.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::builder::Transaction;
use super::canonical;
use super::diagnostics::{DiagnosticSink, NoopSink};
use super::error::TransactionError;
use super::types::TransactionBody;
use super::verification;
use crate::crypto::keys::LedgerKeypair;

/// Stateless apart from its sink, so it is cheap to clone and share across
/// request handlers.
#[derive(Clone)]
pub struct TxEngine {
    sink: Arc<dyn DiagnosticSink>,
}

impl TxEngine {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    pub fn from_signed(&self, raw: &Value) -> Result<Transaction, TransactionError> {
        Transaction::from_signed_with(raw, self.sink.as_ref())
    }

    /// Node-originated payloads only. See [`Transaction::from_trusted`].
    pub fn from_trusted(&self, raw: &Value) -> Result<Transaction, TransactionError> {
        Transaction::from_trusted_with(raw, self.sink.as_ref())
    }

    /// Signs `body` with `keypair` at the current time.
    pub fn create(
        &self,
        keypair: &LedgerKeypair,
        body: &Value,
    ) -> Result<Transaction, TransactionError> {
        Transaction::create_with(keypair, body, self.sink.as_ref())
    }

    pub fn verify(&self, tx: &Transaction) -> bool {
        verification::verify_transaction_with(tx, self.sink.as_ref())
    }

    pub fn verify_all(&self, txs: &[Transaction]) -> Vec<bool> {
        verification::verify_all_with(txs, self.sink.as_ref())
    }

    pub fn canonicalize(&self, raw: &Value) -> Result<TransactionBody, TransactionError> {
        canonical::canonicalize(raw)
    }
}

impl Default for TxEngine {
    fn default() -> Self {
        Self::new(Arc::new(NoopSink))
    }
}

impl fmt::Debug for TxEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxEngine").finish_non_exhaustive()
    }
}
