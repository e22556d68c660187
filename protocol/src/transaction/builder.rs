//! Transaction assembly.
//!
//! A [`Transaction`] is built exactly once, from a raw JSON payload, and is
//! immutable afterwards. There are two families of constructors:
//!
//! - **Signed** — [`Transaction::from_signed`] and [`Transaction::create`].
//!   The address is always recovered from `(hash, signature)`. Any
//!   `address` or `skip_verif` field in the payload is discarded. This is
//!   the only path reachable from outside the node.
//! - **Trusted** — [`Transaction::from_trusted`] and
//!   [`Transaction::create_trusted`]. For transactions the node originates
//!   itself and that are authorized out of band: an embedded `address` is
//!   taken as-is and `skip_verif` bypasses signature verification.
//!
//! [`BodyBuilder`] assembles raw bodies for clients and tests.

use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;

use super::canonical::{canonicalize, envelope_body, is_truthy};
use super::diagnostics::{Diagnostic, DiagnosticSink, NoopSink};
use super::error::TransactionError;
use super::types::{Body, Operation, TransactionBody};
use crate::crypto::keys::LedgerKeypair;
use crate::crypto::signatures::{ec_sign_transaction, get_address};

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Escape hatches a trusted origin may engage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustedOrigin {
    /// The address was embedded in the payload rather than recovered.
    pub custom_address: bool,
    /// Signature verification is bypassed entirely.
    pub skip_verif: bool,
}

/// Where a transaction's authority comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Address recovered from the signature; always cryptographically checked.
    Signed,
    /// Node-originated; see [`TrustedOrigin`].
    Trusted(TrustedOrigin),
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// An assembled ledger transaction.
///
/// The `hash` is the double Keccak-256 of the canonical body only; it never
/// covers `signature` or `address`.
///
/// # Wire format
///
/// ```text
/// { hash, signature, address, nonce, timestamp, parent_tx_hash?,
///   operation | tx_list, skip_verif? }
/// ```
///
/// `skip_verif` appears only for trusted origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    body: TransactionBody,
    hash: String,
    signature: String,
    address: String,
    origin: Origin,
}

impl Transaction {
    /// Assembles a transaction received from a client, a peer or storage.
    ///
    /// Accepts either `{signature, transaction: {..body..}}` or a bare body
    /// carrying its own `signature` field.
    ///
    /// # Errors
    ///
    /// Structural problems only (see [`TransactionError`]). A bad signature
    /// does not fail construction; the address is left empty and
    /// verification returns `false`.
    pub fn from_signed(raw: &Value) -> Result<Self, TransactionError> {
        Self::from_signed_with(raw, &NoopSink)
    }

    pub fn from_signed_with(
        raw: &Value,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, TransactionError> {
        Self::assemble(raw, false, sink)
    }

    /// Assembles a node-originated transaction, honoring an embedded custom
    /// `address` and a truthy `skip_verif`.
    ///
    /// Never route externally received payloads through here.
    pub fn from_trusted(raw: &Value) -> Result<Self, TransactionError> {
        Self::from_trusted_with(raw, &NoopSink)
    }

    pub fn from_trusted_with(
        raw: &Value,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, TransactionError> {
        Self::assemble(raw, true, sink)
    }

    /// Creates and signs a new transaction, stamping the current time.
    ///
    /// The signature covers the raw body as given, with the timestamp
    /// replaced. Extra fields in `body` are therefore signed but not hashed,
    /// and such a transaction will fail verification.
    pub fn create(keypair: &LedgerKeypair, body: &Value) -> Result<Self, TransactionError> {
        Self::create_at(keypair, body, now_millis())
    }

    pub fn create_with(
        keypair: &LedgerKeypair,
        body: &Value,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, TransactionError> {
        Self::sign_and_assemble(keypair, body, now_millis(), sink)
    }

    /// [`Transaction::create`] with an explicit timestamp.
    pub fn create_at(
        keypair: &LedgerKeypair,
        body: &Value,
        timestamp: u64,
    ) -> Result<Self, TransactionError> {
        Self::sign_and_assemble(keypair, body, timestamp, &NoopSink)
    }

    /// Creates an unsigned node-originated transaction. The body is expected
    /// to carry a custom `address` and usually `skip_verif: true`.
    pub fn create_trusted(body: &Value) -> Result<Self, TransactionError> {
        Self::create_trusted_at(body, now_millis())
    }

    pub fn create_trusted_at(body: &Value, timestamp: u64) -> Result<Self, TransactionError> {
        let raw = stamp(body, timestamp)?;
        Self::from_trusted(&json!({ "signature": "", "transaction": raw }))
    }

    fn sign_and_assemble(
        keypair: &LedgerKeypair,
        body: &Value,
        timestamp: u64,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, TransactionError> {
        let raw = stamp(body, timestamp)?;
        let signature = ec_sign_transaction(&raw, keypair);
        Self::from_signed_with(&json!({ "signature": signature, "transaction": raw }), sink)
    }

    fn assemble(
        raw: &Value,
        trusted: bool,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, TransactionError> {
        let envelope = raw.as_object().ok_or(TransactionError::NotAnObject)?;
        let signature = match envelope.get("signature") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(TransactionError::malformed(
                    "signature",
                    "expected a hex string",
                ))
            }
        };
        let tx_data = envelope_body(raw);

        let body = canonicalize(tx_data)?;
        let hash = body.hash();

        let (address, origin) = if trusted {
            let skip_verif = tx_data.get("skip_verif").map(is_truthy).unwrap_or(false);
            match tx_data.get("address") {
                Some(Value::String(custom)) => (
                    custom.clone(),
                    Origin::Trusted(TrustedOrigin {
                        custom_address: true,
                        skip_verif,
                    }),
                ),
                Some(_) => {
                    return Err(TransactionError::malformed(
                        "address",
                        "expected an address string",
                    ))
                }
                None => (
                    recover(&hash, &signature, sink),
                    Origin::Trusted(TrustedOrigin {
                        custom_address: false,
                        skip_verif,
                    }),
                ),
            }
        } else {
            (recover(&hash, &signature, sink), Origin::Signed)
        };

        let tx = Self {
            body,
            hash,
            signature,
            address,
            origin,
        };
        sink.emit(Diagnostic::Created {
            hash: &tx.hash,
            address: &tx.address,
            trusted: tx.is_trusted(),
        });
        Ok(tx)
    }

    // -- Accessors ----------------------------------------------------------

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Checksummed signer address, a custom address for trusted origins, or
    /// empty when recovery failed.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn nonce(&self) -> i64 {
        self.body.nonce
    }

    pub fn timestamp(&self) -> u64 {
        self.body.timestamp
    }

    pub fn parent_tx_hash(&self) -> Option<&str> {
        self.body.parent_tx_hash.as_deref()
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.body.operation()
    }

    pub fn tx_list(&self) -> Option<&[Value]> {
        self.body.tx_list()
    }

    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self.origin, Origin::Trusted(_))
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.body.body, Body::Batch(_))
    }

    /// `true` only for trusted origins that engaged `skip_verif`.
    pub fn skip_verif(&self) -> bool {
        matches!(
            self.origin,
            Origin::Trusted(TrustedOrigin {
                skip_verif: true,
                ..
            })
        )
    }

    /// The data the originator signed.
    pub fn signing_data(&self) -> Value {
        self.body.signing_data()
    }

    /// Recomputes the hash from the stored body.
    pub fn recompute_hash(&self) -> String {
        self.body.hash()
    }

    /// Wire/storage representation. Feeding it back through
    /// [`Transaction::from_signed`] reproduces `hash` and `address` for
    /// signed origins.
    pub fn to_wire(&self) -> Value {
        let mut map = match self.body.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert("hash".into(), Value::from(self.hash.as_str()));
        map.insert("signature".into(), Value::from(self.signature.as_str()));
        map.insert("address".into(), Value::from(self.address.as_str()));
        if let Origin::Trusted(trusted) = self.origin {
            map.insert("skip_verif".into(), Value::from(trusted.skip_verif));
        }
        Value::Object(map)
    }
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hash:       {}", self.hash)?;
        writeln!(f, "nonce:      {}", self.body.nonce)?;
        writeln!(f, "timestamp:  {}", self.body.timestamp)?;
        match self.body.body {
            Body::Single(ref op) => writeln!(f, "operation:  {}", op.to_value())?,
            Body::Batch(ref txs) => writeln!(f, "tx_list:    {} transactions", txs.len())?,
        }
        write!(f, "address:    {}", self.address)?;
        if let Some(ref parent) = self.body.parent_tx_hash {
            write!(f, "\nparent_tx_hash: {}", parent)?;
        }
        Ok(())
    }
}

fn recover(hash: &str, signature: &str, sink: &dyn DiagnosticSink) -> String {
    match get_address(hash, signature) {
        Ok(address) => address.to_string(),
        Err(e) => {
            let reason = e.to_string();
            sink.emit(Diagnostic::RecoveryFailed {
                hash,
                reason: &reason,
            });
            String::new()
        }
    }
}

fn stamp(body: &Value, timestamp: u64) -> Result<Value, TransactionError> {
    let mut raw = body
        .as_object()
        .cloned()
        .ok_or(TransactionError::NotAnObject)?;
    raw.insert("timestamp".into(), Value::from(timestamp));
    Ok(Value::Object(raw))
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// ---------------------------------------------------------------------------
// BodyBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for raw transaction bodies.
///
/// # Usage
///
/// ```
/// use afan_protocol::crypto::LedgerKeypair;
/// use afan_protocol::transaction::{BodyBuilder, Operation, Transaction};
/// use serde_json::json;
///
/// let body = BodyBuilder::new()
///     .nonce(0)
///     .operation(Operation::set_value("/a/b", json!(5)))
///     .build();
///
/// let kp = LedgerKeypair::generate();
/// let tx = Transaction::create(&kp, &body).unwrap();
/// assert_eq!(tx.address(), kp.address().to_string());
/// ```
#[derive(Debug, Clone, Default)]
pub struct BodyBuilder {
    nonce: i64,
    timestamp: Option<u64>,
    parent_tx_hash: Option<String>,
    operation: Option<Value>,
    tx_list: Option<Vec<Value>>,
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nonce(mut self, nonce: i64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Optional: [`Transaction::create`] overwrites it anyway.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn parent_tx_hash(mut self, parent: impl Into<String>) -> Self {
        self.parent_tx_hash = Some(parent.into());
        self
    }

    /// Sets the operation, clearing any `tx_list`.
    pub fn operation(self, op: Operation) -> Self {
        self.raw_operation(op.to_value())
    }

    /// Sets an operation from arbitrary JSON, e.g. a client payload.
    pub fn raw_operation(mut self, op: Value) -> Self {
        self.operation = Some(op);
        self.tx_list = None;
        self
    }

    /// Sets the nested transactions, clearing any operation.
    pub fn tx_list(mut self, txs: Vec<Value>) -> Self {
        self.tx_list = Some(txs);
        self.operation = None;
        self
    }

    pub fn build(self) -> Value {
        let mut map = Map::new();
        map.insert("nonce".into(), Value::from(self.nonce));
        if let Some(ts) = self.timestamp {
            map.insert("timestamp".into(), Value::from(ts));
        }
        if let Some(parent) = self.parent_tx_hash {
            map.insert("parent_tx_hash".into(), Value::from(parent));
        }
        if let Some(op) = self.operation {
            map.insert("operation".into(), op);
        }
        if let Some(txs) = self.tx_list {
            map.insert("tx_list".into(), Value::Array(txs));
        }
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
