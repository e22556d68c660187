//! Core type definitions for ledger transactions.
//!
//! The operation model is a closed set: a transaction either reads or writes
//! the keyed data tree, one path at a time or as an ordered batch. Canonical
//! JSON for each type is produced by [`Operation::to_value`] and
//! [`TransactionBody::to_value`]; that JSON is what gets hashed and signed.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::crypto::hash::hash_transaction_hex;

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

/// Discriminant for an operation against the keyed data tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Read the value stored at a path.
    GetValue,
    /// Read the access rule attached to a path.
    GetRule,
    /// Read the owner record attached to a path.
    GetOwner,
    /// Batch of `GET_VALUE` / `GET_RULE` / `GET_OWNER`.
    Get,
    /// Overwrite the value at a path.
    SetValue,
    /// Add to the numeric value at a path.
    IncValue,
    /// Subtract from the numeric value at a path.
    DecValue,
    /// Replace the access rule at a path.
    SetRule,
    /// Replace the owner record at a path.
    SetOwner,
    /// Batch of the five single SET-family operations.
    Set,
}

impl OperationType {
    /// Every recognized type, in declaration order.
    pub const ALL: [OperationType; 10] = [
        Self::GetValue,
        Self::GetRule,
        Self::GetOwner,
        Self::Get,
        Self::SetValue,
        Self::IncValue,
        Self::DecValue,
        Self::SetRule,
        Self::SetOwner,
        Self::Set,
    ];

    /// Wire name, e.g. `"SET_VALUE"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetValue => "GET_VALUE",
            Self::GetRule => "GET_RULE",
            Self::GetOwner => "GET_OWNER",
            Self::Get => "GET",
            Self::SetValue => "SET_VALUE",
            Self::IncValue => "INC_VALUE",
            Self::DecValue => "DEC_VALUE",
            Self::SetRule => "SET_RULE",
            Self::SetOwner => "SET_OWNER",
            Self::Set => "SET",
        }
    }

    /// Parses a wire name. Matching is exact and case-sensitive.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// `true` for the read-only family, batch included.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::GetValue | Self::GetRule | Self::GetOwner | Self::Get
        )
    }

    /// `true` for the mutating family, batch included.
    pub fn is_write(&self) -> bool {
        !self.is_read()
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Get | Self::Set)
    }

    /// A non-batch read: allowed as an element of a `GET` batch.
    pub fn is_single_read(&self) -> bool {
        self.is_read() && !self.is_batch()
    }

    /// A non-batch write: allowed as an element of a `SET` batch.
    pub fn is_single_write(&self) -> bool {
        self.is_write() && !self.is_batch()
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the recognized wire names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperationType(pub String);

impl fmt::Display for UnknownOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown operation type: {}", self.0)
    }
}

impl std::error::Error for UnknownOperationType {}

impl FromStr for OperationType {
    type Err = UnknownOperationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| UnknownOperationType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Single operations
// ---------------------------------------------------------------------------

/// A single read: `{type, ref}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOp {
    pub op_type: OperationType,
    /// Path in the data tree, normally a string. Whatever JSON the client
    /// sent is kept as-is; `None` only when the key was omitted.
    pub ref_path: Option<Value>,
}

impl GetOp {
    pub fn new(op_type: OperationType, ref_path: impl Into<String>) -> Self {
        Self {
            op_type,
            ref_path: Some(Value::String(ref_path.into())),
        }
    }

    /// The path, when it is a string.
    pub fn path(&self) -> Option<&str> {
        self.ref_path.as_ref().and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), Value::from(self.op_type.as_str()));
        if let Some(ref path) = self.ref_path {
            map.insert("ref".into(), path.clone());
        }
        Value::Object(map)
    }
}

/// A single write: `{type, ref, value}`.
///
/// `ref` and `value` distinguish an explicit JSON `null`
/// (`Some(Value::Null)`) from an omitted field (`None`); the two hash
/// differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOp {
    pub op_type: OperationType,
    pub ref_path: Option<Value>,
    pub value: Option<Value>,
}

impl SetOp {
    pub fn new(op_type: OperationType, ref_path: impl Into<String>, value: Value) -> Self {
        Self {
            op_type,
            ref_path: Some(Value::String(ref_path.into())),
            value: Some(value),
        }
    }

    /// The path, when it is a string.
    pub fn path(&self) -> Option<&str> {
        self.ref_path.as_ref().and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), Value::from(self.op_type.as_str()));
        if let Some(ref path) = self.ref_path {
            map.insert("ref".into(), path.clone());
        }
        if let Some(ref value) = self.value {
            map.insert("value".into(), value.clone());
        }
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A canonical operation, as produced by the canonicalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `GET_VALUE`, `GET_RULE` or `GET_OWNER`.
    Read(GetOp),
    /// `SET_VALUE`, `INC_VALUE`, `DEC_VALUE`, `SET_RULE` or `SET_OWNER`.
    Write(SetOp),
    /// `GET` with its filtered `op_list`.
    ReadBatch(Vec<GetOp>),
    /// `SET` with its filtered `op_list`.
    WriteBatch(Vec<SetOp>),
    /// Missing or unrecognized type. Canonical form is `{}` and verification
    /// always rejects it.
    Unrecognized,
}

impl Operation {
    pub fn get_value(ref_path: impl Into<String>) -> Self {
        Self::Read(GetOp::new(OperationType::GetValue, ref_path))
    }

    pub fn set_value(ref_path: impl Into<String>, value: Value) -> Self {
        Self::Write(SetOp::new(OperationType::SetValue, ref_path, value))
    }

    pub fn inc_value(ref_path: impl Into<String>, delta: Value) -> Self {
        Self::Write(SetOp::new(OperationType::IncValue, ref_path, delta))
    }

    pub fn dec_value(ref_path: impl Into<String>, delta: Value) -> Self {
        Self::Write(SetOp::new(OperationType::DecValue, ref_path, delta))
    }

    /// The type tag, or `None` for [`Operation::Unrecognized`].
    pub fn op_type(&self) -> Option<OperationType> {
        match self {
            Self::Read(op) => Some(op.op_type),
            Self::Write(op) => Some(op.op_type),
            Self::ReadBatch(_) => Some(OperationType::Get),
            Self::WriteBatch(_) => Some(OperationType::Set),
            Self::Unrecognized => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }

    /// Canonical JSON form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Read(op) => op.to_value(),
            Self::Write(op) => op.to_value(),
            Self::ReadBatch(ops) => batch_value(
                OperationType::Get,
                ops.iter().map(GetOp::to_value).collect(),
            ),
            Self::WriteBatch(ops) => batch_value(
                OperationType::Set,
                ops.iter().map(SetOp::to_value).collect(),
            ),
            Self::Unrecognized => Value::Object(Map::new()),
        }
    }
}

fn batch_value(op_type: OperationType, op_list: Vec<Value>) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), Value::from(op_type.as_str()));
    map.insert("op_list".into(), Value::Array(op_list));
    Value::Object(map)
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// TransactionBody
// ---------------------------------------------------------------------------

/// What a transaction carries: a single operation or a list of nested
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Single(Operation),
    /// Nested transactions, passed through unsanitized.
    Batch(Vec<Value>),
}

/// The canonical, pre-signature form of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBody {
    pub nonce: i64,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    pub parent_tx_hash: Option<String>,
    pub body: Body,
}

impl TransactionBody {
    /// Canonical JSON: `{nonce, timestamp, parent_tx_hash?, operation | tx_list}`.
    pub fn to_value(&self) -> Value {
        let mut map = self.header();
        match self.body {
            Body::Single(ref op) => {
                map.insert("operation".into(), op.to_value());
            }
            Body::Batch(ref txs) => {
                map.insert("tx_list".into(), Value::Array(txs.clone()));
            }
        }
        Value::Object(map)
    }

    /// The data a client signs: `{operation, nonce, timestamp, parent_tx_hash?}`.
    ///
    /// For batch bodies there is no operation and `tx_list` is not included,
    /// so a batch cannot be verified through the signature path.
    pub fn signing_data(&self) -> Value {
        let mut map = self.header();
        if let Body::Single(ref op) = self.body {
            map.insert("operation".into(), op.to_value());
        }
        Value::Object(map)
    }

    /// Lowercase hex hash of the canonical JSON.
    pub fn hash(&self) -> String {
        hash_transaction_hex(&self.to_value())
    }

    pub fn operation(&self) -> Option<&Operation> {
        match self.body {
            Body::Single(ref op) => Some(op),
            Body::Batch(_) => None,
        }
    }

    pub fn tx_list(&self) -> Option<&[Value]> {
        match self.body {
            Body::Single(_) => None,
            Body::Batch(ref txs) => Some(txs),
        }
    }

    fn header(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("nonce".into(), Value::from(self.nonce));
        map.insert("timestamp".into(), Value::from(self.timestamp));
        if let Some(ref parent) = self.parent_tx_hash {
            map.insert("parent_tx_hash".into(), Value::from(parent.as_str()));
        }
        map
    }
}

impl Serialize for TransactionBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_type_wire_names() {
        assert_eq!(OperationType::SetValue.to_string(), "SET_VALUE");
        assert_eq!(OperationType::Get.to_string(), "GET");
        assert_eq!(
            serde_json::to_string(&OperationType::IncValue).unwrap(),
            "\"INC_VALUE\""
        );
        for t in OperationType::ALL {
            assert_eq!(t.as_str().parse::<OperationType>().unwrap(), t);
            let via_serde: OperationType =
                serde_json::from_value(Value::from(t.as_str())).unwrap();
            assert_eq!(via_serde, t);
        }
    }

    #[test]
    fn operation_type_parse_is_case_sensitive() {
        assert!("set_value".parse::<OperationType>().is_err());
        assert!("BATCH".parse::<OperationType>().is_err());
        assert_eq!(
            "NOPE".parse::<OperationType>().unwrap_err().to_string(),
            "unknown operation type: NOPE"
        );
    }

    #[test]
    fn operation_type_families() {
        let reads: Vec<_> = OperationType::ALL.iter().filter(|t| t.is_read()).collect();
        assert_eq!(reads.len(), 4);
        assert!(OperationType::Get.is_batch());
        assert!(!OperationType::Get.is_single_read());
        assert!(OperationType::GetRule.is_single_read());
        assert!(OperationType::SetOwner.is_single_write());
        assert!(!OperationType::Set.is_single_write());
        assert!(OperationType::DecValue.is_write());
    }

    #[test]
    fn unrecognized_operation_is_empty_object() {
        assert_eq!(Operation::Unrecognized.to_value(), json!({}));
        assert_eq!(Operation::Unrecognized.op_type(), None);
        assert!(!Operation::Unrecognized.is_recognized());
    }

    #[test]
    fn set_op_distinguishes_null_from_absent() {
        let with_null = SetOp {
            op_type: OperationType::SetValue,
            ref_path: Some(json!("/x")),
            value: Some(Value::Null),
        };
        let absent = SetOp {
            value: None,
            ..with_null.clone()
        };
        assert_eq!(
            with_null.to_value(),
            json!({ "type": "SET_VALUE", "ref": "/x", "value": null })
        );
        assert_eq!(absent.to_value(), json!({ "type": "SET_VALUE", "ref": "/x" }));
    }

    #[test]
    fn batch_operation_value() {
        let op = Operation::ReadBatch(vec![
            GetOp::new(OperationType::GetValue, "/a"),
            GetOp::new(OperationType::GetOwner, "/b"),
        ]);
        assert_eq!(
            op.to_value(),
            json!({
                "type": "GET",
                "op_list": [
                    { "type": "GET_VALUE", "ref": "/a" },
                    { "type": "GET_OWNER", "ref": "/b" }
                ]
            })
        );
        assert_eq!(op.op_type(), Some(OperationType::Get));
    }

    #[test]
    fn body_value_and_signing_data_match_for_single() {
        let body = TransactionBody {
            nonce: 0,
            timestamp: 1000,
            parent_tx_hash: Some("ab".into()),
            body: Body::Single(Operation::set_value("/a/b", json!(5))),
        };
        let expected = json!({
            "nonce": 0,
            "timestamp": 1000,
            "parent_tx_hash": "ab",
            "operation": { "type": "SET_VALUE", "ref": "/a/b", "value": 5 }
        });
        assert_eq!(body.to_value(), expected);
        assert_eq!(body.signing_data(), expected);
        assert_eq!(serde_json::to_value(&body).unwrap(), expected);
    }

    #[test]
    fn signing_data_excludes_tx_list() {
        let body = TransactionBody {
            nonce: 3,
            timestamp: 7,
            parent_tx_hash: None,
            body: Body::Batch(vec![json!({ "nonce": 1 })]),
        };
        assert_eq!(
            body.to_value(),
            json!({ "nonce": 3, "timestamp": 7, "tx_list": [{ "nonce": 1 }] })
        );
        assert_eq!(body.signing_data(), json!({ "nonce": 3, "timestamp": 7 }));
        assert!(body.operation().is_none());
        assert_eq!(body.tx_list().map(|l| l.len()), Some(1));
    }

    #[test]
    fn hash_is_64_hex_chars() {
        let body = TransactionBody {
            nonce: -1,
            timestamp: 1,
            parent_tx_hash: None,
            body: Body::Single(Operation::get_value("/")),
        };
        let hash = body.hash();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
