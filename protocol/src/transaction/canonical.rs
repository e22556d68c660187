//! Canonicalization: reducing an arbitrary payload to the whitelisted fields
//! of its declared type.
//!
//! Dropping is this module's job, rejecting is the verifier's. Unknown
//! fields vanish silently; an unknown single-operation type becomes
//! [`Operation::Unrecognized`] and is rejected at verification time, while
//! unknown types inside a batch are filtered out of the list here.
//!
//! The only failures are structural (see [`check_required_fields`]).

use serde_json::{Map, Value};

use super::error::TransactionError;
use super::types::{Body, GetOp, Operation, OperationType, SetOp, TransactionBody};

/// Checks that `timestamp`, `nonce` and exactly one of `operation` /
/// `tx_list` are present. Presence means the key exists, even with a `null`.
pub fn check_required_fields(raw: &Map<String, Value>) -> Result<(), TransactionError> {
    if !raw.contains_key("timestamp") {
        return Err(TransactionError::MissingField { field: "timestamp" });
    }
    if !raw.contains_key("nonce") {
        return Err(TransactionError::MissingField { field: "nonce" });
    }
    match (raw.contains_key("operation"), raw.contains_key("tx_list")) {
        (false, false) => Err(TransactionError::MissingField { field: "operation" }),
        (true, true) => Err(TransactionError::AmbiguousBody),
        _ => Ok(()),
    }
}

/// The body inside a `{signature, transaction}` envelope.
///
/// A truthy `transaction` member (in the JavaScript sense) is the body;
/// otherwise the payload itself is treated as a bare body.
pub fn envelope_body(raw: &Value) -> &Value {
    match raw.get("transaction") {
        Some(inner) if is_truthy(inner) => inner,
        _ => raw,
    }
}

/// JavaScript truthiness, which the wire format inherited.
pub(crate) fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Produces the canonical body of a raw transaction payload.
///
/// `raw` is the bare body (`{nonce, timestamp, ...}`), not the
/// `{signature, transaction}` envelope.
pub fn canonicalize(raw: &Value) -> Result<TransactionBody, TransactionError> {
    let map = raw.as_object().ok_or(TransactionError::NotAnObject)?;
    check_required_fields(map)?;

    let nonce = map
        .get("nonce")
        .and_then(whole_i64)
        .ok_or_else(|| TransactionError::malformed("nonce", "expected an integer"))?;
    let timestamp = map
        .get("timestamp")
        .and_then(whole_i64)
        .and_then(|t| u64::try_from(t).ok())
        .ok_or_else(|| {
            TransactionError::malformed("timestamp", "expected a non-negative integer")
        })?;
    let parent_tx_hash = match map.get("parent_tx_hash") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(TransactionError::malformed(
                "parent_tx_hash",
                "expected a hex string",
            ))
        }
    };

    let body = match map.get("tx_list") {
        Some(tx_list) => Body::Batch(sanitize_tx_list(tx_list)?),
        None => Body::Single(sanitize_operation(
            map.get("operation").unwrap_or(&Value::Null),
        )),
    };

    Ok(TransactionBody {
        nonce,
        timestamp,
        parent_tx_hash,
        body,
    })
}

/// Whitelists a single operation by its declared type.
pub fn sanitize_operation(raw: &Value) -> Operation {
    let Some(op_type) = raw
        .get("type")
        .and_then(Value::as_str)
        .and_then(OperationType::from_wire)
    else {
        return Operation::Unrecognized;
    };

    match op_type {
        OperationType::Get => Operation::ReadBatch(sanitize_get_op_list(
            raw.get("op_list").unwrap_or(&Value::Null),
        )),
        OperationType::Set => Operation::WriteBatch(sanitize_set_op_list(
            raw.get("op_list").unwrap_or(&Value::Null),
        )),
        t if t.is_read() => Operation::Read(GetOp {
            op_type: t,
            ref_path: ref_of(raw),
        }),
        t => Operation::Write(SetOp {
            op_type: t,
            ref_path: ref_of(raw),
            value: raw.get("value").cloned(),
        }),
    }
}

/// Whitelists the `op_list` of a `GET` batch.
///
/// Elements default to `GET_VALUE`; elements resolving to any other type
/// are dropped. A non-array list yields an empty list.
pub fn sanitize_get_op_list(raw: &Value) -> Vec<GetOp> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let op_type = element_type(item, OperationType::GetValue)?;
            op_type.is_single_read().then(|| GetOp {
                op_type,
                ref_path: ref_of(item),
            })
        })
        .collect()
}

/// Whitelists the `op_list` of a `SET` batch.
///
/// Elements default to `SET_VALUE`; elements resolving to any type outside
/// the single SET family are dropped.
pub fn sanitize_set_op_list(raw: &Value) -> Vec<SetOp> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let op_type = element_type(item, OperationType::SetValue)?;
            op_type.is_single_write().then(|| SetOp {
                op_type,
                ref_path: ref_of(item),
                value: item.get("value").cloned(),
            })
        })
        .collect()
}

/// Nested transactions are passed through unchanged.
// TODO: whitelist each nested body once batch transactions get their own
// signing data; doing it now would change existing batch hashes.
pub fn sanitize_tx_list(raw: &Value) -> Result<Vec<Value>, TransactionError> {
    raw.as_array()
        .cloned()
        .ok_or_else(|| TransactionError::malformed("tx_list", "expected an array"))
}

/// Resolves the type of a batch element. A missing or falsy `type`
/// (`null`, `false`, `0`, `""`) takes the family default; anything that is
/// not a recognized wire name resolves to `None`.
fn element_type(item: &Value, default: OperationType) -> Option<OperationType> {
    match item.get("type") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Some(default),
        Some(Value::String(s)) if s.is_empty() => Some(default),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Some(default),
        Some(Value::String(s)) => OperationType::from_wire(s),
        Some(_) => None,
    }
}

/// An integer, or a float with no fractional part (`5.0` reads as `5`).
fn whole_i64(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    // i64::MAX is not representable; 2^63 is the first float out of range.
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < 9_223_372_036_854_775_808.0)
        .then_some(f as i64)
}

fn ref_of(raw: &Value) -> Option<Value> {
    raw.get("ref").cloned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_set_keeps_only_whitelisted_fields() {
        let raw = json!({
            "type": "SET_VALUE",
            "ref": "/a/b",
            "value": { "deep": [1, 2] },
            "address": "0xdeadbeef",
            "is_admin": true
        });
        assert_eq!(
            sanitize_operation(&raw).to_value(),
            json!({ "type": "SET_VALUE", "ref": "/a/b", "value": { "deep": [1, 2] } })
        );
    }

    #[test]
    fn single_get_drops_value() {
        let raw = json!({ "type": "GET_RULE", "ref": "/rules", "value": 1 });
        assert_eq!(
            sanitize_operation(&raw).to_value(),
            json!({ "type": "GET_RULE", "ref": "/rules" })
        );
    }

    #[test]
    fn every_write_type_keeps_ref_and_value() {
        for t in ["SET_VALUE", "INC_VALUE", "DEC_VALUE", "SET_RULE", "SET_OWNER"] {
            let raw = json!({ "type": t, "ref": "/p", "value": 1, "junk": 0 });
            assert_eq!(
                sanitize_operation(&raw).to_value(),
                json!({ "type": t, "ref": "/p", "value": 1 })
            );
        }
    }

    #[test]
    fn unrecognized_type_sanitizes_to_empty() {
        for raw in [
            json!({ "type": "DROP_TABLE", "ref": "/a" }),
            json!({ "ref": "/a", "value": 1 }),
            json!({ "type": 5 }),
            json!("SET_VALUE"),
            Value::Null,
        ] {
            let op = sanitize_operation(&raw);
            assert_eq!(op, Operation::Unrecognized);
            assert_eq!(op.to_value(), json!({}));
        }
    }

    #[test]
    fn explicit_null_value_is_preserved() {
        let op = sanitize_operation(&json!({ "type": "SET_VALUE", "ref": "/a", "value": null }));
        assert_eq!(op.to_value(), json!({ "type": "SET_VALUE", "ref": "/a", "value": null }));
        let op = sanitize_operation(&json!({ "type": "SET_VALUE", "ref": "/a" }));
        assert_eq!(op.to_value(), json!({ "type": "SET_VALUE", "ref": "/a" }));
    }

    #[test]
    fn non_string_ref_is_kept_verbatim() {
        let op = sanitize_operation(&json!({ "type": "GET_VALUE", "ref": null }));
        assert_eq!(op.to_value(), json!({ "type": "GET_VALUE", "ref": null }));
        let op = sanitize_operation(&json!({ "type": "SET_OWNER", "ref": 7, "value": 1 }));
        assert_eq!(op.to_value(), json!({ "type": "SET_OWNER", "ref": 7, "value": 1 }));
        let op = sanitize_operation(&json!({ "type": "GET_VALUE" }));
        assert_eq!(op.to_value(), json!({ "type": "GET_VALUE" }));
    }

    #[test]
    fn batch_elements_keep_non_string_refs() {
        let get = sanitize_get_op_list(&json!([{ "ref": null }, { "ref": ["a"] }]));
        assert_eq!(get[0].ref_path, Some(Value::Null));
        assert_eq!(get[1].ref_path, Some(json!(["a"])));
        assert_eq!(get[1].path(), None);
        let set = sanitize_set_op_list(&json!([{ "ref": 3, "value": null }]));
        assert_eq!(
            set[0].to_value(),
            json!({ "type": "SET_VALUE", "ref": 3, "value": null })
        );
    }

    #[test]
    fn get_batch_filters_unrecognized_and_preserves_order() {
        let raw = json!({
            "type": "GET",
            "op_list": [
                { "type": "GET_OWNER", "ref": "/1", "extra": 1 },
                { "type": "SET_VALUE", "ref": "/2", "value": 9 },
                { "ref": "/3" },
                { "type": "MYSTERY", "ref": "/4" },
                { "type": "GET_RULE", "ref": "/5" }
            ],
            "value": "ignored"
        });
        assert_eq!(
            sanitize_operation(&raw).to_value(),
            json!({
                "type": "GET",
                "op_list": [
                    { "type": "GET_OWNER", "ref": "/1" },
                    { "type": "GET_VALUE", "ref": "/3" },
                    { "type": "GET_RULE", "ref": "/5" }
                ]
            })
        );
    }

    #[test]
    fn set_batch_filters_and_defaults() {
        let raw = json!({
            "type": "SET",
            "op_list": [
                { "ref": "/a", "value": 1 },
                { "type": "GET_VALUE", "ref": "/b" },
                { "type": "SET", "op_list": [] },
                { "type": "INC_VALUE", "ref": "/c", "value": 2, "nonce": 99 },
                { "type": "", "ref": "/d", "value": null }
            ]
        });
        assert_eq!(
            sanitize_operation(&raw).to_value(),
            json!({
                "type": "SET",
                "op_list": [
                    { "type": "SET_VALUE", "ref": "/a", "value": 1 },
                    { "type": "INC_VALUE", "ref": "/c", "value": 2 },
                    { "type": "SET_VALUE", "ref": "/d", "value": null }
                ]
            })
        );
    }

    #[test]
    fn falsy_element_types_take_default() {
        for ty in [Value::Null, json!(false), json!(0), json!("")] {
            let list = json!([{ "type": ty, "ref": "/x" }]);
            let ops = sanitize_get_op_list(&list);
            assert_eq!(ops, vec![GetOp::new(OperationType::GetValue, "/x")]);
        }
        let truthy_non_string = json!([{ "type": true, "ref": "/x" }, { "type": 1 }]);
        assert!(sanitize_get_op_list(&truthy_non_string).is_empty());
    }

    #[test]
    fn non_object_elements_take_default_without_ref() {
        let ops = sanitize_set_op_list(&json!([7]));
        assert_eq!(
            ops,
            vec![SetOp {
                op_type: OperationType::SetValue,
                ref_path: None,
                value: None
            }]
        );
    }

    #[test]
    fn non_array_op_list_is_empty() {
        let op = sanitize_operation(&json!({ "type": "GET", "op_list": "nope" }));
        assert_eq!(op, Operation::ReadBatch(vec![]));
        let op = sanitize_operation(&json!({ "type": "SET" }));
        assert_eq!(op.to_value(), json!({ "type": "SET", "op_list": [] }));
    }

    #[test]
    fn envelope_body_follows_truthiness() {
        let bare = json!({ "nonce": 0, "transaction": 0 });
        assert_eq!(envelope_body(&bare), &bare);
        let bare = json!({ "nonce": 0, "transaction": "" });
        assert_eq!(envelope_body(&bare), &bare);
        let wrapped = json!({ "signature": "", "transaction": { "nonce": 1 } });
        assert_eq!(envelope_body(&wrapped), &json!({ "nonce": 1 }));
        let listed = json!({ "nonce": 0, "transaction": [1] });
        assert_eq!(envelope_body(&listed), &json!([1]));
        assert_eq!(
            canonicalize(envelope_body(&listed)).unwrap_err(),
            TransactionError::NotAnObject
        );
    }

    #[test]
    fn canonicalize_strips_envelope_fields() {
        let raw = json!({
            "nonce": 1,
            "timestamp": 1000,
            "operation": { "type": "SET_VALUE", "ref": "/a", "value": 5 },
            "address": "0x0000000000000000000000000000000000000001",
            "signature": "0xabc",
            "hash": "ff",
            "skip_verif": true,
            "metadata": { "origin": "client" }
        });
        let body = canonicalize(&raw).unwrap();
        assert_eq!(
            body.to_value(),
            json!({
                "nonce": 1,
                "timestamp": 1000,
                "operation": { "type": "SET_VALUE", "ref": "/a", "value": 5 }
            })
        );
    }

    #[test]
    fn canonicalize_keeps_parent_tx_hash() {
        let raw = json!({
            "nonce": 2,
            "timestamp": 5,
            "parent_tx_hash": "abcd",
            "operation": { "type": "GET_VALUE", "ref": "/" }
        });
        let body = canonicalize(&raw).unwrap();
        assert_eq!(body.parent_tx_hash.as_deref(), Some("abcd"));
    }

    #[test]
    fn canonicalize_passes_tx_list_through() {
        let nested = json!([{ "nonce": 0, "anything": "goes" }, 5]);
        let raw = json!({ "nonce": 0, "timestamp": 1, "tx_list": nested.clone() });
        let body = canonicalize(&raw).unwrap();
        assert_eq!(body.tx_list().map(|l| Value::Array(l.to_vec())), Some(nested));
    }

    #[test]
    fn canonicalize_is_deterministic() {
        let raw = json!({
            "timestamp": 1000,
            "operation": { "value": 5, "ref": "/a/b", "type": "SET_VALUE" },
            "nonce": 0
        });
        let a = canonicalize(&raw).unwrap();
        let b = canonicalize(&raw).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn required_fields_are_enforced() {
        let op = json!({ "type": "GET_VALUE", "ref": "/" });
        assert_eq!(
            canonicalize(&json!({ "nonce": 0, "operation": op.clone() })).unwrap_err(),
            TransactionError::MissingField { field: "timestamp" }
        );
        assert_eq!(
            canonicalize(&json!({ "timestamp": 0, "operation": op.clone() })).unwrap_err(),
            TransactionError::MissingField { field: "nonce" }
        );
        assert_eq!(
            canonicalize(&json!({ "timestamp": 0, "nonce": 0 })).unwrap_err(),
            TransactionError::MissingField { field: "operation" }
        );
        assert_eq!(
            canonicalize(&json!({ "timestamp": 0, "nonce": 0, "operation": op, "tx_list": [] }))
                .unwrap_err(),
            TransactionError::AmbiguousBody
        );
        assert_eq!(
            canonicalize(&json!([1, 2])).unwrap_err(),
            TransactionError::NotAnObject
        );
    }

    #[test]
    fn malformed_header_fields_are_structural() {
        let op = json!({ "type": "GET_VALUE", "ref": "/" });
        assert!(matches!(
            canonicalize(&json!({ "nonce": "zero", "timestamp": 0, "operation": op.clone() })),
            Err(TransactionError::MalformedField { field: "nonce", .. })
        ));
        assert!(matches!(
            canonicalize(&json!({ "nonce": 0, "timestamp": -5, "operation": op.clone() })),
            Err(TransactionError::MalformedField { field: "timestamp", .. })
        ));
        assert!(matches!(
            canonicalize(&json!({ "nonce": 0, "timestamp": 0, "parent_tx_hash": 1, "operation": op })),
            Err(TransactionError::MalformedField { field: "parent_tx_hash", .. })
        ));
        assert!(matches!(
            canonicalize(&json!({ "nonce": 0, "timestamp": 0, "tx_list": {} })),
            Err(TransactionError::MalformedField { field: "tx_list", .. })
        ));
    }

    #[test]
    fn whole_float_header_fields_read_as_integers() {
        let raw: Value = serde_json::from_str(
            r#"{"nonce":2.0,"timestamp":1000.0,"operation":{"type":"GET_VALUE","ref":"/"}}"#,
        )
        .unwrap();
        let body = canonicalize(&raw).unwrap();
        assert_eq!((body.nonce, body.timestamp), (2, 1000));
        assert!(matches!(
            canonicalize(&json!({ "nonce": 0.5, "timestamp": 0, "operation": {} })),
            Err(TransactionError::MalformedField { field: "nonce", .. })
        ));
    }

    #[test]
    fn negative_nonce_is_allowed() {
        let raw = json!({ "nonce": -1, "timestamp": 0, "operation": { "type": "GET_VALUE", "ref": "/" } });
        assert_eq!(canonicalize(&raw).unwrap().nonce, -1);
    }
}
