//! # Hashing Utilities
//!
//! Every node on the network must arrive at the same transaction hash for
//! the same canonical body, so hashing here is a two-step affair:
//!
//! 1. **Stable stringification** — a JSON rendering with no insignificant
//!    whitespace and object keys sorted by UTF-16 code units. Numbers follow
//!    the ECMAScript Number-to-String rules (`5.0` is `5`, `1e20` is
//!    `100000000000000000000`, `1e21` is `1e+21`), so the bytes agree with
//!    what JavaScript peers feed their hasher. Equal `serde_json::Value`s
//!    always produce identical bytes, regardless of how the map was built.
//!
//! 2. **Keccak-256, applied twice** — `keccak256(keccak256(stable_json))`.
//!    This is the transaction hash. Keccak is the original (pre-NIST-padding)
//!    SHA-3 candidate, the same function used for account addresses.

use serde_json::{Number, Value};
use sha3::{Digest, Keccak256};

/// Largest integer a JavaScript number holds exactly (2^53).
const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Compute the Keccak-256 hash of the input data.
///
/// # Example
///
/// ```
/// use afan_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(
///     hex::encode(hash),
///     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
/// );
/// ```
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Renders a JSON value with sorted object keys and no whitespace.
///
/// Strings are escaped by `serde_json`, which matches `JSON.stringify`.
/// Numbers go through [`write_number`].
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::with_capacity(128);
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_stable(&map[key], out);
            }
            out.push('}');
        }
    }
}

/// Integers within ±2^53 print as-is. Anything else is what a JavaScript
/// peer would hold after parsing: the nearest `f64`.
fn write_number(n: &Number, out: &mut String) {
    let exact = match (n.as_u64(), n.as_i64()) {
        (Some(u), _) => u <= MAX_SAFE_INTEGER,
        (None, Some(i)) => i.unsigned_abs() <= MAX_SAFE_INTEGER,
        (None, None) => false,
    };
    if exact {
        out.push_str(&n.to_string());
        return;
    }
    match n.as_f64() {
        Some(f) => write_f64(f, out),
        None => out.push_str("null"),
    }
}

/// ECMAScript `Number::toString(x)` for radix 10.
fn write_f64(f: f64, out: &mut String) {
    if !f.is_finite() {
        out.push_str("null");
        return;
    }
    if f == 0.0 {
        out.push('0');
        return;
    }
    if f < 0.0 {
        out.push('-');
    }

    // `{:e}` yields the shortest round-tripping digits, e.g. "1.2345e-7".
    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // Decimal point position: value = 0.digits * 10^n.
    let n = exp.parse::<i32>().unwrap_or(0) + 1;

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        out.push_str(int);
        out.push('.');
        out.push_str(frac);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let e = n - 1;
        out.push('e');
        out.push(if e < 0 { '-' } else { '+' });
        out.push_str(&e.abs().to_string());
    }
}

fn write_json_string(s: &str, out: &mut String) {
    // Serializing a &str cannot fail.
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}

/// Hash a transaction-shaped JSON value: `keccak256(keccak256(stable_json))`.
///
/// Used both for the transaction hash (over the canonical body) and for the
/// signing hash (over the signing data).
pub fn hash_transaction(value: &Value) -> [u8; 32] {
    keccak256(&keccak256(stable_stringify(value).as_bytes()))
}

/// Hex-encoded [`hash_transaction`], lowercase and without a `0x` prefix.
pub fn hash_transaction_hex(value: &Value) -> String {
    hex::encode(hash_transaction(value))
}
