#![forbid(unsafe_code)]

use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

use crate::common::ContractViolation;

pub const CHECKSUM_HEX_LEN: usize = 64;

/// Ledger payloads are structured blobs; bare scalars carry no provenance
/// context and are rejected.
pub fn validate_payload(field: &'static str, payload: &Value) -> Result<(), ContractViolation> {
    match payload {
        Value::Object(_) | Value::Array(_) => Ok(()),
        _ => Err(ContractViolation::InvalidValue {
            field,
            reason: "must be a JSON object or array",
        }),
    }
}

pub fn validate_checksum_hex(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    if value.len() != CHECKSUM_HEX_LEN {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be 64 hex characters",
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be lowercase hex",
        });
    }
    Ok(())
}

/// Structural payload equality.
///
/// Object key order never matters. Numbers compare by value, so `1` and `1.0`
/// are the same payload; there is no epsilon, `0.1 + 0.2` is not `0.3`.
pub fn payloads_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(x, y)| payloads_equivalent(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| payloads_equivalent(x, y)))
        }
        _ => false,
    }
}

/// Exact numeric equality. An integer only equals a float with no fractional
/// part whose integer value is the same; nothing is rounded through `f64`.
fn numbers_equal(x: &Number, y: &Number) -> bool {
    fn as_int(n: &Number) -> Option<i128> {
        n.as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
    }
    fn float_is_int(f: f64, i: i128) -> bool {
        // Every i64/u64 fits well inside this range, so the cast is exact.
        f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(100) && f as i128 == i
    }

    match (as_int(x), as_int(y)) {
        (Some(i), Some(j)) => i == j,
        (Some(i), None) => y.as_f64().is_some_and(|g| float_is_int(g, i)),
        (None, Some(j)) => x.as_f64().is_some_and(|f| float_is_int(f, j)),
        (None, None) => match (x.as_f64(), y.as_f64()) {
            (Some(f), Some(g)) => f == g,
            _ => false,
        },
    }
}

/// Canonical text form: object keys sorted, no insignificant whitespace.
pub fn canonical_json(payload: &Value) -> String {
    let mut out = String::new();
    write_canonical(payload, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 over the canonical JSON form, lowercase hex.
pub fn payload_checksum_hex(payload: &Value) -> String {
    let digest = Sha256::digest(canonical_json(payload).as_bytes());
    let mut out = String::with_capacity(CHECKSUM_HEX_LEN);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
