//! Canonical serialization and short fingerprint hashing.
//!
//! Every identifier this crate derives (classifier fingerprints, effect-graph hashes, cache keys)
//! goes through [`stable_serialize`] followed by [`hash`], so identical normalized records always
//! produce identical identifiers across runs and platforms.

use serde::Serialize;
use serde_json::Value;

/// Render a JSON-like value into its canonical textual form.
///
/// - object keys are emitted in lexicographic order
/// - arrays keep their order (callers pre-sort set-like collections)
/// - `null` is the literal `null`; absent (`Option::None` + `skip_serializing_if`) keys never
///   reach this function
/// - integral finite numbers print without a fractional part (`30`, not `30.0`)
pub fn stable_serialize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// [`stable_serialize`] for any `Serialize` record.
pub fn stable_serialize_of<T: Serialize + ?Sized>(value: &T) -> String {
    // `to_value` only fails for maps with non-string keys; no record in this crate has those.
    let value = match serde_json::to_value(value) {
        Ok(value) => value,
        Err(err) => {
            debug_assert!(false, "record is not JSON-representable: {err}");
            tracing::error!(error = %err, "record is not JSON-representable; serializing as null");
            Value::Null
        }
    };
    stable_serialize(&value)
}

/// Combine a 32-bit FNV-1a hash and a 32-bit DJB2 hash into a 16-hex-digit fingerprint.
///
/// Both hashes run over UTF-16 code units so that non-ASCII input hashes the same way the
/// cache files written by other tooling expect. Not cryptographic.
pub fn hash(input: &str) -> String {
    let mut fnv = Fnv1a32::new();
    let mut djb = Djb2::new();
    for unit in input.encode_utf16() {
        fnv.write_u16(unit);
        djb.write_u16(unit);
    }
    format!("{:08x}{:08x}", fnv.finish(), djb.finish())
}

/// `prefix + hash(stable_serialize_of(value))`.
pub fn prefixed_hash<T: Serialize + ?Sized>(prefix: &str, value: &T) -> String {
    format!("{prefix}{}", hash(&stable_serialize_of(value)))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_value(out, &map[k]);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &serde_json::Number) {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return;
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            out.push_str(&(f as i64).to_string());
        }
        Some(f) if f.is_finite() => out.push_str(&f.to_string()),
        _ => out.push_str("null"),
    }
}

#[derive(Clone, Copy)]
struct Fnv1a32(u32);

impl Fnv1a32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    fn new() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    fn write_u16(&mut self, unit: u16) {
        self.0 ^= u32::from(unit);
        self.0 = self.0.wrapping_mul(Self::PRIME);
    }

    fn finish(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy)]
struct Djb2(u32);

impl Djb2 {
    const SEED: u32 = 5381;

    fn new() -> Self {
        Self(Self::SEED)
    }

    fn write_u16(&mut self, unit: u16) {
        self.0 = (self.0 << 5).wrapping_add(self.0).wrapping_add(u32::from(unit));
    }

    fn finish(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/stable.rs"]
mod tests;
