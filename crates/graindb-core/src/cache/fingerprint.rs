use crate::value::Value;
use sha2::{Digest, Sha256};

///
/// Fingerprint
/// Content digest used as a cache key. Keys are content-addressed, so
/// equal projections always collide onto the same entry regardless of
/// which record they were computed from.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Fingerprint([u8; 32]);

/// Digest a field projection into a cache fingerprint.
///
/// Pairs are sorted by field name before hashing so the same subset always
/// fingerprints identically, whatever order the caller supplied.
#[must_use]
pub fn fingerprint_pairs(pairs: &[(String, Value)]) -> Fingerprint {
    let mut sorted: Vec<&(String, Value)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    write_len_u32(&mut hasher, sorted.len());
    for (name, value) in sorted {
        write_str(&mut hasher, name);
        write_value(&mut hasher, value);
    }

    Fingerprint(hasher.finalize().into())
}

/// Encode one value into the digest stream, tag byte first.
fn write_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => write_tag(hasher, 0x01),
        Value::Bool(b) => {
            write_tag(hasher, 0x02);
            hasher.update([u8::from(*b)]);
        }
        Value::Int(n) => {
            write_tag(hasher, 0x03);
            hasher.update(n.to_be_bytes());
        }
        Value::Float(x) => {
            write_tag(hasher, 0x04);
            hasher.update(x.to_bits().to_be_bytes());
        }
        Value::Text(s) => {
            write_tag(hasher, 0x05);
            write_str(hasher, s);
        }
        Value::Timestamp(ts) => {
            write_tag(hasher, 0x06);
            hasher.update(ts.get().to_be_bytes());
        }
        Value::Blob(bytes) => {
            write_tag(hasher, 0x07);
            write_len_u32(hasher, bytes.len());
            hasher.update(bytes);
        }
        Value::List(items) => {
            write_tag(hasher, 0x08);
            write_len_u32(hasher, items.len());
            for item in items {
                write_value(hasher, item);
            }
        }
    }
}

/// Encode one string with length prefix into the digest stream.
fn write_str(hasher: &mut Sha256, value: &str) {
    write_len_u32(hasher, value.len());
    hasher.update(value.as_bytes());
}

/// Encode a platform-sized length as u32 with deterministic saturation.
fn write_len_u32(hasher: &mut Sha256, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    hasher.update(len.to_be_bytes());
}

/// Encode one tag byte into the digest stream.
fn write_tag(hasher: &mut Sha256, tag: u8) {
    hasher.update([tag]);
}
