use crate::value::Value;
use std::cmp::Ordering;

/// Rank a value's variant for cross-variant ordering.
///
/// Null sorts first (matching `NULLS FIRST` collation on ascending order);
/// numeric variants share a rank so Int and Float compare numerically.
const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Timestamp(_) => 4,
        Value::Blob(_) => 5,
        Value::List(_) => 6,
    }
}

/// Total, deterministic ordering across all value variants.
///
/// This is the in-memory comparison semantics used by non-SQL evaluation
/// (cached/filtered record matching and ORDER BY emulation). It is total:
/// NaN compares via `f64::total_cmp`, and mismatched variants order by rank.
#[must_use]
pub fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        #[expect(clippy::cast_precision_loss)]
        (Value::Int(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        #[expect(clippy::cast_precision_loss)]
        (Value::Float(x), Value::Int(y)) => x.total_cmp(&(*y as f64)),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        (Value::List(xs), Value::List(ys)) => {
            for (x, y) in xs.iter().zip(ys.iter()) {
                let ord = canonical_cmp(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Equality under canonical comparison semantics.
#[must_use]
pub fn canonical_eq(a: &Value, b: &Value) -> bool {
    canonical_cmp(a, b) == Ordering::Equal
}
