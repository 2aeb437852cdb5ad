mod compare;
mod timestamp;

pub use compare::{canonical_cmp, canonical_eq};
pub use timestamp::Timestamp;

use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Value
///
/// Dynamically-typed field value as carried by records, conditions, and
/// bound statement parameters.
///
/// Null → the field's value is SQL NULL.
/// List → ordered collection, used as the RHS of IN/NOT IN. Element order
///        is preserved for rendering and fingerprints.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Blob(Vec<u8>),
    Bool(bool),
    Float(f64),
    Int(i64),
    List(Vec<Self>),
    Null,
    Text(String),
    Timestamp(Timestamp),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Number of elements this value contributes as bound parameters.
    #[must_use]
    pub fn param_width(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            Self::Null => 0,
            _ => 1,
        }
    }

    /// Case-fold text content to upper case; other variants pass through.
    ///
    /// Matches an `UPPER(col)` wrapper on the column side of a comparison.
    #[must_use]
    pub fn upper(&self) -> Self {
        match self {
            Self::Text(s) => Self::Text(s.to_uppercase()),
            Self::List(items) => Self::List(items.iter().map(Self::upper).collect()),
            other => other.clone(),
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob(bytes) => write!(f, "<blob {} bytes>", bytes.len()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Null => write!(f, "NULL"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Blob(bytes)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Self::List(items.into_iter().map(Self::Int).collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(Self::from).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(Self::Text).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_width_counts_list_elements() {
        assert_eq!(Value::Null.param_width(), 0);
        assert_eq!(Value::Int(1).param_width(), 1);
        assert_eq!(Value::from(vec![1i64, 2, 3]).param_width(), 3);
        assert_eq!(Value::List(vec![]).param_width(), 0);
    }

    #[test]
    fn upper_folds_text_and_lists() {
        assert_eq!(Value::from("abc").upper(), Value::from("ABC"));
        assert_eq!(
            Value::from(vec!["a", "b"]).upper(),
            Value::from(vec!["A", "B"])
        );
        assert_eq!(Value::Int(7).upper(), Value::Int(7));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Value::from("x").to_string(), "'x'");
        assert_eq!(Value::from(vec![1i64, 2]).to_string(), "(1, 2)");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
