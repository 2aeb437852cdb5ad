use crate::value::Value;
use serde::{Deserialize, Serialize};

///
/// FieldType
/// Semantic type tag for one entity field.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Blob,
    Bool,
    Float,
    Id,
    Integer,
    Text,
    Timestamp,
}

impl FieldType {
    /// Whether a value is storable in a field of this type.
    ///
    /// Null is always accepted; nullability is not part of the model.
    #[must_use]
    pub const fn accepts(self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Blob(_) => matches!(self, Self::Blob),
            Value::Bool(_) => matches!(self, Self::Bool),
            Value::Float(_) => matches!(self, Self::Float),
            Value::Int(_) => matches!(self, Self::Integer | Self::Float | Self::Id),
            Value::Text(_) => matches!(self, Self::Text | Self::Id),
            Value::Timestamp(_) => matches!(self, Self::Timestamp),
            Value::List(_) => false,
        }
    }
}

///
/// FieldModel
/// Runtime model for one entity field.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldModel {
    /// Field name used by callers and conditions.
    pub name: String,
    /// Column name in the backing table. For view-backed entities this is
    /// the alias-qualified column (`alias.COLUMN`).
    pub column_name: String,
    /// Semantic type tag.
    pub field_type: FieldType,
    /// Primary-key flag.
    #[serde(default)]
    pub is_pk: bool,
}

impl FieldModel {
    /// Shorthand constructor for a non-PK field.
    #[must_use]
    pub fn new(name: &str, column_name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            column_name: column_name.to_string(),
            field_type,
            is_pk: false,
        }
    }

    /// Shorthand constructor for a primary-key field.
    #[must_use]
    pub fn pk(name: &str, column_name: &str, field_type: FieldType) -> Self {
        Self {
            is_pk: true,
            ..Self::new(name, column_name, field_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_follows_type_tags() {
        assert!(FieldType::Integer.accepts(&Value::Int(1)));
        assert!(FieldType::Integer.accepts(&Value::Null));
        assert!(!FieldType::Integer.accepts(&Value::from("x")));
        assert!(FieldType::Id.accepts(&Value::from("SKU-1")));
        assert!(FieldType::Float.accepts(&Value::Int(2)));
        assert!(!FieldType::Text.accepts(&Value::from(vec![1i64])));
    }
}
