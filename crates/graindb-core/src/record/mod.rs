mod pk;

pub use pk::PrimaryKey;

use crate::{
    error::{ErrorOrigin, InternalError},
    model::EntityModel,
    value::{Value, canonical_eq},
};
use std::{collections::BTreeMap, sync::Arc};

///
/// Record
///
/// One instance of an entity: a field-name-to-value mapping tagged with its
/// model. Unknown field names are rejected at the boundary (construction and
/// `set`), never at use. A record optionally retains a snapshot of the
/// values as last read from storage, used for partial-update field selection
/// and cache-invalidation diffing.
///

#[derive(Clone, Debug)]
pub struct Record {
    model: Arc<EntityModel>,
    values: BTreeMap<String, Value>,
    original: Option<BTreeMap<String, Value>>,
    dirty: bool,
}

impl Record {
    #[must_use]
    pub const fn new(model: Arc<EntityModel>) -> Self {
        Self {
            model,
            values: BTreeMap::new(),
            original: None,
            dirty: false,
        }
    }

    /// Build a record from a field map, validating every name and value.
    pub fn from_fields(
        model: Arc<EntityModel>,
        pairs: Vec<(&str, Value)>,
    ) -> Result<Self, InternalError> {
        let mut record = Self::new(model);
        for (field, value) in pairs {
            record.set(field, value)?;
        }
        Ok(record)
    }

    /// Build a record from one storage row in model field order, marking it
    /// clean (values match storage).
    pub fn from_stored_row(
        model: Arc<EntityModel>,
        row: Vec<Value>,
    ) -> Result<Self, InternalError> {
        if row.len() != model.fields.len() {
            return Err(InternalError::new(
                crate::error::ErrorClass::Storage,
                ErrorOrigin::Dao,
                format!(
                    "row width {} does not match entity '{}' ({} fields)",
                    row.len(),
                    model.entity_name,
                    model.fields.len()
                ),
            ));
        }

        let mut values = BTreeMap::new();
        for (field, value) in model.fields.iter().zip(row) {
            values.insert(field.name.clone(), value);
        }

        let mut record = Self {
            model,
            values,
            original: None,
            dirty: false,
        };
        record.snapshot_stored();

        Ok(record)
    }

    #[must_use]
    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    #[must_use]
    pub fn model_arc(&self) -> Arc<EntityModel> {
        Arc::clone(&self.model)
    }

    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.model.entity_name
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Field value, with unset fields reading as NULL.
    #[must_use]
    pub fn get_or_null(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Set a field, validating the name and value type. Marks the record
    /// dirty until the next `snapshot_stored`.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), InternalError> {
        let value = value.into();
        let field_model = self.model.require_field(field)?;
        if !field_model.field_type.accepts(&value) {
            return Err(InternalError::new(
                crate::error::ErrorClass::Model,
                ErrorOrigin::Model,
                format!(
                    "value {value} is not storable in field '{}.{}' ({:?})",
                    self.model.entity_name, field, field_model.field_type
                ),
            ));
        }

        self.values.insert(field.to_string(), value);
        self.dirty = true;

        Ok(())
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Declare that the current values match storage: clears the dirty flag
    /// and snapshots the current values as "original".
    pub fn snapshot_stored(&mut self) {
        self.original = Some(self.values.clone());
        self.dirty = false;
    }

    /// Value of a field as last read from storage, if a snapshot exists.
    #[must_use]
    pub fn original_value(&self, field: &str) -> Option<&Value> {
        self.original.as_ref().and_then(|orig| orig.get(field))
    }

    #[must_use]
    pub const fn has_snapshot(&self) -> bool {
        self.original.is_some()
    }

    /// Fields whose current value differs from the stored snapshot.
    ///
    /// Without a snapshot every set field counts as changed.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<String> {
        match &self.original {
            None => self.values.keys().cloned().collect(),
            Some(original) => self
                .values
                .iter()
                .filter(|(name, value)| {
                    original
                        .get(*name)
                        .is_none_or(|orig| !canonical_eq(orig, value))
                })
                .map(|(name, _)| name.clone())
                .collect(),
        }
    }

    /// The primary-key projection of this record. Every PK field must be
    /// set.
    pub fn primary_key(&self) -> Result<PrimaryKey, InternalError> {
        let mut pairs = Vec::new();
        for field in self.model.pk_fields() {
            let value = self.values.get(&field.name).ok_or_else(|| {
                InternalError::new(
                    crate::error::ErrorClass::Model,
                    ErrorOrigin::Model,
                    format!(
                        "primary-key field '{}.{}' is not set",
                        self.model.entity_name, field.name
                    ),
                )
            })?;
            pairs.push((field.name.clone(), value.clone()));
        }

        Ok(PrimaryKey::new_unchecked(
            self.model.entity_name.clone(),
            pairs,
        ))
    }

    /// Project a subset of fields as (name, value) pairs, unset fields
    /// reading as NULL. Used as the "and" cache fingerprint source.
    pub fn projection(&self, fields: &[&str]) -> Result<Vec<(String, Value)>, InternalError> {
        let mut pairs = Vec::with_capacity(fields.len());
        for field in fields {
            self.model.require_field(field)?;
            pairs.push(((*field).to_string(), self.get_or_null(field)));
        }
        Ok(pairs)
    }

    /// Like `projection`, but over the stored snapshot values.
    pub fn original_projection(
        &self,
        fields: &[&str],
    ) -> Result<Option<Vec<(String, Value)>>, InternalError> {
        let Some(original) = &self.original else {
            return Ok(None);
        };

        let mut pairs = Vec::with_capacity(fields.len());
        for field in fields {
            self.model.require_field(field)?;
            pairs.push((
                (*field).to_string(),
                original.get(*field).cloned().unwrap_or(Value::Null),
            ));
        }
        Ok(Some(pairs))
    }

    /// Iterate set fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
