use crate::{
    condition::Condition,
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::EntityModel,
    value::Value,
};
use std::fmt;

///
/// PrimaryKey
///
/// A record restricted to exactly its primary-key fields. Field pairs are
/// held in name order so equal keys always print and fingerprint the same.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryKey {
    entity_name: String,
    pairs: Vec<(String, Value)>,
}

impl PrimaryKey {
    /// Build a projection from caller-supplied pairs, requiring exactly the
    /// model's primary-key fields — no more, no fewer.
    pub fn from_pairs(
        model: &EntityModel,
        mut pairs: Vec<(String, Value)>,
    ) -> Result<Self, InternalError> {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut expected: Vec<&str> = model.pk_fields().map(|f| f.name.as_str()).collect();
        expected.sort_unstable();

        let supplied: Vec<&str> = pairs.iter().map(|(name, _)| name.as_str()).collect();
        if supplied != expected {
            return Err(InternalError::new(
                ErrorClass::Model,
                ErrorOrigin::Model,
                format!(
                    "primary key of '{}' requires exactly fields {expected:?}, got {supplied:?}",
                    model.entity_name
                ),
            ));
        }

        Ok(Self {
            entity_name: model.entity_name.clone(),
            pairs,
        })
    }

    /// Internal constructor for pairs already known to be the PK set.
    pub(crate) fn new_unchecked(entity_name: String, mut pairs: Vec<(String, Value)>) -> Self {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entity_name, pairs }
    }

    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    /// Equality condition over the key fields.
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        Condition::field_map(
            self.pairs
                .iter()
                .map(|(name, value)| (name.as_str(), value.clone()))
                .collect(),
        )
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.entity_name)?;
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}
