use serde::{Deserialize, Serialize};

///
/// RelationKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    One,
    Many,
}

///
/// KeyMapEntry
/// One field-to-field mapping in a relation or view link.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyMapEntry {
    /// Field on this entity.
    pub this_field: String,
    /// Field on the related entity.
    pub rel_field: String,
}

impl KeyMapEntry {
    #[must_use]
    pub fn new(this_field: &str, rel_field: &str) -> Self {
        Self {
            this_field: this_field.to_string(),
            rel_field: rel_field.to_string(),
        }
    }
}

///
/// RelationModel
/// Declared relation from one entity to another, addressed as
/// `{title}{entity_name}` (the title distinguishes multiple relations
/// to the same target).
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RelationModel {
    #[serde(default)]
    pub title: String,
    pub entity_name: String,
    pub kind: RelationKind,
    pub key_map: Vec<KeyMapEntry>,
}

impl RelationModel {
    /// The lookup name of this relation.
    #[must_use]
    pub fn relation_name(&self) -> String {
        format!("{}{}", self.title, self.entity_name)
    }
}
