use crate::{
    error::{ErrorOrigin, InternalError},
    model::{
        field::{FieldModel, FieldType},
        relation::RelationModel,
        view::ViewModel,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Field name of the implicit optimistic-lock stamp.
pub const STAMP_FIELD: &str = "last_updated_stamp";

/// Column name of the implicit optimistic-lock stamp.
pub const STAMP_COLUMN: &str = "LAST_UPDATED_STAMP";

///
/// EntityModel
/// Runtime schema description of one entity type.
///
/// Loaded once at startup from an external declarative source and shared
/// read-only across all callers for the life of the process.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EntityModel {
    /// Stable entity name used by callers and routing.
    pub entity_name: String,
    /// Backing table name (ignored for view-backed entities).
    pub table_name: String,
    /// Ordered field list (authoritative for statement column order).
    pub fields: Vec<FieldModel>,
    /// Declared relations to other entities.
    #[serde(default)]
    pub relations: Vec<RelationModel>,
    /// View composition; present only for view-backed entities.
    #[serde(default)]
    pub view: Option<ViewModel>,
    /// Bypass all cache tiers for this entity.
    #[serde(default)]
    pub never_cache: bool,
    /// Verify the stamp field before every update.
    #[serde(default)]
    pub optimistic_lock: bool,
}

impl EntityModel {
    #[must_use]
    pub fn new(entity_name: &str, table_name: &str, fields: Vec<FieldModel>) -> Self {
        Self {
            entity_name: entity_name.to_string(),
            table_name: table_name.to_string(),
            fields,
            relations: Vec::new(),
            view: None,
            never_cache: false,
            optimistic_lock: false,
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field, failing with a model error when absent.
    pub fn require_field(&self, name: &str) -> Result<&FieldModel, InternalError> {
        self.field(name)
            .ok_or_else(|| InternalError::unknown_field(&self.entity_name, name))
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn pk_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.fields.iter().filter(|f| f.is_pk)
    }

    pub fn nonpk_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.fields.iter().filter(|f| !f.is_pk)
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[must_use]
    pub const fn is_view(&self) -> bool {
        self.view.is_some()
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationModel> {
        self.relations.iter().find(|r| r.relation_name() == name)
    }

    /// Validate the model and return its canonical form.
    ///
    /// Optimistic-lock entities gain the implicit stamp field when the
    /// declaration omits it.
    pub fn validated(mut self) -> Result<Self, InternalError> {
        if self.entity_name.is_empty() {
            return Err(InternalError::config(
                ErrorOrigin::Model,
                "entity name must be non-empty",
            ));
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.clone()) {
                return Err(InternalError::config(
                    ErrorOrigin::Model,
                    format!(
                        "entity '{}' declares field '{}' twice",
                        self.entity_name, field.name
                    ),
                ));
            }
        }

        if self.optimistic_lock && !self.has_field(STAMP_FIELD) {
            self.fields.push(FieldModel::new(
                STAMP_FIELD,
                STAMP_COLUMN,
                FieldType::Timestamp,
            ));
        }

        if self.pk_fields().next().is_none() && !self.is_view() {
            return Err(InternalError::config(
                ErrorOrigin::Model,
                format!("entity '{}' has no primary key", self.entity_name),
            ));
        }

        if let Some(view) = &self.view {
            for alias in &view.aliases {
                if view.member(&alias.member_alias).is_none() {
                    return Err(InternalError::config(
                        ErrorOrigin::Model,
                        format!(
                            "view '{}' aliases unknown member '{}'",
                            self.entity_name, alias.member_alias
                        ),
                    ));
                }
            }
            for link in &view.links {
                if view.member(&link.alias).is_none() || view.member(&link.rel_alias).is_none() {
                    return Err(InternalError::config(
                        ErrorOrigin::Model,
                        format!(
                            "view '{}' links unknown member '{}' or '{}'",
                            self.entity_name, link.alias, link.rel_alias
                        ),
                    ));
                }
            }
        }

        Ok(self)
    }
}
