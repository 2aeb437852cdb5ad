use crate::{
    error::{ErrorOrigin, InternalError},
    model::entity::EntityModel,
};
use std::{collections::HashMap, sync::Arc};

///
/// ModelRegistry
///
/// Name → model map plus the entity → datasource routing table.
/// Populated once at startup by the schema loader, then shared read-only.
///

#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<EntityModel>>,
    routing: HashMap<String, String>,
    default_datasource: Option<String>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, validating it first.
    pub fn register(&mut self, model: EntityModel) -> Result<(), InternalError> {
        let model = model.validated()?;
        let name = model.entity_name.clone();
        if self.models.contains_key(&name) {
            return Err(InternalError::config(
                ErrorOrigin::Model,
                format!("entity '{name}' already registered"),
            ));
        }
        self.models.insert(name, Arc::new(model));

        Ok(())
    }

    /// Route one entity to a named datasource.
    pub fn assign(&mut self, entity_name: &str, datasource: &str) {
        self.routing
            .insert(entity_name.to_string(), datasource.to_string());
    }

    /// Set the datasource used by entities with no explicit route.
    pub fn set_default_datasource(&mut self, datasource: &str) {
        self.default_datasource = Some(datasource.to_string());
    }

    /// Look up a model by entity name.
    pub fn model(&self, entity_name: &str) -> Result<Arc<EntityModel>, InternalError> {
        self.models
            .get(entity_name)
            .cloned()
            .ok_or_else(|| InternalError::unknown_entity(entity_name))
    }

    /// Resolve the datasource an entity is stored in.
    pub fn datasource_for(&self, entity_name: &str) -> Result<&str, InternalError> {
        self.routing
            .get(entity_name)
            .or(self.default_datasource.as_ref())
            .map(String::as_str)
            .ok_or_else(|| {
                InternalError::config(
                    ErrorOrigin::Model,
                    format!("no datasource mapping for entity '{entity_name}'"),
                )
            })
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::{FieldModel, FieldType};

    fn item() -> EntityModel {
        EntityModel::new(
            "Item",
            "ITEM",
            vec![FieldModel::pk("id", "ID", FieldType::Id)],
        )
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut reg = ModelRegistry::new();
        reg.register(item()).expect("first registration");
        let err = reg.register(item()).unwrap_err();
        assert_eq!(err.class, crate::error::ErrorClass::Config);
    }

    #[test]
    fn routing_falls_back_to_default() {
        let mut reg = ModelRegistry::new();
        reg.register(item()).expect("registration");
        assert!(reg.datasource_for("Item").is_err());

        reg.set_default_datasource("main");
        assert_eq!(reg.datasource_for("Item").expect("route"), "main");

        reg.assign("Item", "inventory");
        assert_eq!(reg.datasource_for("Item").expect("route"), "inventory");
    }

    #[test]
    fn unknown_entity_is_model_error() {
        let reg = ModelRegistry::new();
        let err = reg.model("Ghost").unwrap_err();
        assert_eq!(err.class, crate::error::ErrorClass::Model);
    }
}
