#[cfg(test)]
mod tests;

use crate::{
    cache::{CacheClearStrategy, EntityCache, NoopCacheClear},
    condition::Condition,
    dao::{FindOptions, GenericDao, OrderSpec, RecordCursor, RetryPolicy},
    error::{ErrorOrigin, InternalError},
    model::{EntityModel, ModelRegistry, RelationKind},
    port::{ConnectionProvider, NoopTransaction, TransactionFacade},
    record::{PrimaryKey, Record},
    sequence::{SequenceConfig, SequenceRegistry},
    sql::Dialect,
    value::Value,
};
use std::{collections::HashMap, sync::Arc};

///
/// DatasourceConfig
///

#[derive(Clone, Debug)]
pub struct DatasourceConfig {
    pub name: String,
    pub dialect: Dialect,
}

impl DatasourceConfig {
    #[must_use]
    pub fn new(name: &str, dialect: Dialect) -> Self {
        Self {
            name: name.to_string(),
            dialect,
        }
    }
}

///
/// DelegatorBuilder
///
/// Explicit wiring for a Delegator: models, datasources, the connection
/// provider, and the optional collaborators. Constructed once at startup —
/// there are no process-global registries.
///

pub struct DelegatorBuilder {
    registry: Arc<ModelRegistry>,
    provider: Option<Arc<dyn ConnectionProvider>>,
    datasources: Vec<DatasourceConfig>,
    tx: Arc<dyn TransactionFacade>,
    clear_strategy: Arc<dyn CacheClearStrategy>,
    sequence_config: SequenceConfig,
    sequence_datasource: Option<String>,
    policy: RetryPolicy,
    tx_timeout_secs: u32,
}

impl DelegatorBuilder {
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            provider: None,
            datasources: Vec::new(),
            tx: Arc::new(NoopTransaction),
            clear_strategy: Arc::new(NoopCacheClear),
            sequence_config: SequenceConfig::default(),
            sequence_datasource: None,
            policy: RetryPolicy::default(),
            tx_timeout_secs: 60,
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn ConnectionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn datasource(mut self, name: &str, dialect: Dialect) -> Self {
        self.datasources.push(DatasourceConfig::new(name, dialect));
        self
    }

    #[must_use]
    pub fn transaction(mut self, tx: Arc<dyn TransactionFacade>) -> Self {
        self.tx = tx;
        self
    }

    #[must_use]
    pub fn clear_strategy(mut self, strategy: Arc<dyn CacheClearStrategy>) -> Self {
        self.clear_strategy = strategy;
        self
    }

    #[must_use]
    pub fn sequence_config(mut self, config: SequenceConfig) -> Self {
        self.sequence_config = config;
        self
    }

    /// Datasource holding the durable sequence counter table; defaults to
    /// the first configured datasource.
    #[must_use]
    pub fn sequence_datasource(mut self, name: &str) -> Self {
        self.sequence_datasource = Some(name.to_string());
        self
    }

    #[must_use]
    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn transaction_timeout_secs(mut self, secs: u32) -> Self {
        self.tx_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<Delegator, InternalError> {
        let provider = self.provider.ok_or_else(|| {
            InternalError::config(ErrorOrigin::Delegator, "no connection provider configured")
        })?;
        let first = self.datasources.first().ok_or_else(|| {
            InternalError::config(ErrorOrigin::Delegator, "no datasources configured")
        })?;

        let sequence_datasource = self
            .sequence_datasource
            .unwrap_or_else(|| first.name.clone());
        let sequence_dialect = self
            .datasources
            .iter()
            .find(|ds| ds.name == sequence_datasource)
            .map_or(first.dialect, |ds| ds.dialect);

        let mut daos = HashMap::new();
        for ds in &self.datasources {
            daos.insert(
                ds.name.clone(),
                GenericDao::new(
                    &ds.name,
                    ds.dialect,
                    Arc::clone(&provider),
                    Arc::clone(&self.registry),
                    self.policy,
                ),
            );
        }

        let sequences = SequenceRegistry::new(
            &sequence_datasource,
            sequence_dialect,
            Arc::clone(&provider),
            self.sequence_config,
        );

        Ok(Delegator {
            registry: self.registry,
            daos,
            cache: EntityCache::new(),
            sequences,
            tx: self.tx,
            clear_strategy: self.clear_strategy,
            tx_timeout_secs: self.tx_timeout_secs,
        })
    }
}

///
/// Delegator
///
/// Single-entry facade over the whole stack: routes each entity to its
/// datasource's DAO, coordinates cache population and invalidation around
/// every call, wraps multi-datasource bulk operations in the transaction
/// facade, and owns sequence allocation.
///

pub struct Delegator {
    registry: Arc<ModelRegistry>,
    daos: HashMap<String, GenericDao>,
    cache: EntityCache,
    sequences: SequenceRegistry,
    tx: Arc<dyn TransactionFacade>,
    clear_strategy: Arc<dyn CacheClearStrategy>,
    tx_timeout_secs: u32,
}

impl std::fmt::Debug for Delegator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegator")
            .field("daos", &self.daos.keys().collect::<Vec<_>>())
            .field("tx_timeout_secs", &self.tx_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Delegator {
    //
    // Models and records
    //

    /// Look up a model by entity name.
    pub fn model(&self, entity_name: &str) -> Result<Arc<EntityModel>, InternalError> {
        self.registry.model(entity_name)
    }

    /// Make an unsaved record from a field map.
    pub fn make_record(
        &self,
        entity_name: &str,
        pairs: Vec<(&str, Value)>,
    ) -> Result<Record, InternalError> {
        Record::from_fields(self.model(entity_name)?, pairs)
    }

    /// Make a primary-key projection from a field map.
    pub fn make_pk(
        &self,
        entity_name: &str,
        pairs: Vec<(&str, Value)>,
    ) -> Result<PrimaryKey, InternalError> {
        let model = self.model(entity_name)?;
        PrimaryKey::from_pairs(
            &model,
            pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    fn dao_for(&self, entity_name: &str) -> Result<&GenericDao, InternalError> {
        let datasource = self.registry.datasource_for(entity_name)?;
        self.daos.get(datasource).ok_or_else(|| {
            InternalError::config(
                ErrorOrigin::Delegator,
                format!("no DAO configured for datasource '{datasource}'"),
            )
        })
    }

    //
    // Create / store / remove
    //

    /// Insert a new record.
    pub fn create(&self, record: &mut Record) -> Result<(), InternalError> {
        self.cache.invalidate_record(record);
        self.dao_for(record.entity_name())?.insert(record)?;
        self.clear_strategy.record_changed(record);
        Ok(())
    }

    /// Upsert a record (insert when missing, update changed fields when
    /// present). Invalidation runs before the write so both the
    /// pre-mutation and post-mutation "and" fingerprints are dropped.
    pub fn store(&self, record: &mut Record) -> Result<(), InternalError> {
        self.cache.invalidate_record(record);
        self.dao_for(record.entity_name())?.store(record)?;
        self.clear_strategy.record_changed(record);
        Ok(())
    }

    /// Update an existing record (optimistic-lock verified when declared).
    pub fn update(&self, record: &mut Record) -> Result<(), InternalError> {
        self.cache.invalidate_record(record);
        self.dao_for(record.entity_name())?.update(record)?;
        self.clear_strategy.record_changed(record);
        Ok(())
    }

    /// Store a batch, grouping per datasource and wrapping in the
    /// transaction facade when more than one datasource is touched.
    pub fn store_all(&self, records: &mut [Record]) -> Result<(), InternalError> {
        let mut datasources: Vec<&str> = Vec::new();
        for record in records.iter() {
            let ds = self.registry.datasource_for(record.entity_name())?;
            if !datasources.contains(&ds) {
                datasources.push(ds);
            }
        }

        let began = if datasources.len() > 1 {
            self.tx.begin(self.tx_timeout_secs)?
        } else {
            false
        };

        let result = (|| {
            for record in records.iter_mut() {
                self.cache.invalidate_record(record);
                self.dao_for(record.entity_name())?.store(record)?;
                self.clear_strategy.record_changed(record);
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                if datasources.len() > 1 {
                    self.tx.commit(began)?;
                }
                Ok(())
            }
            Err(err) => {
                if datasources.len() > 1 {
                    let _ = self.tx.rollback(began);
                }
                Err(err)
            }
        }
    }

    /// Remove one row by primary key, returning the affected count.
    /// Cache invalidation runs before the delete.
    pub fn remove_by_pk(&self, pk: &PrimaryKey) -> Result<u64, InternalError> {
        self.cache.invalidate_pk(pk);
        let affected = self.dao_for(pk.entity_name())?.delete_by_pk(pk)?;
        self.clear_strategy.pk_removed(pk);
        Ok(affected)
    }

    /// Remove the row a record identifies.
    pub fn remove_record(&self, record: &Record) -> Result<u64, InternalError> {
        self.cache.invalidate_record(record);
        let affected = self.dao_for(record.entity_name())?.delete_record(record)?;
        self.clear_strategy.record_changed(record);
        Ok(affected)
    }

    /// Remove rows by field-equality map. The affected rows are unknown, so
    /// the entity's whole cache line is cleared first.
    pub fn remove_by_and(
        &self,
        entity_name: &str,
        pairs: Vec<(&str, Value)>,
    ) -> Result<u64, InternalError> {
        let model = self.model(entity_name)?;
        self.cache.clear_entity(entity_name);
        let affected = self.dao_for(entity_name)?.delete_by_and(&model, pairs)?;
        self.clear_strategy.entity_cleared(entity_name);
        Ok(affected)
    }

    /// Remove rows by arbitrary condition; clears the entity line first.
    pub fn remove_by_condition(
        &self,
        entity_name: &str,
        condition: &Condition,
    ) -> Result<u64, InternalError> {
        let model = self.model(entity_name)?;
        self.cache.clear_entity(entity_name);
        let affected = self
            .dao_for(entity_name)?
            .delete_by_condition(&model, condition)?;
        self.clear_strategy.entity_cleared(entity_name);
        Ok(affected)
    }

    /// Remove every row of an entity.
    pub fn remove_all(&self, entity_name: &str) -> Result<u64, InternalError> {
        let model = self.model(entity_name)?;
        self.cache.clear_entity(entity_name);
        let affected = self.dao_for(entity_name)?.delete_all(&model)?;
        self.clear_strategy.entity_cleared(entity_name);
        Ok(affected)
    }

    //
    // Finds
    //

    /// Select one row by primary key; `use_cache` reads through the PK
    /// tier and populates it on miss.
    pub fn find_by_pk(
        &self,
        pk: &PrimaryKey,
        use_cache: bool,
    ) -> Result<Option<Record>, InternalError> {
        let model = self.model(pk.entity_name())?;
        let cacheable = use_cache && !model.never_cache;

        if cacheable && let Some(hit) = self.cache.get_by_pk(pk) {
            return Ok(Some(hit));
        }

        let found = self.dao_for(pk.entity_name())?.select_by_pk(&model, pk)?;
        if cacheable && let Some(record) = &found {
            self.cache.put_by_pk(record);
        }

        Ok(found)
    }

    /// Select by field-equality map; `use_cache` reads through the "and"
    /// tier and registers the field subset used.
    pub fn find_by_and(
        &self,
        entity_name: &str,
        pairs: Vec<(&str, Value)>,
        use_cache: bool,
    ) -> Result<Vec<Record>, InternalError> {
        let model = self.model(entity_name)?;
        for (field, _) in &pairs {
            model.require_field(field)?;
        }

        let owned_pairs: Vec<(String, Value)> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        let cacheable = use_cache && !model.never_cache;

        if cacheable && let Some(hit) = self.cache.get_by_and(entity_name, &owned_pairs) {
            return Ok(hit);
        }

        let condition = Condition::field_map(pairs);
        let records = self.dao_for(entity_name)?.select_by_condition(
            &model,
            Some(&condition),
            &[],
            &FindOptions::default(),
        )?;

        if cacheable {
            self.cache.put_by_and(&model, &owned_pairs, &records);
        }

        Ok(records)
    }

    /// Select by field-equality map joined with OR. Not cached: the "and"
    /// tier's fingerprint semantics do not apply to disjunctions.
    pub fn find_by_or(
        &self,
        entity_name: &str,
        pairs: Vec<(&str, Value)>,
    ) -> Result<Vec<Record>, InternalError> {
        let model = self.model(entity_name)?;
        let condition = Condition::or(
            pairs
                .into_iter()
                .map(|(field, value)| Condition::eq(field, value))
                .collect(),
        );
        self.dao_for(entity_name)?.select_by_condition(
            &model,
            Some(&condition),
            &[],
            &FindOptions::default(),
        )
    }

    /// Select by arbitrary condition with ordering and find options.
    pub fn find_by_condition(
        &self,
        entity_name: &str,
        condition: Option<&Condition>,
        order: &[OrderSpec],
        options: &FindOptions,
    ) -> Result<Vec<Record>, InternalError> {
        let model = self.model(entity_name)?;
        self.dao_for(entity_name)?
            .select_by_condition(&model, condition, order, options)
    }

    /// Streaming variant; the caller owns the cursor and must close it.
    pub fn find_cursor(
        &self,
        entity_name: &str,
        condition: Option<&Condition>,
        order: &[OrderSpec],
        options: &FindOptions,
    ) -> Result<RecordCursor, InternalError> {
        let model = self.model(entity_name)?;
        self.dao_for(entity_name)?
            .select_cursor(&model, condition, order, options)
    }

    /// Select every row of an entity; `use_cache` reads through the "all"
    /// tier.
    pub fn find_all(
        &self,
        entity_name: &str,
        use_cache: bool,
    ) -> Result<Vec<Record>, InternalError> {
        let model = self.model(entity_name)?;
        let cacheable = use_cache && !model.never_cache;

        if cacheable && let Some(hit) = self.cache.get_all(entity_name) {
            return Ok(hit);
        }

        let records = self.dao_for(entity_name)?.select_by_condition(
            &model,
            None,
            &[],
            &FindOptions::default(),
        )?;

        if cacheable {
            self.cache.put_all(&model, &records);
        }

        Ok(records)
    }

    /// Count rows matching a condition.
    pub fn count_by_condition(
        &self,
        entity_name: &str,
        condition: Option<&Condition>,
        options: &FindOptions,
    ) -> Result<u64, InternalError> {
        let model = self.model(entity_name)?;
        self.dao_for(entity_name)?
            .count_by_condition(&model, condition, options)
    }

    /// Count every row of an entity.
    pub fn count_all(&self, entity_name: &str) -> Result<u64, InternalError> {
        self.count_by_condition(entity_name, None, &FindOptions::default())
    }

    //
    // Relations
    //

    /// Traverse a declared relation from a record, returning the related
    /// records.
    pub fn get_related(
        &self,
        relation_name: &str,
        record: &Record,
    ) -> Result<Vec<Record>, InternalError> {
        let (condition, rel_entity) = self.relation_condition(relation_name, record)?;
        let model = self.model(&rel_entity)?;
        self.dao_for(&rel_entity)?.select_by_condition(
            &model,
            Some(&condition),
            &[],
            &FindOptions::default(),
        )
    }

    /// Traverse a one-cardinality relation, returning at most one record.
    pub fn get_related_one(
        &self,
        relation_name: &str,
        record: &Record,
    ) -> Result<Option<Record>, InternalError> {
        let relation = record
            .model()
            .relation(relation_name)
            .ok_or_else(|| {
                InternalError::new(
                    crate::error::ErrorClass::Model,
                    ErrorOrigin::Model,
                    format!(
                        "entity '{}' has no relation '{relation_name}'",
                        record.entity_name()
                    ),
                )
            })?;
        if relation.kind != RelationKind::One {
            return Err(InternalError::unsupported(
                ErrorOrigin::Delegator,
                format!("relation '{relation_name}' has many-cardinality; use get_related"),
            ));
        }

        Ok(self.get_related(relation_name, record)?.into_iter().next())
    }

    fn relation_condition(
        &self,
        relation_name: &str,
        record: &Record,
    ) -> Result<(Condition, String), InternalError> {
        let relation = record
            .model()
            .relation(relation_name)
            .ok_or_else(|| {
                InternalError::new(
                    crate::error::ErrorClass::Model,
                    ErrorOrigin::Model,
                    format!(
                        "entity '{}' has no relation '{relation_name}'",
                        record.entity_name()
                    ),
                )
            })?;

        let pairs: Vec<(&str, Value)> = relation
            .key_map
            .iter()
            .map(|entry| {
                (
                    entry.rel_field.as_str(),
                    record.get_or_null(&entry.this_field),
                )
            })
            .collect();

        Ok((Condition::field_map(pairs), relation.entity_name.clone()))
    }

    //
    // Transform
    //

    /// Read-modify-apply-retry over matching records; see
    /// [`GenericDao::transform`]. The entity's cache line is cleared first
    /// since an unknown set of rows is about to change.
    pub fn transform(
        &self,
        entity_name: &str,
        condition: Option<&Condition>,
        mutate: &mut dyn FnMut(&mut Record) -> Result<(), InternalError>,
    ) -> Result<Vec<Record>, InternalError> {
        let model = self.model(entity_name)?;
        self.cache.clear_entity(entity_name);
        let stored = self
            .dao_for(entity_name)?
            .transform(&model, condition, mutate)?;
        self.clear_strategy.entity_cleared(entity_name);
        Ok(stored)
    }

    //
    // Sequences
    //

    /// Allocate the next ID for a named sequence.
    pub fn next_seq_id(&self, name: &str) -> Result<i64, InternalError> {
        self.sequences.next_seq_id(name)
    }

    //
    // Cache administration
    //

    /// Drop every cache line.
    pub fn clear_all_caches(&self) {
        self.cache.clear_all();
        self.clear_strategy.all_cleared();
    }

    /// Drop one entity's cache line.
    pub fn clear_cache_line(&self, entity_name: &str) {
        self.cache.clear_entity(entity_name);
        self.clear_strategy.entity_cleared(entity_name);
    }

    /// Drop the cache entries one primary key could be under.
    pub fn clear_cache_line_by_pk(&self, pk: &PrimaryKey) {
        self.cache.invalidate_pk(pk);
        self.clear_strategy.pk_removed(pk);
    }

    /// Render the statement a find would execute, for diagnostics.
    pub fn explain_find(
        &self,
        entity_name: &str,
        condition: Option<&Condition>,
        order: &[OrderSpec],
        options: &FindOptions,
    ) -> Result<String, InternalError> {
        let model = self.model(entity_name)?;
        let dao = self.dao_for(entity_name)?;
        dao.explain_select(&model, condition, order, options)
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn cache(&self) -> &EntityCache {
        &self.cache
    }
}
