mod cursor;
mod read;
mod transform;
mod write;

#[cfg(test)]
mod tests;

pub use cursor::RecordCursor;

use crate::{
    condition::Condition,
    error::{ErrorOrigin, InternalError},
    model::{EntityModel, ModelRegistry},
    obs::{self, MetricsEvent, StatementKind},
    port::{ConnectionProvider, SqlConnection},
    sql::{Dialect, JoinClause, SelectBuilder, TempTablePlan, temp_table},
    value::{Timestamp, Value},
};
use std::{cmp, sync::Arc, time::Duration};

/// Row batch size when bulk-loading a temporary value table.
const TEMP_TABLE_INSERT_BATCH: usize = 200;

///
/// RetryPolicy
///
/// Bounds and backoff for the optimistic-retry loops (transform and
/// sequence refill). The right values are environment-dependent, so they
/// are configuration rather than constants.
///

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 8,
            backoff_min_ms: 5,
            backoff_max_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// Sleep for a jittered interval between retry attempts.
    pub fn backoff(&self) {
        use rand::Rng as _;

        let low = self.backoff_min_ms.min(self.backoff_max_ms);
        let high = self.backoff_max_ms.max(self.backoff_min_ms);
        let wait = rand::rng().random_range(low..=high);
        std::thread::sleep(Duration::from_millis(wait));
    }
}

///
/// CursorScroll
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CursorScroll {
    #[default]
    ForwardOnly,
    Scrollable,
}

///
/// FindOptions
/// Configuration bag for reads. Defaults: no limit, no offset, forward-only
/// read-only cursor.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct FindOptions {
    pub distinct: bool,
    /// Maximum rows to return; 0 means unlimited.
    pub max_results: usize,
    pub offset: usize,
    /// Driver fetch-size hint; advisory only at this boundary.
    pub fetch_size: usize,
    pub scroll: CursorScroll,
}

impl FindOptions {
    #[must_use]
    pub const fn limited(max_results: usize) -> Self {
        Self {
            distinct: false,
            max_results,
            offset: 0,
            fetch_size: 0,
            scroll: CursorScroll::ForwardOnly,
        }
    }
}

///
/// OrderSpec
/// One ordering key in field (not column) terms.
///

#[derive(Clone, Debug)]
pub struct OrderSpec {
    pub field: String,
    pub descending: bool,
}

impl OrderSpec {
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

///
/// GenericDao
///
/// Executes built statements against one datasource. Each call acquires
/// exactly one connection for its duration and always releases it, success
/// or failure. The DAO is schema-driven: every operation takes the entity
/// model it acts on.
///

pub struct GenericDao {
    datasource: String,
    dialect: Dialect,
    provider: Arc<dyn ConnectionProvider>,
    registry: Arc<ModelRegistry>,
    policy: RetryPolicy,
}

impl GenericDao {
    #[must_use]
    pub fn new(
        datasource: &str,
        dialect: Dialect,
        provider: Arc<dyn ConnectionProvider>,
        registry: Arc<ModelRegistry>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            datasource: datasource.to_string(),
            dialect,
            provider,
            registry,
            policy,
        }
    }

    #[must_use]
    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub(crate) fn conn(&self) -> Result<Box<dyn SqlConnection>, InternalError> {
        self.provider.connection(&self.datasource)
    }

    pub(crate) const fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Validate and render a condition, applying both oversized-IN defenses
    /// for this dialect. Returns the WHERE fragment (params appended in
    /// render order) and the temporary tables the statement now owes.
    pub(crate) fn prepare_condition(
        &self,
        model: &EntityModel,
        condition: Option<&Condition>,
        params: &mut Vec<Value>,
    ) -> Result<(Option<String>, TempTablePlan), InternalError> {
        let Some(condition) = condition else {
            return Ok((None, TempTablePlan::default()));
        };
        condition.validate(model)?;

        // Defense 1: hard per-list ceiling, splitting into an OR of
        // within-ceiling IN atoms.
        let condition = match self.dialect.max_in_list() {
            Some(ceiling) => condition.split_oversized_in(ceiling),
            None => condition.clone(),
        };

        // Defense 2: whole-tree bind-parameter ceiling, replacing every IN
        // atom by a temporary-table subquery.
        let (condition, plan) = match self.dialect.max_bind_params() {
            Some(ceiling) if condition.param_count() > ceiling => {
                temp_table::rewrite_with_temp_tables(&condition, model, self.dialect)
            }
            _ => (condition, TempTablePlan::default()),
        };

        let sql = condition.render(model, params)?;
        Ok((Some(sql), plan))
    }

    /// Create and bulk-load the statement's temporary tables.
    pub(crate) fn create_temp_tables(
        conn: &mut dyn SqlConnection,
        plan: &TempTablePlan,
    ) -> Result<(), InternalError> {
        for table in &plan.tables {
            exec(conn, &table.create_sql, &[], StatementKind::Ddl)?;
            for chunk in table.values.chunks(TEMP_TABLE_INSERT_BATCH) {
                let placeholders = vec!["(?)"; chunk.len()].join(", ");
                let sql = format!("INSERT INTO {} (TT_VAL) VALUES {placeholders}", table.name);
                exec(conn, &sql, chunk, StatementKind::Insert)?;
            }
        }
        Ok(())
    }

    /// Drop the statement's temporary tables. A failed drop is surfaced —
    /// it leaks a resource even though the rows were already delivered.
    pub(crate) fn drop_temp_tables(
        conn: &mut dyn SqlConnection,
        plan: &TempTablePlan,
    ) -> Result<(), InternalError> {
        for table in &plan.tables {
            exec(conn, &table.drop_sql, &[], StatementKind::Ddl)?;
        }
        Ok(())
    }

    /// FROM-clause skeleton for a model: the plain table, or the view's
    /// member joins derived from its link definitions.
    pub(crate) fn from_builder(&self, model: &EntityModel) -> Result<SelectBuilder, InternalError> {
        let Some(view) = &model.view else {
            return Ok(SelectBuilder::new(&model.table_name));
        };

        let Some(first) = view.members.first() else {
            return Err(InternalError::config(
                ErrorOrigin::Model,
                format!("view '{}' has no members", model.entity_name),
            ));
        };

        let first_model = self.registry.model(&first.entity_name)?;
        let mut builder = SelectBuilder::new(&first_model.table_name).alias(&first.alias);

        for link in &view.links {
            let missing_member = |alias: &str| {
                InternalError::config(
                    ErrorOrigin::Model,
                    format!(
                        "view '{}' links unknown member '{alias}'",
                        model.entity_name
                    ),
                )
            };
            let this_member = view
                .member(&link.alias)
                .ok_or_else(|| missing_member(&link.alias))?;
            let rel_member = view
                .member(&link.rel_alias)
                .ok_or_else(|| missing_member(&link.rel_alias))?;
            let this_model = self.registry.model(&this_member.entity_name)?;
            let rel_model = self.registry.model(&rel_member.entity_name)?;

            let mut on_parts = Vec::with_capacity(link.key_map.len());
            for pair in &link.key_map {
                let this_col = &this_model.require_field(&pair.this_field)?.column_name;
                let rel_col = &rel_model.require_field(&pair.rel_field)?.column_name;
                on_parts.push(format!(
                    "{}.{this_col} = {}.{rel_col}",
                    link.alias, link.rel_alias
                ));
            }

            builder = builder.join(JoinClause {
                table: rel_model.table_name.clone(),
                alias: link.rel_alias.clone(),
                outer: link.optional,
                on: on_parts.join(" AND "),
            });
        }

        Ok(builder)
    }

    /// Column list for a model, in declared field order.
    pub(crate) fn columns(model: &EntityModel) -> Vec<String> {
        model.fields.iter().map(|f| f.column_name.clone()).collect()
    }
}

/// Next optimistic-lock stamp: wall clock, but strictly after the observed
/// stamp so two writes in the same millisecond remain distinguishable.
pub(crate) fn next_stamp(observed: &Value) -> Timestamp {
    let floor = observed
        .as_timestamp()
        .map_or(i64::MIN, |ts| ts.get().saturating_add(1));
    Timestamp::from_millis(cmp::max(Timestamp::now().get(), floor))
}

/// Execute one statement through the port, recording metrics and wrapping
/// storage failures with the attempted SQL for diagnostics.
pub(crate) fn exec(
    conn: &mut dyn SqlConnection,
    sql: &str,
    params: &[Value],
    kind: StatementKind,
) -> Result<u64, InternalError> {
    obs::record(MetricsEvent::StatementExecuted { kind });
    conn.execute(sql, params)
        .map_err(|err| wrap_storage(err, sql))
}

/// Run one query through the port, with the same wrapping as `exec`.
pub(crate) fn query(
    conn: &mut dyn SqlConnection,
    sql: &str,
    params: &[Value],
) -> Result<Box<dyn crate::port::SqlRows>, InternalError> {
    obs::record(MetricsEvent::StatementExecuted {
        kind: StatementKind::Select,
    });
    conn.query(sql, params).map_err(|err| wrap_storage(err, sql))
}

fn wrap_storage(err: InternalError, sql: &str) -> InternalError {
    if err.class == crate::error::ErrorClass::Storage {
        InternalError::storage(ErrorOrigin::Dao, sql, err.message)
    } else {
        err
    }
}
