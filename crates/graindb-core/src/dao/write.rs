use crate::{
    condition::Condition,
    dao::{GenericDao, exec, next_stamp, query},
    error::{ErrorOrigin, InternalError},
    model::{EntityModel, entity::STAMP_FIELD},
    obs::StatementKind,
    port::SqlConnection,
    record::{PrimaryKey, Record},
    value::{Value, canonical_eq},
};
use std::sync::Arc;

impl GenericDao {
    //
    // Insert
    //

    /// Insert a record, stamping it when the model declares optimistic
    /// locking. On success the record is marked clean ("values now match
    /// storage").
    pub fn insert(&self, record: &mut Record) -> Result<(), InternalError> {
        let model = record.model_arc();
        if model.is_view() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Dao,
                format!(
                    "direct insert on view-backed entity '{}'; use store",
                    model.entity_name
                ),
            ));
        }

        let mut conn = self.conn()?;
        self.insert_on(conn.as_mut(), &model, record)
    }

    pub(crate) fn insert_on(
        &self,
        conn: &mut dyn SqlConnection,
        model: &EntityModel,
        record: &mut Record,
    ) -> Result<(), InternalError> {
        if model.optimistic_lock {
            let stamp = next_stamp(&record.get_or_null(STAMP_FIELD));
            record.set(STAMP_FIELD, stamp)?;
        }

        let sql = crate::sql::InsertBuilder::new(&model.table_name)
            .columns(Self::columns(model))
            .build()?;
        let params: Vec<Value> = model
            .fields
            .iter()
            .map(|f| record.get_or_null(&f.name))
            .collect();

        let affected = exec(conn, &sql, &params, StatementKind::Insert)?;
        if affected == 0 {
            return Err(InternalError::storage(
                ErrorOrigin::Dao,
                &sql,
                format!("insert into '{}' affected no rows", model.entity_name),
            ));
        }
        record.snapshot_stored();

        Ok(())
    }

    //
    // Update
    //

    /// Update every non-PK field of a record, with optimistic-lock
    /// verification when the model declares it. Zero affected rows is a
    /// not-found error, distinct from a SQL error.
    pub fn update(&self, record: &mut Record) -> Result<(), InternalError> {
        let model = record.model_arc();
        if model.is_view() {
            return self.store_view(record);
        }

        let fields: Vec<String> = model
            .nonpk_fields()
            .filter(|f| f.name != STAMP_FIELD)
            .map(|f| f.name.clone())
            .collect();

        let mut conn = self.conn()?;
        let affected = self.update_on(conn.as_mut(), &model, record, &fields, None, true)?;
        if affected == 0 {
            return Err(InternalError::row_not_found(
                &model.entity_name,
                record.primary_key()?,
            ));
        }
        record.snapshot_stored();

        Ok(())
    }

    /// Update only the named fields.
    pub fn update_fields(
        &self,
        record: &mut Record,
        fields: &[&str],
    ) -> Result<(), InternalError> {
        let model = record.model_arc();
        if model.is_view() {
            return self.store_view(record);
        }

        let fields: Vec<String> = fields.iter().map(|f| (*f).to_string()).collect();
        let mut conn = self.conn()?;
        let affected = self.update_on(conn.as_mut(), &model, record, &fields, None, true)?;
        if affected == 0 {
            return Err(InternalError::row_not_found(
                &model.entity_name,
                record.primary_key()?,
            ));
        }
        record.snapshot_stored();

        Ok(())
    }

    /// Core UPDATE: `UPDATE … SET fields[, stamp] WHERE <pk> [AND extra]`.
    ///
    /// With `verify_lock`, an optimistic-lock model is re-selected first and
    /// a stamp mismatch fails with stale-data *before* the UPDATE is issued.
    /// Returns the affected-row count; callers decide what zero means.
    pub(crate) fn update_on(
        &self,
        conn: &mut dyn SqlConnection,
        model: &EntityModel,
        record: &mut Record,
        fields: &[String],
        extra: Option<&Condition>,
        verify_lock: bool,
    ) -> Result<u64, InternalError> {
        let pk = record.primary_key()?;

        if model.optimistic_lock && verify_lock {
            self.verify_stamp(conn, model, record, &pk)?;
        }

        let mut set_fields: Vec<String> = fields.to_vec();
        if model.optimistic_lock {
            let stamp = next_stamp(&record.get_or_null(STAMP_FIELD));
            record.set(STAMP_FIELD, stamp)?;
            if !set_fields.iter().any(|f| f == STAMP_FIELD) {
                set_fields.push(STAMP_FIELD.to_string());
            }
        }
        if set_fields.is_empty() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Dao,
                format!("update of '{}' with no fields", model.entity_name),
            ));
        }

        let mut set_columns = Vec::with_capacity(set_fields.len());
        let mut params = Vec::with_capacity(set_fields.len() + pk.pairs().len());
        for field in &set_fields {
            let field_model = model.require_field(field)?;
            set_columns.push(field_model.column_name.clone());
            params.push(record.get_or_null(field));
        }

        let where_condition = match extra {
            Some(extra) => {
                Condition::combine(pk.to_condition(), crate::condition::JoinOp::And, extra.clone())
            }
            None => pk.to_condition(),
        };
        let mut where_params = Vec::new();
        let (where_sql, _plan) =
            self.prepare_condition(model, Some(&where_condition), &mut where_params)?;
        params.extend(where_params);

        let sql = crate::sql::UpdateBuilder::new(&model.table_name)
            .set_columns(set_columns)
            .where_sql(where_sql)
            .build()?;

        exec(conn, &sql, &params, StatementKind::Update)
    }

    /// Re-select the stamp column and compare it against the in-memory
    /// value; disagreement is a stale-data error.
    fn verify_stamp(
        &self,
        conn: &mut dyn SqlConnection,
        model: &EntityModel,
        record: &Record,
        pk: &PrimaryKey,
    ) -> Result<(), InternalError> {
        let stamp_column = model.require_field(STAMP_FIELD)?.column_name.clone();

        let mut params = Vec::new();
        let condition = pk.to_condition();
        let (where_sql, _plan) = self.prepare_condition(model, Some(&condition), &mut params)?;
        let sql = self
            .from_builder(model)?
            .column(&stamp_column)
            .where_sql(where_sql)
            .build(self.dialect(), None)?;

        let mut rows = query(conn, &sql, &params)?;
        let row = rows
            .next_row()?
            .ok_or_else(|| InternalError::row_not_found(&model.entity_name, pk))?;
        let stored = row.into_iter().next().unwrap_or(Value::Null);
        let mine = record.get_or_null(STAMP_FIELD);

        if canonical_eq(&stored, &mine) {
            Ok(())
        } else {
            Err(InternalError::stale_data(
                &model.entity_name,
                format!("stored stamp {stored} != in-memory stamp {mine} ({pk})"),
            ))
        }
    }

    //
    // Store (upsert)
    //

    /// Store semantics: select by primary key on one connection; missing →
    /// insert, present → update only the fields that actually changed.
    pub fn store(&self, record: &mut Record) -> Result<(), InternalError> {
        let model = record.model_arc();
        if model.is_view() {
            return self.store_view(record);
        }

        let pk = record.primary_key()?;
        let mut conn = self.conn()?;

        let Some(existing) = self.select_by_pk_on(conn.as_mut(), &model, &pk)? else {
            return self.insert_on(conn.as_mut(), &model, record);
        };

        let changed: Vec<String> = record
            .fields()
            .filter(|(name, value)| {
                *name != STAMP_FIELD && !canonical_eq(&existing.get_or_null(name), value)
            })
            .map(|(name, _)| name.to_string())
            .collect();
        if changed.is_empty() {
            record.snapshot_stored();
            return Ok(());
        }

        let affected = self.update_on(conn.as_mut(), &model, record, &changed, None, true)?;
        if affected == 0 {
            return Err(InternalError::row_not_found(&model.entity_name, pk));
        }
        record.snapshot_stored();

        Ok(())
    }

    //
    // View store
    //

    /// Store a view-backed record by decomposing it into per-member
    /// operations: derive each member's values through the view aliases,
    /// select the member's existing rows, then insert (0 rows), update the
    /// changed subset (1 row), or fail as not updatable (more).
    ///
    /// There is no cross-member atomicity: a failure partway leaves the
    /// members already written as they are. Known limitation, kept
    /// deliberately — wrap calls in the transaction facade when that
    /// matters.
    pub fn store_view(&self, record: &mut Record) -> Result<(), InternalError> {
        let model = record.model_arc();
        let Some(view) = &model.view else {
            return Err(InternalError::unsupported(
                ErrorOrigin::Dao,
                format!("entity '{}' is not view-backed", model.entity_name),
            ));
        };

        let registry = self.registry();
        let mut conn = self.conn()?;

        for member in &view.members {
            let member_model = registry.model(&member.entity_name)?;

            // Member field values derived from the view row.
            let mut derived: Vec<(String, Value)> = Vec::new();
            for alias in view.aliases_for(&member.alias) {
                if let Some(value) = record.get(&alias.name) {
                    derived.push((alias.field.clone(), value.clone()));
                }
            }
            if derived.is_empty() {
                continue;
            }

            // Key on the member's PK when fully derivable, else on every
            // derived field.
            let pk_names: Vec<&str> =
                member_model.pk_fields().map(|f| f.name.as_str()).collect();
            let have_pk = pk_names
                .iter()
                .all(|name| derived.iter().any(|(n, _)| n == name));
            let key_pairs: Vec<(&str, Value)> = if have_pk {
                derived
                    .iter()
                    .filter(|(n, _)| pk_names.contains(&n.as_str()))
                    .map(|(n, v)| (n.as_str(), v.clone()))
                    .collect()
            } else {
                derived
                    .iter()
                    .map(|(n, v)| (n.as_str(), v.clone()))
                    .collect()
            };
            let key_condition = Condition::field_map(key_pairs);

            let existing = self.select_list_on(
                conn.as_mut(),
                &member_model,
                Some(&key_condition),
            )?;

            match existing.len() {
                0 => {
                    let mut member_record = Record::from_fields(
                        Arc::clone(&member_model),
                        derived
                            .iter()
                            .map(|(n, v)| (n.as_str(), v.clone()))
                            .collect(),
                    )?;
                    self.insert_on(conn.as_mut(), &member_model, &mut member_record)?;
                }
                1 => {
                    let mut member_record = existing.into_iter().next().unwrap_or_else(|| {
                        Record::new(Arc::clone(&member_model))
                    });
                    let mut changed = Vec::new();
                    for (name, value) in &derived {
                        if !canonical_eq(&member_record.get_or_null(name), value) {
                            member_record.set(name, value.clone())?;
                            changed.push(name.clone());
                        }
                    }
                    if !changed.is_empty() {
                        let affected = self.update_on(
                            conn.as_mut(),
                            &member_model,
                            &mut member_record,
                            &changed,
                            None,
                            true,
                        )?;
                        if affected == 0 {
                            return Err(InternalError::row_not_found(
                                &member_model.entity_name,
                                member_record.primary_key()?,
                            ));
                        }
                    }
                }
                n => {
                    return Err(InternalError::unsupported(
                        ErrorOrigin::Dao,
                        format!(
                            "view '{}' member '{}' matched {n} rows; not updatable",
                            model.entity_name, member.alias
                        ),
                    ));
                }
            }
        }

        record.snapshot_stored();

        Ok(())
    }

    /// Plain list select on an existing connection (no paging, no cursor).
    pub(crate) fn select_list_on(
        &self,
        conn: &mut dyn SqlConnection,
        model: &Arc<EntityModel>,
        condition: Option<&Condition>,
    ) -> Result<Vec<Record>, InternalError> {
        let mut params = Vec::new();
        let (where_sql, _plan) = self.prepare_condition(model, condition, &mut params)?;
        let sql = self
            .from_builder(model)?
            .columns(Self::columns(model))
            .where_sql(where_sql)
            .build(self.dialect(), None)?;

        let mut rows = query(conn, &sql, &params)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next_row()? {
            out.push(Record::from_stored_row(Arc::clone(model), row)?);
        }

        Ok(out)
    }

    //
    // Delete
    //

    /// Delete rows matching an arbitrary condition, returning the affected
    /// count.
    pub fn delete_by_condition(
        &self,
        model: &Arc<EntityModel>,
        condition: &Condition,
    ) -> Result<u64, InternalError> {
        self.delete_where(model, Some(condition))
    }

    /// Delete one row by primary key.
    pub fn delete_by_pk(&self, pk: &PrimaryKey) -> Result<u64, InternalError> {
        let model = self.registry().model(pk.entity_name())?;
        self.delete_where(&model, Some(&pk.to_condition()))
    }

    /// Delete the row a record identifies.
    pub fn delete_record(&self, record: &Record) -> Result<u64, InternalError> {
        let pk = record.primary_key()?;
        self.delete_by_pk(&pk)
    }

    /// Delete by field-equality map.
    pub fn delete_by_and(
        &self,
        model: &Arc<EntityModel>,
        pairs: Vec<(&str, Value)>,
    ) -> Result<u64, InternalError> {
        self.delete_where(model, Some(&Condition::field_map(pairs)))
    }

    /// Delete every row of an entity.
    pub fn delete_all(&self, model: &Arc<EntityModel>) -> Result<u64, InternalError> {
        self.delete_where(model, None)
    }

    fn delete_where(
        &self,
        model: &Arc<EntityModel>,
        condition: Option<&Condition>,
    ) -> Result<u64, InternalError> {
        if model.is_view() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Dao,
                format!("direct delete on view-backed entity '{}'", model.entity_name),
            ));
        }

        let mut params = Vec::new();
        let (where_sql, _plan) = self.prepare_condition(model, condition, &mut params)?;
        let sql = crate::sql::DeleteBuilder::new(&model.table_name)
            .where_sql(where_sql)
            .allow_all(condition.is_none())
            .build()?;

        let mut conn = self.conn()?;
        exec(conn.as_mut(), &sql, &params, StatementKind::Delete)
    }
}
