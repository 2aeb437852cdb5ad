use crate::{
    condition::Condition,
    dao::{FindOptions, GenericDao, OrderSpec, RecordCursor, query},
    error::{ErrorOrigin, InternalError},
    model::EntityModel,
    port::SqlConnection,
    record::{PrimaryKey, Record},
    sql::{OrderByItem, PageSpec},
    value::Value,
};
use std::sync::Arc;

impl GenericDao {
    /// Select one row by primary key. Missing rows are `None`, not an
    /// error, so callers can branch on "missing" vs "broken".
    pub fn select_by_pk(
        &self,
        model: &Arc<EntityModel>,
        pk: &PrimaryKey,
    ) -> Result<Option<Record>, InternalError> {
        let mut conn = self.conn()?;
        self.select_by_pk_on(conn.as_mut(), model, pk)
    }

    /// PK select on an existing connection (same-transaction reads).
    pub(crate) fn select_by_pk_on(
        &self,
        conn: &mut dyn SqlConnection,
        model: &Arc<EntityModel>,
        pk: &PrimaryKey,
    ) -> Result<Option<Record>, InternalError> {
        let condition = pk.to_condition();
        let mut params = Vec::new();
        let (where_sql, _plan) = self.prepare_condition(model, Some(&condition), &mut params)?;

        let sql = self
            .from_builder(model)?
            .columns(Self::columns(model))
            .where_sql(where_sql)
            .build(self.dialect(), None)?;

        let mut rows = query(conn, &sql, &params)?;
        match rows.next_row()? {
            Some(row) => Ok(Some(Record::from_stored_row(Arc::clone(model), row)?)),
            None => Ok(None),
        }
    }

    /// Select all records matching a condition, honoring the find options.
    pub fn select_by_condition(
        &self,
        model: &Arc<EntityModel>,
        condition: Option<&Condition>,
        order: &[OrderSpec],
        options: &FindOptions,
    ) -> Result<Vec<Record>, InternalError> {
        let mut cursor = self.select_cursor(model, condition, order, options)?;
        let records = cursor.drain_remaining()?;
        cursor.close()?;

        Ok(records)
    }

    /// Open a streaming cursor over the rows matching a condition. The
    /// caller owns the cursor and must close it.
    pub fn select_cursor(
        &self,
        model: &Arc<EntityModel>,
        condition: Option<&Condition>,
        order: &[OrderSpec],
        options: &FindOptions,
    ) -> Result<RecordCursor, InternalError> {
        let mut params = Vec::new();
        let (where_sql, plan) = self.prepare_condition(model, condition, &mut params)?;

        let mut builder = self
            .from_builder(model)?
            .columns(Self::columns(model))
            .distinct(options.distinct)
            .where_sql(where_sql);
        let mut order_items = Vec::with_capacity(order.len());
        for spec in order {
            let column = model.require_field(&spec.field)?.column_name.clone();
            order_items.push(if spec.descending {
                OrderByItem::desc(&column)
            } else {
                OrderByItem::asc(&column)
            });
        }
        builder = builder.order_by(order_items);

        let page = (options.max_results > 0)
            .then(|| PageSpec::new(options.max_results, options.offset));
        let sql = builder.build(self.dialect(), page)?;

        let mut conn = self.conn()?;
        if !plan.is_empty() {
            Self::create_temp_tables(conn.as_mut(), &plan)?;
        }

        let rows = match query(conn.as_mut(), &sql, &params) {
            Ok(rows) => rows,
            Err(err) => {
                // The query never ran; still try to unwind the temp tables
                // before the connection goes back to the pool.
                let _ = Self::drop_temp_tables(conn.as_mut(), &plan);
                return Err(err);
            }
        };

        Ok(RecordCursor::new(Arc::clone(model), conn, rows, plan))
    }

    /// Render the statement `select_cursor` would execute, without
    /// executing it. Diagnostics only; temp-table rewrites are applied so
    /// the output is the real statement shape.
    pub fn explain_select(
        &self,
        model: &Arc<EntityModel>,
        condition: Option<&Condition>,
        order: &[OrderSpec],
        options: &FindOptions,
    ) -> Result<String, InternalError> {
        let mut params = Vec::new();
        let (where_sql, _plan) = self.prepare_condition(model, condition, &mut params)?;

        let mut order_items = Vec::with_capacity(order.len());
        for spec in order {
            let column = model.require_field(&spec.field)?.column_name.clone();
            order_items.push(if spec.descending {
                OrderByItem::desc(&column)
            } else {
                OrderByItem::asc(&column)
            });
        }

        let page = (options.max_results > 0)
            .then(|| PageSpec::new(options.max_results, options.offset));
        self.from_builder(model)?
            .columns(Self::columns(model))
            .distinct(options.distinct)
            .where_sql(where_sql)
            .order_by(order_items)
            .build(self.dialect(), page)
    }

    /// `SELECT COUNT([DISTINCT col]|*) FROM … [WHERE …]`.
    pub fn count_by_condition(
        &self,
        model: &Arc<EntityModel>,
        condition: Option<&Condition>,
        options: &FindOptions,
    ) -> Result<u64, InternalError> {
        let mut params = Vec::new();
        let (where_sql, plan) = self.prepare_condition(model, condition, &mut params)?;

        let count_column = if options.distinct {
            let pk_columns: Vec<&str> = model
                .pk_fields()
                .map(|f| f.column_name.as_str())
                .collect();
            match pk_columns.as_slice() {
                [single] => format!("COUNT(DISTINCT {single})"),
                _ => "COUNT(*)".to_string(),
            }
        } else {
            "COUNT(*)".to_string()
        };

        let sql = self
            .from_builder(model)?
            .column(&count_column)
            .where_sql(where_sql)
            .build(self.dialect(), None)?;

        let mut conn = self.conn()?;
        if !plan.is_empty() {
            Self::create_temp_tables(conn.as_mut(), &plan)?;
        }

        let result = (|| {
            let mut rows = query(conn.as_mut(), &sql, &params)?;
            let row = rows.next_row()?.ok_or_else(|| {
                InternalError::storage(ErrorOrigin::Dao, &sql, "COUNT returned no rows")
            })?;
            match row.first() {
                Some(Value::Int(n)) => Ok(u64::try_from(*n).unwrap_or(0)),
                other => Err(InternalError::storage(
                    ErrorOrigin::Dao,
                    &sql,
                    format!("COUNT returned a non-integer value: {other:?}"),
                )),
            }
        })();

        let cleanup = if plan.is_empty() {
            Ok(())
        } else {
            Self::drop_temp_tables(conn.as_mut(), &plan)
        };

        result.and_then(|count| cleanup.map(|()| count))
    }
}
