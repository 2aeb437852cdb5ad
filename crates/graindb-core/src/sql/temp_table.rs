use crate::{
    condition::Condition,
    model::EntityModel,
    sql::dialect::Dialect,
    value::Value,
};

///
/// TempTable
///
/// One temporary value table substituting an oversized IN list. The table
/// must be created and loaded before the main statement executes, and
/// dropped once the result cursor closes.
///

#[derive(Clone, Debug)]
pub struct TempTable {
    pub name: String,
    pub create_sql: String,
    pub insert_sql: String,
    pub drop_sql: String,
    pub values: Vec<Value>,
}

///
/// TempTablePlan
/// The set of temporary tables owed by one statement.
///

#[derive(Clone, Debug, Default)]
pub struct TempTablePlan {
    pub tables: Vec<TempTable>,
}

impl TempTablePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Replace every membership atom with a collection RHS by a subquery
/// against a newly named temporary table, returning the rewritten tree and
/// the plan describing the tables to create, load, and drop.
///
/// The condition must already be validated against `model`; unresolvable
/// fields are left untouched.
#[must_use]
pub fn rewrite_with_temp_tables(
    condition: &Condition,
    model: &EntityModel,
    dialect: Dialect,
) -> (Condition, TempTablePlan) {
    let mut plan = TempTablePlan::default();

    let rewritten = condition.map_in_atoms(&mut |compare| {
        let Value::List(items) = &compare.value else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        let Some(field) = model.field(&compare.field) else {
            return None;
        };

        let index = plan.tables.len();
        let name = dialect.temp_table_name(index);
        let sample = &items[0];
        let values: Vec<Value> = if compare.ignore_case {
            items.iter().map(Value::upper).collect()
        } else {
            items.clone()
        };

        plan.tables.push(TempTable {
            create_sql: dialect.create_temp_table_sql(&name, sample),
            insert_sql: format!("INSERT INTO {name} (TT_VAL) VALUES (?)"),
            drop_sql: dialect.drop_temp_table_sql(&name),
            values,
            name: name.clone(),
        });

        let column = if compare.ignore_case {
            format!("UPPER({})", field.column_name)
        } else {
            field.column_name.clone()
        };
        let negate = if compare.op == crate::condition::CompareOp::NotIn {
            "NOT "
        } else {
            ""
        };

        Some(Condition::Raw(format!(
            "{column} {negate}IN (SELECT TT_VAL FROM {name})"
        )))
    });

    (rewritten, plan)
}
