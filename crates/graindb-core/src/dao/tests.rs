use crate::{
    condition::Condition,
    dao::{FindOptions, GenericDao, OrderSpec, RetryPolicy},
    error::ErrorClass,
    model::entity::STAMP_FIELD,
    sql::Dialect,
    test_support::{
        MemDb, MemProvider, fixture_dao, fixtures_registry, item_row, setup_tables,
    },
    value::Value,
};
use std::sync::Arc;

fn seeded_db() -> Arc<MemDb> {
    let db = MemDb::new();
    setup_tables(&db);
    db.seed_row("ITEM", item_row("A", "blue widget", 7));
    db.seed_row("ITEM", item_row("B", "red widget", 3));
    db.seed_row("ITEM", item_row("C", "green gadget", 9));
    db.seed_row("ITEM", item_row("D", "widget crate", 6));
    db
}

#[test]
fn insert_then_select_by_pk_round_trips() {
    let db = MemDb::new();
    setup_tables(&db);
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let mut record = crate::record::Record::from_fields(
        Arc::clone(&model),
        vec![
            ("id", Value::from("X")),
            ("name", Value::from("thing")),
            ("qty", Value::Int(2)),
        ],
    )
    .expect("record");

    dao.insert(&mut record).expect("insert");
    assert!(!record.is_dirty());

    let pk = record.primary_key().expect("pk");
    let found = dao
        .select_by_pk(&model, &pk)
        .expect("select")
        .expect("row present");
    assert_eq!(found.get("name"), Some(&Value::from("thing")));
    assert_eq!(found.get("qty"), Some(&Value::Int(2)));

    // Missing PK is None, not an error.
    let ghost = crate::record::PrimaryKey::from_pairs(
        &model,
        vec![("id".to_string(), Value::from("missing"))],
    )
    .expect("pk");
    assert!(dao.select_by_pk(&model, &ghost).expect("select").is_none());
}

#[test]
fn select_by_condition_filters_orders_and_pages() {
    let db = seeded_db();
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let condition = Condition::and(vec![
        Condition::gt("qty", 5i64),
        Condition::like("name", "%widget%"),
    ]);
    let found = dao
        .select_by_condition(
            &model,
            Some(&condition),
            &[OrderSpec::asc("id")],
            &FindOptions::default(),
        )
        .expect("select");
    let ids: Vec<Value> = found.iter().map(|r| r.get_or_null("id")).collect();
    assert_eq!(ids, vec![Value::from("A"), Value::from("D")]);

    // Paging via LIMIT/OFFSET on the Postgres dialect.
    let page = dao
        .select_by_condition(
            &model,
            None,
            &[OrderSpec::desc("qty")],
            &FindOptions {
                max_results: 2,
                offset: 1,
                ..FindOptions::default()
            },
        )
        .expect("select");
    let qtys: Vec<Value> = page.iter().map(|r| r.get_or_null("qty")).collect();
    assert_eq!(qtys, vec![Value::Int(7), Value::Int(6)]);
}

#[test]
fn count_matches_select() {
    let db = seeded_db();
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let condition = Condition::and(vec![
        Condition::gt("qty", 5i64),
        Condition::like("name", "%widget%"),
    ]);
    let count = dao
        .count_by_condition(&model, Some(&condition), &FindOptions::default())
        .expect("count");
    assert_eq!(count, 2);

    let all = dao
        .count_by_condition(&model, None, &FindOptions::default())
        .expect("count");
    assert_eq!(all, 4);
}

#[test]
fn update_requires_existing_row() {
    let db = MemDb::new();
    setup_tables(&db);
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let mut record = crate::record::Record::from_fields(
        Arc::clone(&model),
        vec![
            ("id", Value::from("none")),
            ("name", Value::from("x")),
            ("qty", Value::Int(1)),
        ],
    )
    .expect("record");

    let err = dao.update(&mut record).unwrap_err();
    assert_eq!(err.class, ErrorClass::NotFound);
}

#[test]
fn optimistic_lock_rejects_stale_writer() {
    let db = MemDb::new();
    setup_tables(&db);
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Counter").expect("model");

    let mut record = crate::record::Record::from_fields(
        Arc::clone(&model),
        vec![("id", Value::from("C")), ("value", Value::Int(0))],
    )
    .expect("record");
    dao.insert(&mut record).expect("insert");

    let pk = record.primary_key().expect("pk");
    let mut copy1 = dao.select_by_pk(&model, &pk).expect("select").expect("row");
    let mut copy2 = dao.select_by_pk(&model, &pk).expect("select").expect("row");

    // First writer wins and advances the stamp.
    let stamp_before = copy1.get_or_null(STAMP_FIELD);
    copy1.set("value", 1i64).expect("set");
    dao.update(&mut copy1).expect("update");
    assert_ne!(copy1.get_or_null(STAMP_FIELD), stamp_before);

    // Second writer holds the old stamp; same field change must fail
    // stale, not silently overwrite.
    copy2.set("value", 2i64).expect("set");
    let err = dao.update(&mut copy2).unwrap_err();
    assert_eq!(err.class, ErrorClass::StaleData);

    let stored = dao.select_by_pk(&model, &pk).expect("select").expect("row");
    assert_eq!(stored.get("value"), Some(&Value::Int(1)));
}

#[test]
fn store_inserts_when_missing_and_updates_only_changed_fields() {
    let db = MemDb::new();
    setup_tables(&db);
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let mut record = crate::record::Record::from_fields(
        Arc::clone(&model),
        vec![
            ("id", Value::from("S")),
            ("name", Value::from("stored")),
            ("qty", Value::Int(1)),
        ],
    )
    .expect("record");
    dao.store(&mut record).expect("store inserts");
    assert_eq!(db.snapshot_rows("ITEM").len(), 1);

    // Second store with one changed field issues an UPDATE of that field.
    record.set("qty", 5i64).expect("set");
    let statements_before = db.statements().len();
    dao.store(&mut record).expect("store updates");
    let statements: Vec<String> = db.statements()[statements_before..]
        .iter()
        .map(|(sql, _)| sql.clone())
        .collect();
    assert!(
        statements
            .iter()
            .any(|sql| sql.starts_with("UPDATE ITEM SET QTY = ?")),
        "expected a narrow update, got {statements:?}"
    );

    let rows = db.snapshot_rows("ITEM");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][2], Value::Int(5));

    // Storing again with nothing changed issues no UPDATE at all.
    let statements_before = db.statements().len();
    dao.store(&mut record).expect("store no-op");
    let statements: Vec<String> = db.statements()[statements_before..]
        .iter()
        .map(|(sql, _)| sql.clone())
        .collect();
    assert!(statements.iter().all(|sql| !sql.starts_with("UPDATE")));
}

#[test]
fn delete_variants_return_affected_counts() {
    let db = seeded_db();
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let affected = dao
        .delete_by_and(&model, vec![("qty", Value::Int(3))])
        .expect("delete");
    assert_eq!(affected, 1);

    let affected = dao
        .delete_by_condition(&model, &Condition::like("name", "%gadget%"))
        .expect("delete");
    assert_eq!(affected, 1);

    let affected = dao.delete_all(&model).expect("delete all");
    assert_eq!(affected, 2);
    assert!(db.snapshot_rows("ITEM").is_empty());
}

//
// Cursor behavior
//

#[test]
fn cursor_supports_absolute_partial_and_backward_reads() {
    let db = seeded_db();
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let mut cursor = dao
        .select_cursor(
            &model,
            None,
            &[OrderSpec::asc("id")],
            &FindOptions::default(),
        )
        .expect("cursor");

    let first = cursor.next().expect("next").expect("row");
    assert_eq!(first.get_or_null("id"), Value::from("A"));

    // Absolute positioning, then a partial drain of 2 from there.
    let two = cursor.next_n(2, Some(1)).expect("next_n");
    let ids: Vec<Value> = two.iter().map(|r| r.get_or_null("id")).collect();
    assert_eq!(ids, vec![Value::from("B"), Value::from("C")]);

    // Backward movement re-reads the row before the last returned.
    let back = cursor.previous().expect("previous").expect("row");
    assert_eq!(back.get_or_null("id"), Value::from("B"));

    // Drain picks up from the current position.
    let rest = cursor.drain_remaining().expect("drain");
    let ids: Vec<Value> = rest.iter().map(|r| r.get_or_null("id")).collect();
    assert_eq!(ids, vec![Value::from("C"), Value::from("D")]);

    cursor.close().expect("close");
    // Close is idempotent; use after close is the distinct closed error.
    cursor.close().expect("second close");
    let err = cursor.next().unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);
    assert!(err.message.contains("cursor already closed"));
}

#[test]
fn absolute_past_end_reports_missing_row() {
    let db = seeded_db();
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let mut cursor = dao
        .select_cursor(&model, None, &[OrderSpec::asc("id")], &FindOptions::default())
        .expect("cursor");
    assert!(!cursor.absolute(10).expect("absolute"));
    assert!(cursor.next().expect("next").is_none());
    cursor.close().expect("close");
}

//
// Temporary-table overflow path
//

#[test]
fn param_ceiling_overflow_routes_in_list_through_temp_table() {
    let db = seeded_db();
    // SqlServer carries the 2000-bind-parameter ceiling.
    let dao = GenericDao::new(
        "main",
        Dialect::SqlServer,
        MemProvider::new(Arc::clone(&db)),
        fixtures_registry(),
        RetryPolicy::default(),
    );
    let model = dao.registry().model("Item").expect("model");

    // 2003 elements: above the ceiling, so the IN atom becomes a subquery
    // against a bulk-loaded temp table. The filler range avoids the seeded
    // qty values 3 and 6.
    let needles: Vec<Value> = (100..2101)
        .map(Value::Int)
        .chain([Value::Int(7), Value::Int(9)])
        .collect();
    let condition = Condition::is_in("qty", needles);

    let mut cursor = dao
        .select_cursor(&model, Some(&condition), &[OrderSpec::asc("id")], &FindOptions::default())
        .expect("cursor");
    assert!(db.has_table("#GRAIN_TMP_0"));

    let found = cursor.drain_remaining().expect("drain");
    let ids: Vec<Value> = found.iter().map(|r| r.get_or_null("id")).collect();
    assert_eq!(ids, vec![Value::from("A"), Value::from("C")]);

    // Closing the cursor drops the temp table.
    cursor.close().expect("close");
    assert!(!db.has_table("#GRAIN_TMP_0"));

    let executed: Vec<String> = db.statements().iter().map(|(sql, _)| sql.clone()).collect();
    assert!(
        executed
            .iter()
            .any(|sql| sql.starts_with("CREATE TABLE #GRAIN_TMP_0")),
        "expected temp-table DDL, got {executed:?}"
    );
    assert!(
        executed
            .iter()
            .any(|sql| sql.contains("QTY IN (SELECT TT_VAL FROM #GRAIN_TMP_0)")),
        "expected subquery rewrite, got {executed:?}"
    );
}

#[test]
fn below_ceiling_in_list_binds_parameters_directly() {
    let db = seeded_db();
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let condition = Condition::is_in("qty", vec![7i64, 9]);
    let found = dao
        .select_by_condition(&model, Some(&condition), &[OrderSpec::asc("id")], &FindOptions::default())
        .expect("select");
    assert_eq!(found.len(), 2);
    assert!(db.statements().iter().all(|(sql, _)| !sql.contains("GRAIN_TMP")));
}

//
// View decomposition
//

#[test]
fn store_view_writes_members_and_updates_changed_fields() {
    let db = MemDb::new();
    setup_tables(&db);
    let dao = fixture_dao(&db);
    let view_model = dao.registry().model("OrderView").expect("model");

    let mut row = crate::record::Record::from_fields(
        Arc::clone(&view_model),
        vec![
            ("order_id", Value::from("O1")),
            ("customer", Value::from("acme")),
            ("line_no", Value::Int(1)),
            ("sku", Value::from("SKU-1")),
        ],
    )
    .expect("record");

    // First store inserts both members.
    dao.store(&mut row).expect("store view");
    assert_eq!(db.snapshot_rows("ORDER_HEADER").len(), 1);
    assert_eq!(db.snapshot_rows("ORDER_LINE").len(), 1);

    // Changing one member field updates only that member row.
    row.set("sku", Value::from("SKU-2")).expect("set");
    dao.store(&mut row).expect("store view again");
    let lines = db.snapshot_rows("ORDER_LINE");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0][2], Value::from("SKU-2"));
    assert_eq!(db.snapshot_rows("ORDER_HEADER").len(), 1);
}

#[test]
fn view_rejects_direct_insert_and_delete() {
    let db = MemDb::new();
    setup_tables(&db);
    let dao = fixture_dao(&db);
    let view_model = dao.registry().model("OrderView").expect("model");

    let mut row = crate::record::Record::from_fields(
        Arc::clone(&view_model),
        vec![("order_id", Value::from("O1")), ("line_no", Value::Int(1))],
    )
    .expect("record");

    let err = dao.insert(&mut row).unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);

    let err = dao
        .delete_by_condition(&view_model, &Condition::eq("order_id", "O1"))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);
}

//
// Transform
//

#[test]
fn transform_applies_mutation_and_converges_under_contention() {
    let db = MemDb::new();
    setup_tables(&db);
    let registry = fixtures_registry();
    let policy = RetryPolicy {
        max_tries: 40,
        backoff_min_ms: 1,
        backoff_max_ms: 5,
    };
    let dao = Arc::new(GenericDao::new(
        "main",
        Dialect::Postgres,
        MemProvider::new(Arc::clone(&db)),
        Arc::clone(&registry),
        policy,
    ));
    let model = registry.model("Counter").expect("model");

    let mut record = crate::record::Record::from_fields(
        Arc::clone(&model),
        vec![("id", Value::from("C")), ("value", Value::Int(0))],
    )
    .expect("record");
    dao.insert(&mut record).expect("insert");

    // Commutative increment from N concurrent transforms: no lost updates.
    const WRITERS: usize = 6;
    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let dao = Arc::clone(&dao);
        let model = Arc::clone(&model);
        handles.push(std::thread::spawn(move || {
            let condition = Condition::eq("id", "C");
            dao.transform(&model, Some(&condition), &mut |rec| {
                let value = rec.get_or_null("value").as_int().unwrap_or(0);
                rec.set("value", value + 1)
            })
            .expect("transform converges");
        }));
    }
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let pk = record.primary_key().expect("pk");
    let stored = dao.select_by_pk(&model, &pk).expect("select").expect("row");
    assert_eq!(stored.get("value"), Some(&Value::Int(WRITERS as i64)));
}

#[test]
fn transform_requires_optimistic_lock() {
    let db = MemDb::new();
    setup_tables(&db);
    let dao = fixture_dao(&db);
    let model = dao.registry().model("Item").expect("model");

    let err = dao
        .transform(&model, None, &mut |_| Ok(()))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);
}
