use crate::{
    condition::Condition,
    dao::{FindOptions, OrderSpec},
    delegator::{Delegator, DelegatorBuilder},
    error::{ErrorClass, InternalError},
    model::ModelRegistry,
    port::TransactionFacade,
    sql::Dialect,
    test_support::{MemDb, MemProvider, fixtures_registry, item_row, setup_tables},
    value::Value,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

fn delegator(db: &Arc<MemDb>) -> Delegator {
    DelegatorBuilder::new(fixtures_registry())
        .provider(MemProvider::new(Arc::clone(db)))
        .datasource("main", Dialect::Postgres)
        .build()
        .expect("delegator builds")
}

fn widget_fixture(db: &MemDb) {
    setup_tables(db);
    // 10 rows; exactly 4 satisfy qty > 5 AND name LIKE '%widget%'.
    db.seed_row("ITEM", item_row("A", "blue widget", 7));
    db.seed_row("ITEM", item_row("B", "red widget", 9));
    db.seed_row("ITEM", item_row("C", "widget bin", 12));
    db.seed_row("ITEM", item_row("D", "mega widget", 6));
    db.seed_row("ITEM", item_row("E", "red widget", 2));
    db.seed_row("ITEM", item_row("F", "gadget", 10));
    db.seed_row("ITEM", item_row("G", "gizmo", 1));
    db.seed_row("ITEM", item_row("H", "sprocket", 8));
    db.seed_row("ITEM", item_row("I", "cog", 22));
    db.seed_row("ITEM", item_row("J", "thingamajig", 5));
}

#[test]
fn find_and_count_agree_on_the_widget_scenario() {
    let db = MemDb::new();
    widget_fixture(&db);
    let delegator = delegator(&db);

    let condition = Condition::and(vec![
        Condition::gt("qty", 5i64),
        Condition::like("name", "%widget%"),
    ]);

    let found = delegator
        .find_by_condition(
            "Item",
            Some(&condition),
            &[OrderSpec::asc("id")],
            &FindOptions::default(),
        )
        .expect("find");
    let ids: Vec<Value> = found.iter().map(|r| r.get_or_null("id")).collect();
    assert_eq!(
        ids,
        vec![
            Value::from("A"),
            Value::from("B"),
            Value::from("C"),
            Value::from("D"),
        ]
    );

    let count = delegator
        .count_by_condition("Item", Some(&condition), &FindOptions::default())
        .expect("count");
    assert_eq!(count, 4);
}

#[test]
fn find_by_pk_cached_skips_storage_on_hit() {
    let db = MemDb::new();
    widget_fixture(&db);
    let delegator = delegator(&db);

    let pk = delegator
        .make_pk("Item", vec![("id", Value::from("A"))])
        .expect("pk");

    let first = delegator
        .find_by_pk(&pk, true)
        .expect("find")
        .expect("row present");
    assert_eq!(first.get_or_null("qty"), Value::Int(7));

    let statements_after_first = db.statements().len();
    let second = delegator
        .find_by_pk(&pk, true)
        .expect("find")
        .expect("row present");
    assert_eq!(second.get_or_null("qty"), Value::Int(7));
    assert_eq!(
        db.statements().len(),
        statements_after_first,
        "cache hit must not touch storage"
    );

    // The uncached variant always goes to storage.
    delegator.find_by_pk(&pk, false).expect("find");
    assert!(db.statements().len() > statements_after_first);
}

#[test]
fn find_by_and_cache_invalidates_on_store() {
    let db = MemDb::new();
    widget_fixture(&db);
    let delegator = delegator(&db);

    let hot = delegator
        .find_by_and("Item", vec![("qty", Value::Int(7))], true)
        .expect("find");
    assert_eq!(hot.len(), 1);

    // Update A's qty through the delegator; both the qty=7 and qty=8
    // fingerprints must be invalidated.
    let mut record = hot.into_iter().next().expect("record");
    record.set("qty", 8i64).expect("set");
    delegator.store(&mut record).expect("store");

    let stale = delegator
        .find_by_and("Item", vec![("qty", Value::Int(7))], true)
        .expect("find");
    assert!(stale.is_empty(), "qty=7 filter must re-read after store");

    let fresh = delegator
        .find_by_and("Item", vec![("qty", Value::Int(8))], true)
        .expect("find");
    let ids: Vec<Value> = fresh.iter().map(|r| r.get_or_null("id")).collect();
    assert!(ids.contains(&Value::from("A")));
    assert!(ids.contains(&Value::from("H")));
}

#[test]
fn find_all_cached_and_invalidated_by_create() {
    let db = MemDb::new();
    widget_fixture(&db);
    let delegator = delegator(&db);

    assert_eq!(delegator.find_all("Item", true).expect("find").len(), 10);

    let statements = db.statements().len();
    assert_eq!(delegator.find_all("Item", true).expect("find").len(), 10);
    assert_eq!(db.statements().len(), statements, "all-tier hit");

    let mut new_item = delegator
        .make_record(
            "Item",
            vec![
                ("id", Value::from("K")),
                ("name", Value::from("late widget")),
                ("qty", Value::Int(30)),
            ],
        )
        .expect("record");
    delegator.create(&mut new_item).expect("create");

    assert_eq!(delegator.find_all("Item", true).expect("find").len(), 11);
}

#[test]
fn remove_by_pk_invalidates_and_deletes() {
    let db = MemDb::new();
    widget_fixture(&db);
    let delegator = delegator(&db);

    let pk = delegator
        .make_pk("Item", vec![("id", Value::from("A"))])
        .expect("pk");
    delegator.find_by_pk(&pk, true).expect("find");

    let affected = delegator.remove_by_pk(&pk).expect("remove");
    assert_eq!(affected, 1);
    assert!(delegator.find_by_pk(&pk, true).expect("find").is_none());
    assert_eq!(db.snapshot_rows("ITEM").len(), 9);
}

#[test]
fn relation_traversal_uses_declared_key_map() {
    let db = MemDb::new();
    widget_fixture(&db);
    db.seed_row("ITEM_TAG", vec![Value::from("A"), Value::from("new")]);
    db.seed_row("ITEM_TAG", vec![Value::from("A"), Value::from("sale")]);
    db.seed_row("ITEM_TAG", vec![Value::from("B"), Value::from("new")]);
    let delegator = delegator(&db);

    let pk = delegator
        .make_pk("Item", vec![("id", Value::from("A"))])
        .expect("pk");
    let item = delegator
        .find_by_pk(&pk, false)
        .expect("find")
        .expect("row present");

    let tags = delegator.get_related("ItemTag", &item).expect("related");
    assert_eq!(tags.len(), 2);

    // One-cardinality accessor refuses a many relation.
    let err = delegator.get_related_one("ItemTag", &item).unwrap_err();
    assert_eq!(err.class, ErrorClass::Unsupported);

    // Unknown relation is a model error.
    let err = delegator.get_related("Ghost", &item).unwrap_err();
    assert_eq!(err.class, ErrorClass::Model);
}

//
// Bulk + transactions
//

struct RecordingTx {
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

impl RecordingTx {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            begun: AtomicUsize::new(0),
            committed: AtomicUsize::new(0),
            rolled_back: AtomicUsize::new(0),
        })
    }
}

impl TransactionFacade for RecordingTx {
    fn begin(&self, _timeout_secs: u32) -> Result<bool, InternalError> {
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn commit(&self, began: bool) -> Result<(), InternalError> {
        assert!(began);
        self.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self, began: bool) -> Result<(), InternalError> {
        assert!(began);
        self.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn split_registry() -> Arc<ModelRegistry> {
    let mut registry = ModelRegistry::new();
    registry
        .register(crate::test_support::item_model())
        .expect("Item registers");
    registry
        .register(crate::test_support::item_tag_model())
        .expect("ItemTag registers");
    registry.set_default_datasource("main");
    registry.assign("ItemTag", "second");
    Arc::new(registry)
}

#[test]
fn store_all_wraps_multi_datasource_batches_in_a_transaction() {
    let db = MemDb::new();
    setup_tables(&db);
    let tx = RecordingTx::new();
    let delegator = DelegatorBuilder::new(split_registry())
        .provider(MemProvider::new(Arc::clone(&db)))
        .datasource("main", Dialect::Postgres)
        .datasource("second", Dialect::Postgres)
        .transaction(tx.clone())
        .build()
        .expect("delegator builds");

    let mut item = delegator
        .make_record(
            "Item",
            vec![
                ("id", Value::from("A")),
                ("name", Value::from("widget")),
                ("qty", Value::Int(1)),
            ],
        )
        .expect("record");
    let tag = delegator
        .make_record(
            "ItemTag",
            vec![("item_id", Value::from("A")), ("tag", Value::from("new"))],
        )
        .expect("record");

    let mut batch = vec![item.clone(), tag];
    delegator.store_all(&mut batch).expect("store_all");
    assert_eq!(tx.begun.load(Ordering::SeqCst), 1);
    assert_eq!(tx.committed.load(Ordering::SeqCst), 1);
    assert_eq!(tx.rolled_back.load(Ordering::SeqCst), 0);
    assert_eq!(db.snapshot_rows("ITEM").len(), 1);
    assert_eq!(db.snapshot_rows("ITEM_TAG").len(), 1);

    // A single-datasource batch skips the facade entirely.
    item.set("qty", 2i64).expect("set");
    delegator
        .store_all(std::slice::from_mut(&mut item))
        .expect("store_all");
    assert_eq!(tx.begun.load(Ordering::SeqCst), 1);

    // A record that cannot be stored rolls the batch transaction back.
    let broken_tag = delegator
        .make_record("ItemTag", vec![("item_id", Value::from("B"))])
        .expect("record");
    let mut bad_batch = vec![item, broken_tag];
    let err = delegator.store_all(&mut bad_batch).unwrap_err();
    assert_eq!(err.class, ErrorClass::Model);
    assert_eq!(tx.begun.load(Ordering::SeqCst), 2);
    assert_eq!(tx.rolled_back.load(Ordering::SeqCst), 1);
    assert_eq!(tx.committed.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_datasource_mapping_is_a_config_error() {
    let db = MemDb::new();
    setup_tables(&db);
    let delegator = DelegatorBuilder::new(split_registry())
        .provider(MemProvider::new(Arc::clone(&db)))
        .datasource("main", Dialect::Postgres)
        // "second" deliberately not configured.
        .build()
        .expect("delegator builds");

    let mut tag = delegator
        .make_record(
            "ItemTag",
            vec![("item_id", Value::from("A")), ("tag", Value::from("new"))],
        )
        .expect("record");
    let err = delegator.create(&mut tag).unwrap_err();
    assert_eq!(err.class, ErrorClass::Config);
}

#[test]
fn builder_requires_provider_and_datasource() {
    let err = DelegatorBuilder::new(fixtures_registry()).build().unwrap_err();
    assert_eq!(err.class, ErrorClass::Config);

    let db = MemDb::new();
    let err = DelegatorBuilder::new(fixtures_registry())
        .provider(MemProvider::new(db))
        .build()
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Config);
}

#[test]
fn sequences_allocate_through_the_facade() {
    let db = MemDb::new();
    setup_tables(&db);
    let delegator = delegator(&db);

    let first = delegator.next_seq_id("order").expect("id");
    let second = delegator.next_seq_id("order").expect("id");
    assert_eq!(second, first + 1);
}

#[test]
fn explain_find_renders_the_statement() {
    let db = MemDb::new();
    setup_tables(&db);
    let delegator = delegator(&db);

    let condition = Condition::gt("qty", 5i64);
    let sql = delegator
        .explain_find(
            "Item",
            Some(&condition),
            &[OrderSpec::asc("name")],
            &FindOptions::limited(10),
        )
        .expect("explain");
    assert_eq!(
        sql,
        "SELECT ID, NAME, QTY FROM ITEM WHERE QTY > ? ORDER BY NAME LIMIT 10"
    );
    // Explaining executes nothing.
    assert!(db.statements().is_empty());
}

#[test]
fn cursor_variant_streams_through_the_facade() {
    let db = MemDb::new();
    widget_fixture(&db);
    let delegator = delegator(&db);

    let mut cursor = delegator
        .find_cursor(
            "Item",
            Some(&Condition::like("name", "%widget%")),
            &[OrderSpec::asc("id")],
            &FindOptions::default(),
        )
        .expect("cursor");
    let rows = cursor.drain_remaining().expect("drain");
    assert_eq!(rows.len(), 5);
    cursor.close().expect("close");
}
