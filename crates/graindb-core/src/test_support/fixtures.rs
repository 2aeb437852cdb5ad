//! Shared model fixtures and wiring helpers for tests.

use crate::{
    dao::{GenericDao, RetryPolicy},
    model::{
        EntityModel, FieldModel, FieldType, KeyMapEntry, ModelRegistry, RelationKind,
        RelationModel, ViewAlias, ViewLink, ViewMember, ViewModel,
    },
    sql::Dialect,
    test_support::{MemDb, MemProvider},
    value::Value,
};
use std::sync::Arc;

#[must_use]
pub fn item_model() -> EntityModel {
    let mut model = EntityModel::new(
        "Item",
        "ITEM",
        vec![
            FieldModel::pk("id", "ID", FieldType::Id),
            FieldModel::new("name", "NAME", FieldType::Text),
            FieldModel::new("qty", "QTY", FieldType::Integer),
        ],
    );
    model.relations.push(RelationModel {
        title: String::new(),
        entity_name: "ItemTag".to_string(),
        kind: RelationKind::Many,
        key_map: vec![KeyMapEntry::new("id", "item_id")],
    });
    model
}

#[must_use]
pub fn item_tag_model() -> EntityModel {
    EntityModel::new(
        "ItemTag",
        "ITEM_TAG",
        vec![
            FieldModel::pk("item_id", "ITEM_ID", FieldType::Id),
            FieldModel::pk("tag", "TAG", FieldType::Text),
        ],
    )
}

/// Optimistic-lock entity for update/transform tests. Validation adds the
/// implicit stamp field.
#[must_use]
pub fn counter_model() -> EntityModel {
    let mut model = EntityModel::new(
        "Counter",
        "COUNTER",
        vec![
            FieldModel::pk("id", "ID", FieldType::Id),
            FieldModel::new("value", "VALUE", FieldType::Integer),
        ],
    );
    model.optimistic_lock = true;
    model
}

#[must_use]
pub fn order_header_model() -> EntityModel {
    EntityModel::new(
        "OrderHeader",
        "ORDER_HEADER",
        vec![
            FieldModel::pk("order_id", "ORDER_ID", FieldType::Id),
            FieldModel::new("customer", "CUSTOMER", FieldType::Text),
        ],
    )
}

#[must_use]
pub fn order_line_model() -> EntityModel {
    EntityModel::new(
        "OrderLine",
        "ORDER_LINE",
        vec![
            FieldModel::pk("order_id", "ORDER_ID", FieldType::Id),
            FieldModel::pk("line_no", "LINE_NO", FieldType::Integer),
            FieldModel::new("sku", "SKU", FieldType::Text),
            FieldModel::new("qty", "QTY", FieldType::Integer),
        ],
    )
}

/// Joined view over OrderHeader + OrderLine. View field columns are
/// alias-qualified, as view-backed models require.
#[must_use]
pub fn order_view_model() -> EntityModel {
    let mut model = EntityModel::new(
        "OrderView",
        "",
        vec![
            FieldModel::pk("order_id", "OH.ORDER_ID", FieldType::Id),
            FieldModel::new("customer", "OH.CUSTOMER", FieldType::Text),
            FieldModel::pk("line_no", "OL.LINE_NO", FieldType::Integer),
            FieldModel::new("sku", "OL.SKU", FieldType::Text),
        ],
    );
    model.view = Some(ViewModel {
        members: vec![
            ViewMember {
                alias: "OH".to_string(),
                entity_name: "OrderHeader".to_string(),
            },
            ViewMember {
                alias: "OL".to_string(),
                entity_name: "OrderLine".to_string(),
            },
        ],
        links: vec![ViewLink {
            alias: "OH".to_string(),
            rel_alias: "OL".to_string(),
            optional: false,
            key_map: vec![KeyMapEntry::new("order_id", "order_id")],
        }],
        aliases: vec![
            ViewAlias {
                name: "order_id".to_string(),
                member_alias: "OH".to_string(),
                field: "order_id".to_string(),
            },
            ViewAlias {
                name: "customer".to_string(),
                member_alias: "OH".to_string(),
                field: "customer".to_string(),
            },
            ViewAlias {
                name: "order_id".to_string(),
                member_alias: "OL".to_string(),
                field: "order_id".to_string(),
            },
            ViewAlias {
                name: "line_no".to_string(),
                member_alias: "OL".to_string(),
                field: "line_no".to_string(),
            },
            ViewAlias {
                name: "sku".to_string(),
                member_alias: "OL".to_string(),
                field: "sku".to_string(),
            },
        ],
    });
    model
}

/// Registry over every fixture model, routed to the "main" datasource.
#[must_use]
pub fn fixtures_registry() -> Arc<ModelRegistry> {
    let mut registry = ModelRegistry::new();
    registry.register(item_model()).expect("Item registers");
    registry
        .register(item_tag_model())
        .expect("ItemTag registers");
    registry
        .register(counter_model())
        .expect("Counter registers");
    registry
        .register(order_header_model())
        .expect("OrderHeader registers");
    registry
        .register(order_line_model())
        .expect("OrderLine registers");
    registry
        .register(order_view_model())
        .expect("OrderView registers");
    registry.set_default_datasource("main");
    Arc::new(registry)
}

/// Create every fixture table in the backing store.
pub fn setup_tables(db: &MemDb) {
    db.create_table("ITEM", &["ID", "NAME", "QTY"]);
    db.create_table("ITEM_TAG", &["ITEM_ID", "TAG"]);
    db.create_table("COUNTER", &["ID", "VALUE", "LAST_UPDATED_STAMP"]);
    db.create_table("ORDER_HEADER", &["ORDER_ID", "CUSTOMER"]);
    db.create_table("ORDER_LINE", &["ORDER_ID", "LINE_NO", "SKU", "QTY"]);
    db.create_table("SEQUENCE_VALUE_ITEM", &["SEQ_NAME", "SEQ_ID"]);
}

#[must_use]
pub fn item_row(id: &str, name: &str, qty: i64) -> Vec<Value> {
    vec![Value::from(id), Value::from(name), Value::Int(qty)]
}

/// DAO over a fresh fixture wiring (Postgres dialect, default policy).
#[must_use]
pub fn fixture_dao(db: &Arc<MemDb>) -> GenericDao {
    GenericDao::new(
        "main",
        Dialect::Postgres,
        MemProvider::new(Arc::clone(db)),
        fixtures_registry(),
        RetryPolicy::default(),
    )
}
