use crate::{
    cache::EntityCache,
    model::{EntityModel, FieldModel, FieldType},
    record::Record,
    value::Value,
};
use std::sync::Arc;

fn item_model() -> Arc<EntityModel> {
    Arc::new(
        EntityModel::new(
            "Item",
            "ITEM",
            vec![
                FieldModel::pk("id", "ID", FieldType::Id),
                FieldModel::new("name", "NAME", FieldType::Text),
                FieldModel::new("qty", "QTY", FieldType::Integer),
            ],
        )
        .validated()
        .expect("model should validate"),
    )
}

fn never_cache_model() -> Arc<EntityModel> {
    let mut model = EntityModel::new(
        "Secret",
        "SECRET",
        vec![FieldModel::pk("id", "ID", FieldType::Id)],
    );
    model.never_cache = true;
    Arc::new(model.validated().expect("model should validate"))
}

fn item(id: &str, name: &str, qty: i64) -> Record {
    let mut record = Record::from_fields(
        item_model(),
        vec![
            ("id", Value::from(id)),
            ("name", Value::from(name)),
            ("qty", Value::Int(qty)),
        ],
    )
    .expect("record");
    record.snapshot_stored();
    record
}

#[test]
fn pk_tier_round_trip() {
    let cache = EntityCache::new();
    let record = item("A", "widget", 5);
    let pk = record.primary_key().expect("pk");

    assert!(cache.get_by_pk(&pk).is_none());
    cache.put_by_pk(&record);
    let cached = cache.get_by_pk(&pk).expect("cached");
    assert_eq!(cached.get("qty"), Some(&Value::Int(5)));

    cache.remove_by_pk(&pk);
    assert!(cache.get_by_pk(&pk).is_none());
}

#[test]
fn cached_copy_is_isolated_from_caller_mutation() {
    let cache = EntityCache::new();
    let mut record = item("A", "widget", 5);
    cache.put_by_pk(&record);

    // Mutating the caller's record must not corrupt the cached snapshot.
    record.set("qty", 99i64).expect("set");
    let pk = record.primary_key().expect("pk");
    let cached = cache.get_by_pk(&pk).expect("cached");
    assert_eq!(cached.get("qty"), Some(&Value::Int(5)));

    // Mutating a returned copy must not affect the cache either.
    let mut returned = cache.get_by_pk(&pk).expect("cached");
    returned.set("qty", 42i64).expect("set");
    let cached = cache.get_by_pk(&pk).expect("cached");
    assert_eq!(cached.get("qty"), Some(&Value::Int(5)));
}

#[test]
fn and_tier_invalidates_pre_and_post_fingerprints() {
    let cache = EntityCache::new();
    let model = item_model();

    // Two filters cached over the {qty} subset.
    let old_pairs = vec![("qty".to_string(), Value::Int(5))];
    let new_pairs = vec![("qty".to_string(), Value::Int(9))];
    let record = item("A", "widget", 5);
    cache.put_by_and(&model, &old_pairs, std::slice::from_ref(&record));
    cache.put_by_and(&model, &new_pairs, &[]);
    assert!(cache.get_by_and("Item", &old_pairs).is_some());
    assert!(cache.get_by_and("Item", &new_pairs).is_some());

    // Update qty 5 → 9: the record moves out of one filter and into the
    // other, so both fingerprints must go.
    let mut updated = record.clone();
    updated.set("qty", 9i64).expect("set");
    cache.invalidate_record(&updated);

    assert!(cache.get_by_and("Item", &old_pairs).is_none());
    assert!(cache.get_by_and("Item", &new_pairs).is_none());
}

#[test]
fn invalidate_record_clears_pk_and_all_tiers() {
    let cache = EntityCache::new();
    let model = item_model();
    let record = item("A", "widget", 5);

    cache.put_by_pk(&record);
    cache.put_all(&model, std::slice::from_ref(&record));
    assert!(cache.get_all("Item").is_some());

    cache.invalidate_record(&record);
    assert!(cache.get_by_pk(&record.primary_key().expect("pk")).is_none());
    assert!(cache.get_all("Item").is_none());
}

#[test]
fn invalidate_by_bare_pk_drops_whole_and_line() {
    let cache = EntityCache::new();
    let model = item_model();
    let record = item("A", "widget", 5);
    let pairs = vec![("name".to_string(), Value::from("widget"))];

    cache.put_by_pk(&record);
    cache.put_by_and(&model, &pairs, std::slice::from_ref(&record));
    cache.put_all(&model, std::slice::from_ref(&record));

    cache.invalidate_pk(&record.primary_key().expect("pk"));
    assert!(cache.get_by_pk(&record.primary_key().expect("pk")).is_none());
    assert!(cache.get_by_and("Item", &pairs).is_none());
    assert!(cache.get_all("Item").is_none());
}

#[test]
fn never_cache_entities_bypass_silently() {
    let cache = EntityCache::new();
    let model = never_cache_model();
    let record = Record::from_fields(Arc::clone(&model), vec![("id", Value::from("S"))])
        .expect("record");

    cache.put_by_pk(&record);
    cache.put_all(&model, std::slice::from_ref(&record));
    cache.put_by_and(
        &model,
        &[("id".to_string(), Value::from("S"))],
        std::slice::from_ref(&record),
    );

    assert!(cache.is_empty());
    assert!(cache.get_by_pk(&record.primary_key().expect("pk")).is_none());
}

#[test]
fn clear_entity_only_touches_one_line() {
    let cache = EntityCache::new();
    let model = item_model();
    let record = item("A", "widget", 5);

    cache.put_by_pk(&record);
    cache.put_all(&model, std::slice::from_ref(&record));

    cache.clear_entity("Other");
    assert_eq!(cache.len(), 2);

    cache.clear_entity("Item");
    assert!(cache.is_empty());
}

#[test]
fn empty_result_lists_are_cacheable() {
    let cache = EntityCache::new();
    let model = item_model();
    let pairs = vec![("qty".to_string(), Value::Int(0))];

    cache.put_by_and(&model, &pairs, &[]);
    let cached = cache.get_by_and("Item", &pairs).expect("cached");
    assert!(cached.is_empty());
}
