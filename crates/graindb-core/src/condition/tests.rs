use crate::{
    condition::{CompareOp, Condition, JoinOp},
    model::{EntityModel, FieldModel, FieldType},
    record::Record,
    value::Value,
};
use proptest::prelude::*;
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
                FieldModel::new("price", "PRICE", FieldType::Float),
            ],
        )
        .validated()
        .expect("model should validate"),
    )
}

fn render(condition: &Condition) -> (String, Vec<Value>) {
    let model = item_model();
    let mut params = Vec::new();
    let sql = condition
        .render(&model, &mut params)
        .expect("condition should render");
    (sql, params)
}

#[test]
fn renders_simple_compare() {
    let (sql, params) = render(&Condition::gt("qty", 5i64));
    assert_eq!(sql, "QTY > ?");
    assert_eq!(params, vec![Value::Int(5)]);
}

#[test]
fn renders_null_equality_without_params() {
    let (sql, params) = render(&Condition::eq("name", Value::Null));
    assert_eq!(sql, "NAME IS NULL");
    assert!(params.is_empty());

    let (sql, _) = render(&Condition::ne("name", Value::Null));
    assert_eq!(sql, "NAME IS NOT NULL");
}

#[test]
fn null_with_ordering_operator_fails_fast() {
    let model = item_model();
    let mut params = Vec::new();
    let err = Condition::gt("qty", Value::Null)
        .render(&model, &mut params)
        .unwrap_err();
    assert_eq!(err.class, crate::error::ErrorClass::Unsupported);
    assert!(Condition::gt("qty", Value::Null).validate(&model).is_err());
}

#[test]
fn renders_in_list_in_iteration_order() {
    let (sql, params) = render(&Condition::is_in("id", vec!["b", "a", "c"]));
    assert_eq!(sql, "ID IN (?, ?, ?)");
    assert_eq!(
        params,
        vec![Value::from("b"), Value::from("a"), Value::from("c")]
    );
}

#[test]
fn renders_in_with_scalar_rhs_as_single_placeholder() {
    let (sql, params) = render(&Condition::is_in("id", "only"));
    assert_eq!(sql, "ID IN (?)");
    assert_eq!(params, vec![Value::from("only")]);
}

#[test]
fn renders_empty_in_as_identity() {
    let (sql, params) = render(&Condition::is_in("id", Value::List(vec![])));
    assert_eq!(sql, "1=0");
    assert!(params.is_empty());

    let (sql, _) = render(&Condition::not_in("id", Value::List(vec![])));
    assert_eq!(sql, "1=1");
}

#[test]
fn collection_rhs_requires_membership_operator() {
    let model = item_model();
    let cond = Condition::eq("qty", Value::from(vec![1i64, 2]));
    assert!(cond.validate(&model).is_err());

    let mut params = Vec::new();
    let err = cond.render(&model, &mut params).unwrap_err();
    assert_eq!(err.class, crate::error::ErrorClass::Unsupported);
    assert!(params.is_empty());
}

#[test]
fn ignore_case_wraps_column_and_folds_param() {
    let (sql, params) = render(&Condition::eq("name", "widget").ignore_case());
    assert_eq!(sql, "UPPER(NAME) = ?");
    assert_eq!(params, vec![Value::from("WIDGET")]);
}

#[test]
fn renders_list_and_nested_combine() {
    let cond = Condition::combine(
        Condition::and(vec![
            Condition::gt("qty", 5i64),
            Condition::like("name", "%widget%"),
        ]),
        JoinOp::Or,
        Condition::eq("id", "X"),
    );
    let (sql, params) = render(&cond);
    assert_eq!(sql, "((QTY > ?) AND (NAME LIKE ?)) OR (ID = ?)");
    assert_eq!(params.len(), 3);
    assert_eq!(cond.param_count(), 3);
}

#[test]
fn validate_rejects_unknown_fields_recursively() {
    let model = item_model();
    let cond = Condition::and(vec![
        Condition::eq("id", "A"),
        Condition::combine(
            Condition::eq("qty", 1i64),
            JoinOp::And,
            Condition::eq("ghost", 2i64),
        ),
    ]);
    let err = cond.validate(&model).unwrap_err();
    assert_eq!(err.class, crate::error::ErrorClass::Model);
}

#[test]
fn raw_fragment_renders_verbatim_with_no_params() {
    let cond = Condition::and(vec![
        Condition::eq("id", "A"),
        Condition::Raw("QTY IN (SELECT TT_VAL FROM TMP_1)".to_string()),
    ]);
    let (sql, params) = render(&cond);
    assert_eq!(sql, "(ID = ?) AND (QTY IN (SELECT TT_VAL FROM TMP_1))");
    assert_eq!(params, vec![Value::from("A")]);
}

//
// IN-overflow rewriting
//

#[test]
fn split_below_ceiling_is_structurally_identical() {
    let cond = Condition::is_in("qty", (0..10).map(Value::Int).collect::<Vec<_>>());
    assert_eq!(cond.split_oversized_in(10), cond);
}

#[test]
fn split_above_ceiling_partitions_in_order_without_loss() {
    let items: Vec<Value> = (0..25).map(Value::Int).collect();
    let cond = Condition::is_in("qty", items.clone());
    let split = cond.split_oversized_in(10);

    // Param count across all partitions equals the original collection
    // size exactly once.
    assert_eq!(split.param_count(), 25);

    let model = item_model();
    let mut params = Vec::new();
    let sql = split.render(&model, &mut params).expect("render");
    assert_eq!(
        sql,
        "(QTY IN (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)) OR (QTY IN (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)) OR (QTY IN (?, ?, ?, ?, ?))"
    );
    assert_eq!(params, items);
}

#[test]
fn split_not_in_joins_with_and() {
    let items: Vec<Value> = (0..4).map(Value::Int).collect();
    let split = Condition::not_in("qty", items).split_oversized_in(2);
    let Condition::List(JoinOp::And, parts) = &split else {
        panic!("expected AND list, got {split:?}");
    };
    assert_eq!(parts.len(), 2);
}

#[test]
fn rewrites_compose_without_touching_original() {
    let original = Condition::and(vec![
        Condition::is_in("qty", (0..6).map(Value::Int).collect::<Vec<_>>()),
        Condition::eq("id", "A"),
    ]);
    let snapshot = original.clone();

    let once = original.split_oversized_in(2);
    let twice = once.map_in_atoms(&mut |compare| {
        Some(Condition::Raw(format!(
            "{} IN (SELECT TT_VAL FROM TMP_X)",
            compare.field.to_uppercase()
        )))
    });

    assert_eq!(original, snapshot);
    assert_eq!(once.param_count(), 7);
    assert_eq!(twice.param_count(), 1); // only `id = ?` binds
}

//
// In-memory evaluation
//

fn item_record(id: &str, name: &str, qty: i64) -> Record {
    Record::from_fields(
        item_model(),
        vec![
            ("id", Value::from(id)),
            ("name", Value::from(name)),
            ("qty", Value::Int(qty)),
        ],
    )
    .expect("record")
}

#[test]
fn matches_follows_sql_semantics() {
    let record = item_record("A", "blue widget", 7);

    let cond = Condition::and(vec![
        Condition::gt("qty", 5i64),
        Condition::like("name", "%widget%"),
    ]);
    assert!(cond.matches(&record).expect("eval"));

    let cond = Condition::and(vec![
        Condition::gt("qty", 9i64),
        Condition::like("name", "%widget%"),
    ]);
    assert!(!cond.matches(&record).expect("eval"));

    assert!(
        Condition::is_in("id", vec!["A", "B"])
            .matches(&record)
            .expect("eval")
    );
    assert!(
        Condition::eq("name", "BLUE WIDGET")
            .ignore_case()
            .matches(&record)
            .expect("eval")
    );
}

#[test]
fn matches_treats_unset_field_as_null() {
    let record = Record::from_fields(item_model(), vec![("id", Value::from("A"))])
        .expect("record");

    assert!(
        Condition::eq("name", Value::Null)
            .matches(&record)
            .expect("eval")
    );
    // Ordering against NULL is never satisfied.
    assert!(!Condition::gt("qty", 5i64).matches(&record).expect("eval"));
}

//
// Round-trip property: param_count == rendered `?` count == sink length,
// in left-to-right order.
//

fn arb_atom() -> impl Strategy<Value = Condition> {
    prop_oneof![
        any::<i64>().prop_map(|n| Condition::eq("qty", n)),
        any::<i64>().prop_map(|n| Condition::gt("qty", n)),
        "[a-z]{0,8}".prop_map(|s| Condition::like("name", &format!("%{s}%"))),
        prop::collection::vec(any::<i64>(), 0..40)
            .prop_map(|ns| Condition::is_in("qty", ns.into_iter().map(Value::Int).collect::<Vec<_>>())),
        Just(Condition::eq("name", Value::Null)),
        "[a-z]{1,8}".prop_map(|s| Condition::ne("id", s.as_str()).ignore_case()),
    ]
}

fn arb_condition() -> impl Strategy<Value = Condition> {
    arb_atom().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Condition::and),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Condition::or),
            (inner.clone(), inner).prop_map(|(a, b)| Condition::combine(a, JoinOp::Or, b)),
        ]
    })
}

proptest! {
    #[test]
    fn param_count_matches_rendered_placeholders(cond in arb_condition()) {
        let model = item_model();
        let mut params = Vec::new();
        let sql = cond.render(&model, &mut params).expect("render");

        let placeholders = sql.matches('?').count();
        prop_assert_eq!(cond.param_count(), placeholders);
        prop_assert_eq!(params.len(), placeholders);
    }

    #[test]
    fn split_preserves_params_exactly(items in prop::collection::vec(any::<i64>(), 0..300)) {
        let values: Vec<Value> = items.iter().copied().map(Value::Int).collect();
        let cond = Condition::is_in("qty", values.clone());
        let split = cond.split_oversized_in(100);

        let model = item_model();
        let mut params = Vec::new();
        split.render(&model, &mut params).expect("render");

        if values.is_empty() {
            prop_assert!(params.is_empty());
        } else {
            prop_assert_eq!(params, values);
        }
    }
}

#[test]
fn operator_tokens_cover_registry() {
    // Every operator renders a token and the membership set is closed.
    for op in [
        CompareOp::Equals,
        CompareOp::NotEquals,
        CompareOp::Less,
        CompareOp::LessEq,
        CompareOp::Greater,
        CompareOp::GreaterEq,
        CompareOp::In,
        CompareOp::NotIn,
        CompareOp::Like,
        CompareOp::NotLike,
    ] {
        assert!(!op.sql_token().is_empty());
        assert_eq!(op.is_membership(), matches!(op, CompareOp::In | CompareOp::NotIn));
    }
}
