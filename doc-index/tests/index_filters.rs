mod common;

use common::MockCollection;
use doc_index::{
    compile_query, ClauseOp, FieldCondition, Index, IndexConfig, IndexFilterRecord, QueryOptions,
    RangeOp, Sort,
};
use serde_json::{json, Value};

fn index_config() -> IndexConfig {
    IndexConfig {
        entity: "my_entity".to_string(),
        indexes: vec![Index {
            name: "_id".to_string(),
            pk: vec![".PK".to_string()],
            sk: vec![".SK".to_string()],
            relations: vec![],
        }],
    }
}

fn items() -> Vec<Value> {
    vec![
        json!({ "PK": "ranking", "SK": -0.001 }),
        json!({ "PK": "ranking", "SK": -1e-12 }),
        json!({ "PK": "ranking", "SK": 0 }),
        json!({ "PK": "ranking", "SK": 0.007 }),
        json!({ "PK": "ranking", "SK": 10000 }),
        json!({ "PK": "ranking", "SK": 11 }),
        json!({ "PK": "ranking", "SK": 2 }),
        json!({ "PK": "ranking", "SK": 33 }),
        json!({ "PK": "users", "SK": "antonio" }),
        json!({ "PK": "users", "SK": "cacau" }),
        json!({ "PK": "users", "SK": "cacau2" }),
        json!({ "PK": "users", "SK": "cacauZ" }),
        json!({ "PK": "users", "SK": "maggie" }),
        json!({ "PK": "users", "SK": "rafaela" }),
    ]
}

fn seeded() -> MockCollection {
    let config = index_config();
    let mut col = MockCollection::new();
    for item in items() {
        let mut doc = item.clone();
        doc["originalSK"] = item["SK"].clone();
        col.store(doc, &config);
    }
    col
}

fn get(col: &MockCollection, pk: &str, sk: Option<FieldCondition>) -> Vec<Value> {
    get_sorted(col, pk, sk, Sort::Asc)
}

fn get_sorted(
    col: &MockCollection,
    pk: &str,
    sk: Option<FieldCondition>,
    sort: Sort,
) -> Vec<Value> {
    let mut filter = IndexFilterRecord::new().field("PK", pk);
    if let Some(condition) = sk {
        filter = filter.field("SK", condition);
    }
    let options = QueryOptions {
        sort,
        ..QueryOptions::default()
    };
    let query = compile_query(&filter, &index_config(), &options).expect("query");
    col.find_field(&query, "originalSK")
}

fn hash_query_key(sk: impl Into<FieldCondition>) -> String {
    let filter = IndexFilterRecord::new().field("PK", "users").field("SK", sk);
    let query = compile_query(&filter, &index_config(), &QueryOptions::default()).expect("query");
    match &query.clauses[0].op {
        ClauseOp::Eq(id) => id.clone(),
        other => panic!("expected a pinned id clause, got {other:?}"),
    }
}

#[test]
fn hash_key_tokens() {
    // Pinned `_id` strings for representative sort keys; the numeric tokens
    // are part of the storage format.
    assert_eq!(
        hash_query_key(12000000000000000000000000000000000000.0),
        "my_entity⋮_id⋮users⋮71212⋮"
    );
    assert_eq!(
        hash_query_key(-0.0000000000000000000000000000000000012),
        "my_entity⋮_id⋮users⋮30z87~⋮"
    );
    assert_eq!(hash_query_key(0), "my_entity⋮_id⋮users⋮5⋮");
    assert_eq!(hash_query_key(2), "my_entity⋮_id⋮users⋮7012⋮");
    assert_eq!(hash_query_key("2"), "my_entity⋮_id⋮users⋮2⋮");
}

#[test]
fn numeric_partition_keys_encode_too() {
    let filter = IndexFilterRecord::new()
        .field("PK", 123)
        .field("SK", RangeOp::lt("abc"));
    let query = compile_query(&filter, &index_config(), &QueryOptions::default()).unwrap();
    assert_eq!(
        query.clauses[0].op,
        ClauseOp::Eq("my_entity⋮_id⋮703123⋮".to_string())
    );
}

#[test]
fn stored_and_filtered_ids_are_identical() {
    let col = seeded();
    let filter = IndexFilterRecord::new()
        .field("PK", "users")
        .field("SK", "cacau");
    let query = compile_query(&filter, &index_config(), &QueryOptions::default()).unwrap();
    let found = col.find(&query);
    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].get("_id"),
        Some(&Value::String("my_entity⋮_id⋮users⋮cacau⋮".to_string()))
    );
}

#[test]
fn empty_sort_key_condition_scans_the_partition() {
    let col = seeded();
    assert_eq!(get(&col, "users", None).len(), 6);
    assert_eq!(get(&col, "ranking", None).len(), 8);
}

#[test]
fn string_starts_with() {
    let col = seeded();
    assert_eq!(
        get(&col, "users", Some(RangeOp::starts_with("cacau").into())),
        vec![json!("cacau"), json!("cacau2"), json!("cacauZ")]
    );
}

#[test]
fn string_between() {
    let col = seeded();
    assert_eq!(
        get(&col, "users", Some(RangeOp::between("a", "cz").into())),
        vec![
            json!("antonio"),
            json!("cacau"),
            json!("cacau2"),
            json!("cacauZ")
        ]
    );
}

#[test]
fn string_between_descending_reverses() {
    let col = seeded();
    assert_eq!(
        get_sorted(
            &col,
            "users",
            Some(RangeOp::between("a", "cz").into()),
            Sort::Desc
        ),
        vec![
            json!("cacauZ"),
            json!("cacau2"),
            json!("cacau"),
            json!("antonio")
        ]
    );
}

#[test]
fn string_comparators() {
    let col = seeded();
    assert_eq!(
        get(&col, "users", Some(RangeOp::eq("cacau").into())),
        vec![json!("cacau")]
    );
    assert_eq!(
        get(&col, "users", Some(RangeOp::gt("cacau").into())),
        vec![
            json!("cacau2"),
            json!("cacauZ"),
            json!("maggie"),
            json!("rafaela")
        ]
    );
    assert_eq!(
        get(&col, "users", Some(RangeOp::gte("maggie").into())),
        vec![json!("maggie"), json!("rafaela")]
    );
    assert_eq!(
        get(&col, "users", Some(RangeOp::lt("cacau2").into())),
        vec![json!("antonio"), json!("cacau")]
    );
    assert_eq!(
        get(&col, "users", Some(RangeOp::lte("cacau2").into())),
        vec![json!("antonio"), json!("cacau"), json!("cacau2")]
    );
}

#[test]
fn numeric_between() {
    let col = seeded();
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::between(0, 2).into())),
        vec![json!(0), json!(0.007), json!(2)]
    );
    assert_eq!(
        get(
            &col,
            "ranking",
            Some(RangeOp::between(-0.1, -0.000000000001).into())
        ),
        vec![json!(-0.001), json!(-1e-12)]
    );
}

#[test]
fn numeric_eq_ignores_sign_of_zero_and_trailing_zeros() {
    let col = seeded();
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::eq(0.007).into())),
        vec![json!(0.007)]
    );
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::eq(-0.0).into())),
        vec![json!(0)]
    );
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::eq(-0.0010).into())),
        vec![json!(-0.001)]
    );
}

#[test]
fn numeric_comparators() {
    let col = seeded();
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::gt(33).into())),
        vec![json!(10000)]
    );
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::gte(33).into())),
        vec![json!(33), json!(10000)]
    );
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::lt(-0.000000000001).into())),
        vec![json!(-0.001)]
    );
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::lt(-0.001).into())),
        Vec::<Value>::new()
    );
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::lt(0.007).into())),
        vec![json!(-0.001), json!(-1e-12), json!(0)]
    );
    assert_eq!(
        get(&col, "ranking", Some(RangeOp::lte(-0.001).into())),
        vec![json!(-0.001)]
    );
    assert_eq!(get(&col, "ranking", Some(RangeOp::lte(33).into())).len(), 7);
}

#[test]
fn relation_scans_include_nested_partitions() {
    let config = IndexConfig {
        entity: "my_entity".to_string(),
        indexes: vec![Index {
            name: "_id".to_string(),
            pk: vec![".PK".to_string()],
            sk: vec![".SK".to_string()],
            relations: vec!["access_token".to_string()],
        }],
    };
    let mut col = MockCollection::new();
    col.store(json!({ "PK": "users", "SK": "antonio" }), &config);
    // A related sub-entity nested under the "users" partition.
    col.store(json!({ "PK": "users⦙tok1", "SK": "t1" }), &config);
    // A sibling partition that must stay invisible.
    col.store(json!({ "PK": "teams", "SK": "blue" }), &config);

    let filter = IndexFilterRecord::new().field("PK", "users");
    let query = compile_query(&filter, &config, &QueryOptions::default()).unwrap();
    assert_eq!(
        query.relation_clauses[0].op,
        ClauseOp::StartsWith("my_entity⋮_id⋮users⦙".to_string())
    );

    let found = col.find_field(&query, "SK");
    assert_eq!(found, vec![json!("antonio"), json!("t1")]);
}
