use doc_index::{
    build_index_fields, compile_query, Error, Index, IndexConfig, IndexFilterRecord, QueryOptions,
    RangeOp, Sort,
};
use serde_json::json;

fn main() -> Result<(), Error> {
    env_logger::init();

    let config = IndexConfig {
        entity: "user".to_string(),
        indexes: vec![Index {
            name: "_id".to_string(),
            pk: vec![".tenant".to_string()],
            sk: vec![".score".to_string()],
            relations: vec![],
        }],
    };

    // Write path: compute the physical index fields to persist alongside
    // the document.
    let item = json!({ "tenant": "acme", "score": -0.001, "name": "antonio" });
    let built = build_index_fields(&item, &config)?;
    for (field, value) in &built.index_fields {
        println!("{field} = {value}");
    }

    // Read path: compile a logical range filter into the store's native
    // query expression.
    let filter = IndexFilterRecord::new()
        .field("tenant", "acme")
        .field("score", RangeOp::between(-0.1, 10));
    let query = compile_query(
        &filter,
        &config,
        &QueryOptions {
            sort: Sort::Desc,
            ..QueryOptions::default()
        },
    )?;
    println!("{}", serde_json::to_string_pretty(&query).expect("query is serializable"));

    Ok(())
}
