use doc_index::{build_index_fields, ClauseOp, IndexConfig, NativeQuery, QueryClause, Sort};
use serde_json::{Map, Value};

/// In-memory stand-in for the document store: equality and lexicographic
/// range matching over string fields plus a single-field sort, which is
/// exactly the contract the query compiler targets.
#[derive(Default)]
pub struct MockCollection {
    docs: Vec<Map<String, Value>>,
}

impl MockCollection {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self::default()
    }

    /// Builds the index fields for `item`, merges them in and stores the
    /// document, the way the write path of a transporter would.
    pub fn store(&mut self, item: Value, config: &IndexConfig) {
        let built = build_index_fields(&item, config).expect("index fields");
        let mut doc = match item {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        for (field, value) in built.index_fields {
            doc.insert(field, Value::String(value));
        }
        self.docs.push(doc);
    }

    pub fn find(&self, query: &NativeQuery) -> Vec<Map<String, Value>> {
        let mut out: Vec<Map<String, Value>> = self
            .docs
            .iter()
            .filter(|doc| matches(doc, query))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            let ord = field_str(a, &query.sort_field).cmp(field_str(b, &query.sort_field));
            match query.sort {
                Sort::Asc => ord,
                Sort::Desc => ord.reverse(),
            }
        });
        out
    }

    /// The matched documents' values at `field`, in result order.
    pub fn find_field(&self, query: &NativeQuery, field: &str) -> Vec<Value> {
        self.find(query)
            .iter()
            .map(|doc| doc.get(field).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// A document matches when every conjunctive clause holds, or when any
/// relation-prefix alternative does.
fn matches(doc: &Map<String, Value>, query: &NativeQuery) -> bool {
    if query.clauses.iter().all(|clause| clause_matches(doc, clause)) {
        return true;
    }
    query
        .relation_clauses
        .iter()
        .any(|clause| clause_matches(doc, clause))
}

fn clause_matches(doc: &Map<String, Value>, clause: &QueryClause) -> bool {
    let Some(actual) = doc.get(&clause.field).and_then(Value::as_str) else {
        return false;
    };
    match &clause.op {
        ClauseOp::Eq(expected) => actual == expected,
        ClauseOp::Gt(bound) => actual > bound.as_str(),
        ClauseOp::Gte(bound) => actual >= bound.as_str(),
        ClauseOp::Lt(bound) => actual < bound.as_str(),
        ClauseOp::Lte(bound) => actual <= bound.as_str(),
        ClauseOp::StartsWith(prefix) => actual.starts_with(prefix.as_str()),
    }
}

fn field_str<'a>(doc: &'a Map<String, Value>, field: &str) -> &'a str {
    doc.get(field).and_then(Value::as_str).unwrap_or("")
}
