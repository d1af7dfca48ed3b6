use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{parse_index_config, resolve_index, IndexConfig};
use crate::encode::RELATION_PRECEDES;
use crate::error::Error;
use crate::filter::{
    parse_filter, FilterKind, IndexFilterRecord, ParsedFilter, QueryOptions, SkBound, Sort,
};

/// Native identity field of the underlying store, the sort fallback when no
/// filter field is usable.
const NATIVE_ID_FIELD: &str = "_id";

/// One field/operator clause of the native filter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClause {
    pub field: String,
    pub op: ClauseOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClauseOp {
    #[serde(rename = "$eq")]
    Eq(String),
    #[serde(rename = "$gt")]
    Gt(String),
    #[serde(rename = "$gte")]
    Gte(String),
    #[serde(rename = "$lt")]
    Lt(String),
    #[serde(rename = "$lte")]
    Lte(String),
    #[serde(rename = "$startsWith")]
    StartsWith(String),
}

/// Declarative query against the underlying store: a conjunctive clause
/// list, disjoint relation-prefix alternatives, and a sort selector. A
/// document matches when every clause holds or any relation clause does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeQuery {
    /// Collection to run against: the entity name.
    pub collection: String,
    pub clauses: Vec<QueryClause>,
    pub relation_clauses: Vec<QueryClause>,
    pub sort_field: String,
    pub sort: Sort,
}

/// Translates a decomposed filter into the store's native expression.
pub fn compile(parsed: &ParsedFilter, config: &IndexConfig) -> Result<NativeQuery, Error> {
    let config = parse_index_config(config)?;
    let index = resolve_index(&config, Some(&parsed.index_name))?;

    let mut clauses = Vec::new();
    match &parsed.kind {
        FilterKind::Pinned { id } => clauses.push(QueryClause {
            field: index.id_field(),
            op: ClauseOp::Eq(id.clone()),
        }),
        FilterKind::Prefix { pk, sk_bounds } => {
            clauses.push(QueryClause {
                field: index.pk_field(),
                op: ClauseOp::Eq(pk.clone()),
            });
            for bound in sk_bounds {
                clauses.push(QueryClause {
                    field: index.sk_field(),
                    op: bound_op(bound),
                });
            }
        }
    }

    // Resume strictly past the cursor, in scan direction.
    if let Some(bound) = &parsed.cursor_bound {
        clauses.push(QueryClause {
            field: index.sk_field(),
            op: match parsed.sort {
                Sort::Asc => ClauseOp::Gt(bound.clone()),
                Sort::Desc => ClauseOp::Lt(bound.clone()),
            },
        });
    }

    // A partition hosting related sub-entities matches them through the
    // relation marker right after the open partition prefix.
    let mut relation_clauses = Vec::new();
    if !index.relations.is_empty() {
        relation_clauses.push(QueryClause {
            field: index.pk_field(),
            op: ClauseOp::StartsWith(format!("{}{RELATION_PRECEDES}", parsed.pk_part_open)),
        });
    }

    // Pinned lookups order by the full key; prefix scans by the sort-key
    // field (the partition field is constant across the result set). A
    // reserved operator marker in the field name falls back to the native
    // identity field.
    let sort_field = match &parsed.kind {
        FilterKind::Pinned { .. } => index.id_field(),
        FilterKind::Prefix { .. } => index.sk_field(),
    };
    let sort_field = if sort_field.starts_with('$') {
        NATIVE_ID_FIELD.to_string()
    } else {
        sort_field
    };

    debug!(
        "compiled query on {:?}: {} clauses, {} relation clauses",
        parsed.entity,
        clauses.len(),
        relation_clauses.len()
    );

    Ok(NativeQuery {
        collection: parsed.entity.clone(),
        clauses,
        relation_clauses,
        sort_field,
        sort: parsed.sort,
    })
}

/// Read-path entry point: parse the logical filter, then compile it.
pub fn compile_query(
    filter: &IndexFilterRecord,
    config: &IndexConfig,
    options: &QueryOptions,
) -> Result<NativeQuery, Error> {
    let parsed = parse_filter(filter, config, options)?;
    compile(&parsed, config)
}

fn bound_op(bound: &SkBound) -> ClauseOp {
    match bound {
        SkBound::Eq(token) => ClauseOp::Eq(token.clone()),
        SkBound::Gt(token) => ClauseOp::Gt(token.clone()),
        SkBound::Gte(token) => ClauseOp::Gte(token.clone()),
        SkBound::Lt(token) => ClauseOp::Lt(token.clone()),
        SkBound::Lte(token) => ClauseOp::Lte(token.clone()),
        SkBound::StartsWith(token) => ClauseOp::StartsWith(token.clone()),
    }
}
