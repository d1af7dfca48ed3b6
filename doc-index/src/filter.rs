use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{normalize_path, parse_index_config, resolve_index, Index, IndexConfig};
use crate::encode::{encode, KeyValue, KEY_DELIMITER};
use crate::error::Error;
use crate::fields::{join_index_key, ParsedIndexKey};

/// Range condition over the sort key. `$startsWith` is only valid for
/// string-typed sort key positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RangeOp {
    #[serde(rename = "$eq")]
    Eq(KeyValue),
    #[serde(rename = "$gt")]
    Gt(KeyValue),
    #[serde(rename = "$gte")]
    Gte(KeyValue),
    #[serde(rename = "$lt")]
    Lt(KeyValue),
    #[serde(rename = "$lte")]
    Lte(KeyValue),
    #[serde(rename = "$between")]
    Between(KeyValue, KeyValue),
    #[serde(rename = "$startsWith")]
    StartsWith(KeyValue),
}

impl RangeOp {
    pub fn eq(value: impl Into<KeyValue>) -> Self {
        RangeOp::Eq(value.into())
    }

    pub fn gt(value: impl Into<KeyValue>) -> Self {
        RangeOp::Gt(value.into())
    }

    pub fn gte(value: impl Into<KeyValue>) -> Self {
        RangeOp::Gte(value.into())
    }

    pub fn lt(value: impl Into<KeyValue>) -> Self {
        RangeOp::Lt(value.into())
    }

    pub fn lte(value: impl Into<KeyValue>) -> Self {
        RangeOp::Lte(value.into())
    }

    pub fn between(low: impl Into<KeyValue>, high: impl Into<KeyValue>) -> Self {
        RangeOp::Between(low.into(), high.into())
    }

    pub fn starts_with(value: impl Into<KeyValue>) -> Self {
        RangeOp::StartsWith(value.into())
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            RangeOp::Eq(_) => "$eq",
            RangeOp::Gt(_) => "$gt",
            RangeOp::Gte(_) => "$gte",
            RangeOp::Lt(_) => "$lt",
            RangeOp::Lte(_) => "$lte",
            RangeOp::Between(_, _) => "$between",
            RangeOp::StartsWith(_) => "$startsWith",
        }
    }
}

/// One filter entry: either a pinned scalar or a range operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldCondition {
    Value(KeyValue),
    Op(RangeOp),
}

impl From<KeyValue> for FieldCondition {
    fn from(value: KeyValue) -> Self {
        FieldCondition::Value(value)
    }
}

impl From<RangeOp> for FieldCondition {
    fn from(op: RangeOp) -> Self {
        FieldCondition::Op(op)
    }
}

impl From<&str> for FieldCondition {
    fn from(value: &str) -> Self {
        FieldCondition::Value(value.into())
    }
}

impl From<String> for FieldCondition {
    fn from(value: String) -> Self {
        FieldCondition::Value(value.into())
    }
}

impl From<f64> for FieldCondition {
    fn from(value: f64) -> Self {
        FieldCondition::Value(value.into())
    }
}

impl From<i64> for FieldCondition {
    fn from(value: i64) -> Self {
        FieldCondition::Value(value.into())
    }
}

impl From<i32> for FieldCondition {
    fn from(value: i32) -> Self {
        FieldCondition::Value(value.into())
    }
}

/// Logical filter over an index's key fields, keyed by field path, e.g.
/// `{ "PK": "users", "SK": { "$gt": 2 } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexFilterRecord {
    pub fields: BTreeMap<String, FieldCondition>,
}

impl IndexFilterRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, path: impl Into<String>, condition: impl Into<FieldCondition>) -> Self {
        self.fields.insert(path.into(), condition.into());
        self
    }
}

/// Result ordering over the sort key. Ascending unless asked otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

/// Pagination cursor: the `_id` of the last seen document, or a
/// filter-shaped record pinning its PK/SK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    Id(String),
    Record(IndexFilterRecord),
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub index_name: Option<String>,
    pub after: Option<Cursor>,
    pub sort: Sort,
}

/// Encoded bound over the joined `_idSK` value.
#[derive(Debug, Clone, PartialEq)]
pub enum SkBound {
    Eq(String),
    Gt(String),
    Gte(String),
    Lt(String),
    Lte(String),
    StartsWith(String),
}

/// Decomposition of one logical filter against one index.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// Every key field pinned: a single equality on the full `_id`.
    Pinned { id: String },
    /// Partition pinned, sort key constrained (or not) by encoded bounds.
    Prefix { pk: String, sk_bounds: Vec<SkBound> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFilter {
    pub entity: String,
    pub index_name: String,
    /// Partition part without its trailing delimiter, the base for
    /// relation-prefix clauses.
    pub pk_part_open: String,
    pub kind: FilterKind,
    /// Exclusive resume bound over `_idSK`, already encoded.
    pub cursor_bound: Option<String>,
    pub sort: Sort,
}

/// Read-path decomposition: resolves the index, re-encodes the filter's key
/// values exactly like the write path, and classifies the filter as an
/// exact-key lookup or a PK-prefix range scan.
pub fn parse_filter(
    filter: &IndexFilterRecord,
    config: &IndexConfig,
    options: &QueryOptions,
) -> Result<ParsedFilter, Error> {
    let config = parse_index_config(config)?;
    let index = resolve_index(&config, options.index_name.as_deref())?;

    let conditions = normalized_conditions(filter)?;
    reject_unknown_fields(&conditions, index)?;

    let pk_values = pinned_values(&conditions, &index.pk, |path| Error::MissingKeyField {
        path: path.to_string(),
    })?;
    let (sk_scalars, sk_op) = sort_key_conditions(&conditions, index)?;

    let key = join_index_key(&config.entity, index, &pk_values, &sk_scalars)?;

    let mut kind = match sk_op {
        Some((op, path)) => FilterKind::Prefix {
            pk: key.pk.clone(),
            sk_bounds: operator_bounds(op, path, &key.sk)?,
        },
        None if sk_scalars.len() == index.sk.len() => FilterKind::Pinned {
            id: key.id.clone(),
        },
        None if sk_scalars.is_empty() => FilterKind::Prefix {
            pk: key.pk.clone(),
            sk_bounds: Vec::new(),
        },
        // A strict scalar prefix of the sort key pins its leading components.
        None => FilterKind::Prefix {
            pk: key.pk.clone(),
            sk_bounds: vec![SkBound::StartsWith(format!("{}{KEY_DELIMITER}", key.sk))],
        },
    };

    let cursor_bound = match &options.after {
        Some(after) => {
            // A comparator needs `_idSK` to apply to, so a pinned lookup
            // degrades to the equivalent prefix form.
            if let FilterKind::Pinned { .. } = kind {
                kind = FilterKind::Prefix {
                    pk: key.pk.clone(),
                    sk_bounds: vec![SkBound::Eq(key.sk.clone())],
                };
            }
            Some(cursor_sort_key(after, &config, index, &key)?)
        }
        None => None,
    };

    debug!(
        "parsed filter on {}/{} as {}",
        config.entity,
        index.name,
        match &kind {
            FilterKind::Pinned { .. } => "pinned lookup",
            FilterKind::Prefix { .. } => "prefix scan",
        }
    );

    Ok(ParsedFilter {
        entity: config.entity.clone(),
        index_name: index.name.clone(),
        pk_part_open: key.pk_part_open,
        kind,
        cursor_bound,
        sort: options.sort,
    })
}

fn normalized_conditions(
    filter: &IndexFilterRecord,
) -> Result<BTreeMap<&str, &FieldCondition>, Error> {
    let mut conditions = BTreeMap::new();
    for (path, condition) in &filter.fields {
        if conditions.insert(normalize_path(path), condition).is_some() {
            return Err(Error::Config(format!("duplicate filter field {path:?}")));
        }
    }
    Ok(conditions)
}

fn reject_unknown_fields(
    conditions: &BTreeMap<&str, &FieldCondition>,
    index: &Index,
) -> Result<(), Error> {
    for path in conditions.keys() {
        let known = index.pk.iter().chain(&index.sk).any(|p| p == path);
        if !known {
            return Err(Error::Config(format!(
                "field {path:?} is not part of index {:?}",
                index.name
            )));
        }
    }
    Ok(())
}

/// Every path must be bound to a plain scalar; operators never apply to the
/// partition key.
fn pinned_values(
    conditions: &BTreeMap<&str, &FieldCondition>,
    paths: &[String],
    missing: impl Fn(&str) -> Error,
) -> Result<Vec<KeyValue>, Error> {
    let mut values = Vec::with_capacity(paths.len());
    for path in paths {
        match conditions.get(path.as_str()) {
            Some(FieldCondition::Value(value)) => values.push(value.clone()),
            Some(FieldCondition::Op(op)) => {
                return Err(Error::UnsupportedOperator {
                    operator: op.name(),
                    path: path.clone(),
                });
            }
            None => return Err(missing(path)),
        }
    }
    Ok(values)
}

/// Walks the sort key paths in declared order: scalars pin a leading prefix,
/// then at most one range operator, then nothing.
fn sort_key_conditions<'a, 'i>(
    conditions: &BTreeMap<&str, &'a FieldCondition>,
    index: &'i Index,
) -> Result<(Vec<KeyValue>, Option<(&'a RangeOp, &'i str)>), Error> {
    let mut scalars = Vec::new();
    let mut op: Option<(&RangeOp, &str)> = None;
    let mut stopped_at: Option<&str> = None;

    for path in &index.sk {
        let condition = conditions.get(path.as_str());
        if let Some(stop) = stopped_at {
            if condition.is_some() {
                return Err(Error::Config(format!(
                    "sort key field {path:?} cannot be constrained after {stop:?} left the key prefix open"
                )));
            }
            continue;
        }
        match condition {
            Some(FieldCondition::Value(value)) => scalars.push(value.clone()),
            Some(FieldCondition::Op(range_op)) => {
                op = Some((range_op, path.as_str()));
                stopped_at = Some(path.as_str());
            }
            None => stopped_at = Some(path.as_str()),
        }
    }

    Ok((scalars, op))
}

/// Encodes one range operator into bounds over the joined `_idSK`. When
/// scalar conditions pin a leading prefix, comparators additionally pin it
/// with a `StartsWith` so neighbouring prefixes stay out of range.
fn operator_bounds(op: &RangeOp, path: &str, prefix: &str) -> Result<Vec<SkBound>, Error> {
    let joined = |token: String| -> String {
        if prefix.is_empty() {
            token
        } else {
            format!("{prefix}{KEY_DELIMITER}{token}")
        }
    };
    let prefix_bound = || -> Option<SkBound> {
        if prefix.is_empty() {
            None
        } else {
            Some(SkBound::StartsWith(format!("{prefix}{KEY_DELIMITER}")))
        }
    };

    let mut bounds = Vec::with_capacity(3);
    match op {
        RangeOp::Eq(value) => bounds.push(SkBound::Eq(joined(encode(value)?))),
        RangeOp::Gt(value) => {
            bounds.extend(prefix_bound());
            bounds.push(SkBound::Gt(joined(encode(value)?)));
        }
        RangeOp::Gte(value) => {
            bounds.extend(prefix_bound());
            bounds.push(SkBound::Gte(joined(encode(value)?)));
        }
        RangeOp::Lt(value) => {
            bounds.extend(prefix_bound());
            bounds.push(SkBound::Lt(joined(encode(value)?)));
        }
        RangeOp::Lte(value) => {
            bounds.extend(prefix_bound());
            bounds.push(SkBound::Lte(joined(encode(value)?)));
        }
        RangeOp::Between(low, high) => {
            match low.try_cmp(high) {
                None => {
                    return Err(Error::InvalidRange(format!(
                        "$between bounds on {path:?} mix {} and {}",
                        low.type_name(),
                        high.type_name()
                    )));
                }
                Some(std::cmp::Ordering::Greater) => {
                    return Err(Error::InvalidRange(format!(
                        "$between lower bound on {path:?} is above its upper bound"
                    )));
                }
                Some(_) => {}
            }
            bounds.extend(prefix_bound());
            bounds.push(SkBound::Gte(joined(encode(low)?)));
            bounds.push(SkBound::Lte(joined(encode(high)?)));
        }
        RangeOp::StartsWith(value) => match value {
            KeyValue::String(s) => bounds.push(SkBound::StartsWith(joined(s.clone()))),
            KeyValue::Number(_) => {
                return Err(Error::UnsupportedOperator {
                    operator: op.name(),
                    path: path.to_string(),
                });
            }
        },
    }
    Ok(bounds)
}

/// Derives the exclusive `_idSK` resume bound from an `after` cursor, via
/// the same encoding as the filter itself.
fn cursor_sort_key(
    after: &Cursor,
    config: &IndexConfig,
    index: &Index,
    key: &ParsedIndexKey,
) -> Result<String, Error> {
    match after {
        Cursor::Id(id) => id
            .strip_prefix(&key.pk)
            .and_then(|rest| rest.strip_suffix(KEY_DELIMITER))
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidCursor(format!(
                    "cursor {id:?} does not belong to partition {:?}",
                    key.pk
                ))
            }),
        Cursor::Record(record) => {
            let conditions = normalized_conditions(record)?;
            let invalid =
                |path: &str| Error::InvalidCursor(format!("cursor record misses field {path:?}"));
            let pk_values = pinned_values(&conditions, &index.pk, invalid)?;
            let sk_values = pinned_values(&conditions, &index.sk, invalid)?;
            let cursor_key = join_index_key(&config.entity, index, &pk_values, &sk_values)?;
            if cursor_key.pk != key.pk {
                return Err(Error::InvalidCursor(format!(
                    "cursor partition {:?} does not match filter partition {:?}",
                    cursor_key.pk, key.pk
                )));
            }
            Ok(cursor_key.sk)
        }
    }
}
