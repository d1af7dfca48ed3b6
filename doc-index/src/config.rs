use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encode::KeyValue;
use crate::error::Error;

/// Declarative index configuration for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub entity: String,
    pub indexes: Vec<Index>,
}

/// One composite index: ordered partition-key paths, optional ordered
/// sort-key paths, and the entities related under this partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    #[serde(rename = "PK")]
    pub pk: Vec<String>,
    #[serde(rename = "SK", default)]
    pub sk: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<String>,
}

impl Index {
    /// Physical field holding the full composite key.
    pub fn id_field(&self) -> String {
        self.name.clone()
    }

    /// Physical field holding the partition part, trailing delimiter included.
    pub fn pk_field(&self) -> String {
        format!("{}PK", self.name)
    }

    /// Physical field holding the joined sort-key tokens.
    pub fn sk_field(&self) -> String {
        format!("{}SK", self.name)
    }
}

/// Physical field names one index materializes on stored documents. The
/// caller uses these to provision native store indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFieldNames {
    pub index_name: String,
    pub id: String,
    pub pk: String,
    pub sk: String,
}

/// Normalizes and validates a raw index configuration. Idempotent: parsing
/// an already-parsed config is a no-op.
pub fn parse_index_config(raw: &IndexConfig) -> Result<IndexConfig, Error> {
    if raw.entity.is_empty() {
        return Err(Error::Config("entity name must not be empty".to_string()));
    }
    if raw.indexes.is_empty() {
        return Err(Error::Config(format!(
            "entity {:?} declares no indexes",
            raw.entity
        )));
    }

    let mut seen = HashSet::new();
    let mut indexes = Vec::with_capacity(raw.indexes.len());
    for index in &raw.indexes {
        if index.name.is_empty() {
            return Err(Error::Config("index name must not be empty".to_string()));
        }
        if !seen.insert(index.name.as_str()) {
            return Err(Error::Config(format!(
                "duplicate index name {:?}",
                index.name
            )));
        }
        if index.pk.is_empty() {
            return Err(Error::Config(format!(
                "index {:?} declares no PK fields",
                index.name
            )));
        }
        indexes.push(Index {
            name: index.name.clone(),
            pk: normalize_paths(&index.name, &index.pk)?,
            sk: normalize_paths(&index.name, &index.sk)?,
            relations: index.relations.clone(),
        });
    }

    Ok(IndexConfig {
        entity: raw.entity.clone(),
        indexes,
    })
}

/// Resolves which index a call addresses: the named one, or the sole
/// configured index when no name is given.
pub(crate) fn resolve_index<'a>(
    config: &'a IndexConfig,
    name: Option<&str>,
) -> Result<&'a Index, Error> {
    match name {
        Some(name) => config
            .indexes
            .iter()
            .find(|index| index.name == name)
            .ok_or_else(|| Error::UnknownIndex {
                name: name.to_string(),
            }),
        None if config.indexes.len() == 1 => Ok(&config.indexes[0]),
        None => Err(Error::Config(format!(
            "entity {:?} has {} indexes, an index name is required",
            config.entity,
            config.indexes.len()
        ))),
    }
}

/// The physical index field names per configured index.
pub fn index_field_names(config: &IndexConfig) -> Result<Vec<IndexFieldNames>, Error> {
    let config = parse_index_config(config)?;
    Ok(config
        .indexes
        .iter()
        .map(|index| IndexFieldNames {
            index_name: index.name.clone(),
            id: index.id_field(),
            pk: index.pk_field(),
            sk: index.sk_field(),
        })
        .collect())
}

fn normalize_paths(index_name: &str, paths: &[String]) -> Result<Vec<String>, Error> {
    paths
        .iter()
        .map(|path| {
            let normalized = normalize_path(path);
            if normalized.is_empty() {
                return Err(Error::Config(format!(
                    "index {index_name:?} declares an empty field path"
                )));
            }
            Ok(normalized.to_string())
        })
        .collect()
}

/// Leading-dot shorthand (`.PK`) is relative to the item root.
pub(crate) fn normalize_path(path: &str) -> &str {
    path.strip_prefix('.').unwrap_or(path)
}

/// Looks up each dotted path in the raw item, converting the found scalars
/// to key values. Paths resolving to `null` or nothing count as missing:
/// required (PK) lookups fail naming the first missing path, optional (SK)
/// lookups stop at it, shortening the key.
pub(crate) fn resolve_field_paths(
    item: &Value,
    paths: &[String],
    required: bool,
) -> Result<Vec<KeyValue>, Error> {
    let mut values = Vec::with_capacity(paths.len());
    for path in paths {
        match lookup_path(item, path) {
            Some(value) => values.push(scalar_value(path, value)?),
            None if required => {
                return Err(Error::MissingKeyField { path: path.clone() });
            }
            None => break,
        }
    }
    Ok(values)
}

fn lookup_path<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

fn scalar_value(path: &str, value: &Value) -> Result<KeyValue, Error> {
    match value {
        Value::String(s) => Ok(KeyValue::String(s.clone())),
        Value::Number(n) => n
            .as_f64()
            .map(KeyValue::Number)
            .ok_or_else(|| Error::UnsupportedValue(format!("number at {path:?} overflows f64"))),
        other => Err(Error::UnsupportedValue(format!(
            "field {path:?} holds a non-scalar value ({other})"
        ))),
    }
}
