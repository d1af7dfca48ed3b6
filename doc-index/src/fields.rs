use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use serde_json::Value;

use crate::config::{parse_index_config, resolve_field_paths, Index, IndexConfig};
use crate::encode::{base36, encode, KeyValue, KEY_DELIMITER};
use crate::error::Error;

/// Entity-level marker fields stored next to the per-index key fields.
pub const ENTITY_FIELD: &str = "_e";
pub const CREATED_FIELD: &str = "_c";

/// One index's composite key, fully encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIndexKey {
    pub entity: String,
    pub index_name: String,
    /// Physical field names this key is stored under.
    pub id_field: String,
    pub pk_field: String,
    pub sk_field: String,
    /// Partition part without the trailing delimiter; relation prefixes
    /// append to this.
    pub pk_part_open: String,
    /// Full `_idPK` value, trailing delimiter included.
    pub pk: String,
    /// Joined `_idSK` value, empty when the index has no resolved SK fields.
    pub sk: String,
    /// Full `_id` value.
    pub id: String,
}

/// The physical fields to persist alongside one document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFields {
    /// Flat map merged into the stored document.
    pub index_fields: BTreeMap<String, String>,
    /// Structured view of the same keys, one entry per configured index.
    pub parsed_index_keys: Vec<ParsedIndexKey>,
}

/// Write-path entry point: computes every configured index's key fields for
/// a raw item. Pure except for the `_c` creation marker.
pub fn build_index_fields(item: &Value, config: &IndexConfig) -> Result<IndexedFields, Error> {
    let config = parse_index_config(config)?;

    let mut index_fields = BTreeMap::new();
    let mut parsed_index_keys = Vec::with_capacity(config.indexes.len());

    for index in &config.indexes {
        let pk_values = resolve_field_paths(item, &index.pk, true)?;
        let sk_values = resolve_field_paths(item, &index.sk, false)?;
        let key = join_index_key(&config.entity, index, &pk_values, &sk_values)?;

        index_fields.insert(key.pk_field.clone(), key.pk.clone());
        index_fields.insert(key.sk_field.clone(), key.sk.clone());
        index_fields.insert(key.id_field.clone(), key.id.clone());
        parsed_index_keys.push(key);
    }

    index_fields.insert(ENTITY_FIELD.to_string(), config.entity.clone());
    index_fields.insert(CREATED_FIELD.to_string(), created_marker());

    debug!(
        "built {} index keys for entity {:?}",
        parsed_index_keys.len(),
        config.entity
    );

    Ok(IndexedFields {
        index_fields,
        parsed_index_keys,
    })
}

/// Encodes and joins already-resolved PK/SK values into one index's key
/// strings. Shared by the write path and the filter parser, which is what
/// makes a filter-derived `_id` byte-identical to the stored one.
pub(crate) fn join_index_key(
    entity: &str,
    index: &Index,
    pk_values: &[KeyValue],
    sk_values: &[KeyValue],
) -> Result<ParsedIndexKey, Error> {
    let pk_tokens = encode_all(pk_values)?;
    let sk_tokens = encode_all(sk_values)?;

    let mut pk_part_open = format!("{}{KEY_DELIMITER}{}", entity, index.name);
    for token in &pk_tokens {
        pk_part_open.push(KEY_DELIMITER);
        pk_part_open.push_str(token);
    }

    let pk = format!("{pk_part_open}{KEY_DELIMITER}");
    let sk = sk_tokens.join(&KEY_DELIMITER.to_string());
    let id = format!("{pk}{sk}{KEY_DELIMITER}");

    Ok(ParsedIndexKey {
        entity: entity.to_string(),
        index_name: index.name.clone(),
        id_field: index.id_field(),
        pk_field: index.pk_field(),
        sk_field: index.sk_field(),
        pk_part_open,
        pk,
        sk,
        id,
    })
}

fn encode_all(values: &[KeyValue]) -> Result<Vec<String>, Error> {
    values.iter().map(encode).collect()
}

/// Creation marker: base-36 unix milliseconds. Only `_id` is required to be
/// deterministic; `_c` records when the fields were computed.
fn created_marker() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    base36(millis)
}
