mod config;
mod encode;
mod error;
mod fields;
mod filter;
mod query;

pub use config::{index_field_names, parse_index_config, Index, IndexConfig, IndexFieldNames};
pub use encode::{encode, KeyValue, KEY_DELIMITER, RELATION_PRECEDES};
pub use error::Error;
pub use fields::{
    build_index_fields, IndexedFields, ParsedIndexKey, CREATED_FIELD, ENTITY_FIELD,
};
pub use filter::{
    parse_filter, Cursor, FieldCondition, FilterKind, IndexFilterRecord, ParsedFilter,
    QueryOptions, RangeOp, SkBound, Sort,
};
pub use query::{compile, compile_query, ClauseOp, NativeQuery, QueryClause};

/// Registration entry for one entity's index configuration.
pub struct EntityIndexMeta {
    pub entity: &'static str,
    pub config: fn() -> IndexConfig,
}

impl std::fmt::Debug for EntityIndexMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EntityIndexMeta {{ entity: {}, indexes: {:?} }}",
            self.entity,
            (self.config)()
                .indexes
                .iter()
                .map(|index| index.name.clone())
                .collect::<Vec<_>>()
        )
    }
}

inventory::collect!(EntityIndexMeta);

/// All entity index configurations registered in the running process,
/// keyed by entity name.
pub fn registered_entities() -> std::collections::HashMap<&'static str, IndexConfig> {
    inventory::iter::<EntityIndexMeta>()
        .map(|meta| (meta.entity, (meta.config)()))
        .collect()
}
