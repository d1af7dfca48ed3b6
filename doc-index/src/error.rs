#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid index config: {0}")]
    Config(String),
    #[error("missing key field: {path}")]
    MissingKeyField { path: String },
    #[error("unsupported key value: {0}")]
    UnsupportedValue(String),
    #[error("unknown index: {name}")]
    UnknownIndex { name: String },
    #[error("unsupported operator {operator} on field {path}")]
    UnsupportedOperator { operator: &'static str, path: String },
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
