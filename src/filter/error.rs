use thiserror::Error;

/// Rejections raised while compiling a JSON filter. Every variant is a
/// client mistake and maps to a 400.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unknown table: {0}")]
    InvalidTableName(String),

    #[error("Unknown or unsafe column: {0}")]
    InvalidColumn(String),

    #[error("Malformed filter clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    #[error("Bad operand for filter operator: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid page window: {0}")]
    InvalidWindow(String),
}
