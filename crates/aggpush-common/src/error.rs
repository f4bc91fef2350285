use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Relation not found: {0}")]
    RelationNotFound(String),
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    #[error("Script compilation failed: {0}")]
    ScriptCompilation(String),
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub fn relation_not_found(name: impl Into<String>) -> Self {
        Error::RelationNotFound(name.into())
    }

    pub fn column_not_found(name: impl Into<String>) -> Self {
        Error::ColumnNotFound(name.into())
    }

    pub fn script_compilation(msg: impl Into<String>) -> Self {
        Error::ScriptCompilation(msg.into())
    }

    pub fn unsupported_expression(msg: impl Into<String>) -> Self {
        Error::UnsupportedExpression(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
