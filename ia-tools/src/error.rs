use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{name}' not found")]
    UnknownOperation {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("Invalid table name {table:?}. Allowed tables: users, orders, sales")]
    InvalidTable { table: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<rusqlite::Error> for ToolError {
    fn from(e: rusqlite::Error) -> Self {
        Self::ExecutionFailed(e.to_string())
    }
}
