//! Error types for command construction and serialization

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Parameter '{0}' is not defined")]
    UndefinedParameter(String),

    #[error("Missing required parameter '{param}' for command '{command}'")]
    MissingParameter { command: String, param: String },

    #[error("Invalid value for '{param}': {reason}")]
    InvalidValue { param: String, reason: String },

    #[error("Command '{0}' cannot be attached as a component")]
    InvalidComponent(String),

    #[error("Table has no rows")]
    EmptyTable,

    #[error("Row holds {cells} cells but the table only has {columns} columns")]
    RowOverflow { columns: usize, cells: usize },

    #[error("Column '{0}' does not exist")]
    UnknownColumn(String),

    #[error("Layout break conflict: {0} has both a new page and a new column check")]
    LayoutBreakConflict(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    /// Shorthand for an `InvalidValue` error
    pub fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::InvalidValue {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
