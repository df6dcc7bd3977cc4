//! Error types for queue operations

use print_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Command model error: {0}")]
    Model(#[from] ModelError),

    #[error("Command '{command}' uses undefined variables: {}", .missing.join(", "))]
    UndefinedVariables { command: String, missing: Vec<String> },
}

pub type Result<T> = std::result::Result<T, QueueError>;
