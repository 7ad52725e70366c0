use thiserror::Error;

/// Store-level failure.
///
/// Anything surfaced as a `DbError` is a fault: the registry never uses it for
/// expected outcomes such as "key already exists".
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
