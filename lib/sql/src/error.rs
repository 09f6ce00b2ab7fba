use thiserror::Error;

/// Errors surfaced by the SQL storage layer.
#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("lock error: {0}")]
    Lock(String),
}
