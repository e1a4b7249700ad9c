use thiserror::Error;

/// Failure reported by an [`EventStore`](crate::sink::EventStore).
///
/// The pipeline logs and counts these but never stops on them.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt {table} row: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistenceError {
    pub fn backend(err: impl ToString) -> Self {
        Self::Backend(err.to_string())
    }
}
