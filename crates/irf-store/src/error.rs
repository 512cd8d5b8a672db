use irf_core::PersistError;
use irf_resolver::ResolveError;

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure
    #[error("database error: {0}")]
    Database(String),

    /// No row with that key
    #[error("not found: {0}")]
    NotFound(String),

    /// Key already taken
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation not allowed on this record
    #[error("protected: {0}")]
    Protected(String),

    /// Framework failed validation and was not written
    #[error(transparent)]
    Invalid(#[from] ResolveError),

    /// Column value could not be decoded
    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        /// Table name
        table: &'static str,
        /// Column name
        column: &'static str,
        /// Decoder message
        detail: String,
    },

    /// Encoding failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(e.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<StoreError> for PersistError {
    fn from(e: StoreError) -> Self {
        PersistError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violation_is_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: StoreError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[test]
    fn persist_error_keeps_message() {
        let err = PersistError::from(StoreError::NotFound("report x".into()));
        assert_eq!(err.0, "not found: report x");
    }
}
