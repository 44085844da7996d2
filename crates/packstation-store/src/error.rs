//! # Store Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / std::io::Error / serde_json::Error                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← categorized, carries the path or entity     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BackendError (packstation-core) ← what the session reports             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use thiserror::Error;

use packstation_core::BackendError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the row (duplicate EAN, duplicate order id).
    #[error("Duplicate {field}")]
    UniqueViolation { field: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The primary audit record of an order is never overwritten.
    #[error("audit record {} already exists", .0.display())]
    RecordExists(PathBuf),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value cannot be mapped to a domain type.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// ```text
/// sqlx::Error::RowNotFound    → StoreError::NotFound
/// sqlx::Error::Database       → constraint type from the SQLite message
/// sqlx::Error::PoolTimedOut   → StoreError::PoolExhausted
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    StoreError::UniqueViolation {
                        field: field.to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    StoreError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    StoreError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Mapping into the core
// =============================================================================

pub(crate) fn catalog_error(err: StoreError) -> BackendError {
    BackendError::catalog(err)
}

pub(crate) fn audit_error(err: StoreError) -> BackendError {
    BackendError::audit(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_exists_names_path() {
        let err = StoreError::RecordExists(PathBuf::from("audit/202410/8042"));
        assert_eq!(err.to_string(), "audit record audit/202410/8042 already exists");
    }

    #[test]
    fn test_maps_to_backend_error() {
        let backend = audit_error(StoreError::RecordExists(PathBuf::from("x")));
        assert!(backend.to_string().starts_with("audit store unavailable: "));

        let backend = catalog_error(StoreError::PoolExhausted);
        assert_eq!(backend.to_string(), "catalog unavailable: Connection pool exhausted");
    }
}
