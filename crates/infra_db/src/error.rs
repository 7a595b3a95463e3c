//! Database error types
//!
//! Errors raised by the PostgreSQL adapter and their mapping onto the
//! backend-neutral `PortError`.

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure or deadlock; the unit of work may be retried
    #[error("Concurrent update: {0}")]
    Conflict(String),

    /// Transaction error
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row does not map to a domain value
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Share", "SHR-123");
    /// assert!(error.to_string().contains("Share"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }
}

/// Maps SQLx errors onto specific variants by PostgreSQL error code
///
/// See <https://www.postgresql.org/docs/current/errcodes-appendix.html>
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(e) => DatabaseError::ConnectionFailed(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") | Some("23502") => DatabaseError::ConstraintViolation(message),
                    Some("40001") | Some("40P01") => DatabaseError::Conflict(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<DatabaseError> for PortError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(msg) => PortError::NotFound {
                entity_type: "Entity".to_string(),
                id: msg,
            },
            DatabaseError::Conflict(msg) => PortError::conflict(msg),
            DatabaseError::DuplicateEntry(msg)
            | DatabaseError::ForeignKeyViolation(msg)
            | DatabaseError::ConstraintViolation(msg) => PortError::constraint(msg),
            DatabaseError::ConnectionFailed(msg) => PortError::connection(msg),
            DatabaseError::PoolExhausted => PortError::connection("Connection pool exhausted"),
            DatabaseError::SerializationError(msg) => PortError::transformation(msg),
            DatabaseError::SqlError(e) => PortError::from(DatabaseError::from(&e)),
            other => PortError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = DatabaseError::from(&sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
        assert!(PortError::from(err).is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let err = DatabaseError::from(&sqlx::Error::PoolTimedOut);
        assert!(err.is_connection_error());
        assert!(PortError::from(err).is_transient());
    }

    #[test]
    fn test_conflict_maps_to_port_conflict() {
        let err = DatabaseError::Conflict("could not serialize access".into());
        assert!(err.is_conflict());
        assert!(PortError::from(err).is_conflict());
    }

    #[test]
    fn test_wrapped_sql_error_is_classified() {
        let err = DatabaseError::SqlError(sqlx::Error::PoolTimedOut);
        assert!(matches!(PortError::from(err), PortError::Connection { .. }));
    }

    #[test]
    fn test_constraint_variants_map_to_port_constraint() {
        let err = DatabaseError::ConstraintViolation("shares_balance_check".into());
        assert!(err.is_constraint_violation());
        assert!(matches!(PortError::from(err), PortError::Constraint { .. }));
    }
}
