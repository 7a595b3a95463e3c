//! Ports and Adapters Infrastructure
//!
//! Domain crates define their storage ports (the ledger and trading units of
//! work) as traits; adapters in `infra_db` or the in-memory stores implement
//! them. This module holds the pieces every port shares.
//!
//! ```text
//!   services (poster, transfer, trading, dividends, resets)
//!                        │
//!                        ▼
//!        LedgerStore / TradingStore port traits
//!                        │
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//!   PostgreSQL adapter          In-memory adapter
//! ```

use std::fmt;
use thiserror::Error;

/// Error type for port operations
///
/// All adapters report failures through this type so services can handle
/// storage problems without knowing which backend is in use.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A conditional write lost against a concurrent unit of work
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// A stored value violated a constraint
    #[error("Constraint violation: {message}")]
    Constraint {
        message: String,
    },

    /// Connection to the underlying store failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// A stored row could not be mapped to a domain value
    #[error("Transformation error: {message}")]
    Transformation {
        message: String,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a Constraint error
    pub fn constraint(message: impl Into<String>) -> Self {
        PortError::Constraint {
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a Transformation error
    pub fn transformation(message: impl Into<String>) -> Self {
        PortError::Transformation {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Conflict { .. } | PortError::Connection { .. } | PortError::Timeout { .. }
        )
    }

    /// Returns true if a concurrent writer won the race for the same row
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker trait for all domain ports
///
/// Port traits extend this marker so they can be shared across tasks.
pub trait DomainPort: Send + Sync + 'static {}
