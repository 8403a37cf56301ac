//! Error types shared by every graphmodel crate.
//!
//! Errors are grouped into a small set of kinds (see [`ErrorKind`]) so callers
//! can tell a missing row apart from a `single()` that matched too many rows,
//! or a rejected query apart from a transaction that is no longer usable.

use thiserror::Error;

/// Error reported by a graph engine adapter.
///
/// Adapters translate their driver errors into this type; the façade then
/// wraps it in [`GraphError::Engine`] together with the operation that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    /// Human readable description from the driver
    pub message: String,
    /// Driver specific status code, when one is available
    pub code: Option<String>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// Coarse classification of a [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    UnsupportedQuery,
    NotFound,
    MultiplicityViolation,
    TransactionState,
    Engine,
    RequiredPropertyMissing,
    Serialization,
    InvalidArgument,
    InvalidOperation,
    Cancelled,
}

/// Error type for all mapping, query and transaction operations
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("Configuration error for {type_name}: {message}")]
    Configuration { type_name: String, message: String },

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error(
        "{operation}: no {entity_type} found{}",
        .id.as_ref().map(|id| format!(" with id '{id}'")).unwrap_or_default()
    )]
    NotFound {
        operation: String,
        entity_type: String,
        id: Option<String>,
    },

    #[error("{operation}: expected exactly one {entity_type} but found {found}")]
    MultiplicityViolation {
        operation: String,
        entity_type: String,
        found: usize,
    },

    #[error("Transaction error: {0}")]
    TransactionState(String),

    #[error("Engine error during {operation} on {target}: {source}")]
    Engine {
        operation: String,
        target: String,
        #[source]
        source: EngineError,
    },

    #[error("{type_name}: required property '{property}' is missing")]
    RequiredPropertyMissing { type_name: String, property: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

/// Result type used across graphmodel
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub fn configuration(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedQuery(message.into())
    }

    pub fn not_found(
        operation: impl Into<String>,
        entity_type: impl Into<String>,
        id: Option<&str>,
    ) -> Self {
        Self::NotFound {
            operation: operation.into(),
            entity_type: entity_type.into(),
            id: id.map(str::to_string),
        }
    }

    pub fn multiplicity(
        operation: impl Into<String>,
        entity_type: impl Into<String>,
        found: usize,
    ) -> Self {
        Self::MultiplicityViolation {
            operation: operation.into(),
            entity_type: entity_type.into(),
            found,
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::TransactionState(message.into())
    }

    pub fn engine(
        operation: impl Into<String>,
        target: impl Into<String>,
        source: EngineError,
    ) -> Self {
        Self::Engine {
            operation: operation.into(),
            target: target.into(),
            source,
        }
    }

    pub fn required_missing(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::RequiredPropertyMissing {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled(operation.into())
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::UnsupportedQuery(_) => ErrorKind::UnsupportedQuery,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MultiplicityViolation { .. } => ErrorKind::MultiplicityViolation,
            Self::TransactionState(_) => ErrorKind::TransactionState,
            Self::Engine { .. } => ErrorKind::Engine,
            Self::RequiredPropertyMissing { .. } => ErrorKind::RequiredPropertyMissing,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Check if the error is worth retrying in a fresh transaction
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Engine { source, .. } => source
                .code
                .as_deref()
                .is_some_and(|code| code.contains("TransientError")),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}
