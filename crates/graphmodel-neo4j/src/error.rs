//! Error types for the Neo4j adapter

use graphmodel_core::EngineError;
use thiserror::Error;

/// Neo4j adapter error type
#[derive(Error, Debug)]
pub enum Neo4jError {
    /// Connection or configuration failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// A value that has no Bolt or graphmodel counterpart
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Operation on a transaction that already finished
    #[error("Transaction already finished")]
    Finished,

    /// Underlying driver error
    #[error("Neo4j error: {0}")]
    Driver(#[from] neo4rs::Error),

    /// Row column could not be read
    #[error("Row decode error: {0}")]
    Decode(#[from] neo4rs::DeError),
}

/// Result type for adapter operations
pub type Neo4jResult<T> = Result<T, Neo4jError>;

impl From<Neo4jError> for EngineError {
    fn from(err: Neo4jError) -> Self {
        let code = match &err {
            Neo4jError::Connection(_) => "connection",
            Neo4jError::Conversion(_) | Neo4jError::Decode(_) => "conversion",
            Neo4jError::Finished => "finished",
            Neo4jError::Driver(_) => "driver",
        };
        EngineError::with_code(err.to_string(), code)
    }
}
