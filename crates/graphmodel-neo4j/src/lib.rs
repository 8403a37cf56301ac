//! Neo4j engine for graphmodel
//!
//! Implements the [`graphmodel_core::GraphEngine`] seam over the neo4rs Bolt
//! driver. Parameters are converted to Bolt values on the way out and rows
//! are converted back into [`graphmodel_core::Record`]s, so nothing above
//! this crate sees driver types.
//!
//! ```no_run
//! use graphmodel_config::ConnectionConfig;
//! use graphmodel_neo4j::Neo4jEngine;
//!
//! # async fn connect() -> Result<(), graphmodel_neo4j::Neo4jError> {
//! let engine = Neo4jEngine::connect(&ConnectionConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod engine;
pub mod error;

pub use engine::{Neo4jEngine, Neo4jTransaction};
pub use error::{Neo4jError, Neo4jResult};
