//! Graph engine abstraction
//!
//! The mapper never talks to a database driver directly. Everything it
//! needs is expressed through these two traits: open a transaction, run
//! parameterized Cypher inside it, then commit or roll back.
//!
//! ## Implementations
//!
//! - `Neo4jEngine` (in graphmodel-neo4j) - Bolt driver backed engine
//! - `MockEngine` (in graphmodel, feature `test-utils`) - scripted responses for tests

use crate::error::EngineError;
use crate::value::{Parameters, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Session access mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    #[default]
    Write,
}

/// Options used when opening an engine session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Target database; `None` uses the server default
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub access_mode: AccessMode,
}

impl SessionOptions {
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_access_mode(mut self, access_mode: AccessMode) -> Self {
        self.access_mode = access_mode;
        self
    }
}

/// A graph database that can open transactions
#[async_trait]
pub trait GraphEngine: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Open a session and start a transaction in it
    async fn begin_transaction(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn EngineTransaction>, EngineError>;
}

/// An open engine transaction.
///
/// `commit` and `rollback` end the transaction; `close_session` releases the
/// session that owns it and is called exactly once after either.
#[async_trait]
pub trait EngineTransaction: Send {
    /// Run one statement and collect every row
    async fn run_query(
        &mut self,
        text: &str,
        parameters: &Parameters,
    ) -> Result<Vec<Record>, EngineError>;

    async fn commit(&mut self) -> Result<(), EngineError>;

    async fn rollback(&mut self) -> Result<(), EngineError>;

    async fn close_session(&mut self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mode_serde() {
        assert_eq!(serde_json::to_string(&AccessMode::Read).unwrap(), "\"read\"");
        let parsed: SessionOptions =
            serde_json::from_str(r#"{"database":"movies","access_mode":"write"}"#).unwrap();
        assert_eq!(
            parsed,
            SessionOptions::default().with_database("movies")
        );
    }
}
