//! [`GraphEngine`] backed by the neo4rs Bolt driver

use crate::convert::{record_from_row, to_bolt};
use crate::error::{Neo4jError, Neo4jResult};
use async_trait::async_trait;
use graphmodel_config::ConnectionConfig;
use graphmodel_core::{
    EngineError, EngineTransaction, GraphEngine, Parameters, Record, SessionOptions,
};
use neo4rs::{query, ConfigBuilder, Graph, Txn};
use tracing::{debug, info, trace};

/// Engine over a pooled Bolt connection
pub struct Neo4jEngine {
    graph: Graph,
    uri: String,
}

impl Neo4jEngine {
    /// Connect using a connection section from configuration
    pub async fn connect(config: &ConnectionConfig) -> Neo4jResult<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_deref().unwrap_or_default())
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections);
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }
        let driver_config = builder
            .build()
            .map_err(|e| Neo4jError::Connection(e.to_string()))?;

        let graph = Graph::connect(driver_config)
            .await
            .map_err(|e| Neo4jError::Connection(format!("{}: {e}", config.uri)))?;
        info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self::from_graph(graph, config.uri.clone()))
    }

    /// Wrap an already connected driver
    pub fn from_graph(graph: Graph, uri: impl Into<String>) -> Self {
        Self {
            graph,
            uri: uri.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl std::fmt::Debug for Neo4jEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jEngine").field("uri", &self.uri).finish()
    }
}

#[async_trait]
impl GraphEngine for Neo4jEngine {
    fn name(&self) -> &str {
        "neo4j"
    }

    async fn begin_transaction(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn EngineTransaction>, EngineError> {
        // The driver routes every transaction through the same pool; the
        // access mode only matters for clustered deployments.
        trace!(access_mode = ?options.access_mode, "Starting transaction");
        let txn = match &options.database {
            Some(database) => self.graph.start_txn_on(database.as_str()).await,
            None => self.graph.start_txn().await,
        }
        .map_err(Neo4jError::from)?;
        Ok(Box::new(Neo4jTransaction { txn: Some(txn) }))
    }
}

/// One open driver transaction. Finished once committed or rolled back.
pub struct Neo4jTransaction {
    txn: Option<Txn>,
}

impl Neo4jTransaction {
    fn active(&mut self) -> Neo4jResult<&mut Txn> {
        self.txn.as_mut().ok_or(Neo4jError::Finished)
    }

    async fn run(&mut self, text: &str, parameters: &Parameters) -> Neo4jResult<Vec<Record>> {
        let mut statement = query(text);
        for (name, value) in parameters {
            statement = statement.param(name.as_str(), to_bolt(value)?);
        }

        let txn = self.active()?;
        let mut stream = txn.execute(statement).await?;
        let mut records = Vec::new();
        while let Some(row) = stream.next(txn.handle()).await? {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl EngineTransaction for Neo4jTransaction {
    async fn run_query(
        &mut self,
        text: &str,
        parameters: &Parameters,
    ) -> Result<Vec<Record>, EngineError> {
        let records = self.run(text, parameters).await?;
        debug!(rows = records.len(), "Statement finished");
        Ok(records)
    }

    async fn commit(&mut self) -> Result<(), EngineError> {
        let txn = self.txn.take().ok_or(Neo4jError::Finished)?;
        txn.commit().await.map_err(Neo4jError::from)?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), EngineError> {
        let txn = self.txn.take().ok_or(Neo4jError::Finished)?;
        txn.rollback().await.map_err(Neo4jError::from)?;
        Ok(())
    }

    async fn close_session(&mut self) -> Result<(), EngineError> {
        // Dropping an unfinished transaction returns its connection to the
        // pool and the server rolls it back.
        if self.txn.take().is_some() {
            debug!("Session closed with an unfinished transaction");
        }
        Ok(())
    }
}
