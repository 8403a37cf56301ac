//! Transaction lifecycle.
//!
//! A [`GraphTransaction`] exclusively owns one engine transaction and the
//! session it runs in. It moves `Active → Committed | RolledBack` exactly
//! once, and the session is released exactly once afterwards. Handles are
//! cheap clones of the same transaction; dropping the last handle of a
//! transaction that is still active rolls it back on the current runtime.
//!
//! [`TransactionManager`] hands out transactions for one graph and wraps
//! operations in implicit transactions when the caller did not supply one.

use graphmodel_core::{
    EngineTransaction, GraphEngine, GraphError, GraphResult, Parameters, Record, SessionOptions,
};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

fn not_active() -> GraphError {
    GraphError::transaction("transaction not active")
}

struct TransactionInner {
    id: Uuid,
    graph_id: Uuid,
    state: Mutex<TransactionState>,
    /// `None` once the session has been released
    engine: tokio::sync::Mutex<Option<Box<dyn EngineTransaction>>>,
}

impl Drop for TransactionInner {
    fn drop(&mut self) {
        let Some(mut engine) = self.engine.get_mut().take() else {
            return;
        };
        let active = *self.state.get_mut() == TransactionState::Active;
        let id = self.id;
        if active {
            warn!(transaction = %id, "Transaction dropped while active; rolling back");
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if active {
                        if let Err(e) = engine.rollback().await {
                            warn!(transaction = %id, error = %e, "Rollback of dropped transaction failed");
                        }
                    }
                    if let Err(e) = engine.close_session().await {
                        warn!(transaction = %id, error = %e, "Failed to close session of dropped transaction");
                    }
                });
            }
            Err(_) => {
                warn!(transaction = %id, "No async runtime to release the session of a dropped transaction");
            }
        }
    }
}

/// Handle to an open graph transaction
#[derive(Clone)]
pub struct GraphTransaction {
    inner: Arc<TransactionInner>,
}

impl fmt::Debug for GraphTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphTransaction")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl GraphTransaction {
    fn new(graph_id: Uuid, engine: Box<dyn EngineTransaction>) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                id: Uuid::new_v4(),
                graph_id,
                state: Mutex::new(TransactionState::Active),
                engine: tokio::sync::Mutex::new(Some(engine)),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    pub(crate) fn graph_id(&self) -> Uuid {
        self.inner.graph_id
    }

    /// Run one statement; `operation` and `target` name the failing call in
    /// engine errors
    pub(crate) async fn run(
        &self,
        operation: &str,
        target: &str,
        text: &str,
        parameters: &Parameters,
    ) -> GraphResult<Vec<Record>> {
        if !self.is_active() {
            return Err(not_active());
        }
        let mut guard = self.inner.engine.lock().await;
        let engine = guard.as_mut().ok_or_else(not_active)?;
        engine
            .run_query(text, parameters)
            .await
            .map_err(|e| GraphError::engine(operation, target, e))
    }

    pub async fn commit(&self) -> GraphResult<()> {
        self.finish(TransactionState::Committed).await
    }

    pub async fn rollback(&self) -> GraphResult<()> {
        self.finish(TransactionState::RolledBack).await
    }

    async fn finish(&self, outcome: TransactionState) -> GraphResult<()> {
        let mut guard = self.inner.engine.lock().await;
        if !self.is_active() {
            return Err(not_active());
        }
        let mut engine = guard.take().ok_or_else(not_active)?;

        let (operation, result) = match outcome {
            TransactionState::Committed => ("commit", engine.commit().await),
            _ => ("rollback", engine.rollback().await),
        };
        if outcome == TransactionState::Committed && result.is_err() {
            // The engine may still hold server-side state for the failed commit
            if let Err(e) = engine.rollback().await {
                warn!(transaction = %self.inner.id, error = %e, "Rollback after failed commit failed");
            }
        }
        *self.inner.state.lock() = if result.is_ok() {
            outcome
        } else {
            TransactionState::RolledBack
        };
        self.release(engine).await;

        match result {
            Ok(()) => {
                info!(transaction = %self.inner.id, state = %outcome, "Transaction finished");
                Ok(())
            }
            Err(e) => Err(GraphError::engine(
                operation,
                format!("transaction {}", self.inner.id),
                e,
            )),
        }
    }

    async fn release(&self, mut engine: Box<dyn EngineTransaction>) {
        if let Err(e) = engine.close_session().await {
            warn!(transaction = %self.inner.id, error = %e, "Failed to close session");
        }
    }

    /// Roll back if still active and release the session. Idempotent;
    /// failures are logged, never returned.
    pub async fn dispose(&self) {
        let mut guard = self.inner.engine.lock().await;
        let Some(mut engine) = guard.take() else {
            return;
        };
        let was_active = {
            let mut state = self.inner.state.lock();
            let active = *state == TransactionState::Active;
            if active {
                *state = TransactionState::RolledBack;
            }
            active
        };
        if was_active {
            debug!(transaction = %self.inner.id, "Disposing active transaction");
            if let Err(e) = engine.rollback().await {
                warn!(transaction = %self.inner.id, error = %e, "Rollback during disposal failed");
            }
        }
        self.release(engine).await;
    }
}

/// A transaction in use by one operation.
///
/// Implicit leases own their transaction and finish it in
/// [`complete`](Self::complete); leases of caller-supplied transactions
/// leave it untouched.
#[derive(Debug)]
pub struct TransactionLease {
    transaction: GraphTransaction,
    implicit: bool,
}

impl TransactionLease {
    pub fn transaction(&self) -> &GraphTransaction {
        &self.transaction
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// Commit on success or roll back on failure when implicit, then
    /// dispose. The original error always wins over a rollback error.
    pub async fn complete<T>(self, outcome: GraphResult<T>) -> GraphResult<T> {
        if !self.implicit {
            return outcome;
        }
        let result = match outcome {
            Ok(value) => self.transaction.commit().await.map(|()| value),
            Err(err) => {
                if self.transaction.is_active() {
                    if let Err(rollback) = self.transaction.rollback().await {
                        warn!(transaction = %self.transaction.id(), error = %rollback, "Rollback after failure failed");
                    }
                }
                Err(err)
            }
        };
        self.transaction.dispose().await;
        result
    }
}

/// Opens and validates transactions for one graph
pub struct TransactionManager {
    graph_id: Uuid,
    engine: Arc<dyn GraphEngine>,
    options: SessionOptions,
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("graph_id", &self.graph_id)
            .field("engine", &self.engine.name())
            .field("options", &self.options)
            .finish()
    }
}

impl TransactionManager {
    pub fn new(engine: Arc<dyn GraphEngine>, options: SessionOptions) -> Self {
        Self {
            graph_id: Uuid::new_v4(),
            engine,
            options,
        }
    }

    pub fn graph_id(&self) -> Uuid {
        self.graph_id
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub async fn begin_explicit(&self) -> GraphResult<GraphTransaction> {
        let engine = self
            .engine
            .begin_transaction(&self.options)
            .await
            .map_err(|e| GraphError::engine("begin_transaction", self.engine.name(), e))?;
        let transaction = GraphTransaction::new(self.graph_id, engine);
        info!(transaction = %transaction.id(), engine = self.engine.name(), "Transaction started");
        Ok(transaction)
    }

    /// Check that a caller-supplied transaction can be used here
    pub fn validate(&self, transaction: &GraphTransaction) -> GraphResult<()> {
        if transaction.graph_id() != self.graph_id {
            return Err(GraphError::transaction(
                "transaction belongs to a different graph",
            ));
        }
        if !transaction.is_active() {
            return Err(not_active());
        }
        Ok(())
    }

    /// Lease `existing` after validating it, or open an implicit transaction
    pub async fn get_or_create_implicit(
        &self,
        existing: Option<&GraphTransaction>,
    ) -> GraphResult<TransactionLease> {
        match existing {
            Some(transaction) => {
                self.validate(transaction)?;
                Ok(TransactionLease {
                    transaction: transaction.clone(),
                    implicit: false,
                })
            }
            None => Ok(TransactionLease {
                transaction: self.begin_explicit().await?,
                implicit: true,
            }),
        }
    }

    /// Run `work` inside `existing` or a fresh implicit transaction.
    ///
    /// Implicit transactions commit when `work` succeeds and roll back when
    /// it fails or `cancellation` fires first. Caller-supplied transactions
    /// are never committed or rolled back here.
    pub async fn execute_in_transaction<T, F, Fut>(
        &self,
        existing: Option<&GraphTransaction>,
        cancellation: &CancellationToken,
        operation: &str,
        work: F,
    ) -> GraphResult<T>
    where
        F: FnOnce(GraphTransaction) -> Fut,
        Fut: Future<Output = GraphResult<T>>,
    {
        if cancellation.is_cancelled() {
            return Err(GraphError::cancelled(operation));
        }
        let lease = self.get_or_create_implicit(existing).await?;
        let transaction = lease.transaction().clone();

        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                debug!(operation, "Operation cancelled");
                Err(GraphError::cancelled(operation))
            }
            result = work(transaction) => result,
        };
        lease.complete(outcome).await
    }
}
