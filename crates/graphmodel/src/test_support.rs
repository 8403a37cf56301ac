//! Scripted in-memory engine for tests.
//!
//! [`MockEngine`] never interprets Cypher. It records every statement per
//! transaction, answers from scripted rules matched by substring, and counts
//! lifecycle calls so tests can assert commit and rollback discipline.
//!
//! ```rust,ignore
//! let engine = MockEngine::new();
//! engine.respond("MATCH (n1:Person)", vec![Record::new().with("n1", node)]);
//! let graph = Graph::new(Arc::new(engine.clone()));
//! ```

use async_trait::async_trait;
use graphmodel_core::{
    EngineError, EngineTransaction, GraphEngine, GraphValue, NodeRecord, Parameters, Record,
    RelationshipRecord, SessionOptions,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One statement the engine received
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedQuery {
    /// Sequence number of the transaction, starting at 1
    pub transaction: usize,
    pub text: String,
    pub parameters: Parameters,
}

#[derive(Debug, Clone)]
enum Response {
    Rows(Vec<Record>),
    Error(EngineError),
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    response: Response,
    once: bool,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    queries: Vec<ExecutedQuery>,
    sessions: Vec<SessionOptions>,
    begun: usize,
    commits: usize,
    rollbacks: usize,
    closed: usize,
    fail_begin: Option<EngineError>,
    fail_commit: Option<EngineError>,
    fail_rollback: Option<EngineError>,
}

impl MockState {
    fn respond(&mut self, text: &str) -> Response {
        let matches = |rule: &Rule| text.contains(&rule.pattern);
        let position = self
            .rules
            .iter()
            .position(|rule| rule.once && matches(rule))
            .or_else(|| self.rules.iter().position(|rule| !rule.once && matches(rule)));

        match position {
            Some(index) if self.rules[index].once => self.rules.remove(index).response,
            Some(index) => self.rules[index].response.clone(),
            None => Response::Rows(Vec::new()),
        }
    }
}

/// Deterministic scripted engine
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_rule(&self, pattern: &str, response: Response, once: bool) -> &Self {
        self.state.lock().rules.push(Rule {
            pattern: pattern.to_string(),
            response,
            once,
        });
        self
    }

    /// Answer every statement containing `pattern` with `rows`
    pub fn respond(&self, pattern: &str, rows: Vec<Record>) -> &Self {
        self.add_rule(pattern, Response::Rows(rows), false)
    }

    /// Answer the next statement containing `pattern` with `rows`; one-shot
    /// rules are consulted before persistent ones
    pub fn respond_once(&self, pattern: &str, rows: Vec<Record>) -> &Self {
        self.add_rule(pattern, Response::Rows(rows), true)
    }

    /// Fail every statement containing `pattern`
    pub fn fail_on(&self, pattern: &str, error: EngineError) -> &Self {
        self.add_rule(pattern, Response::Error(error), false)
    }

    pub fn fail_begin(&self, error: EngineError) -> &Self {
        self.state.lock().fail_begin = Some(error);
        self
    }

    pub fn fail_commit(&self, error: EngineError) -> &Self {
        self.state.lock().fail_commit = Some(error);
        self
    }

    pub fn fail_rollback(&self, error: EngineError) -> &Self {
        self.state.lock().fail_rollback = Some(error);
        self
    }

    /// Every statement received, in order
    pub fn queries(&self) -> Vec<ExecutedQuery> {
        self.state.lock().queries.clone()
    }

    /// Statement texts received, in order
    pub fn query_texts(&self) -> Vec<String> {
        self.state
            .lock()
            .queries
            .iter()
            .map(|query| query.text.clone())
            .collect()
    }

    /// Statements received by transaction `transaction`
    pub fn queries_in(&self, transaction: usize) -> Vec<ExecutedQuery> {
        self.state
            .lock()
            .queries
            .iter()
            .filter(|query| query.transaction == transaction)
            .cloned()
            .collect()
    }

    /// Options of every session opened, in order
    pub fn sessions(&self) -> Vec<SessionOptions> {
        self.state.lock().sessions.clone()
    }

    pub fn transactions_begun(&self) -> usize {
        self.state.lock().begun
    }

    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().rollbacks
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.lock().closed
    }

    /// Forget recorded statements and counters; rules are kept
    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.queries.clear();
        state.sessions.clear();
        state.begun = 0;
        state.commits = 0;
        state.rollbacks = 0;
        state.closed = 0;
    }
}

#[async_trait]
impl GraphEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn begin_transaction(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn EngineTransaction>, EngineError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_begin.clone() {
            return Err(error);
        }
        state.begun += 1;
        state.sessions.push(options.clone());
        Ok(Box::new(MockTransaction {
            id: state.begun,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockTransaction {
    id: usize,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl EngineTransaction for MockTransaction {
    async fn run_query(
        &mut self,
        text: &str,
        parameters: &Parameters,
    ) -> Result<Vec<Record>, EngineError> {
        let mut state = self.state.lock();
        state.queries.push(ExecutedQuery {
            transaction: self.id,
            text: text.to_string(),
            parameters: parameters.clone(),
        });
        match state.respond(text) {
            Response::Rows(rows) => Ok(rows),
            Response::Error(error) => Err(error),
        }
    }

    async fn commit(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_commit.clone() {
            return Err(error);
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_rollback.clone() {
            return Err(error);
        }
        state.rollbacks += 1;
        Ok(())
    }

    async fn close_session(&mut self) -> Result<(), EngineError> {
        self.state.lock().closed += 1;
        Ok(())
    }
}

/// Node value as the engine would return it
pub fn node<I, K, V>(labels: &[&str], properties: I) -> NodeRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<GraphValue>,
{
    NodeRecord {
        element_id: format!("4:mock:{}", uuid::Uuid::new_v4()),
        labels: labels.iter().map(|label| label.to_string()).collect(),
        properties: properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    }
}

/// Relationship value as the engine would return it
pub fn relationship<I, K, V>(relationship_type: &str, properties: I) -> RelationshipRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<GraphValue>,
{
    RelationshipRecord {
        element_id: format!("5:mock:{}", uuid::Uuid::new_v4()),
        relationship_type: relationship_type.to_string(),
        start_element_id: String::new(),
        end_element_id: String::new(),
        properties: properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    }
}

/// One entry of a collected complex-property column
pub fn complex_entry(path: &[&str], sequence: &[i64], node: NodeRecord) -> GraphValue {
    let mut entry = BTreeMap::new();
    entry.insert(
        "path".to_string(),
        GraphValue::List(path.iter().map(|t| GraphValue::from(*t)).collect()),
    );
    entry.insert(
        "seq".to_string(),
        GraphValue::List(sequence.iter().map(|s| GraphValue::Int(*s)).collect()),
    );
    entry.insert("node".to_string(), GraphValue::Node(node));
    GraphValue::Map(entry)
}

/// One element of a traversal hops column
pub fn hop(relationship: RelationshipRecord, start: &str, end: &str) -> GraphValue {
    let mut entry = BTreeMap::new();
    entry.insert(
        "relationship".to_string(),
        GraphValue::Relationship(relationship),
    );
    entry.insert("start".to_string(), GraphValue::from(start));
    entry.insert("end".to_string(), GraphValue::from(end));
    GraphValue::Map(entry)
}
