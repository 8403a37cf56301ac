//! Query execution.
//!
//! [`QueryProvider`] renders a [`QueryModel`], runs it through the
//! transaction manager, materializes the rows and applies the terminal's
//! row selection (`first`, `single`, `last`).

use crate::materialize::{Materializer, ResultRow};
use crate::transaction::{GraphTransaction, TransactionManager};
use graphmodel_core::{GraphError, GraphResult};
use graphmodel_query::{CypherRenderer, QueryModel, QueryRenderer, RenderedQuery, RowSelection};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Renders and executes query models
#[derive(Debug)]
pub struct QueryProvider {
    renderer: CypherRenderer,
    transactions: Arc<TransactionManager>,
    log_parameters: bool,
}

impl QueryProvider {
    pub fn new(renderer: CypherRenderer, transactions: Arc<TransactionManager>) -> Self {
        Self {
            renderer,
            transactions,
            log_parameters: false,
        }
    }

    /// Include bound parameter values in debug logs
    pub fn with_parameter_logging(mut self, enabled: bool) -> Self {
        self.log_parameters = enabled;
        self
    }

    pub fn renderer(&self) -> &CypherRenderer {
        &self.renderer
    }

    /// Render without executing
    pub fn render(&self, model: &QueryModel) -> GraphResult<RenderedQuery> {
        self.renderer.render(model)
    }

    /// Run `model` in `transaction`, or in an implicit one, and return the
    /// selected rows. Rendering errors surface before any transaction is
    /// opened.
    pub async fn execute(
        &self,
        model: &QueryModel,
        transaction: Option<&GraphTransaction>,
        cancellation: &CancellationToken,
    ) -> GraphResult<Vec<ResultRow>> {
        let rendered = self.render(model)?;
        let materializer = Materializer::for_model(self.renderer.registry(), model)?;
        let entity_type = model.root.schema.type_name().to_string();
        let operation = model.terminal.name();

        if self.log_parameters {
            debug!(
                query = %rendered.text,
                parameters = ?rendered.parameters,
                "Executing query"
            );
        } else {
            debug!(query = %rendered.text, "Executing query");
        }

        let RenderedQuery {
            text,
            parameters,
            shape,
            selection,
        } = rendered;
        let target = entity_type.clone();
        let records = self
            .transactions
            .execute_in_transaction(transaction, cancellation, operation, move |tx| async move {
                tx.run(operation, &target, &text, &parameters).await
            })
            .await?;

        trace!(rows = records.len(), "Query returned");
        let rows = materializer.materialize(&shape, records)?;
        select_rows(rows, selection, model, &entity_type)
    }
}

/// Apply the terminal's row selection and its cardinality rules
fn select_rows(
    mut rows: Vec<ResultRow>,
    selection: RowSelection,
    model: &QueryModel,
    entity_type: &str,
) -> GraphResult<Vec<ResultRow>> {
    let terminal = &model.terminal;
    match selection {
        RowSelection::All => return Ok(rows),
        RowSelection::First => rows.truncate(1),
        RowSelection::Single => {
            if rows.len() > 1 {
                return Err(GraphError::multiplicity(
                    terminal.name(),
                    entity_type,
                    rows.len(),
                ));
            }
        }
        RowSelection::Last => {
            let last = rows.pop();
            rows = last.into_iter().collect();
        }
    }

    if rows.is_empty() && !terminal.or_default() {
        return Err(GraphError::not_found(terminal.name(), entity_type, None));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::Person;
    use crate::test_support::{node, MockEngine};
    use graphmodel_core::{ErrorKind, GraphValue, Record, SchemaRegistry, SessionOptions};
    use graphmodel_query::{Lambda, QueryOperator, QueryRoot, Terminal};
    use test_case::test_case;

    fn provider(engine: &MockEngine) -> QueryProvider {
        let registry = Arc::new(SchemaRegistry::default());
        let transactions = Arc::new(TransactionManager::new(
            Arc::new(engine.clone()),
            SessionOptions::default(),
        ));
        QueryProvider::new(CypherRenderer::new(registry), transactions)
    }

    fn people(terminal: Terminal) -> QueryModel {
        let registry = SchemaRegistry::default();
        let schema = registry.schema_of::<Person>().unwrap();
        QueryModel::new(QueryRoot::new(schema, Vec::new())).with_terminal(terminal)
    }

    fn person_rows(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                let person = node(
                    &["Person"],
                    [
                        ("Id", GraphValue::from(format!("p-{i}"))),
                        ("FirstName", GraphValue::from("Ann")),
                        ("LastName", GraphValue::from("Lee")),
                        ("Age", GraphValue::Int(40)),
                    ],
                );
                Record::new()
                    .with("n1", person)
                    .with("n1_complex", GraphValue::List(Vec::new()))
            })
            .collect()
    }

    #[test_case(Terminal::Single, 0, Some(ErrorKind::NotFound) ; "single with no rows")]
    #[test_case(Terminal::Single, 1, None ; "single with one row")]
    #[test_case(Terminal::Single, 2, Some(ErrorKind::MultiplicityViolation) ; "single with two rows")]
    #[test_case(Terminal::SingleOrDefault, 0, None ; "single or default with no rows")]
    #[test_case(Terminal::SingleOrDefault, 2, Some(ErrorKind::MultiplicityViolation) ; "single or default with two rows")]
    #[test_case(Terminal::First, 0, Some(ErrorKind::NotFound) ; "first with no rows")]
    #[test_case(Terminal::FirstOrDefault, 0, None ; "first or default with no rows")]
    #[test_case(Terminal::Last, 0, Some(ErrorKind::NotFound) ; "last with no rows")]
    #[tokio::test]
    async fn test_cardinality(terminal: Terminal, rows: usize, expected: Option<ErrorKind>) {
        let engine = MockEngine::new();
        engine.respond("MATCH (n1:Person)", person_rows(rows));
        let outcome = provider(&engine)
            .execute(&people(terminal), None, &CancellationToken::new())
            .await;
        assert_eq!(outcome.err().map(|err| err.kind()), expected);
    }

    #[tokio::test]
    async fn test_last_without_ordering_keeps_final_row() {
        let engine = MockEngine::new();
        engine.respond("MATCH (n1:Person)", person_rows(3));
        let rows = provider(&engine)
            .execute(&people(Terminal::Last), None, &CancellationToken::new())
            .await
            .unwrap();
        let [ResultRow::Entity(info)] = rows.as_slice() else {
            panic!("expected one entity row");
        };
        assert_eq!(info.string("Id"), Some("p-2"));
    }

    #[tokio::test]
    async fn test_render_errors_open_no_transaction() {
        let engine = MockEngine::new();
        let model = people(Terminal::ToList).with(QueryOperator::Where(Lambda::new("p", |p| {
            p.field("NoSuchMember").eq(1)
        })));
        let err = provider(&engine)
            .execute(&model, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedQuery);
        assert_eq!(engine.transactions_begun(), 0);
    }

    #[tokio::test]
    async fn test_parameters_are_bound_not_inlined() {
        let engine = MockEngine::new();
        let model = people(Terminal::ToList).with(QueryOperator::Where(Lambda::new("p", |p| {
            p.field("LastName").eq("O'Brien")
        })));
        provider(&engine)
            .execute(&model, None, &CancellationToken::new())
            .await
            .unwrap();

        let queries = engine.queries();
        assert_eq!(queries.len(), 1);
        assert!(!queries[0].text.contains("O'Brien"));
        assert!(queries[0]
            .parameters
            .values()
            .any(|value| value == &GraphValue::from("O'Brien")));
        assert_eq!(engine.commits(), 1);
    }
}
