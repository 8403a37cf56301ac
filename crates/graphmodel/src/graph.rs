//! The [`Graph`] façade: entity CRUD, transactions and query roots.
//!
//! Every operation takes an optional caller transaction. Without one the
//! operation runs in an implicit transaction that commits on success and
//! rolls back on failure.

use crate::complex::ComplexPropertyManager;
use crate::provider::QueryProvider;
use crate::queryable::{NodeQuery, Query, RelationshipQuery};
use crate::transaction::{GraphTransaction, TransactionManager};
use graphmodel_config::GraphModelConfig;
use graphmodel_core::naming::{DEFAULT_DEPTH_ALLOWED, PROPERTY_RELATIONSHIP_PREFIX};
use graphmodel_core::{
    GraphEngine, GraphEntity, GraphError, GraphResult, GraphValue, MappingTable, NodeEntity,
    Parameters, Record, RelationshipEntity, SchemaRegistry, SerializerRegistry, SessionOptions,
    ID_PROPERTY,
};
use graphmodel_query::render::quote_identifier;
use graphmodel_query::{CypherRenderer, QueryModel, QueryRoot};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

pub(crate) struct GraphInner {
    schemas: Arc<SchemaRegistry>,
    serializers: SerializerRegistry,
    transactions: Arc<TransactionManager>,
    provider: QueryProvider,
    complex: ComplexPropertyManager,
}

/// Entry point for mapping typed entities onto a graph engine.
///
/// Cloning is cheap; clones share registries and the transaction manager.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
    cancellation: CancellationToken,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id())
            .field("engine", &self.inner.transactions.engine_name())
            .field("complex_depth", &self.inner.complex.depth())
            .finish()
    }
}

/// Assembles a [`Graph`]
pub struct GraphBuilder {
    engine: Arc<dyn GraphEngine>,
    mapping: MappingTable,
    session: SessionOptions,
    complex_depth: usize,
    traversal_limit: Option<usize>,
    log_parameters: bool,
}

impl GraphBuilder {
    pub fn mapping(mut self, mapping: MappingTable) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn session_options(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    /// How deep complex properties are read, written and deleted
    pub fn complex_property_depth(mut self, depth: usize) -> Self {
        self.complex_depth = depth;
        self
    }

    /// Upper bound on the summed depth of a query's traversal steps
    pub fn traversal_limit(mut self, limit: Option<usize>) -> Self {
        self.traversal_limit = limit;
        self
    }

    /// Include parameter values in query debug logs
    pub fn log_parameters(mut self, enabled: bool) -> Self {
        self.log_parameters = enabled;
        self
    }

    pub fn build(self) -> Graph {
        let schemas = Arc::new(SchemaRegistry::new(self.mapping));
        let serializers = SerializerRegistry::new(schemas.clone());
        let transactions = Arc::new(TransactionManager::new(self.engine, self.session));
        let renderer = CypherRenderer::new(schemas.clone())
            .with_complex_depth(self.complex_depth)
            .with_traversal_limit(self.traversal_limit);
        let provider = QueryProvider::new(renderer, transactions.clone())
            .with_parameter_logging(self.log_parameters);

        let graph = Graph {
            inner: Arc::new(GraphInner {
                schemas,
                serializers,
                transactions,
                provider,
                complex: ComplexPropertyManager::new(self.complex_depth),
            }),
            cancellation: CancellationToken::new(),
        };
        debug!(graph = %graph.id(), engine = graph.inner.transactions.engine_name(), "Graph created");
        graph
    }
}

fn require_id(operation: &str, entity_type: &str, id: &str) -> GraphResult<()> {
    if id.trim().is_empty() {
        return Err(GraphError::invalid_argument(format!(
            "{operation}: {entity_type} identifier must not be empty"
        )));
    }
    Ok(())
}

fn int_column(records: &[Record], column: &str) -> i64 {
    records
        .first()
        .and_then(|record| record.get(column))
        .and_then(GraphValue::as_i64)
        .unwrap_or(0)
}

fn id_parameters(id: &str) -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("id".to_string(), GraphValue::from(id));
    parameters
}

fn label_pattern(labels: &[String]) -> String {
    labels
        .iter()
        .map(|label| format!(":{}", quote_identifier(label)))
        .collect()
}

impl Graph {
    /// A graph with default mapping and session settings
    pub fn new(engine: Arc<dyn GraphEngine>) -> Self {
        Self::builder(engine).build()
    }

    pub fn builder(engine: Arc<dyn GraphEngine>) -> GraphBuilder {
        GraphBuilder {
            engine,
            mapping: MappingTable::default(),
            session: SessionOptions::default(),
            complex_depth: DEFAULT_DEPTH_ALLOWED,
            traversal_limit: None,
            log_parameters: false,
        }
    }

    /// Build from loaded configuration after validating it
    pub fn from_config(engine: Arc<dyn GraphEngine>, config: &GraphModelConfig) -> GraphResult<Self> {
        config.validate()?;
        Ok(Self::builder(engine)
            .mapping(config.mapping.to_mapping_table())
            .session_options(config.session_options())
            .complex_property_depth(config.query.complex_property_depth)
            .traversal_limit(config.query.traversal_limit)
            .log_parameters(config.query.log_parameters)
            .build())
    }

    /// Identifier that ties transactions to this graph
    pub fn id(&self) -> Uuid {
        self.inner.transactions.graph_id()
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.inner.schemas
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.inner.serializers
    }

    pub(crate) fn provider(&self) -> &QueryProvider {
        &self.inner.provider
    }

    pub(crate) fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Make queries for `Base` also match nodes labelled as `Sub`
    pub fn register_subtype<Base: GraphEntity, Sub: GraphEntity>(&self) {
        self.inner.schemas.register_subtype::<Base, Sub>();
    }

    /// A handle whose operations observe `cancellation`
    pub fn with_cancellation(&self, cancellation: CancellationToken) -> Self {
        Self {
            inner: self.inner.clone(),
            cancellation,
        }
    }

    pub async fn begin_transaction(&self) -> GraphResult<GraphTransaction> {
        if self.cancellation.is_cancelled() {
            return Err(GraphError::cancelled("begin_transaction"));
        }
        self.inner.transactions.begin_explicit().await
    }

    /// Query nodes of `T`, including registered subtypes
    pub fn nodes<T: NodeEntity>(&self) -> NodeQuery<T> {
        let model = self.inner.schemas.schema_of::<T>().map(|schema| {
            let labels = self.inner.schemas.polymorphic_labels(&schema);
            QueryModel::new(QueryRoot::new(schema, labels))
        });
        Query::new(self.clone(), model)
    }

    /// Query relationships of `T`
    pub fn relationships<T: RelationshipEntity>(&self) -> RelationshipQuery<T> {
        let model = self
            .inner
            .schemas
            .schema_of::<T>()
            .map(|schema| QueryModel::new(QueryRoot::new(schema, Vec::new())));
        Query::new(self.clone(), model)
    }

    async fn in_transaction<T, F, Fut>(
        &self,
        transaction: Option<&GraphTransaction>,
        operation: &str,
        work: F,
    ) -> GraphResult<T>
    where
        F: FnOnce(GraphTransaction) -> Fut,
        Fut: std::future::Future<Output = GraphResult<T>>,
    {
        self.inner
            .transactions
            .execute_in_transaction(transaction, &self.cancellation, operation, work)
            .await
    }

    /// Store a new node and its complex properties
    #[instrument(skip(self, entity, transaction), fields(entity_type = T::type_name(), id = entity.entity_id()))]
    pub async fn create_node<T: NodeEntity>(
        &self,
        entity: &T,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<()> {
        const OPERATION: &str = "create_node";
        let schema = self.inner.schemas.schema_of::<T>()?;
        let id = entity.entity_id();
        require_id(OPERATION, schema.type_name(), id)?;
        let info = self.inner.serializers.serialize(entity)?;

        let text = format!("CREATE (n{} $properties)", label_pattern(schema.labels()));
        let mut parameters = Parameters::new();
        parameters.insert(
            "properties".to_string(),
            GraphValue::Map(info.storage_properties(&schema)),
        );

        let complex = self.inner.complex;
        let (schema, info) = (&schema, &info);
        self.in_transaction(transaction, OPERATION, |tx| async move {
            tx.run(OPERATION, schema.type_name(), &text, &parameters).await?;
            complex
                .write_complex_properties(schema.label(), id, info, &tx)
                .await?;
            Ok(())
        })
        .await
    }

    /// Load the node of `T` with `id`
    #[instrument(skip(self, transaction), fields(entity_type = T::type_name()))]
    pub async fn get_node<T: NodeEntity>(
        &self,
        id: &str,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<T> {
        require_id("get_node", T::type_name(), id)?;
        let mut query = self.nodes::<T>().filter(|p| p.field(ID_PROPERTY).eq(id));
        if let Some(tx) = transaction {
            query = query.in_transaction(tx);
        }
        query
            .first_or_default()
            .await?
            .ok_or_else(|| GraphError::not_found("get_node", T::type_name(), Some(id)))
    }

    /// Overwrite the stored properties of an existing node and replace its
    /// complex properties
    #[instrument(skip(self, entity, transaction), fields(entity_type = T::type_name(), id = entity.entity_id()))]
    pub async fn update_node<T: NodeEntity>(
        &self,
        entity: &T,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<()> {
        const OPERATION: &str = "update_node";
        let schema = self.inner.schemas.schema_of::<T>()?;
        let id = entity.entity_id();
        require_id(OPERATION, schema.type_name(), id)?;
        let info = self.inner.serializers.serialize(entity)?;

        let text = format!(
            "MATCH (n:{} {{{ID_PROPERTY}: $id}})\nSET n = $properties\nRETURN count(n) AS updated",
            quote_identifier(schema.label())
        );
        let mut parameters = id_parameters(id);
        parameters.insert(
            "properties".to_string(),
            GraphValue::Map(info.storage_properties(&schema)),
        );

        let complex = self.inner.complex;
        let (schema, info) = (&schema, &info);
        self.in_transaction(transaction, OPERATION, |tx| async move {
            let records = tx.run(OPERATION, schema.type_name(), &text, &parameters).await?;
            if int_column(&records, "updated") == 0 {
                return Err(GraphError::not_found(OPERATION, schema.type_name(), Some(id)));
            }
            if schema.has_complex_properties() {
                complex
                    .update_complex_properties(schema.label(), id, info, &tx)
                    .await?;
            }
            Ok(())
        })
        .await
    }

    /// Delete a node and its complex properties. Without `cascade` a node
    /// that still has relationships is left alone and the call fails.
    #[instrument(skip(self, transaction), fields(entity_type = T::type_name()))]
    pub async fn delete_node<T: NodeEntity>(
        &self,
        id: &str,
        cascade: bool,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<()> {
        const OPERATION: &str = "delete_node";
        let schema = self.inner.schemas.schema_of::<T>()?;
        require_id(OPERATION, schema.type_name(), id)?;

        let label = quote_identifier(schema.label()).into_owned();
        let inspect = format!(
            "MATCH (n:{label} {{{ID_PROPERTY}: $id}})\n\
             OPTIONAL MATCH (n)-[rel]-()\n\
             WHERE NOT type(rel) STARTS WITH $prefix\n\
             RETURN count(DISTINCT n) AS nodes, count(rel) AS relationships"
        );
        let mut inspect_parameters = id_parameters(id);
        inspect_parameters.insert(
            "prefix".to_string(),
            GraphValue::from(PROPERTY_RELATIONSHIP_PREFIX),
        );
        let delete = format!("MATCH (n:{label} {{{ID_PROPERTY}: $id}})\nDETACH DELETE n");
        let delete_parameters = id_parameters(id);

        let complex = self.inner.complex;
        let schema = &schema;
        self.in_transaction(transaction, OPERATION, |tx| async move {
            let records = tx
                .run(OPERATION, schema.type_name(), &inspect, &inspect_parameters)
                .await?;
            if int_column(&records, "nodes") == 0 {
                return Err(GraphError::not_found(OPERATION, schema.type_name(), Some(id)));
            }
            let relationships = int_column(&records, "relationships");
            if relationships > 0 && !cascade {
                return Err(GraphError::invalid_operation(format!(
                    "{} {id} still has {relationships} relationship(s); delete them or cascade",
                    schema.type_name()
                )));
            }
            complex.delete_complex_properties(schema.label(), id, &tx).await?;
            tx.run(OPERATION, schema.type_name(), &delete, &delete_parameters)
                .await?;
            Ok(())
        })
        .await
    }

    /// Connect the relationship's start and end nodes
    #[instrument(skip(self, entity, transaction), fields(entity_type = T::type_name(), id = entity.entity_id()))]
    pub async fn create_relationship<T: RelationshipEntity>(
        &self,
        entity: &T,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<()> {
        const OPERATION: &str = "create_relationship";
        let schema = self.inner.schemas.schema_of::<T>()?;
        let id = entity.entity_id();
        require_id(OPERATION, schema.type_name(), id)?;
        require_id(OPERATION, "start node", entity.start_node_id())?;
        require_id(OPERATION, "end node", entity.end_node_id())?;
        let info = self.inner.serializers.serialize(entity)?;

        let text = format!(
            "MATCH (a {{{ID_PROPERTY}: $start}}), (b {{{ID_PROPERTY}: $end}})\n\
             CREATE (a)-[r:{} $properties]->(b)\n\
             RETURN count(r) AS created",
            quote_identifier(schema.label())
        );
        let mut parameters = Parameters::new();
        parameters.insert("start".to_string(), GraphValue::from(entity.start_node_id()));
        parameters.insert("end".to_string(), GraphValue::from(entity.end_node_id()));
        parameters.insert(
            "properties".to_string(),
            GraphValue::Map(info.storage_properties(&schema)),
        );

        let schema = &schema;
        self.in_transaction(transaction, OPERATION, |tx| async move {
            let records = tx.run(OPERATION, schema.type_name(), &text, &parameters).await?;
            if int_column(&records, "created") == 0 {
                return Err(GraphError::not_found(
                    OPERATION,
                    "endpoint node",
                    Some(format!("{} -> {}", entity.start_node_id(), entity.end_node_id()).as_str()),
                ));
            }
            Ok(())
        })
        .await
    }

    /// Load the relationship of `T` with `id`
    #[instrument(skip(self, transaction), fields(entity_type = T::type_name()))]
    pub async fn get_relationship<T: RelationshipEntity>(
        &self,
        id: &str,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<T> {
        require_id("get_relationship", T::type_name(), id)?;
        let mut query = self
            .relationships::<T>()
            .filter(|r| r.field(ID_PROPERTY).eq(id));
        if let Some(tx) = transaction {
            query = query.in_transaction(tx);
        }
        query
            .first_or_default()
            .await?
            .ok_or_else(|| GraphError::not_found("get_relationship", T::type_name(), Some(id)))
    }

    /// Overwrite the relationship's properties. Endpoints cannot change.
    #[instrument(skip(self, entity, transaction), fields(entity_type = T::type_name(), id = entity.entity_id()))]
    pub async fn update_relationship<T: RelationshipEntity>(
        &self,
        entity: &T,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<()> {
        const OPERATION: &str = "update_relationship";
        let schema = self.inner.schemas.schema_of::<T>()?;
        let id = entity.entity_id();
        require_id(OPERATION, schema.type_name(), id)?;
        let info = self.inner.serializers.serialize(entity)?;

        let rel_type = quote_identifier(schema.label()).into_owned();
        let endpoints = format!(
            "MATCH (a)-[r:{rel_type} {{{ID_PROPERTY}: $id}}]->(b)\n\
             RETURN a.{ID_PROPERTY} AS start, b.{ID_PROPERTY} AS end"
        );
        let endpoint_parameters = id_parameters(id);
        let update = format!(
            "MATCH ()-[r:{rel_type} {{{ID_PROPERTY}: $id}}]->()\nSET r = $properties"
        );
        let mut update_parameters = id_parameters(id);
        update_parameters.insert(
            "properties".to_string(),
            GraphValue::Map(info.storage_properties(&schema)),
        );

        let schema = &schema;
        self.in_transaction(transaction, OPERATION, |tx| async move {
            let records = tx
                .run(OPERATION, schema.type_name(), &endpoints, &endpoint_parameters)
                .await?;
            let Some(record) = records.first() else {
                return Err(GraphError::not_found(OPERATION, schema.type_name(), Some(id)));
            };
            let stored_start = record.get("start").and_then(GraphValue::as_str);
            let stored_end = record.get("end").and_then(GraphValue::as_str);
            if stored_start != Some(entity.start_node_id()) || stored_end != Some(entity.end_node_id()) {
                return Err(GraphError::invalid_operation(format!(
                    "{} {id}: relationship endpoints cannot be changed",
                    schema.type_name()
                )));
            }
            tx.run(OPERATION, schema.type_name(), &update, &update_parameters)
                .await?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, transaction), fields(entity_type = T::type_name()))]
    pub async fn delete_relationship<T: RelationshipEntity>(
        &self,
        id: &str,
        transaction: Option<&GraphTransaction>,
    ) -> GraphResult<()> {
        const OPERATION: &str = "delete_relationship";
        let schema = self.inner.schemas.schema_of::<T>()?;
        require_id(OPERATION, schema.type_name(), id)?;

        let text = format!(
            "MATCH ()-[r:{} {{{ID_PROPERTY}: $id}}]->()\nDELETE r\nRETURN count(r) AS deleted",
            quote_identifier(schema.label())
        );
        let parameters = id_parameters(id);

        let schema = &schema;
        self.in_transaction(transaction, OPERATION, |tx| async move {
            let records = tx.run(OPERATION, schema.type_name(), &text, &parameters).await?;
            if int_column(&records, "deleted") == 0 {
                return Err(GraphError::not_found(OPERATION, schema.type_name(), Some(id)));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{Address, Knows, Person};
    use crate::test_support::{node, MockEngine};
    use graphmodel_core::ErrorKind;

    fn graph(engine: &MockEngine) -> Graph {
        Graph::new(Arc::new(engine.clone()))
    }

    #[tokio::test]
    async fn test_create_node_writes_entity_then_auxiliary_nodes() {
        let engine = MockEngine::new();
        let mut alice = Person::new("p-1", "Alice", "Smith", 30);
        alice.home_address = Some(Address::new("1 Main St", "Seattle"));

        graph(&engine).create_node(&alice, None).await.unwrap();

        let texts = engine.query_texts();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "CREATE (n:Person $properties)");
        assert!(texts[1].contains("__PROPERTY__HomeAddress__"));

        let queries = engine.queries();
        let GraphValue::Map(properties) = &queries[0].parameters["properties"] else {
            panic!("properties should bind as a map");
        };
        assert_eq!(properties.get("FirstName"), Some(&GraphValue::from("Alice")));
        assert!(!properties.contains_key("HomeAddress"));
        assert!(!properties.contains_key("Email"));
        assert_eq!(engine.commits(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected_before_any_transaction() {
        let engine = MockEngine::new();
        let nameless = Person::new("", "Bob", "Jones", 40);
        let err = graph(&engine).create_node(&nameless, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(engine.transactions_begun(), 0);
    }

    #[tokio::test]
    async fn test_get_node_missing_is_not_found() {
        let engine = MockEngine::new();
        let err = graph(&engine)
            .get_node::<Person>("nobody", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("nobody"));
    }

    #[tokio::test]
    async fn test_update_missing_node_rolls_back() {
        let engine = MockEngine::new();
        engine.respond("SET n = $properties", vec![Record::new().with("updated", 0i64)]);
        let err = graph(&engine)
            .update_node(&Person::new("p-9", "Zed", "Zulu", 50), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(engine.rollbacks(), 1);
        assert_eq!(engine.commits(), 0);
    }

    #[tokio::test]
    async fn test_update_node_replaces_complex_properties() {
        let engine = MockEngine::new();
        engine.respond("SET n = $properties", vec![Record::new().with("updated", 1i64)]);
        let mut alice = Person::new("p-1", "Alice", "Smith", 30);
        alice.previous_addresses = vec![Address::new("2 Elm", "Oslo")];

        graph(&engine).update_node(&alice, None).await.unwrap();

        let texts = engine.query_texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[1].contains("DETACH DELETE aux"));
        assert!(texts[2].contains("__PROPERTY__PreviousAddresses__"));
    }

    #[tokio::test]
    async fn test_delete_with_relationships_requires_cascade() {
        let engine = MockEngine::new();
        engine.respond(
            "OPTIONAL MATCH (n)-[rel]-()",
            vec![Record::new()
                .with("nodes", 1i64)
                .with("relationships", 2i64)],
        );
        let graph = graph(&engine);

        let err = graph.delete_node::<Person>("p-1", false, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(!engine.query_texts().iter().any(|t| t.contains("DETACH DELETE n")));

        engine.clear_history();
        graph.delete_node::<Person>("p-1", true, None).await.unwrap();
        let texts = engine.query_texts();
        assert!(texts[1].contains("DETACH DELETE aux"));
        assert_eq!(texts[2], "MATCH (n:Person {Id: $id})\nDETACH DELETE n");
    }

    #[tokio::test]
    async fn test_create_relationship_with_missing_endpoint() {
        let engine = MockEngine::new();
        engine.respond("CREATE (a)-[r:KNOWS", vec![Record::new().with("created", 0i64)]);
        let err = graph(&engine)
            .create_relationship(&Knows::new("k-1", "p-1", "p-404", 2020), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("p-404"));
    }

    #[tokio::test]
    async fn test_relationship_endpoints_are_immutable() {
        let engine = MockEngine::new();
        engine.respond(
            "RETURN a.Id AS start",
            vec![Record::new().with("start", "p-1").with("end", "p-2")],
        );
        let graph = graph(&engine);

        graph
            .update_relationship(&Knows::new("k-1", "p-1", "p-2", 2021), None)
            .await
            .unwrap();
        let err = graph
            .update_relationship(&Knows::new("k-1", "p-1", "p-3", 2021), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[tokio::test]
    async fn test_explicit_transaction_is_left_open() {
        let engine = MockEngine::new();
        let graph = graph(&engine);
        let tx = graph.begin_transaction().await.unwrap();

        graph
            .create_node(&Person::new("p-1", "Alice", "Smith", 30), Some(&tx))
            .await
            .unwrap();
        assert!(tx.is_active());
        assert_eq!(engine.commits(), 0);

        tx.commit().await.unwrap();
        assert_eq!(engine.commits(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_graph_refuses_work() {
        let engine = MockEngine::new();
        let token = CancellationToken::new();
        token.cancel();
        let graph = graph(&engine).with_cancellation(token);

        let err = graph
            .create_node(&Person::new("p-1", "Alice", "Smith", 30), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(engine.transactions_begun(), 0);
    }

    #[tokio::test]
    async fn test_get_node_matches_registered_subtype_labels() {
        let engine = MockEngine::new();
        engine.respond(
            "MATCH (n1)",
            vec![Record::new()
                .with(
                    "n1",
                    node(
                        &["Person"],
                        [
                            ("Id", GraphValue::from("p-1")),
                            ("FirstName", GraphValue::from("Alice")),
                            ("LastName", GraphValue::from("Smith")),
                            ("Age", GraphValue::Int(30)),
                        ],
                    ),
                )
                .with("n1_complex", GraphValue::List(Vec::new()))],
        );
        let graph = graph(&engine);
        graph.register_subtype::<Person, crate::test_fixtures::Company>();

        let alice: Person = graph.get_node("p-1", None).await.unwrap();
        assert_eq!(alice, Person::new("p-1", "Alice", "Smith", 30));
        assert!(engine.query_texts()[0].contains("n1:Company"));
    }
}
