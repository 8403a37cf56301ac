//! Typed query façade.
//!
//! A [`Query`] pairs a [`QueryModel`] under construction with a row decoder
//! that turns materialized rows into the caller's types. Operators consume
//! and return the query; terminals borrow it, so one query can be executed
//! several times.
//!
//! ```rust,ignore
//! let young: Vec<Person> = graph
//!     .nodes::<Person>()
//!     .filter(|p| p.field("Age").lt(35))
//!     .order_by(|p| p.field("LastName"))
//!     .take(10)
//!     .to_list()
//!     .await?;
//! ```
//!
//! Builder errors (unknown types, invalid traversal depths) are kept and
//! reported by the first terminal, before any transaction is opened.

use crate::graph::Graph;
use crate::materialize::{GraphPath, ResultRow};
use crate::transaction::GraphTransaction;
use graphmodel_core::{
    GraphError, GraphResult, GraphValue, NodeEntity, RelationshipEntity, SerializerRegistry,
};
use graphmodel_query::{
    Expr, Lambda, QueryModel, QueryOperator, RenderedQuery, Terminal, TraversalDirection,
    TraversalStep,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

const PARAMETER: &str = "p";

/// Converts one materialized row into a typed value
pub trait RowDecoder {
    type Output;

    fn decode(serializers: &SerializerRegistry, row: ResultRow) -> GraphResult<Self::Output>;
}

fn row_kind(row: &ResultRow) -> &'static str {
    match row {
        ResultRow::Entity(_) => "entity",
        ResultRow::Projection(_) => "projection",
        ResultRow::Scalar(_) => "scalar",
        ResultRow::Traversal { .. } => "traversal",
        ResultRow::Group { .. } => "group",
        ResultRow::Path(_) => "path",
    }
}

fn unexpected(expected: &str, row: &ResultRow) -> GraphError {
    GraphError::serialization(format!(
        "expected a {expected} row but got a {} row",
        row_kind(row)
    ))
}

fn from_value<V: DeserializeOwned>(value: &GraphValue) -> GraphResult<V> {
    Ok(serde_json::from_value(value.to_json())?)
}

/// Rows of node entities
pub struct Nodes<T>(PhantomData<fn() -> T>);

impl<T: NodeEntity> RowDecoder for Nodes<T> {
    type Output = T;

    fn decode(serializers: &SerializerRegistry, row: ResultRow) -> GraphResult<T> {
        match row {
            ResultRow::Entity(info) => serializers.deserialize::<T>(&info),
            other => Err(unexpected("node", &other)),
        }
    }
}

/// Rows of relationship entities
pub struct Relationships<T>(PhantomData<fn() -> T>);

impl<T: RelationshipEntity> RowDecoder for Relationships<T> {
    type Output = T;

    fn decode(serializers: &SerializerRegistry, row: ResultRow) -> GraphResult<T> {
        match row {
            ResultRow::Entity(info) => serializers.deserialize::<T>(&info),
            other => Err(unexpected("relationship", &other)),
        }
    }
}

/// Rows of projected values, decoded with serde
pub struct Projections<P>(PhantomData<fn() -> P>);

impl<P: DeserializeOwned> RowDecoder for Projections<P> {
    type Output = P;

    fn decode(_serializers: &SerializerRegistry, row: ResultRow) -> GraphResult<P> {
        match row {
            ResultRow::Projection(value) => from_value(&value),
            other => Err(unexpected("projection", &other)),
        }
    }
}

/// Result of `group_by`
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

/// Rows of groups
pub struct Groups<K, T>(PhantomData<fn() -> (K, T)>);

impl<K: DeserializeOwned, T: NodeEntity> RowDecoder for Groups<K, T> {
    type Output = Grouping<K, T>;

    fn decode(serializers: &SerializerRegistry, row: ResultRow) -> GraphResult<Grouping<K, T>> {
        match row {
            ResultRow::Group { key, items } => Ok(Grouping {
                key: from_value(&key)?,
                items: items
                    .iter()
                    .map(|info| serializers.deserialize::<T>(info))
                    .collect::<GraphResult<Vec<_>>>()?,
            }),
            other => Err(unexpected("group", &other)),
        }
    }
}

/// One traversal result: the node the traversal started from, the
/// relationships of the last hop and the node reached
#[derive(Debug, Clone, PartialEq)]
pub struct Traversed<S, R, T> {
    pub source: S,
    pub relationships: Vec<R>,
    pub target: T,
}

/// Rows of traversal triples
pub struct Traversals<S, R, T>(PhantomData<fn() -> (S, R, T)>);

impl<S: NodeEntity, R: RelationshipEntity, T: NodeEntity> RowDecoder for Traversals<S, R, T> {
    type Output = Traversed<S, R, T>;

    fn decode(
        serializers: &SerializerRegistry,
        row: ResultRow,
    ) -> GraphResult<Traversed<S, R, T>> {
        match row {
            ResultRow::Traversal {
                source,
                relationships,
                target,
            } => Ok(Traversed {
                source: serializers.deserialize::<S>(&source)?,
                relationships: relationships
                    .iter()
                    .map(|info| serializers.deserialize::<R>(info))
                    .collect::<GraphResult<Vec<_>>>()?,
                target: serializers.deserialize::<T>(&target)?,
            }),
            other => Err(unexpected("traversal", &other)),
        }
    }
}

/// Target nodes of traversal rows
pub struct Targets<S, R, T>(PhantomData<fn() -> (S, R, T)>);

impl<S, R, T: NodeEntity> RowDecoder for Targets<S, R, T> {
    type Output = T;

    fn decode(serializers: &SerializerRegistry, row: ResultRow) -> GraphResult<T> {
        match row {
            ResultRow::Traversal { target, .. } => serializers.deserialize::<T>(&target),
            other => Err(unexpected("traversal", &other)),
        }
    }
}

/// Path rows
pub struct Paths;

impl RowDecoder for Paths {
    type Output = GraphPath;

    fn decode(_serializers: &SerializerRegistry, row: ResultRow) -> GraphResult<GraphPath> {
        match row {
            ResultRow::Path(path) => Ok(path),
            other => Err(unexpected("path", &other)),
        }
    }
}

pub type NodeQuery<T> = Query<Nodes<T>>;
pub type RelationshipQuery<T> = Query<Relationships<T>>;
pub type ProjectionQuery<P> = Query<Projections<P>>;
pub type GroupedQuery<K, T> = Query<Groups<K, T>>;
pub type TraversalQuery<S, R, T> = Query<Traversals<S, R, T>>;
pub type TargetQuery<S, R, T> = Query<Targets<S, R, T>>;
pub type PathQuery = Query<Paths>;

/// A query under construction, decoded by `D`
pub struct Query<D> {
    graph: Graph,
    model: GraphResult<QueryModel>,
    transaction: Option<GraphTransaction>,
    cancellation: CancellationToken,
    depth_limit: Option<usize>,
    _rows: PhantomData<fn() -> D>,
}

impl<D> Clone for Query<D> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            model: self.model.clone(),
            transaction: self.transaction.clone(),
            cancellation: self.cancellation.clone(),
            depth_limit: self.depth_limit,
            _rows: PhantomData,
        }
    }
}

impl<D> fmt::Debug for Query<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.model)
            .field("transaction", &self.transaction.as_ref().map(GraphTransaction::id))
            .field("depth_limit", &self.depth_limit)
            .finish()
    }
}

impl<D> Query<D> {
    pub(crate) fn new(graph: Graph, model: GraphResult<QueryModel>) -> Self {
        let cancellation = graph.cancellation_token().clone();
        Self {
            graph,
            model,
            transaction: None,
            cancellation,
            depth_limit: None,
            _rows: PhantomData,
        }
    }

    fn retype<E>(self) -> Query<E> {
        Query {
            graph: self.graph,
            model: self.model,
            transaction: self.transaction,
            cancellation: self.cancellation,
            depth_limit: self.depth_limit,
            _rows: PhantomData,
        }
    }

    fn try_map_model(mut self, apply: impl FnOnce(QueryModel) -> GraphResult<QueryModel>) -> Self {
        self.model = self.model.and_then(apply);
        self
    }

    fn with(self, operator: QueryOperator) -> Self {
        self.try_map_model(|model| Ok(model.with(operator)))
    }

    /// The model built so far, or the first builder error
    pub fn model(&self) -> GraphResult<&QueryModel> {
        self.model.as_ref().map_err(Clone::clone)
    }

    /// Render the query as it would run for `to_list`
    pub fn to_cypher(&self) -> GraphResult<RenderedQuery> {
        let model = self.model()?.clone();
        self.graph.provider().render(&model)
    }

    /// Keep rows matching `predicate`
    pub fn filter(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.with(QueryOperator::Where(Lambda::new(PARAMETER, predicate)))
    }

    pub fn order_by(self, key: impl FnOnce(Expr) -> Expr) -> Self {
        self.with(QueryOperator::OrderBy {
            key: Lambda::new(PARAMETER, key),
            descending: false,
        })
    }

    pub fn order_by_descending(self, key: impl FnOnce(Expr) -> Expr) -> Self {
        self.with(QueryOperator::OrderBy {
            key: Lambda::new(PARAMETER, key),
            descending: true,
        })
    }

    pub fn then_by(self, key: impl FnOnce(Expr) -> Expr) -> Self {
        self.with(QueryOperator::ThenBy {
            key: Lambda::new(PARAMETER, key),
            descending: false,
        })
    }

    pub fn then_by_descending(self, key: impl FnOnce(Expr) -> Expr) -> Self {
        self.with(QueryOperator::ThenBy {
            key: Lambda::new(PARAMETER, key),
            descending: true,
        })
    }

    pub fn take(self, count: usize) -> Self {
        self.with(QueryOperator::Take(count))
    }

    pub fn skip(self, count: usize) -> Self {
        self.with(QueryOperator::Skip(count))
    }

    pub fn distinct(self) -> Self {
        self.with(QueryOperator::Distinct)
    }

    /// Project each row; the result decodes into `P` with serde
    pub fn select<P: DeserializeOwned>(
        self,
        selector: impl FnOnce(Expr) -> Expr,
    ) -> ProjectionQuery<P> {
        self.with(QueryOperator::Select(Lambda::new(PARAMETER, selector)))
            .retype()
    }

    /// Run inside `transaction` instead of an implicit one
    pub fn in_transaction(mut self, transaction: &GraphTransaction) -> Self {
        self.transaction = Some(transaction.clone());
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Reject traversals whose steps may visit more than `limit`
    /// relationships in total
    pub fn with_depth_limit(mut self, limit: usize) -> Self {
        self.depth_limit = Some(limit);
        self
    }

    async fn execute(&self, terminal: Terminal) -> GraphResult<Vec<ResultRow>> {
        let model = self.model()?.clone().with_terminal(terminal);
        if let Some(limit) = self.depth_limit {
            model.check_depth_limit(limit)?;
        }
        self.graph
            .provider()
            .execute(&model, self.transaction.as_ref(), &self.cancellation)
            .await
    }

    async fn scalar(&self, terminal: Terminal) -> GraphResult<GraphValue> {
        let name = terminal.name();
        match self.execute(terminal).await?.into_iter().next() {
            Some(ResultRow::Scalar(value)) => Ok(value),
            Some(other) => Err(unexpected("scalar", &other)),
            None => Err(GraphError::serialization(format!("{name} returned no rows"))),
        }
    }

    pub async fn count(&self) -> GraphResult<usize> {
        let value = self.scalar(Terminal::Count).await?;
        value
            .as_i64()
            .and_then(|count| usize::try_from(count).ok())
            .ok_or_else(|| {
                GraphError::serialization(format!("count returned a {}", value.type_name()))
            })
    }

    pub async fn any(&self) -> GraphResult<bool> {
        let value = self.scalar(Terminal::Any).await?;
        value.as_bool().ok_or_else(|| {
            GraphError::serialization(format!("any returned a {}", value.type_name()))
        })
    }

    /// Whether any row matches `predicate`
    pub async fn any_where(&self, predicate: impl FnOnce(Expr) -> Expr) -> GraphResult<bool> {
        self.clone().filter(predicate).any().await
    }

    /// Whether every row matches `predicate`; true for no rows
    pub async fn all(&self, predicate: impl FnOnce(Expr) -> Expr) -> GraphResult<bool> {
        let value = self
            .scalar(Terminal::All(Lambda::new(PARAMETER, predicate)))
            .await?;
        value.as_bool().ok_or_else(|| {
            GraphError::serialization(format!("all returned a {}", value.type_name()))
        })
    }

    /// Sum of `selector` over the rows; zero for no rows
    pub async fn sum(&self, selector: impl FnOnce(Expr) -> Expr) -> GraphResult<f64> {
        let value = self
            .scalar(Terminal::Sum(Some(Lambda::new(PARAMETER, selector))))
            .await?;
        if value.is_null() {
            return Ok(0.0);
        }
        value.as_f64().ok_or_else(|| {
            GraphError::serialization(format!("sum returned a {}", value.type_name()))
        })
    }

    /// Mean of `selector` over the rows; `None` for no rows
    pub async fn average(&self, selector: impl FnOnce(Expr) -> Expr) -> GraphResult<Option<f64>> {
        let value = self
            .scalar(Terminal::Average(Some(Lambda::new(PARAMETER, selector))))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        value.as_f64().map(Some).ok_or_else(|| {
            GraphError::serialization(format!("average returned a {}", value.type_name()))
        })
    }

    pub async fn min<V: DeserializeOwned>(
        &self,
        selector: impl FnOnce(Expr) -> Expr,
    ) -> GraphResult<Option<V>> {
        let value = self
            .scalar(Terminal::Min(Some(Lambda::new(PARAMETER, selector))))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        from_value(&value).map(Some)
    }

    pub async fn max<V: DeserializeOwned>(
        &self,
        selector: impl FnOnce(Expr) -> Expr,
    ) -> GraphResult<Option<V>> {
        let value = self
            .scalar(Terminal::Max(Some(Lambda::new(PARAMETER, selector))))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        from_value(&value).map(Some)
    }
}

impl<D: RowDecoder> Query<D> {
    async fn decoded(&self, terminal: Terminal) -> GraphResult<Vec<D::Output>> {
        let rows = self.execute(terminal).await?;
        let serializers = self.graph.serializers();
        rows.into_iter()
            .map(|row| D::decode(serializers, row))
            .collect()
    }

    async fn at_most_one(&self, terminal: Terminal) -> GraphResult<Option<D::Output>> {
        Ok(self.decoded(terminal).await?.into_iter().next())
    }

    async fn exactly_one(&self, terminal: Terminal) -> GraphResult<D::Output> {
        let name = terminal.name();
        let entity_type = self
            .model()?
            .root
            .schema
            .type_name()
            .to_string();
        self.at_most_one(terminal)
            .await?
            .ok_or_else(|| GraphError::not_found(name, entity_type, None))
    }

    pub async fn to_list(&self) -> GraphResult<Vec<D::Output>> {
        self.decoded(Terminal::ToList).await
    }

    pub async fn first(&self) -> GraphResult<D::Output> {
        self.exactly_one(Terminal::First).await
    }

    pub async fn first_or_default(&self) -> GraphResult<Option<D::Output>> {
        self.at_most_one(Terminal::FirstOrDefault).await
    }

    /// The only row; `NotFound` for none, `MultiplicityViolation` for more
    pub async fn single(&self) -> GraphResult<D::Output> {
        self.exactly_one(Terminal::Single).await
    }

    pub async fn single_or_default(&self) -> GraphResult<Option<D::Output>> {
        self.at_most_one(Terminal::SingleOrDefault).await
    }

    /// The final row. With an ordering and no paging the ordering is
    /// inverted and one row fetched; otherwise every row is read.
    pub async fn last(&self) -> GraphResult<D::Output> {
        self.exactly_one(Terminal::Last).await
    }

    pub async fn last_or_default(&self) -> GraphResult<Option<D::Output>> {
        self.at_most_one(Terminal::LastOrDefault).await
    }
}

/// Build a traversal step to `U` over `R`, with `U`'s subtype labels
fn traversal_step<R: RelationshipEntity, U: NodeEntity>(graph: &Graph) -> GraphResult<TraversalStep> {
    let schemas = graph.schemas();
    let relationship = schemas.schema_of::<R>()?;
    let target = schemas.schema_of::<U>()?;
    let labels = schemas.polymorphic_labels(&target);
    TraversalStep::new(relationship, target, labels)
}

impl<T: NodeEntity> Query<Nodes<T>> {
    /// Group rows by `key`; groups decode as [`Grouping`]
    pub fn group_by<K: DeserializeOwned>(
        self,
        key: impl FnOnce(Expr) -> Expr,
    ) -> GroupedQuery<K, T> {
        self.with(QueryOperator::GroupBy(Lambda::new(PARAMETER, key)))
            .retype()
    }

    /// Follow outgoing `R` relationships to `U` nodes
    pub fn traverse<R: RelationshipEntity, U: NodeEntity>(self) -> TraversalQuery<T, R, U> {
        let step = traversal_step::<R, U>(&self.graph);
        self.try_map_model(|model| Ok(model.with(QueryOperator::Traverse(step?))))
            .retype()
    }
}

impl<S: NodeEntity, R: RelationshipEntity, T: NodeEntity> Query<Traversals<S, R, T>> {
    fn map_last_step(self, apply: impl FnOnce(TraversalStep) -> GraphResult<TraversalStep>) -> Self {
        self.try_map_model(|mut model| {
            let index = model
                .operators
                .iter()
                .rposition(|operator| matches!(operator, QueryOperator::Traverse(_)))
                .ok_or_else(|| GraphError::invalid_operation("query has no traversal step"))?;
            if let QueryOperator::Traverse(step) = &model.operators[index] {
                model.operators[index] = QueryOperator::Traverse(apply(step.clone())?);
            }
            Ok(model)
        })
    }

    /// Direction of the last hop
    pub fn direction(self, direction: TraversalDirection) -> Self {
        self.map_last_step(|step| Ok(step.with_direction(direction)))
    }

    /// Make the last hop variable-length
    pub fn depth(self, min: usize, max: usize) -> Self {
        self.map_last_step(|step| step.with_depth(min, max))
    }

    /// Keep only last-hop relationships matching `predicate`
    pub fn filter_relationship(self, predicate: impl FnOnce(Expr) -> Expr) -> Self {
        self.with(QueryOperator::WhereRelationship(Lambda::new("r", predicate)))
    }

    /// Continue from the reached nodes over `R2` relationships to `U`
    pub fn then_traverse<R2: RelationshipEntity, U: NodeEntity>(self) -> TraversalQuery<S, R2, U> {
        let step = traversal_step::<R2, U>(&self.graph);
        self.try_map_model(|model| Ok(model.with(QueryOperator::Traverse(step?))))
            .retype()
    }

    /// Only the reached nodes
    pub fn targets(self) -> TargetQuery<S, R, T> {
        self.retype()
    }

    /// Whole matched paths
    pub fn paths(self) -> PathQuery {
        self.with(QueryOperator::IncludePaths).retype()
    }
}

impl<S: NodeEntity, R: RelationshipEntity, T: NodeEntity> Query<Targets<S, R, T>> {
    /// Back to full traversal triples
    pub fn with_sources(self) -> TraversalQuery<S, R, T> {
        self.retype()
    }
}
