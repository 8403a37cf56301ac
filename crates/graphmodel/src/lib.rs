//! # graphmodel
//!
//! Typed object/graph mapping. Domain types describe their properties once;
//! the [`Graph`] façade stores them as nodes and relationships, and
//! LINQ-style queries over them are rendered to parameterized Cypher and
//! materialized back into the same types.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graphmodel::Graph;
//! use std::sync::Arc;
//!
//! let graph = Graph::new(Arc::new(engine));
//! graph.create_node(&alice, None).await?;
//!
//! let friends = graph
//!     .nodes::<Person>()
//!     .filter(|p| p.field("FirstName").eq("Alice"))
//!     .traverse::<Knows, Person>()
//!     .targets()
//!     .to_list()
//!     .await?;
//! ```
//!
//! ## Layout
//!
//! - [`graph`] - CRUD entry points and query roots
//! - [`queryable`] - typed query builders and terminals
//! - [`provider`] / [`materialize`] - execution and row decoding
//! - [`complex`] - auxiliary-node storage for complex properties
//! - [`transaction`] - explicit and implicit transactions

pub mod complex;
pub mod graph;
pub mod materialize;
pub mod provider;
pub mod queryable;
pub mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

#[cfg(test)]
mod test_fixtures;

pub use complex::{AuxiliaryParent, AuxiliaryWrite, ComplexPropertyManager};
pub use graph::{Graph, GraphBuilder};
pub use materialize::{GraphPath, ResultRow};
pub use provider::QueryProvider;
pub use queryable::{
    GroupedQuery, Grouping, NodeQuery, PathQuery, ProjectionQuery, Query, RelationshipQuery,
    RowDecoder, TargetQuery, TraversalQuery, Traversed,
};
pub use transaction::{GraphTransaction, TransactionLease, TransactionManager, TransactionState};

pub use graphmodel_core::{
    new_entity_id, graph_type, ComplexType, EntityKind, ErrorKind, GraphEntity, GraphError,
    GraphResult, GraphValue, NodeEntity, NodeProperties, PropertyListBuilder,
    RelationshipDirection, RelationshipEntity, RelationshipProperties,
};
pub use graphmodel_query::{Expr, TraversalDirection};
pub use tokio_util::sync::CancellationToken;
