//! Query translation for graphmodel.
//!
//! Queries are described as data and rendered to Cypher in three layers:
//!
//! - [`expr`]: the lambda expression IR and its fluent constructors
//! - [`operator`]: operator chains ([`QueryModel`]) built by the typed façade
//! - [`render`]: the [`CypherRenderer`], driven by the [`coordinator`] and the
//!   [`builder`] over a per-query [`BuildContext`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graphmodel_query::{CypherRenderer, Lambda, QueryModel, QueryOperator, QueryRenderer};
//!
//! let model = QueryModel::new(root)
//!     .with(QueryOperator::Where(Lambda::new("p", |p| p.field("Age").lt(35))));
//! let rendered = CypherRenderer::new(registry).render(&model)?;
//! // MATCH (n1:Person) WHERE n1.Age < $p1 RETURN n1 ...
//! ```

pub mod builder;
pub mod context;
pub mod coordinator;
pub mod expr;
pub mod operator;
pub mod render;

#[cfg(test)]
mod test_fixtures;

pub use builder::{ExpressionBuilder, Operand};
pub use context::{AliasKind, BuildContext, BuildState};
pub use coordinator::{QueryCoordinator, RESULT_COLUMN, VALUE_COLUMN};
pub use expr::{BinaryOp, Expr, IntoExpr, Lambda, UnaryOp};
pub use operator::{
    QueryModel, QueryOperator, QueryRoot, Terminal, TraversalDirection, TraversalStep,
};
pub use render::{
    CypherRenderer, EntityColumns, QueryRenderer, RenderedQuery, ResultShape, RowSelection,
};
