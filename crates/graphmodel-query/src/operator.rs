//! Query operator chains.
//!
//! A [`QueryModel`] is the complete, engine-neutral description of one query:
//! the root entity type, the operators applied to it in order, and the
//! terminal operator that decides the result shape.

use crate::expr::Lambda;
use graphmodel_core::{EntitySchema, GraphError, GraphResult, SchemaKind};
use std::sync::Arc;

/// Direction of a traversal hop, relative to the current node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TraversalDirection {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

/// One traversal hop from the current node to a target node type
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalStep {
    relationship: Arc<EntitySchema>,
    target: Arc<EntitySchema>,
    target_labels: Vec<String>,
    direction: TraversalDirection,
    min_depth: usize,
    max_depth: usize,
    relationship_filters: Vec<Lambda>,
}

impl TraversalStep {
    /// Single outgoing hop. `target_labels` lists every concrete label the
    /// target may carry; an empty list uses the target schema's label.
    pub fn new(
        relationship: Arc<EntitySchema>,
        target: Arc<EntitySchema>,
        target_labels: Vec<String>,
    ) -> GraphResult<Self> {
        if relationship.kind() != SchemaKind::Relationship {
            return Err(GraphError::invalid_argument(format!(
                "{} is not a relationship type",
                relationship.type_name()
            )));
        }
        if target.kind() != SchemaKind::Node {
            return Err(GraphError::invalid_argument(format!(
                "{} is not a node type",
                target.type_name()
            )));
        }
        let target_labels = if target_labels.is_empty() {
            vec![target.label().to_string()]
        } else {
            target_labels
        };
        Ok(Self {
            relationship,
            target,
            target_labels,
            direction: TraversalDirection::Outgoing,
            min_depth: 1,
            max_depth: 1,
            relationship_filters: Vec::new(),
        })
    }

    pub fn with_direction(mut self, direction: TraversalDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Variable-length hop; `max` must be at least `max(min, 1)`
    pub fn with_depth(mut self, min: usize, max: usize) -> GraphResult<Self> {
        if max < min.max(1) {
            return Err(GraphError::invalid_argument(format!(
                "traversal depth {min}..{max} is empty; max depth must be at least max(min, 1)"
            )));
        }
        self.min_depth = min;
        self.max_depth = max;
        Ok(self)
    }

    pub fn with_relationship_filter(mut self, predicate: Lambda) -> Self {
        self.relationship_filters.push(predicate);
        self
    }

    pub fn relationship(&self) -> &Arc<EntitySchema> {
        &self.relationship
    }

    pub fn relationship_type(&self) -> &str {
        self.relationship.label()
    }

    pub fn target(&self) -> &Arc<EntitySchema> {
        &self.target
    }

    pub fn target_labels(&self) -> &[String] {
        &self.target_labels
    }

    pub fn direction(&self) -> TraversalDirection {
        self.direction
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// More than one relationship can be visited
    pub fn is_variable_length(&self) -> bool {
        self.max_depth > 1 || self.min_depth != 1
    }

    pub fn relationship_filters(&self) -> &[Lambda] {
        &self.relationship_filters
    }
}

/// Operators applied between the root and the terminal
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Where(Lambda),
    Select(Lambda),
    /// Replaces any previous ordering
    OrderBy { key: Lambda, descending: bool },
    /// Appends to the current ordering
    ThenBy { key: Lambda, descending: bool },
    GroupBy(Lambda),
    Take(usize),
    Skip(usize),
    Distinct,
    Traverse(TraversalStep),
    /// Predicate over the relationships of the most recent traversal
    WhereRelationship(Lambda),
    /// Return the named traversal paths instead of triples
    IncludePaths,
}

/// Terminal operator, deciding the result shape
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Terminal {
    #[default]
    ToList,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    Last,
    LastOrDefault,
    Count,
    Any,
    All(Lambda),
    Sum(Option<Lambda>),
    Average(Option<Lambda>),
    Min(Option<Lambda>),
    Max(Option<Lambda>),
}

impl Terminal {
    /// Terminals that return one scalar instead of rows
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Terminal::Count
                | Terminal::Any
                | Terminal::All(_)
                | Terminal::Sum(_)
                | Terminal::Average(_)
                | Terminal::Min(_)
                | Terminal::Max(_)
        )
    }

    /// `*OrDefault` terminals yield `None` instead of a not-found error
    pub fn or_default(&self) -> bool {
        matches!(
            self,
            Terminal::FirstOrDefault | Terminal::SingleOrDefault | Terminal::LastOrDefault
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Terminal::ToList => "to_list",
            Terminal::First => "first",
            Terminal::FirstOrDefault => "first_or_default",
            Terminal::Single => "single",
            Terminal::SingleOrDefault => "single_or_default",
            Terminal::Last => "last",
            Terminal::LastOrDefault => "last_or_default",
            Terminal::Count => "count",
            Terminal::Any => "any",
            Terminal::All(_) => "all",
            Terminal::Sum(_) => "sum",
            Terminal::Average(_) => "average",
            Terminal::Min(_) => "min",
            Terminal::Max(_) => "max",
        }
    }
}

/// Root entity type of a query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRoot {
    pub schema: Arc<EntitySchema>,
    /// Every concrete label (or relationship type) the root may carry
    pub labels: Vec<String>,
}

impl QueryRoot {
    pub fn new(schema: Arc<EntitySchema>, labels: Vec<String>) -> Self {
        let labels = if labels.is_empty() {
            vec![schema.label().to_string()]
        } else {
            labels
        };
        Self { schema, labels }
    }
}

/// A complete query: root, operator chain and terminal
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    pub root: QueryRoot,
    pub operators: Vec<QueryOperator>,
    pub terminal: Terminal,
}

impl QueryModel {
    pub fn new(root: QueryRoot) -> Self {
        Self {
            root,
            operators: Vec::new(),
            terminal: Terminal::ToList,
        }
    }

    pub fn with(mut self, operator: QueryOperator) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn with_terminal(mut self, terminal: Terminal) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn traversal_steps(&self) -> impl Iterator<Item = &TraversalStep> {
        self.operators.iter().filter_map(|op| match op {
            QueryOperator::Traverse(step) => Some(step),
            _ => None,
        })
    }

    /// Sum of the maximum depths of every traversal step
    pub fn total_traversal_depth(&self) -> usize {
        self.traversal_steps().map(TraversalStep::max_depth).sum()
    }

    /// Reject traversals that may walk further than `limit` hops in total
    pub fn check_depth_limit(&self, limit: usize) -> GraphResult<()> {
        let total = self.total_traversal_depth();
        if total > limit {
            return Err(GraphError::invalid_argument(format!(
                "traversal may visit {total} relationships, above the limit of {limit}"
            )));
        }
        Ok(())
    }
}
