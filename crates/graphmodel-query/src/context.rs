//! Per-query build context.
//!
//! Owns everything one query build accumulates: the alias allocator, the
//! parameter table and the clause fragments. A context is never shared
//! between builds and is consumed when the query is rendered.

use graphmodel_core::{GraphError, GraphResult, GraphValue, Parameters};
use std::collections::HashSet;
use std::fmt;

/// Lifecycle of one query build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildState {
    Initial,
    Accumulating,
    Finalizing,
    Rendered,
}

impl BuildState {
    fn can_become(self, next: BuildState) -> bool {
        matches!(
            (self, next),
            (BuildState::Initial, BuildState::Accumulating)
                | (BuildState::Accumulating, BuildState::Accumulating)
                | (BuildState::Accumulating, BuildState::Finalizing)
                | (BuildState::Finalizing, BuildState::Rendered)
        )
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Initial => "initial",
            BuildState::Accumulating => "accumulating",
            BuildState::Finalizing => "finalizing",
            BuildState::Rendered => "rendered",
        };
        f.write_str(name)
    }
}

/// Alias families; each has its own counter and prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasKind {
    Node,
    Relationship,
    /// Auxiliary node inside a complex-property subquery
    Complex,
    /// Relationship list of a complex-property load
    ComplexRelationship,
    /// Auxiliary node of a complex-property load
    ComplexNode,
    /// List comprehension or predicate variable
    Variable,
    Path,
    Group,
}

impl AliasKind {
    pub fn prefix(self) -> &'static str {
        match self {
            AliasKind::Node => "n",
            AliasKind::Relationship => "r",
            AliasKind::Complex => "c",
            AliasKind::ComplexRelationship => "cr",
            AliasKind::ComplexNode => "cn",
            AliasKind::Variable => "x",
            AliasKind::Path => "path",
            AliasKind::Group => "g",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

const ALIAS_KINDS: usize = 8;

/// One ordering key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub text: String,
    pub descending: bool,
}

/// Clause fragments accumulated while operators are applied
#[derive(Debug, Clone, Default)]
pub struct QueryParts {
    /// Pattern of the single MATCH clause
    pub pattern: String,
    /// Name bound to the whole pattern when paths are returned
    pub path_alias: Option<String>,
    /// Polymorphic label conditions, AND-ed before explicit filters
    pub label_conditions: Vec<String>,
    pub filters: Vec<String>,
    pub order: Vec<OrderKey>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub distinct: bool,
    /// `(column, expression)` aggregates computed by the group WITH clause
    pub group_aggregates: Vec<(String, String)>,
}

impl QueryParts {
    /// Label conditions and explicit filters, in that order
    pub fn conditions(&self) -> Vec<String> {
        self.label_conditions
            .iter()
            .chain(self.filters.iter())
            .cloned()
            .collect()
    }

    pub fn is_paged(&self) -> bool {
        self.skip.is_some() || self.limit.is_some()
    }
}

/// Alias allocator, parameter table and clause state for one query
#[derive(Debug)]
pub struct BuildContext {
    state: BuildState,
    counters: [usize; ALIAS_KINDS],
    allocated: Vec<String>,
    parameters: Parameters,
    parameter_count: usize,
    parts: QueryParts,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildContext {
    pub fn new() -> Self {
        Self {
            state: BuildState::Initial,
            counters: [0; ALIAS_KINDS],
            allocated: Vec::new(),
            parameters: Parameters::new(),
            parameter_count: 0,
            parts: QueryParts::default(),
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Move to `next`, rejecting out-of-order transitions
    pub fn transition(&mut self, next: BuildState) -> GraphResult<()> {
        if self.state == BuildState::Rendered {
            return Err(GraphError::invalid_operation(
                "query context has already been rendered",
            ));
        }
        if !self.state.can_become(next) {
            return Err(GraphError::invalid_operation(format!(
                "query build cannot move from {} to {next}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Allocate a fresh alias; aliases are never reused within one query
    pub fn alias(&mut self, kind: AliasKind) -> String {
        let counter = &mut self.counters[kind.index()];
        *counter += 1;
        let alias = format!("{}{}", kind.prefix(), counter);
        self.allocated.push(alias.clone());
        alias
    }

    /// Every alias allocated so far, in allocation order
    pub fn allocated_aliases(&self) -> &[String] {
        &self.allocated
    }

    /// Bind a value as a fresh parameter, returning its placeholder (`$p1`)
    pub fn parameter(&mut self, value: impl Into<GraphValue>) -> String {
        self.parameter_count += 1;
        let name = format!("p{}", self.parameter_count);
        self.parameters.insert(name.clone(), value.into());
        format!("${name}")
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parts(&self) -> &QueryParts {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut QueryParts {
        &mut self.parts
    }

    /// Consume the context, yielding the parameter table
    pub fn into_parameters(self) -> Parameters {
        self.parameters
    }

    /// Sanity check used by tests and debug logging
    pub fn aliases_are_unique(&self) -> bool {
        let mut seen = HashSet::new();
        self.allocated.iter().all(|alias| seen.insert(alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmodel_core::ErrorKind;

    #[test]
    fn test_alias_families_count_independently() {
        let mut ctx = BuildContext::new();
        assert_eq!(ctx.alias(AliasKind::Node), "n1");
        assert_eq!(ctx.alias(AliasKind::Relationship), "r1");
        assert_eq!(ctx.alias(AliasKind::Node), "n2");
        assert_eq!(ctx.alias(AliasKind::ComplexRelationship), "cr1");
        assert_eq!(ctx.alias(AliasKind::ComplexNode), "cn1");
        assert_eq!(ctx.alias(AliasKind::Complex), "c1");
        assert_eq!(ctx.alias(AliasKind::Path), "path1");
        assert_eq!(ctx.alias(AliasKind::Group), "g1");
        assert!(ctx.aliases_are_unique());
    }

    #[test]
    fn test_parameters_are_numbered() {
        let mut ctx = BuildContext::new();
        assert_eq!(ctx.parameter("O'Brien"), "$p1");
        assert_eq!(ctx.parameter(35), "$p2");
        assert_eq!(ctx.parameters().get("p1"), Some(&GraphValue::from("O'Brien")));
        assert_eq!(ctx.parameters().len(), 2);
    }

    #[test]
    fn test_state_machine_order() {
        let mut ctx = BuildContext::new();
        assert!(ctx.transition(BuildState::Finalizing).is_err());
        ctx.transition(BuildState::Accumulating).unwrap();
        ctx.transition(BuildState::Accumulating).unwrap();
        ctx.transition(BuildState::Finalizing).unwrap();
        ctx.transition(BuildState::Rendered).unwrap();

        let err = ctx.transition(BuildState::Rendered).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.to_string().contains("already been rendered"));
    }
}
