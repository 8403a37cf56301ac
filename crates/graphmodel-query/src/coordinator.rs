//! Query build coordination.
//!
//! [`QueryCoordinator`] drives one build through the [`BuildState`] machine:
//! the root opens the MATCH pattern, each operator accumulates clause
//! fragments in the [`BuildContext`], and the terminal finalizes the clause
//! list and the result shape.

use crate::builder::{EntityOperand, ExpressionBuilder, GroupOperand, Operand};
use crate::context::{AliasKind, BuildContext, BuildState, OrderKey};
use crate::expr::Lambda;
use crate::operator::{QueryOperator, QueryRoot, Terminal, TraversalDirection, TraversalStep};
use crate::render::{
    complex_column, quote_identifier, ComplexLoad, EntityColumns, RenderedQuery, ResultShape,
    RowSelection,
};
use graphmodel_core::{
    EntitySchema, GraphError, GraphResult, GraphValue, SchemaKind, SchemaRegistry, ID_PROPERTY,
};
use std::sync::Arc;
use tracing::trace;

/// Column holding scalar terminal results
pub const RESULT_COLUMN: &str = "result";

/// Column holding single-value projections
pub const VALUE_COLUMN: &str = "value";

/// Relationship bound by the most recent traversal step
#[derive(Debug, Clone)]
struct Hop {
    alias: String,
    variable_length: bool,
    schema: Arc<EntitySchema>,
}

#[derive(Debug, Clone)]
struct GroupState {
    alias: String,
    key: String,
    element: Operand,
    filters: Vec<String>,
}

fn unsupported(message: impl Into<String>) -> GraphError {
    GraphError::unsupported(message)
}

fn label_condition(alias: &str, labels: &[String]) -> String {
    let alternatives: Vec<String> = labels
        .iter()
        .map(|label| format!("{alias}:{}", quote_identifier(label)))
        .collect();
    format!("({})", alternatives.join(" OR "))
}

fn count_parameter(value: usize) -> GraphValue {
    GraphValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Accumulates one query build
pub struct QueryCoordinator<'a> {
    registry: &'a SchemaRegistry,
    complex_depth: usize,
    ctx: BuildContext,
    current: Operand,
    /// Variables bound by the MATCH pattern, in binding order
    variables: Vec<String>,
    traversal_source: Option<EntityOperand>,
    last_hop: Option<Hop>,
    group: Option<GroupState>,
    projection: Option<Operand>,
}

impl<'a> QueryCoordinator<'a> {
    /// Open the MATCH pattern for `root`
    pub fn new(
        registry: &'a SchemaRegistry,
        complex_depth: usize,
        root: &QueryRoot,
    ) -> GraphResult<Self> {
        let mut ctx = BuildContext::new();
        ctx.transition(BuildState::Accumulating)?;
        let schema = registry.resolve(&root.schema)?;

        let (pattern, variables, current) = match schema.kind() {
            SchemaKind::Node => {
                let alias = ctx.alias(AliasKind::Node);
                let pattern = match root.labels.as_slice() {
                    [label] => format!("({alias}:{})", quote_identifier(label)),
                    labels => {
                        let condition = label_condition(&alias, labels);
                        ctx.parts_mut().label_conditions.push(condition);
                        format!("({alias})")
                    }
                };
                (pattern, vec![alias.clone()], Operand::entity(alias, schema))
            }
            SchemaKind::Relationship => {
                let start = ctx.alias(AliasKind::Node);
                let relationship = ctx.alias(AliasKind::Relationship);
                let end = ctx.alias(AliasKind::Node);
                let types: Vec<String> = root
                    .labels
                    .iter()
                    .map(|label| quote_identifier(label).into_owned())
                    .collect();
                let pattern = format!("({start})-[{relationship}:{}]->({end})", types.join("|"));
                let current = Operand::relationship(
                    relationship.clone(),
                    schema,
                    format!("{start}.{ID_PROPERTY}"),
                    format!("{end}.{ID_PROPERTY}"),
                );
                (pattern, vec![start, relationship, end], current)
            }
            SchemaKind::Complex => {
                return Err(GraphError::invalid_argument(format!(
                    "{} is a complex type and cannot be queried directly",
                    schema.type_name()
                )))
            }
        };
        ctx.parts_mut().pattern = pattern;

        Ok(Self {
            registry,
            complex_depth,
            ctx,
            current,
            variables,
            traversal_source: None,
            last_hop: None,
            group: None,
            projection: None,
        })
    }

    pub fn state(&self) -> BuildState {
        self.ctx.state()
    }

    fn reject_after_paging(&self, operator: &str) -> GraphResult<()> {
        if self.ctx.parts().is_paged() {
            return Err(unsupported(format!(
                "{operator} cannot follow take or skip"
            )));
        }
        Ok(())
    }

    /// Apply one operator
    pub fn apply(&mut self, operator: &QueryOperator) -> GraphResult<()> {
        self.ctx.transition(BuildState::Accumulating)?;
        let registry = self.registry;

        match operator {
            QueryOperator::Where(predicate) => {
                self.reject_after_paging("where")?;
                let condition = ExpressionBuilder::new(registry).predicate(
                    predicate,
                    self.current.clone(),
                    &mut self.ctx,
                )?;
                match &mut self.group {
                    Some(group) => group.filters.push(condition),
                    None => self.ctx.parts_mut().filters.push(condition),
                }
            }
            QueryOperator::Select(selector) => self.select(selector)?,
            QueryOperator::OrderBy { key, descending } => {
                self.order(key, *descending, true)?;
            }
            QueryOperator::ThenBy { key, descending } => {
                self.order(key, *descending, false)?;
            }
            QueryOperator::GroupBy(key) => self.group_by(key)?,
            QueryOperator::Take(count) => self.ctx.parts_mut().limit = Some(*count),
            QueryOperator::Skip(count) => self.ctx.parts_mut().skip = Some(*count),
            QueryOperator::Distinct => {
                self.reject_after_paging("distinct")?;
                self.ctx.parts_mut().distinct = true;
            }
            QueryOperator::Traverse(step) => self.traverse(step)?,
            QueryOperator::WhereRelationship(predicate) => {
                self.reject_after_paging("where_relationship")?;
                let hop = self.last_hop.clone().ok_or_else(|| {
                    GraphError::invalid_operation("where_relationship requires a traversal")
                })?;
                self.filter_relationship(&hop, predicate)?;
            }
            QueryOperator::IncludePaths => {
                if self.last_hop.is_none() {
                    return Err(GraphError::invalid_operation(
                        "paths are only available on traversals",
                    ));
                }
                if self.ctx.parts().path_alias.is_none() {
                    let alias = self.ctx.alias(AliasKind::Path);
                    self.variables.push(alias.clone());
                    self.ctx.parts_mut().path_alias = Some(alias);
                }
            }
        }
        Ok(())
    }

    fn select(&mut self, selector: &Lambda) -> GraphResult<()> {
        if selector.is_identity() {
            return Ok(());
        }
        let projected = ExpressionBuilder::new(self.registry).lambda(
            selector,
            self.current.clone(),
            &mut self.ctx,
        )?;
        match &projected {
            Operand::Value { .. } | Operand::List { .. } | Operand::Map { .. } => {
                self.projection = Some(projected.clone());
                self.current = projected;
                Ok(())
            }
            Operand::Entity(_) if projected == self.current => Ok(()),
            other => Err(unsupported(format!(
                "select cannot project to a {}",
                other.describe()
            ))),
        }
    }

    fn order(&mut self, key: &Lambda, descending: bool, replace: bool) -> GraphResult<()> {
        self.reject_after_paging(if replace { "order_by" } else { "then_by" })?;
        let text =
            ExpressionBuilder::new(self.registry).scalar(key, self.current.clone(), &mut self.ctx)?;
        let order = &mut self.ctx.parts_mut().order;
        if replace {
            order.clear();
        }
        order.push(OrderKey { text, descending });
        Ok(())
    }

    fn group_by(&mut self, key: &Lambda) -> GraphResult<()> {
        self.reject_after_paging("group_by")?;
        if self.group.is_some() {
            return Err(unsupported("group_by can only be applied once"));
        }
        if self.projection.is_some() {
            return Err(unsupported("group_by cannot follow select"));
        }

        let built =
            ExpressionBuilder::new(self.registry).lambda(key, self.current.clone(), &mut self.ctx)?;
        let alias = self.ctx.alias(AliasKind::Group);
        let column = format!("{alias}_key");
        let (text, key_operand) = match built {
            Operand::Value { text, kind } => (text, Operand::value(column, kind)),
            Operand::List { text, element } => (text, Operand::List { text: column, element }),
            Operand::Map { text, members } => {
                let members = members
                    .iter()
                    .map(|(name, member)| {
                        let access = format!("{column}.{}", quote_identifier(name));
                        (name.clone(), Operand::value(access, member.kind()))
                    })
                    .collect();
                (text, Operand::Map { text: column, members })
            }
            other => {
                return Err(unsupported(format!(
                    "cannot group by a {}",
                    other.describe()
                )))
            }
        };

        // Orderings before a grouping are meaningless once rows collapse
        self.ctx.parts_mut().order.clear();
        self.group = Some(GroupState {
            alias: alias.clone(),
            key: text,
            element: self.current.clone(),
            filters: Vec::new(),
        });
        self.current = Operand::Group(GroupOperand {
            alias,
            key: Box::new(key_operand),
            element: Box::new(self.current.clone()),
        });
        Ok(())
    }

    fn traverse(&mut self, step: &TraversalStep) -> GraphResult<()> {
        self.reject_after_paging("traverse")?;
        if self.group.is_some() || self.projection.is_some() {
            return Err(unsupported("traverse must come before select and group_by"));
        }
        let source = match &self.current {
            Operand::Entity(entity) if entity.schema.kind() == SchemaKind::Node => entity.clone(),
            other => {
                return Err(unsupported(format!(
                    "traversals start from a node, not a {}",
                    other.describe()
                )))
            }
        };

        let relationship_schema = self.registry.resolve(step.relationship())?;
        let target_schema = self.registry.resolve(step.target())?;
        let relationship = self.ctx.alias(AliasKind::Relationship);
        let target = self.ctx.alias(AliasKind::Node);

        let length = if !step.is_variable_length() {
            String::new()
        } else if step.min_depth() == step.max_depth() {
            format!("*{}", step.max_depth())
        } else {
            format!("*{}..{}", step.min_depth(), step.max_depth())
        };
        let (left, right) = match step.direction() {
            TraversalDirection::Outgoing => ("-", "->"),
            TraversalDirection::Incoming => ("<-", "-"),
            TraversalDirection::Both => ("-", "-"),
        };
        let target_pattern = match step.target_labels() {
            [label] => format!("({target}:{})", quote_identifier(label)),
            labels => {
                let condition = label_condition(&target, labels);
                self.ctx.parts_mut().label_conditions.push(condition);
                format!("({target})")
            }
        };
        let segment = format!(
            "{left}[{relationship}:{}{length}]{right}{target_pattern}",
            quote_identifier(step.relationship_type())
        );
        self.ctx.parts_mut().pattern.push_str(&segment);
        self.variables.push(relationship.clone());
        self.variables.push(target.clone());

        let hop = Hop {
            alias: relationship,
            variable_length: step.is_variable_length(),
            schema: relationship_schema,
        };
        for predicate in step.relationship_filters() {
            self.filter_relationship(&hop, predicate)?;
        }

        trace!(pattern = %self.ctx.parts().pattern, "Added traversal step");
        if self.traversal_source.is_none() {
            self.traversal_source = Some(source);
        }
        self.last_hop = Some(hop);
        self.current = Operand::entity(target, target_schema);
        Ok(())
    }

    fn filter_relationship(&mut self, hop: &Hop, predicate: &Lambda) -> GraphResult<()> {
        let bound = if hop.variable_length {
            self.ctx.alias(AliasKind::Variable)
        } else {
            hop.alias.clone()
        };
        let operand = Operand::relationship(
            bound.clone(),
            Arc::clone(&hop.schema),
            format!("startNode({bound}).{ID_PROPERTY}"),
            format!("endNode({bound}).{ID_PROPERTY}"),
        );
        let condition =
            ExpressionBuilder::new(self.registry).predicate(predicate, operand, &mut self.ctx)?;
        let condition = if hop.variable_length {
            format!("ALL({bound} IN {} WHERE {condition})", hop.alias)
        } else {
            condition
        };
        self.ctx.parts_mut().filters.push(condition);
        Ok(())
    }

    /// Finalize with `terminal` and render the query
    pub fn finish(mut self, terminal: &Terminal) -> GraphResult<RenderedQuery> {
        self.ctx.transition(BuildState::Finalizing)?;

        let (clauses, shape, selection) = if terminal.is_scalar() {
            let (clauses, shape) = self.finish_scalar(terminal)?;
            (clauses, shape, RowSelection::All)
        } else {
            self.finish_rows(terminal)?
        };

        self.ctx.transition(BuildState::Rendered)?;
        debug_assert!(self.ctx.aliases_are_unique());
        Ok(RenderedQuery {
            text: clauses.join("\n"),
            parameters: self.ctx.into_parameters(),
            shape,
            selection,
        })
    }

    fn match_clause(&self) -> String {
        let parts = self.ctx.parts();
        let mut clause = match &parts.path_alias {
            Some(path) => format!("MATCH {path} = {}", parts.pattern),
            None => format!("MATCH {}", parts.pattern),
        };
        let conditions = parts.conditions();
        if !conditions.is_empty() {
            clause.push_str("\nWHERE ");
            clause.push_str(&conditions.join(" AND "));
        }
        clause
    }

    /// ORDER BY, SKIP and LIMIT lines
    fn paging_clauses(&mut self) -> Vec<String> {
        let parts = self.ctx.parts().clone();
        let mut clauses = Vec::new();
        if !parts.order.is_empty() {
            let keys: Vec<String> = parts
                .order
                .iter()
                .map(|key| {
                    if key.descending {
                        format!("{} DESC", key.text)
                    } else {
                        key.text.clone()
                    }
                })
                .collect();
            clauses.push(format!("ORDER BY {}", keys.join(", ")));
        }
        if let Some(skip) = parts.skip {
            clauses.push(format!("SKIP {}", self.ctx.parameter(count_parameter(skip))));
        }
        if let Some(limit) = parts.limit {
            clauses.push(format!("LIMIT {}", self.ctx.parameter(count_parameter(limit))));
        }
        clauses
    }

    fn finish_rows(
        &mut self,
        terminal: &Terminal,
    ) -> GraphResult<(Vec<String>, ResultShape, RowSelection)> {
        let parts = self.ctx.parts_mut();
        let selection = match terminal {
            Terminal::First | Terminal::FirstOrDefault => {
                parts.limit = Some(parts.limit.map_or(1, |limit| limit.min(1)));
                RowSelection::First
            }
            Terminal::Single | Terminal::SingleOrDefault => {
                parts.limit = Some(parts.limit.map_or(2, |limit| limit.min(2)));
                RowSelection::Single
            }
            Terminal::Last | Terminal::LastOrDefault => {
                if !parts.order.is_empty() && !parts.is_paged() {
                    for key in &mut parts.order {
                        key.descending = !key.descending;
                    }
                    parts.limit = Some(1);
                    RowSelection::First
                } else {
                    RowSelection::Last
                }
            }
            _ => RowSelection::All,
        };

        let mut clauses = vec![self.match_clause()];
        let (items, shape) = self.row_items(&mut clauses)?;
        let distinct = if self.ctx.parts().distinct {
            "DISTINCT "
        } else {
            ""
        };
        clauses.push(format!("RETURN {distinct}{}", items.join(", ")));
        clauses.extend(self.paging_clauses());
        Ok((clauses, shape, selection))
    }

    /// Load the complex properties of a returned node, yielding the column
    fn load_complex(&mut self, entity: &EntityOperand, clauses: &mut Vec<String>) -> Option<String> {
        if entity.schema.kind() != SchemaKind::Node || !entity.schema.has_complex_properties() {
            return None;
        }
        let load = ComplexLoad::render(
            &mut self.ctx,
            &entity.alias,
            self.complex_depth,
            &self.variables,
        );
        clauses.push(load.clause);
        self.variables.push(load.column.clone());
        Some(load.column)
    }

    /// Complex entries for every node of `path`, in path order, when
    /// either end of the traversal has complex properties
    fn path_complex(&mut self, path: &str) -> Option<String> {
        let loads_complex = |entity: &EntityOperand| {
            entity.schema.kind() == SchemaKind::Node && entity.schema.has_complex_properties()
        };
        let source = self.traversal_source.as_ref()?;
        let target = match &self.current {
            Operand::Entity(entity) => Some(entity),
            _ => None,
        };
        if !loads_complex(source) && !target.is_some_and(loads_complex) {
            return None;
        }
        let node = self.ctx.alias(AliasKind::Variable);
        let entries = ComplexLoad::entries(&mut self.ctx, &node, self.complex_depth);
        Some(format!("[{node} IN nodes({path}) | {entries}]"))
    }

    fn entity_items(
        &mut self,
        entity: &EntityOperand,
        clauses: &mut Vec<String>,
    ) -> (Vec<String>, EntityColumns) {
        match &entity.endpoints {
            Some((start, end)) => {
                let columns = EntityColumns::relationship(entity.alias.clone());
                let mut items = vec![entity.alias.clone()];
                if let Some((start_column, end_column)) = &columns.endpoint_columns {
                    items.push(format!("{start} AS {start_column}"));
                    items.push(format!("{end} AS {end_column}"));
                }
                (items, columns)
            }
            None => {
                let complex = self.load_complex(entity, clauses);
                let mut items = vec![entity.alias.clone()];
                items.extend(complex.clone());
                (items, EntityColumns::node(entity.alias.clone(), complex))
            }
        }
    }

    fn projection_items(projection: &Operand) -> GraphResult<(Vec<String>, ResultShape)> {
        match projection {
            Operand::Value { text, .. } | Operand::List { text, .. } => Ok((
                vec![format!("{text} AS {VALUE_COLUMN}")],
                ResultShape::Projection {
                    columns: vec![VALUE_COLUMN.to_string()],
                    single: true,
                },
            )),
            Operand::Map { members, .. } => {
                let mut items = Vec::with_capacity(members.len());
                let mut columns = Vec::with_capacity(members.len());
                for (name, member) in members {
                    let text = match member {
                        Operand::Value { text, .. }
                        | Operand::List { text, .. }
                        | Operand::Map { text, .. } => text,
                        other => {
                            return Err(unsupported(format!(
                                "projection member '{name}' is a {}",
                                other.describe()
                            )))
                        }
                    };
                    items.push(format!("{text} AS {}", quote_identifier(name)));
                    columns.push(name.clone());
                }
                Ok((
                    items,
                    ResultShape::Projection {
                        columns,
                        single: false,
                    },
                ))
            }
            other => Err(unsupported(format!("cannot return a {}", other.describe()))),
        }
    }

    /// The group WITH clause; `collect_items` adds the grouped elements
    fn group_clause(
        &mut self,
        group: &GroupState,
        collect_items: bool,
        clauses: &mut Vec<String>,
    ) -> GraphResult<Option<EntityColumns>> {
        let mut items = vec![format!("{} AS {}_key", group.key, group.alias)];
        items.extend(
            self.ctx
                .parts()
                .group_aggregates
                .iter()
                .map(|(column, expression)| format!("{expression} AS {column}")),
        );

        let mut grouped = None;
        if collect_items {
            let entity = match &group.element {
                Operand::Entity(entity) if entity.endpoints.is_none() => entity.clone(),
                other => {
                    return Err(unsupported(format!(
                        "grouped {} rows need a select projection",
                        other.describe()
                    )))
                }
            };
            let complex = self.load_complex(&entity, clauses);
            let column = format!("{}_items", group.alias);
            items.push(format!("collect({}) AS {column}", entity.alias));
            let complex_column = complex.map(|complex| {
                let collected = format!("{column}_complex");
                items.push(format!("collect({complex}) AS {collected}"));
                collected
            });
            grouped = Some(EntityColumns::node(column, complex_column));
        }

        let mut clause = format!("WITH {}", items.join(", "));
        if !group.filters.is_empty() {
            clause.push_str("\nWHERE ");
            clause.push_str(&group.filters.join(" AND "));
        }
        clauses.push(clause);
        Ok(grouped)
    }

    fn row_items(&mut self, clauses: &mut Vec<String>) -> GraphResult<(Vec<String>, ResultShape)> {
        if let Some(path) = self.ctx.parts().path_alias.clone() {
            if self.group.is_some() || self.projection.is_some() {
                return Err(unsupported(
                    "paths cannot be combined with select or group_by",
                ));
            }
            let mut items = vec![path.clone()];
            let complex_column = self.path_complex(&path).map(|expression| {
                let column = complex_column(&path);
                items.push(format!("{expression} AS {column}"));
                column
            });
            return Ok((
                items,
                ResultShape::Paths {
                    column: path,
                    complex_column,
                },
            ));
        }

        if let Some(group) = self.group.clone() {
            let grouped = self.group_clause(&group, self.projection.is_none(), clauses)?;
            return match (&self.projection, grouped) {
                (Some(projection), _) => Self::projection_items(projection),
                (None, Some(items)) => {
                    let key = format!("{}_key", group.alias);
                    let mut returned = vec![key.clone(), items.column.clone()];
                    returned.extend(items.complex_column.clone());
                    Ok((returned, ResultShape::Groups { key, items }))
                }
                (None, None) => Err(unsupported("group has nothing to return")),
            };
        }

        if let Some(projection) = &self.projection {
            return Self::projection_items(projection);
        }

        let entity = match &self.current {
            Operand::Entity(entity) => entity.clone(),
            other => return Err(unsupported(format!("cannot return a {}", other.describe()))),
        };

        match (self.traversal_source.clone(), self.last_hop.clone()) {
            (Some(source), Some(hop)) => {
                let (mut items, source_columns) = self.entity_items(&source, clauses);
                let hops = format!("{}_hops", hop.alias);
                let start = |x: &str| format!("startNode({x}).{ID_PROPERTY}");
                let end = |x: &str| format!("endNode({x}).{ID_PROPERTY}");
                let expression = if hop.variable_length {
                    let x = self.ctx.alias(AliasKind::Variable);
                    format!(
                        "[{x} IN {r} | {{relationship: {x}, start: {}, end: {}}}]",
                        start(&x),
                        end(&x),
                        r = hop.alias
                    )
                } else {
                    format!(
                        "[{{relationship: {r}, start: {}, end: {}}}]",
                        start(&hop.alias),
                        end(&hop.alias),
                        r = hop.alias
                    )
                };
                items.push(format!("{expression} AS {hops}"));
                let (target_items, target_columns) = self.entity_items(&entity, clauses);
                items.extend(target_items);
                Ok((
                    items,
                    ResultShape::Traversal {
                        source: source_columns,
                        hops,
                        target: target_columns,
                    },
                ))
            }
            _ => {
                let (items, columns) = self.entity_items(&entity, clauses);
                Ok((items, ResultShape::Entities(columns)))
            }
        }
    }

    /// Operand the scalar terminal reads after an intermediate WITH
    fn rebound(&self) -> Operand {
        match &self.projection {
            Some(Operand::Value { kind, .. }) => Operand::value(VALUE_COLUMN, *kind),
            Some(Operand::List { element, .. }) => Operand::List {
                text: VALUE_COLUMN.to_string(),
                element: *element,
            },
            Some(Operand::Map { members, .. }) => {
                let rebound: Vec<(String, Operand)> = members
                    .iter()
                    .map(|(name, member)| {
                        let column = quote_identifier(name).into_owned();
                        (name.clone(), Operand::value(column, member.kind()))
                    })
                    .collect();
                let entries: Vec<String> = rebound
                    .iter()
                    .map(|(name, _)| {
                        let column = quote_identifier(name);
                        format!("{column}: {column}")
                    })
                    .collect();
                Operand::Map {
                    text: format!("{{{}}}", entries.join(", ")),
                    members: rebound,
                }
            }
            _ => self.current.clone(),
        }
    }

    fn finish_scalar(&mut self, terminal: &Terminal) -> GraphResult<(Vec<String>, ResultShape)> {
        let parts = self.ctx.parts();
        let intermediate = parts.is_paged() || parts.distinct || self.group.is_some();
        let operand = if intermediate {
            self.rebound()
        } else {
            self.current.clone()
        };

        // Selectors first: group aggregates they register must reach the WITH
        let registry = self.registry;
        let mut rejected = None;
        let selected = |this: &mut Self, selector: &Option<Lambda>, name: &str| match selector {
            Some(selector) => ExpressionBuilder::new(registry).scalar(
                selector,
                operand.clone(),
                &mut this.ctx,
            ),
            None => match &operand {
                Operand::Value { text, .. } => Ok(text.clone()),
                other => Err(unsupported(format!(
                    "{name} over a {} needs a selector",
                    other.describe()
                ))),
            },
        };
        let result = match terminal {
            Terminal::Count => "count(*)".to_string(),
            Terminal::Any => "count(*) > 0".to_string(),
            Terminal::All(predicate) => {
                let condition = ExpressionBuilder::new(registry).predicate(
                    predicate,
                    operand.clone(),
                    &mut self.ctx,
                )?;
                rejected = Some(format!("NOT ({condition})"));
                "count(*) = 0".to_string()
            }
            Terminal::Sum(selector) => format!("sum({})", selected(self, selector, "sum")?),
            Terminal::Average(selector) => {
                format!("avg({})", selected(self, selector, "average")?)
            }
            Terminal::Min(selector) => format!("min({})", selected(self, selector, "min")?),
            Terminal::Max(selector) => format!("max({})", selected(self, selector, "max")?),
            other => {
                return Err(GraphError::invalid_operation(format!(
                    "{} is not a scalar terminal",
                    other.name()
                )))
            }
        };

        let mut clauses = Vec::new();
        if !intermediate {
            if let Some(rejected) = rejected {
                self.ctx.parts_mut().filters.push(rejected);
            }
            clauses.push(self.match_clause());
        } else {
            clauses.push(self.match_clause());
            let distinct = self.ctx.parts().distinct;
            let mut items = Vec::new();
            if let Some(group) = self.group.clone() {
                self.group_clause(&group, false, &mut clauses)?;
                if !distinct || self.projection.is_none() {
                    items.push(format!("{}_key", group.alias));
                    items.extend(
                        self.ctx
                            .parts()
                            .group_aggregates
                            .iter()
                            .map(|(column, _)| column.clone()),
                    );
                }
            } else if !distinct || self.projection.is_none() {
                items.extend(self.variables.iter().cloned());
            }
            if let Some(projection) = &self.projection {
                items.extend(Self::projection_items(projection)?.0);
            }

            let mut clause = format!(
                "WITH {}{}",
                if distinct { "DISTINCT " } else { "" },
                items.join(", ")
            );
            for line in self.paging_clauses() {
                clause.push('\n');
                clause.push_str(&line);
            }
            if let Some(rejected) = rejected {
                clause.push_str("\nWHERE ");
                clause.push_str(&rejected);
            }
            clauses.push(clause);
        }
        clauses.push(format!("RETURN {result} AS {RESULT_COLUMN}"));
        Ok((
            clauses,
            ResultShape::Scalar {
                column: RESULT_COLUMN.to_string(),
            },
        ))
    }
}
