//! Cypher query renderer.
//!
//! Renders a [`QueryModel`] to Cypher with:
//! - a single MATCH pattern extended by traversal steps
//! - `EXISTS` / `COUNT` subqueries for complex-property predicates
//! - complex-property loads for every returned node
//! - parameter binding for every constant, SKIP and LIMIT

use crate::coordinator::QueryCoordinator;
use crate::operator::QueryModel;
use crate::render::{QueryRenderer, RenderedQuery};
use graphmodel_core::naming::DEFAULT_DEPTH_ALLOWED;
use graphmodel_core::{GraphResult, SchemaRegistry};
use std::sync::Arc;
use tracing::debug;

/// Cypher renderer over a shared schema registry.
#[derive(Debug, Clone)]
pub struct CypherRenderer {
    registry: Arc<SchemaRegistry>,
    /// Relationship hops walked when loading complex properties
    complex_depth: usize,
    /// Upper bound on the summed max depth of traversal steps
    traversal_limit: Option<usize>,
}

impl CypherRenderer {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            complex_depth: DEFAULT_DEPTH_ALLOWED,
            traversal_limit: None,
        }
    }

    pub fn with_complex_depth(mut self, depth: usize) -> Self {
        self.complex_depth = depth.max(1);
        self
    }

    pub fn with_traversal_limit(mut self, limit: Option<usize>) -> Self {
        self.traversal_limit = limit;
        self
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn complex_depth(&self) -> usize {
        self.complex_depth
    }
}

impl QueryRenderer for CypherRenderer {
    fn name(&self) -> &str {
        "cypher"
    }

    fn render(&self, model: &QueryModel) -> GraphResult<RenderedQuery> {
        if let Some(limit) = self.traversal_limit {
            model.check_depth_limit(limit)?;
        }

        let mut coordinator = QueryCoordinator::new(&self.registry, self.complex_depth, &model.root)?;
        for operator in &model.operators {
            coordinator.apply(operator)?;
        }
        let rendered = coordinator.finish(&model.terminal)?;

        debug!(
            root = model.root.schema.type_name(),
            operators = model.operators.len(),
            terminal = model.terminal.name(),
            parameters = rendered.parameters.len(),
            "Rendered Cypher query"
        );
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, Lambda};
    use crate::operator::{QueryOperator, QueryRoot, Terminal, TraversalDirection, TraversalStep};
    use crate::render::{EntityColumns, ResultShape, RowSelection};
    use crate::test_fixtures::{
        polymorphic_registry, registry, Company, Employee, Knows, Person, WorksAt,
    };
    use graphmodel_core::{ErrorKind, GraphEntity, GraphValue};

    fn renderer() -> CypherRenderer {
        CypherRenderer::new(Arc::new(registry()))
    }

    fn model<T: GraphEntity>(renderer: &CypherRenderer) -> QueryModel {
        let schema = renderer.registry().schema_of::<T>().unwrap();
        let labels = renderer.registry().polymorphic_labels(&schema);
        QueryModel::new(QueryRoot::new(schema, labels))
    }

    fn filter(body: impl FnOnce(Expr) -> Expr) -> QueryOperator {
        QueryOperator::Where(Lambda::new("x", body))
    }

    fn order_by(member: &str, descending: bool) -> QueryOperator {
        QueryOperator::OrderBy {
            key: Lambda::new("x", |x| x.field(member)),
            descending,
        }
    }

    fn works_at(renderer: &CypherRenderer) -> TraversalStep {
        let registry = renderer.registry();
        TraversalStep::new(
            registry.schema_of::<WorksAt>().unwrap(),
            registry.schema_of::<Company>().unwrap(),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_filter_with_complex_member() {
        let renderer = renderer();
        let query = model::<Person>(&renderer).with(filter(|p| {
            p.field("Age")
                .lt(35)
                .and(p.field("HomeAddress").field("City").eq("Seattle"))
        }));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Person)
        WHERE (n1.Age < $p1 AND EXISTS { MATCH (n1)-[:__PROPERTY__HomeAddress__]->(c1) WHERE c1.City = $p2 })
        OPTIONAL MATCH (n1)-[cr1*1..5]->(cn1)
        WHERE ALL(x1 IN cr1 WHERE type(x1) STARTS WITH $p3)
        WITH n1, collect({path: [x2 IN cr1 | type(x2)], seq: [x3 IN cr1 | x3.SequenceNumber], node: cn1}) AS n1_complex
        RETURN n1, n1_complex
        ");
        assert_eq!(rendered.parameters.get("p1"), Some(&GraphValue::Int(35)));
        assert_eq!(
            rendered.parameters.get("p2"),
            Some(&GraphValue::from("Seattle"))
        );
        assert_eq!(
            rendered.shape,
            ResultShape::Entities(EntityColumns::node("n1", Some("n1_complex".to_string())))
        );
        assert_eq!(rendered.selection, RowSelection::All);
    }

    #[test]
    fn test_string_constants_are_never_inlined() {
        let renderer = renderer();
        let query = model::<Company>(&renderer).with(filter(|c| c.field("Name").eq("O'Brien")));
        let rendered = renderer.render(&query).unwrap();

        assert!(!rendered.text.contains("O'Brien"));
        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Company)
        WHERE n1.Name = $p1
        RETURN n1
        ");
        assert_eq!(
            rendered.parameters.get("p1"),
            Some(&GraphValue::from("O'Brien"))
        );
    }

    #[test]
    fn test_filters_are_anded_in_order() {
        let renderer = renderer();
        let query = model::<Company>(&renderer)
            .with(filter(|c| c.field("Name").starts_with("A")))
            .with(filter(|c| c.field("Name").ne("Acme")));
        let rendered = renderer.render(&query).unwrap();
        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Company)
        WHERE n1.Name STARTS WITH $p1 AND n1.Name <> $p2
        RETURN n1
        ");
    }

    #[test]
    fn test_order_skip_take() {
        let renderer = renderer();
        let query = model::<Company>(&renderer)
            .with(order_by("Name", false))
            .with(QueryOperator::Skip(1))
            .with(QueryOperator::Take(2));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Company)
        RETURN n1
        ORDER BY n1.Name
        SKIP $p1
        LIMIT $p2
        ");
        assert_eq!(rendered.parameters.get("p1"), Some(&GraphValue::Int(1)));
        assert_eq!(rendered.parameters.get("p2"), Some(&GraphValue::Int(2)));
    }

    #[test]
    fn test_repeated_take_keeps_one_limit() {
        let renderer = renderer();
        let query = model::<Company>(&renderer)
            .with(QueryOperator::Take(5))
            .with(QueryOperator::Take(5));
        let rendered = renderer.render(&query).unwrap();

        assert_eq!(rendered.text.matches("LIMIT").count(), 1);
        assert_eq!(rendered.parameters.len(), 1);
        assert_eq!(rendered.parameters.get("p1"), Some(&GraphValue::Int(5)));
    }

    #[test]
    fn test_operators_after_paging_are_rejected() {
        let renderer = renderer();
        for operator in [
            filter(|c| c.field("Name").eq("x")),
            order_by("Name", false),
            QueryOperator::Distinct,
        ] {
            let query = model::<Company>(&renderer)
                .with(QueryOperator::Take(3))
                .with(operator);
            let err = renderer.render(&query).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedQuery);
        }
    }

    #[test]
    fn test_first_and_single_clamp_limit() {
        let renderer = renderer();
        let first = model::<Company>(&renderer)
            .with(QueryOperator::Take(5))
            .with_terminal(Terminal::First);
        let rendered = renderer.render(&first).unwrap();
        assert_eq!(rendered.parameters.get("p1"), Some(&GraphValue::Int(1)));
        assert_eq!(rendered.selection, RowSelection::First);

        let single = model::<Company>(&renderer).with_terminal(Terminal::SingleOrDefault);
        let rendered = renderer.render(&single).unwrap();
        assert!(rendered.text.ends_with("LIMIT $p1"));
        assert_eq!(rendered.parameters.get("p1"), Some(&GraphValue::Int(2)));
        assert_eq!(rendered.selection, RowSelection::Single);
    }

    #[test]
    fn test_last_inverts_ordering() {
        let renderer = renderer();
        let query = model::<Company>(&renderer)
            .with(order_by("Name", false))
            .with_terminal(Terminal::Last);
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Company)
        RETURN n1
        ORDER BY n1.Name DESC
        LIMIT $p1
        ");
        assert_eq!(rendered.selection, RowSelection::First);
    }

    #[test]
    fn test_last_without_ordering_is_buffered() {
        let renderer = renderer();
        let query = model::<Company>(&renderer)
            .with(order_by("Name", false))
            .with(QueryOperator::Take(10))
            .with_terminal(Terminal::LastOrDefault);
        let rendered = renderer.render(&query).unwrap();

        assert!(rendered.text.contains("ORDER BY n1.Name\n"));
        assert_eq!(rendered.selection, RowSelection::Last);
    }

    #[test]
    fn test_polymorphic_root_matches_every_label() {
        let renderer = CypherRenderer::new(Arc::new(polymorphic_registry()));
        let query = model::<Person>(&renderer).with_terminal(Terminal::Count);
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1)
        WHERE (n1:Person OR n1:Employee)
        RETURN count(*) AS result
        ");
    }

    #[test]
    fn test_relationship_root() {
        let renderer = renderer();
        let query = model::<Knows>(&renderer).with(filter(|k| {
            k.field("Since").gt(2000).and(k.field("EndNodeId").eq("p-2"))
        }));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1)-[r1:KNOWS]->(n2)
        WHERE (r1.Since > $p1 AND n2.Id = $p2)
        RETURN r1, n1.Id AS r1_start, n2.Id AS r1_end
        ");
        assert_eq!(
            rendered.shape,
            ResultShape::Entities(EntityColumns::relationship("r1"))
        );
    }

    #[test]
    fn test_variable_length_traversal_with_relationship_filter() {
        let renderer = renderer();
        let step = works_at(&renderer)
            .with_depth(1, 3)
            .unwrap()
            .with_relationship_filter(Lambda::new("w", |w| w.field("Role").eq("Engineer")));
        let query = model::<Employee>(&renderer).with(QueryOperator::Traverse(step));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Employee)-[r1:WORKS_AT*1..3]->(n2:Company)
        WHERE ALL(x1 IN r1 WHERE x1.Role = $p1)
        RETURN n1, [x2 IN r1 | {relationship: x2, start: startNode(x2).Id, end: endNode(x2).Id}] AS r1_hops, n2
        ");
        assert_eq!(
            rendered.shape,
            ResultShape::Traversal {
                source: EntityColumns::node("n1", None),
                hops: "r1_hops".to_string(),
                target: EntityColumns::node("n2", None),
            }
        );
    }

    #[test]
    fn test_incoming_single_hop() {
        let renderer = renderer();
        let registry = renderer.registry();
        let step = TraversalStep::new(
            registry.schema_of::<WorksAt>().unwrap(),
            registry.schema_of::<Employee>().unwrap(),
            Vec::new(),
        )
        .unwrap()
        .with_direction(TraversalDirection::Incoming);
        let query = model::<Company>(&renderer).with(QueryOperator::Traverse(step));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Company)<-[r1:WORKS_AT]-(n2:Employee)
        RETURN n1, [{relationship: r1, start: startNode(r1).Id, end: endNode(r1).Id}] AS r1_hops, n2
        ");
    }

    #[test]
    fn test_fixed_depth_and_both_directions() {
        let renderer = renderer();
        let step = works_at(&renderer)
            .with_depth(2, 2)
            .unwrap()
            .with_direction(TraversalDirection::Both);
        let query = model::<Employee>(&renderer)
            .with(QueryOperator::Traverse(step))
            .with(QueryOperator::IncludePaths);
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH path1 = (n1:Employee)-[r1:WORKS_AT*2]-(n2:Company)
        RETURN path1
        ");
        assert_eq!(
            rendered.shape,
            ResultShape::Paths {
                column: "path1".to_string(),
                complex_column: None,
            }
        );
    }

    #[test]
    fn test_paths_collect_complex_entries_per_node() {
        let renderer = renderer();
        let registry = renderer.registry();
        let step = TraversalStep::new(
            registry.schema_of::<Knows>().unwrap(),
            registry.schema_of::<Person>().unwrap(),
            Vec::new(),
        )
        .unwrap()
        .with_depth(1, 2)
        .unwrap();
        let query = model::<Person>(&renderer)
            .with(QueryOperator::Traverse(step))
            .with(QueryOperator::IncludePaths);
        let rendered = renderer.render(&query).unwrap();

        assert!(rendered.text.starts_with("MATCH path1 = (n1:Person)-[r1:KNOWS*1..2]->(n2:Person)"));
        assert!(rendered.text.contains("IN nodes(path1) | [("));
        assert!(rendered.text.contains("[x1 IN nodes(path1) | [(x1)-[cr1*1..5]->(cn1) WHERE ALL(x2 IN cr1 WHERE type(x2) STARTS WITH $p1)"));
        assert!(rendered.text.ends_with("AS path1_complex"));
        assert_eq!(
            rendered.shape,
            ResultShape::Paths {
                column: "path1".to_string(),
                complex_column: Some("path1_complex".to_string()),
            }
        );
    }

    #[test]
    fn test_traversal_depth_limit() {
        let renderer = renderer().with_traversal_limit(Some(2));
        let step = works_at(&renderer).with_depth(1, 3).unwrap();
        let query = model::<Employee>(&renderer).with(QueryOperator::Traverse(step));
        let err = renderer.render(&query).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_where_relationship_needs_traversal() {
        let renderer = renderer();
        let query = model::<Employee>(&renderer).with(QueryOperator::WhereRelationship(
            Lambda::new("w", |w| w.field("Role").eq("x")),
        ));
        let err = renderer.render(&query).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_projection_and_ordering() {
        let renderer = renderer();
        let query = model::<Employee>(&renderer)
            .with(order_by("Age", true))
            .with(QueryOperator::Select(Lambda::new("e", |e| {
                Expr::object([("Name", e.field("FirstName")), ("Salary", e.field("Salary"))])
            })));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Employee)
        RETURN n1.first_name AS Name, n1.Salary AS Salary
        ORDER BY n1.Age DESC
        ");
        assert_eq!(
            rendered.shape,
            ResultShape::Projection {
                columns: vec!["Name".to_string(), "Salary".to_string()],
                single: false,
            }
        );
    }

    #[test]
    fn test_group_by_with_aggregates() {
        let renderer = renderer();
        let query = model::<Employee>(&renderer)
            .with(QueryOperator::GroupBy(Lambda::new("e", |e| e.field("LastName"))))
            .with(QueryOperator::Where(Lambda::new("g", |g| g.count().gt(1))))
            .with(QueryOperator::Select(Lambda::new("g", |g| {
                Expr::object([
                    ("Name", g.key()),
                    ("Count", g.clone().count()),
                    ("Total", g.sum(|e| e.field("Salary"))),
                ])
            })));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Employee)
        WITH n1.LastName AS g1_key, count(n1) AS g1_agg1, sum(n1.Salary) AS g1_agg2
        WHERE g1_agg1 > $p1
        RETURN g1_key AS Name, g1_agg1 AS Count, g1_agg2 AS Total
        ");
    }

    #[test]
    fn test_raw_groups_collect_items() {
        let renderer = renderer();
        let query = model::<Employee>(&renderer)
            .with(QueryOperator::GroupBy(Lambda::new("e", |e| e.field("LastName"))));
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Employee)
        WITH n1.LastName AS g1_key, collect(n1) AS g1_items
        RETURN g1_key, g1_items
        ");
        assert_eq!(
            rendered.shape,
            ResultShape::Groups {
                key: "g1_key".to_string(),
                items: EntityColumns::node("g1_items", None),
            }
        );
    }

    #[test]
    fn test_scalar_terminals() {
        let renderer = renderer();

        let all = model::<Company>(&renderer).with_terminal(Terminal::All(Lambda::new("c", |c| {
            c.field("Name").starts_with("A")
        })));
        insta::assert_snapshot!(renderer.render(&all).unwrap().text, @r"
        MATCH (n1:Company)
        WHERE NOT (n1.Name STARTS WITH $p1)
        RETURN count(*) = 0 AS result
        ");

        let sum = model::<Employee>(&renderer)
            .with(QueryOperator::Select(Lambda::new("e", |e| e.field("Salary"))))
            .with_terminal(Terminal::Sum(None));
        insta::assert_snapshot!(renderer.render(&sum).unwrap().text, @r"
        MATCH (n1:Employee)
        RETURN sum(n1.Salary) AS result
        ");

        let average = model::<Employee>(&renderer)
            .with_terminal(Terminal::Average(Some(Lambda::new("e", |e| e.field("Age")))));
        insta::assert_snapshot!(renderer.render(&average).unwrap().text, @r"
        MATCH (n1:Employee)
        RETURN avg(n1.Age) AS result
        ");

        let missing = model::<Employee>(&renderer).with_terminal(Terminal::Max(None));
        assert_eq!(
            renderer.render(&missing).unwrap_err().kind(),
            ErrorKind::UnsupportedQuery
        );
    }

    #[test]
    fn test_scalar_over_page_uses_intermediate_with() {
        let renderer = renderer();
        let query = model::<Company>(&renderer)
            .with(order_by("Name", false))
            .with(QueryOperator::Skip(1))
            .with(QueryOperator::Take(2))
            .with_terminal(Terminal::Any);
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Company)
        WITH n1
        ORDER BY n1.Name
        SKIP $p1
        LIMIT $p2
        RETURN count(*) > 0 AS result
        ");
    }

    #[test]
    fn test_distinct_projection_count() {
        let renderer = renderer();
        let query = model::<Employee>(&renderer)
            .with(QueryOperator::Select(Lambda::new("e", |e| e.field("LastName"))))
            .with(QueryOperator::Distinct)
            .with_terminal(Terminal::Count);
        let rendered = renderer.render(&query).unwrap();

        insta::assert_snapshot!(rendered.text, @r"
        MATCH (n1:Employee)
        WITH DISTINCT n1.LastName AS value
        RETURN count(*) AS result
        ");
    }

    #[test]
    fn test_aliases_are_unique_across_features() {
        let renderer = renderer();
        let registry = renderer.registry();
        let step = TraversalStep::new(
            registry.schema_of::<Knows>().unwrap(),
            registry.schema_of::<Person>().unwrap(),
            Vec::new(),
        )
        .unwrap()
        .with_depth(1, 2)
        .unwrap();
        let query = model::<Person>(&renderer)
            .with(filter(|p| p.field("PreviousAddresses").any(|a| a.field("City").eq("Austin"))))
            .with(QueryOperator::Traverse(step))
            .with(filter(|f| f.field("HomeAddress").field("City").eq("Boston")));
        let rendered = renderer.render(&query).unwrap();

        // Both ends carry complex loads with their own aliases
        assert!(rendered.text.contains("(n1)-[cr1*1..5]->(cn1)"));
        assert!(rendered.text.contains("(n2)-[cr2*1..5]->(cn2)"));
        assert!(rendered.text.contains("(c1) WHERE c1.City = $p1"));
        assert!(rendered.text.contains("(c2) WHERE c2.City = $p2"));
        assert!(rendered.text.contains("WITH n1, r1, n2, n1_complex, collect("));
        assert!(rendered.text.ends_with("RETURN n1, n1_complex, [x4 IN r1 | {relationship: x4, start: startNode(x4).Id, end: endNode(x4).Id}] AS r1_hops, n2, n2_complex"));
    }

    #[test]
    fn test_complex_roots_are_rejected() {
        let renderer = renderer();
        let schema = renderer
            .registry()
            .complex_schema_of::<crate::test_fixtures::Address>()
            .unwrap();
        let err = renderer
            .render(&QueryModel::new(QueryRoot::new(schema, Vec::new())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
