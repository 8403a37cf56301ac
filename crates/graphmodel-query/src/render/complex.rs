//! Complex-property load fragments.
//!
//! Complex values live on auxiliary nodes reached through reserved-prefix
//! relationships. Loading them alongside an entity walks those
//! relationships up to the configured depth and collects one entry per
//! reachable auxiliary node:
//!
//! ```text
//! OPTIONAL MATCH (n1)-[cr1*1..5]->(cn1)
//! WHERE ALL(x1 IN cr1 WHERE type(x1) STARTS WITH $p1)
//! WITH n1, collect({path: [x2 IN cr1 | type(x2)], seq: [x3 IN cr1 | x3.SequenceNumber], node: cn1}) AS n1_complex
//! ```
//!
//! `path` lists the relationship types from the entity to the node and
//! `seq` their sequence numbers, which is enough to rebuild the tree.

use crate::context::{AliasKind, BuildContext};
use graphmodel_core::naming::{PROPERTY_RELATIONSHIP_PREFIX, SEQUENCE_NUMBER_PROPERTY};

/// Column holding the collected complex entries of `alias`
pub fn complex_column(alias: &str) -> String {
    format!("{alias}_complex")
}

/// Rendered load for one entity alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexLoad {
    pub clause: String,
    pub column: String,
}

impl ComplexLoad {
    /// Load the complex properties of `anchor`, carrying `carried` through
    /// the aggregating WITH
    pub fn render(
        ctx: &mut BuildContext,
        anchor: &str,
        depth: usize,
        carried: &[String],
    ) -> Self {
        let relationships = ctx.alias(AliasKind::ComplexRelationship);
        let node = ctx.alias(AliasKind::ComplexNode);
        let filter_variable = ctx.alias(AliasKind::Variable);
        let type_variable = ctx.alias(AliasKind::Variable);
        let seq_variable = ctx.alias(AliasKind::Variable);
        let prefix = ctx.parameter(PROPERTY_RELATIONSHIP_PREFIX);
        let column = complex_column(anchor);

        let clause = format!(
            "OPTIONAL MATCH ({anchor})-[{relationships}*1..{depth}]->({node})\n\
             WHERE ALL({filter_variable} IN {relationships} WHERE type({filter_variable}) STARTS WITH {prefix})\n\
             WITH {carried}, collect({{path: [{type_variable} IN {relationships} | type({type_variable})], \
             seq: [{seq_variable} IN {relationships} | {seq_variable}.{SEQUENCE_NUMBER_PROPERTY}], \
             node: {node}}}) AS {column}",
            depth = depth.max(1),
            carried = carried.join(", "),
        );

        Self { clause, column }
    }

    /// Pattern comprehension collecting the entries of `anchor` in place.
    /// Used for nodes the MATCH does not bind, such as the members of a
    /// returned path.
    pub fn entries(ctx: &mut BuildContext, anchor: &str, depth: usize) -> String {
        let relationships = ctx.alias(AliasKind::ComplexRelationship);
        let node = ctx.alias(AliasKind::ComplexNode);
        let filter_variable = ctx.alias(AliasKind::Variable);
        let type_variable = ctx.alias(AliasKind::Variable);
        let seq_variable = ctx.alias(AliasKind::Variable);
        let prefix = ctx.parameter(PROPERTY_RELATIONSHIP_PREFIX);

        format!(
            "[({anchor})-[{relationships}*1..{depth}]->({node}) \
             WHERE ALL({filter_variable} IN {relationships} WHERE type({filter_variable}) STARTS WITH {prefix}) \
             | {{path: [{type_variable} IN {relationships} | type({type_variable})], \
             seq: [{seq_variable} IN {relationships} | {seq_variable}.{SEQUENCE_NUMBER_PROPERTY}], \
             node: {node}}}]",
            depth = depth.max(1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmodel_core::GraphValue;

    #[test]
    fn test_load_clause() {
        let mut ctx = BuildContext::new();
        ctx.alias(AliasKind::Node);
        let load = ComplexLoad::render(&mut ctx, "n1", 5, &["n1".to_string()]);

        assert_eq!(load.column, "n1_complex");
        insta::assert_snapshot!(load.clause, @r"
        OPTIONAL MATCH (n1)-[cr1*1..5]->(cn1)
        WHERE ALL(x1 IN cr1 WHERE type(x1) STARTS WITH $p1)
        WITH n1, collect({path: [x2 IN cr1 | type(x2)], seq: [x3 IN cr1 | x3.SequenceNumber], node: cn1}) AS n1_complex
        ");
        assert_eq!(
            ctx.parameters().get("p1"),
            Some(&GraphValue::from("__PROPERTY__"))
        );
    }

    #[test]
    fn test_entries_comprehension() {
        let mut ctx = BuildContext::new();
        let entries = ComplexLoad::entries(&mut ctx, "x1", 2);
        assert_eq!(
            entries,
            "[(x1)-[cr1*1..2]->(cn1) WHERE ALL(x2 IN cr1 WHERE type(x2) STARTS WITH $p1) \
             | {path: [x3 IN cr1 | type(x3)], seq: [x4 IN cr1 | x4.SequenceNumber], node: cn1}]"
        );
    }

    #[test]
    fn test_carries_every_variable() {
        let mut ctx = BuildContext::new();
        let carried = vec!["n1".to_string(), "r1".to_string(), "n2".to_string()];
        let load = ComplexLoad::render(&mut ctx, "n2", 3, &carried);
        assert!(load.clause.contains("WITH n1, r1, n2, collect("));
        assert!(load.clause.contains("(n2)-[cr1*1..3]->(cn1)"));
        assert!(load.clause.ends_with("AS n2_complex"));
    }
}
