//! Complex-property persistence.
//!
//! A complex property is stored as an auxiliary node linked from its owner
//! through a `__PROPERTY__{name}__` relationship carrying the item's
//! `SequenceNumber`. Nested complex properties hang off the auxiliary node
//! the same way, so a whole value is a tree rooted at the entity.
//!
//! Writes are planned up front as a preorder list of [`AuxiliaryWrite`]s and
//! executed in order; updates delete every reachable auxiliary node and
//! write the tree again.

use crate::transaction::GraphTransaction;
use graphmodel_core::naming::{
    property_relationship_type, AUX_ID_PROPERTY, PROPERTY_RELATIONSHIP_PREFIX,
    SEQUENCE_NUMBER_PROPERTY,
};
use graphmodel_core::{EntityInfo, GraphError, GraphResult, GraphValue, Parameters, ID_PROPERTY};
use graphmodel_query::render::quote_identifier;
use tracing::debug;

/// Node an auxiliary write attaches to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxiliaryParent {
    /// The owning entity, matched by label and identifier
    Entity { label: String, id: String },
    /// A previously written auxiliary node, matched by label and aux id
    Auxiliary { label: String, aux_id: String },
}

/// One auxiliary node plus the relationship linking it to its parent
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryWrite {
    pub parent: AuxiliaryParent,
    pub label: String,
    pub aux_id: String,
    /// Simple properties of the nested value, including the aux id
    pub properties: Parameters,
    pub relationship_type: String,
    pub sequence_number: usize,
}

impl AuxiliaryWrite {
    /// Statement text and parameters creating this node
    pub fn statement(&self) -> (String, Parameters) {
        let parent = match &self.parent {
            AuxiliaryParent::Entity { label, .. } => {
                format!("(parent:{} {{{ID_PROPERTY}: $parent_id}})", quote_identifier(label))
            }
            AuxiliaryParent::Auxiliary { label, .. } => format!(
                "(parent:{} {{{AUX_ID_PROPERTY}: $parent_id}})",
                quote_identifier(label)
            ),
        };
        let parent_id = match &self.parent {
            AuxiliaryParent::Entity { id, .. } => id.clone(),
            AuxiliaryParent::Auxiliary { aux_id, .. } => aux_id.clone(),
        };
        let text = format!(
            "MATCH {parent}\n\
             CREATE (parent)-[:{rel} {{{SEQUENCE_NUMBER_PROPERTY}: $sequence}}]->(aux:{label} $properties)",
            rel = quote_identifier(&self.relationship_type),
            label = quote_identifier(&self.label),
        );

        let mut parameters = Parameters::new();
        parameters.insert("parent_id".to_string(), GraphValue::from(parent_id));
        parameters.insert(
            "sequence".to_string(),
            GraphValue::Int(i64::try_from(self.sequence_number).unwrap_or(i64::MAX)),
        );
        parameters.insert(
            "properties".to_string(),
            GraphValue::Map(self.properties.clone()),
        );
        (text, parameters)
    }
}

/// Plan the auxiliary writes for every complex property of `info`, parents
/// before children, collection items in sequence order.
///
/// Nesting deeper than `depth` is rejected, since reads and deletes never
/// follow property relationships past it.
pub fn plan_complex_writes(
    parent: &AuxiliaryParent,
    info: &EntityInfo,
    depth: usize,
) -> GraphResult<Vec<AuxiliaryWrite>> {
    let mut writes = Vec::new();
    plan_recursive(parent, info, 1, depth, &mut writes)?;
    Ok(writes)
}

fn plan_recursive(
    parent: &AuxiliaryParent,
    info: &EntityInfo,
    level: usize,
    depth: usize,
    writes: &mut Vec<AuxiliaryWrite>,
) -> GraphResult<()> {
    for (storage_name, property) in info.complex_properties() {
        if level > depth && !property.items().is_empty() {
            return Err(GraphError::configuration(
                info.declared_type(),
                format!(
                    "complex property '{storage_name}' nests {level} levels deep, beyond the configured depth of {depth}"
                ),
            ));
        }
        let relationship_type = property_relationship_type(storage_name);
        for (sequence_number, child) in property.items().into_iter().enumerate() {
            let aux_id = uuid::Uuid::new_v4().to_string();
            let mut properties: Parameters = child
                .simple_properties()
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(name, value)| (name.clone(), value.to_graph_value()))
                .collect();
            properties.insert(AUX_ID_PROPERTY.to_string(), GraphValue::from(aux_id.clone()));

            let label = child.label().unwrap_or(child.declared_type()).to_string();
            writes.push(AuxiliaryWrite {
                parent: parent.clone(),
                label: label.clone(),
                aux_id: aux_id.clone(),
                properties,
                relationship_type: relationship_type.clone(),
                sequence_number,
            });
            plan_recursive(
                &AuxiliaryParent::Auxiliary { label, aux_id },
                child,
                level + 1,
                depth,
                writes,
            )?;
        }
    }
    Ok(())
}

/// Writes, replaces and deletes complex-property trees
#[derive(Debug, Clone, Copy)]
pub struct ComplexPropertyManager {
    depth: usize,
}

impl ComplexPropertyManager {
    /// `depth` bounds how deep writes nest and how far deletes follow
    /// property relationships
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Create the auxiliary nodes of `info` under the entity `label`/`id`.
    /// The first failing write aborts and its error propagates.
    pub async fn write_complex_properties(
        &self,
        label: &str,
        id: &str,
        info: &EntityInfo,
        tx: &GraphTransaction,
    ) -> GraphResult<usize> {
        let parent = AuxiliaryParent::Entity {
            label: label.to_string(),
            id: id.to_string(),
        };
        let writes = plan_complex_writes(&parent, info, self.depth)?;
        for write in &writes {
            let (text, parameters) = write.statement();
            tx.run("write_complex_properties", info.declared_type(), &text, &parameters)
                .await?;
        }
        if !writes.is_empty() {
            debug!(entity = id, count = writes.len(), "Wrote auxiliary nodes");
        }
        Ok(writes.len())
    }

    /// Replace the stored complex properties of the entity with those of
    /// `info`
    pub async fn update_complex_properties(
        &self,
        label: &str,
        id: &str,
        info: &EntityInfo,
        tx: &GraphTransaction,
    ) -> GraphResult<usize> {
        self.delete_complex_properties(label, id, tx).await?;
        self.write_complex_properties(label, id, info, tx).await
    }

    /// Remove every auxiliary node reachable from the entity
    pub async fn delete_complex_properties(
        &self,
        label: &str,
        id: &str,
        tx: &GraphTransaction,
    ) -> GraphResult<()> {
        let (text, parameters) = self.delete_statement(label, id);
        tx.run("delete_complex_properties", label, &text, &parameters)
            .await?;
        Ok(())
    }

    fn delete_statement(&self, label: &str, id: &str) -> (String, Parameters) {
        let text = format!(
            "MATCH (n:{label} {{{ID_PROPERTY}: $id}})-[rels*1..{depth}]->(aux)\n\
             WHERE ALL(rel IN rels WHERE type(rel) STARTS WITH $prefix)\n\
             DETACH DELETE aux",
            label = quote_identifier(label),
            depth = self.depth,
        );
        let mut parameters = Parameters::new();
        parameters.insert("id".to_string(), GraphValue::from(id));
        parameters.insert(
            "prefix".to_string(),
            GraphValue::from(PROPERTY_RELATIONSHIP_PREFIX),
        );
        (text, parameters)
    }
}
