//! Row materialization.
//!
//! Turns engine records into type-erased [`ResultRow`]s following the
//! [`ResultShape`] the renderer reported. Entities come back as
//! [`EntityInfo`] snapshots; typed decoding happens in the query façade.
//!
//! Complex properties arrive as a flat list of `{path, seq, node}` entries
//! per entity. `path` holds the relationship types from the entity down to
//! the auxiliary node and `seq` their sequence numbers; grouping entries by
//! that prefix rebuilds the tree.

use graphmodel_core::naming::{is_reserved_storage_name, property_relationship_type};
use graphmodel_core::{
    ComplexProperty, EntityInfo, EntitySchema, GraphError, GraphResult, GraphValue, NodeRecord,
    PathRecord, PropertyRole, Record, RelationshipRecord, SchemaRegistry, ID_PROPERTY,
};
use graphmodel_query::{EntityColumns, QueryModel, ResultShape};
use std::collections::HashMap;
use std::sync::Arc;

/// A path returned by a traversal with `paths()`
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPath {
    nodes: Vec<EntityInfo>,
    relationships: Vec<EntityInfo>,
}

impl GraphPath {
    /// A path needs at least one node and exactly one relationship between
    /// consecutive nodes
    pub fn new(nodes: Vec<EntityInfo>, relationships: Vec<EntityInfo>) -> GraphResult<Self> {
        if nodes.is_empty() {
            return Err(GraphError::serialization("path has no nodes"));
        }
        if relationships.len() + 1 != nodes.len() {
            return Err(GraphError::serialization(format!(
                "path has {} nodes but {} relationships",
                nodes.len(),
                relationships.len()
            )));
        }
        Ok(Self {
            nodes,
            relationships,
        })
    }

    pub fn nodes(&self) -> &[EntityInfo] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[EntityInfo] {
        &self.relationships
    }

    pub fn start(&self) -> &EntityInfo {
        &self.nodes[0]
    }

    pub fn end(&self) -> &EntityInfo {
        &self.nodes[self.nodes.len() - 1]
    }

    /// Number of relationships
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

/// One materialized row
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    Entity(EntityInfo),
    Projection(GraphValue),
    Scalar(GraphValue),
    Traversal {
        source: EntityInfo,
        relationships: Vec<EntityInfo>,
        target: EntityInfo,
    },
    Group {
        key: GraphValue,
        items: Vec<EntityInfo>,
    },
    Path(GraphPath),
}

fn shape_error(message: impl Into<String>) -> GraphError {
    GraphError::serialization(message)
}

fn column<'r>(record: &'r Record, name: &str) -> GraphResult<&'r GraphValue> {
    record
        .get(name)
        .ok_or_else(|| shape_error(format!("row has no column '{name}'")))
}

/// Schemas the rows of one query decode against
#[derive(Debug, Clone)]
pub struct Materializer<'a> {
    registry: &'a SchemaRegistry,
    source: Arc<EntitySchema>,
    relationship: Option<Arc<EntitySchema>>,
    target: Arc<EntitySchema>,
}

impl<'a> Materializer<'a> {
    /// Take the schemas from `model`: the root, plus the relationship and
    /// target of its last traversal step
    pub fn for_model(registry: &'a SchemaRegistry, model: &QueryModel) -> GraphResult<Self> {
        let source = registry.resolve(&model.root.schema)?;
        let (relationship, target) = match model.traversal_steps().last() {
            Some(step) => (
                Some(registry.resolve(step.relationship())?),
                registry.resolve(step.target())?,
            ),
            None => (None, Arc::clone(&source)),
        };
        Ok(Self {
            registry,
            source,
            relationship,
            target,
        })
    }

    /// Convert every record according to `shape`
    pub fn materialize(&self, shape: &ResultShape, records: Vec<Record>) -> GraphResult<Vec<ResultRow>> {
        records
            .iter()
            .map(|record| self.row(shape, record))
            .collect()
    }

    fn row(&self, shape: &ResultShape, record: &Record) -> GraphResult<ResultRow> {
        match shape {
            ResultShape::Entities(columns) => {
                self.entity(&self.target, columns, record).map(ResultRow::Entity)
            }
            ResultShape::Projection { columns, single } => {
                if *single {
                    let name = columns
                        .first()
                        .ok_or_else(|| shape_error("projection has no columns"))?;
                    return Ok(ResultRow::Projection(column(record, name)?.clone()));
                }
                let mut object = std::collections::BTreeMap::new();
                for name in columns {
                    object.insert(name.clone(), column(record, name)?.clone());
                }
                Ok(ResultRow::Projection(GraphValue::Map(object)))
            }
            ResultShape::Scalar { column: name } => {
                Ok(ResultRow::Scalar(column(record, name)?.clone()))
            }
            ResultShape::Traversal {
                source,
                hops,
                target,
            } => {
                let source_info = self.entity(&self.source, source, record)?;
                let target_info = self.entity(&self.target, target, record)?;
                let relationships = self.hops(column(record, hops)?)?;
                Ok(ResultRow::Traversal {
                    source: source_info,
                    relationships,
                    target: target_info,
                })
            }
            ResultShape::Groups { key, items } => {
                let key = column(record, key)?.clone();
                let nodes = column(record, &items.column)?
                    .as_list()
                    .ok_or_else(|| shape_error("group items are not a list"))?;
                let complex = match &items.complex_column {
                    Some(name) => column(record, name)?.as_list().unwrap_or_default(),
                    None => &[],
                };
                let items = nodes
                    .iter()
                    .enumerate()
                    .map(|(index, value)| {
                        let node = value
                            .as_node()
                            .ok_or_else(|| shape_error("group item is not a node"))?;
                        self.node_info(&self.target, node, complex.get(index))
                    })
                    .collect::<GraphResult<Vec<_>>>()?;
                Ok(ResultRow::Group { key, items })
            }
            ResultShape::Paths {
                column: name,
                complex_column,
            } => match column(record, name)? {
                GraphValue::Path(path) => {
                    let complex = match complex_column {
                        Some(complex) => column(record, complex)?
                            .as_list()
                            .ok_or_else(|| shape_error("path complex entries are not a list"))?,
                        None => &[],
                    };
                    self.path(path, complex).map(ResultRow::Path)
                }
                other => Err(shape_error(format!(
                    "path column holds a {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn entity(
        &self,
        schema: &Arc<EntitySchema>,
        columns: &EntityColumns,
        record: &Record,
    ) -> GraphResult<EntityInfo> {
        let value = column(record, &columns.column)?;
        if let Some((start, end)) = &columns.endpoint_columns {
            let relationship = value.as_relationship().ok_or_else(|| {
                shape_error(format!("column '{}' is not a relationship", columns.column))
            })?;
            return Ok(relationship_info(
                schema,
                relationship,
                record.get(start),
                record.get(end),
            ));
        }

        let node = value
            .as_node()
            .ok_or_else(|| shape_error(format!("column '{}' is not a node", columns.column)))?;
        let complex = match &columns.complex_column {
            Some(name) => record.get(name),
            None => None,
        };
        self.node_info(schema, node, complex)
    }

    fn hops(&self, value: &GraphValue) -> GraphResult<Vec<EntityInfo>> {
        let schema = self
            .relationship
            .as_ref()
            .ok_or_else(|| shape_error("traversal row without a traversal step"))?;
        value
            .as_list()
            .ok_or_else(|| shape_error("traversal hops are not a list"))?
            .iter()
            .map(|hop| {
                let hop = hop
                    .as_map()
                    .ok_or_else(|| shape_error("traversal hop is not a map"))?;
                let relationship = hop
                    .get("relationship")
                    .and_then(GraphValue::as_relationship)
                    .ok_or_else(|| shape_error("traversal hop has no relationship"))?;
                Ok(relationship_info(
                    schema,
                    relationship,
                    hop.get("start"),
                    hop.get("end"),
                ))
            })
            .collect()
    }

    /// `complex` holds one entry list per path node, in path order
    fn path(&self, path: &PathRecord, complex: &[GraphValue]) -> GraphResult<GraphPath> {
        let relationship_schema = self
            .relationship
            .as_ref()
            .ok_or_else(|| shape_error("path row without a traversal step"))?;

        let mut ids = HashMap::new();
        let mut nodes = Vec::with_capacity(path.nodes.len());
        for (index, node) in path.nodes.iter().enumerate() {
            if let Some(id) = node.properties.get(ID_PROPERTY) {
                ids.insert(node.element_id.as_str(), id.clone());
            }
            let schema = if node.labels.iter().any(|l| self.source.labels().contains(l)) {
                &self.source
            } else {
                &self.target
            };
            nodes.push(self.node_info(schema, node, complex.get(index))?);
        }

        let relationships = path
            .relationships
            .iter()
            .map(|relationship| {
                relationship_info(
                    relationship_schema,
                    relationship,
                    ids.get(relationship.start_element_id.as_str()),
                    ids.get(relationship.end_element_id.as_str()),
                )
            })
            .collect();
        GraphPath::new(nodes, relationships)
    }

    /// Snapshot of `node`, with its complex properties rebuilt from the
    /// collected `complex` entries
    pub fn node_info(
        &self,
        schema: &Arc<EntitySchema>,
        node: &NodeRecord,
        complex: Option<&GraphValue>,
    ) -> GraphResult<EntityInfo> {
        let schema = self.registry.resolve(schema)?;
        let mut info = simple_info(&schema, node);
        if schema.has_complex_properties() {
            let entries = complex.map(parse_entries).unwrap_or_default();
            let entries: Vec<&ComplexEntry> = entries.iter().collect();
            self.attach_complex(&mut info, &schema, &entries, 0)?;
        }
        Ok(info)
    }

    fn attach_complex(
        &self,
        info: &mut EntityInfo,
        schema: &EntitySchema,
        entries: &[&ComplexEntry],
        depth: usize,
    ) -> GraphResult<()> {
        for property in schema.complex_properties() {
            let relationship_type = property_relationship_type(&property.storage_name);
            let mut children: Vec<&ComplexEntry> = entries
                .iter()
                .copied()
                .filter(|entry| {
                    entry.path.len() == depth + 1 && entry.path[depth] == relationship_type
                })
                .collect();
            if children.is_empty() {
                continue;
            }
            children.sort_by_key(|entry| entry.seq.get(depth).copied().unwrap_or_default());

            let nested = match &property.nested {
                Some(nested) => self.registry.resolve(nested)?,
                None => {
                    return Err(GraphError::configuration(
                        schema.type_name(),
                        format!("complex property '{}' has no nested schema", property.name),
                    ))
                }
            };

            let mut items = Vec::with_capacity(children.len());
            for child in children {
                let mut child_info = simple_info(&nested, &child.node);
                let descendants: Vec<&ComplexEntry> = entries
                    .iter()
                    .copied()
                    .filter(|entry| entry.path.len() > depth + 1 && entry.descends_from(child))
                    .collect();
                self.attach_complex(&mut child_info, &nested, &descendants, depth + 1)?;
                items.push(child_info);
            }

            let value = if property.is_collection() {
                ComplexProperty::Collection(items)
            } else {
                match items.into_iter().next() {
                    Some(first) => ComplexProperty::Entity(Box::new(first)),
                    None => continue,
                }
            };
            info.set_complex(property.storage_name.clone(), value);
        }
        Ok(())
    }
}

/// Simple properties of `node`, without mapper-reserved attributes
fn simple_info(schema: &EntitySchema, node: &NodeRecord) -> EntityInfo {
    let labels = if node.labels.is_empty() {
        schema.labels().to_vec()
    } else {
        node.labels.clone()
    };
    let mut info = EntityInfo::new(schema.type_name(), labels);
    for (name, value) in &node.properties {
        if !is_reserved_storage_name(name) {
            info.set_value(name.clone(), value.clone());
        }
    }
    info
}

/// Snapshot of a relationship; endpoint ids fill the structural properties
pub fn relationship_info(
    schema: &EntitySchema,
    relationship: &RelationshipRecord,
    start: Option<&GraphValue>,
    end: Option<&GraphValue>,
) -> EntityInfo {
    let mut info = EntityInfo::new(
        schema.type_name(),
        vec![relationship.relationship_type.clone()],
    );
    for (name, value) in &relationship.properties {
        if !is_reserved_storage_name(name) {
            info.set_value(name.clone(), value.clone());
        }
    }
    for (role, endpoint) in [(PropertyRole::StartNode, start), (PropertyRole::EndNode, end)] {
        if let (Some(property), Some(id)) = (schema.property_with_role(role), endpoint) {
            info.set_value(property.storage_name.clone(), id.clone());
        }
    }
    info
}

/// One collected auxiliary node
#[derive(Debug, Clone, PartialEq)]
struct ComplexEntry {
    path: Vec<String>,
    seq: Vec<i64>,
    node: NodeRecord,
}

impl ComplexEntry {
    fn descends_from(&self, ancestor: &ComplexEntry) -> bool {
        let depth = ancestor.path.len();
        self.path.len() > depth
            && self.path[..depth] == ancestor.path[..]
            && self.seq.get(..depth) == Some(&ancestor.seq[..])
    }
}

/// Entries of a complex column; rows where the optional match found
/// nothing carry null nodes and are skipped
fn parse_entries(value: &GraphValue) -> Vec<ComplexEntry> {
    let Some(entries) = value.as_list() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.as_map()?;
            let node = entry.get("node")?.as_node()?.clone();
            let path = entry
                .get("path")?
                .as_list()?
                .iter()
                .map(|t| t.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()?;
            let seq = entry
                .get("seq")
                .and_then(GraphValue::as_list)
                .map(|seq| seq.iter().map(|s| s.as_i64().unwrap_or_default()).collect())
                .unwrap_or_default();
            Some(ComplexEntry { path, seq, node })
        })
        .collect()
}
