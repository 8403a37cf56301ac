//! Shared domain types and row builders for the integration tests.

#![allow(dead_code)]

use graphmodel::test_support::{complex_entry, node, MockEngine};
use graphmodel::{
    graph_type, ComplexType, EntityKind, Graph, GraphEntity, NodeEntity, NodeProperties,
    PropertyListBuilder, RelationshipDirection, RelationshipEntity, RelationshipProperties,
};
use graphmodel_core::naming::property_relationship_type;
use graphmodel_core::{EntityInfo, GraphValue, Record};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub name: String,
}

impl ComplexType for Tag {
    fn describe(p: &mut PropertyListBuilder) {
        p.property::<String>("Name");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub tags: Vec<Tag>,
}

impl Address {
    pub fn new(street: &str, city: &str) -> Self {
        Self {
            street: street.to_string(),
            city: city.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags
            .iter()
            .map(|name| Tag {
                name: name.to_string(),
            })
            .collect();
        self
    }
}

impl ComplexType for Address {
    fn describe(p: &mut PropertyListBuilder) {
        p.property::<String>("Street")
            .property::<String>("City")
            .property::<Vec<Tag>>("Tags");
    }
}

graph_type!(complex Tag, Address);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub home_address: Option<Address>,
    pub previous_addresses: Vec<Address>,
}

impl Person {
    pub fn new(id: &str, first_name: &str, last_name: &str, age: i32) -> Self {
        Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            age,
            home_address: None,
            previous_addresses: Vec::new(),
        }
    }
}

impl GraphEntity for Person {
    const KIND: EntityKind = EntityKind::Node;

    fn describe(p: &mut PropertyListBuilder) {
        p.include::<NodeProperties>()
            .property::<String>("FirstName")
            .property::<String>("LastName")
            .property::<i32>("Age")
            .property::<Option<Address>>("HomeAddress")
            .property::<Vec<Address>>("PreviousAddresses");
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl NodeEntity for Person {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Knows {
    pub id: String,
    pub start_node_id: String,
    pub end_node_id: String,
    pub direction: RelationshipDirection,
    pub since: i32,
}

impl Knows {
    pub fn new(id: &str, from: &str, to: &str, since: i32) -> Self {
        Self {
            id: id.to_string(),
            start_node_id: from.to_string(),
            end_node_id: to.to_string(),
            direction: RelationshipDirection::Outgoing,
            since,
        }
    }
}

impl GraphEntity for Knows {
    const KIND: EntityKind = EntityKind::Relationship;

    fn label() -> &'static str {
        "KNOWS"
    }

    fn describe(p: &mut PropertyListBuilder) {
        p.include::<RelationshipProperties>().property::<i32>("Since");
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl RelationshipEntity for Knows {
    fn start_node_id(&self) -> &str {
        &self.start_node_id
    }

    fn end_node_id(&self) -> &str {
        &self.end_node_id
    }

    fn direction(&self) -> RelationshipDirection {
        self.direction
    }
}

pub fn graph(engine: &MockEngine) -> Graph {
    Graph::new(Arc::new(engine.clone()))
}

/// Five people whose last names sort in id order
pub fn five_people() -> Vec<Person> {
    vec![
        Person::new("p-1", "Ann", "Adams", 41),
        Person::new("p-2", "Ben", "Brown", 29),
        Person::new("p-3", "Cat", "Clark", 35),
        Person::new("p-4", "Dan", "Davis", 52),
        Person::new("p-5", "Eve", "Evans", 23),
    ]
}

/// The row an engine would return for `entity` under `alias`, complex
/// properties included
pub fn stored_row(graph: &Graph, alias: &str, entity: &Person) -> Record {
    let schema = graph.schemas().schema_of::<Person>().unwrap();
    let info = graph.serializers().serialize(entity).unwrap();
    let mut entries = Vec::new();
    collect_entries(&info, &mut Vec::new(), &mut Vec::new(), &mut entries);

    Record::new()
        .with(alias, node(&[schema.label()], info.storage_properties(&schema)))
        .with(format!("{alias}_complex"), GraphValue::List(entries))
}

fn collect_entries(
    info: &EntityInfo,
    path: &mut Vec<String>,
    sequence: &mut Vec<i64>,
    entries: &mut Vec<GraphValue>,
) {
    for (name, property) in info.complex_properties() {
        for (index, child) in property.items().into_iter().enumerate() {
            path.push(property_relationship_type(name));
            sequence.push(index as i64);

            let properties = child
                .simple_properties()
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(name, value)| (name.clone(), value.to_graph_value()));
            let label = child.label().unwrap_or(child.declared_type());
            let steps: Vec<&str> = path.iter().map(String::as_str).collect();
            entries.push(complex_entry(&steps, sequence, node(&[label], properties)));

            collect_entries(child, path, sequence, entries);
            path.pop();
            sequence.pop();
        }
    }
}
