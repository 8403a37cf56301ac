//! Domain types shared by the unit tests.

use graphmodel_core::{
    graph_type, ComplexType, EntityKind, GraphEntity, NodeEntity, NodeProperties,
    PropertyListBuilder, RelationshipDirection, RelationshipEntity, RelationshipProperties,
};
use serde::{Deserialize, Serialize};

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
    pub zip: Option<String>,
    pub tags: Vec<Tag>,
}

impl Address {
    pub fn new(street: &str, city: &str) -> Self {
        Self {
            street: street.to_string(),
            city: city.to_string(),
            zip: None,
            tags: Vec::new(),
        }
    }
}

impl ComplexType for Address {
    fn describe(p: &mut PropertyListBuilder) {
        p.property::<String>("Street")
            .property::<String>("City")
            .property::<Option<String>>("Zip")
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
    pub email: Option<String>,
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
            email: None,
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
            .property::<Option<String>>("Email")
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
pub struct Company {
    pub id: String,
    pub name: String,
}

impl GraphEntity for Company {
    const KIND: EntityKind = EntityKind::Node;

    fn describe(p: &mut PropertyListBuilder) {
        p.include::<NodeProperties>().property::<String>("Name");
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl NodeEntity for Company {}

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
