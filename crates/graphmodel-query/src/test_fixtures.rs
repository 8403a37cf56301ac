//! Domain types shared by the query tests.

use chrono::NaiveDate;
use graphmodel_core::{
    graph_type, ComplexType, EntityKind, GraphEntity, NodeEntity, NodeProperties,
    PropertyListBuilder, RelationshipDirection, RelationshipEntity, RelationshipProperties,
    SchemaRegistry,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: Option<String>,
}

impl ComplexType for Address {
    fn describe(p: &mut PropertyListBuilder) {
        p.property::<String>("Street")
            .property::<String>("City")
            .property::<Option<String>>("Zip");
    }
}

graph_type!(complex Address);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub email: Option<String>,
    pub tags: Vec<String>,
    pub birth_date: NaiveDate,
    pub home_address: Option<Address>,
    pub previous_addresses: Vec<Address>,
}

impl GraphEntity for Person {
    const KIND: EntityKind = EntityKind::Node;

    fn describe(p: &mut PropertyListBuilder) {
        p.include::<NodeProperties>()
            .property::<String>("FirstName")
            .stored_as("first_name")
            .property::<String>("LastName")
            .property::<i32>("Age")
            .indexed()
            .property::<Option<String>>("Email")
            .property::<Vec<String>>("Tags")
            .property::<NaiveDate>("BirthDate")
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
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub salary: f64,
}

impl GraphEntity for Employee {
    const KIND: EntityKind = EntityKind::Node;

    fn describe(p: &mut PropertyListBuilder) {
        p.include::<NodeProperties>()
            .property::<String>("FirstName")
            .stored_as("first_name")
            .property::<String>("LastName")
            .property::<i32>("Age")
            .property::<f64>("Salary");
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl NodeEntity for Employee {}

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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorksAt {
    pub id: String,
    pub start_node_id: String,
    pub end_node_id: String,
    pub role: String,
}

impl GraphEntity for WorksAt {
    const KIND: EntityKind = EntityKind::Relationship;

    fn label() -> &'static str {
        "WORKS_AT"
    }

    fn describe(p: &mut PropertyListBuilder) {
        p.include::<RelationshipProperties>().property::<String>("Role");
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl RelationshipEntity for WorksAt {
    fn start_node_id(&self) -> &str {
        &self.start_node_id
    }

    fn end_node_id(&self) -> &str {
        &self.end_node_id
    }
}

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::default()
}

/// Registry where `Employee` is a subtype of `Person`
pub fn polymorphic_registry() -> SchemaRegistry {
    let registry = SchemaRegistry::default();
    registry.register_subtype::<Person, Employee>();
    registry
}
