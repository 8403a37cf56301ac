//! Entity traits and property declarations.
//!
//! Domain types describe themselves once through `describe`, listing the
//! properties the mapper should store. Shared capability sets such as
//! [`NodeProperties`] can be pulled in with [`PropertyListBuilder::include`];
//! a type's own declarations always win over included ones.
//!
//! ## Usage
//!
//! ```rust,ignore
//! impl GraphEntity for Person {
//!     const KIND: EntityKind = EntityKind::Node;
//!
//!     fn describe(p: &mut PropertyListBuilder) {
//!         p.include::<NodeProperties>()
//!             .property::<String>("FirstName")
//!             .property::<i32>("Age").indexed()
//!             .property::<Option<Address>>("HomeAddress");
//!     }
//!
//!     fn entity_id(&self) -> &str {
//!         &self.id
//!     }
//! }
//! impl NodeEntity for Person {}
//! ```

use crate::types::{short_type_name, GraphType, ScalarKind, ValueType};
use crate::value::GraphValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Member name of the identifier property declared by the built-in sets
pub const ID_PROPERTY: &str = "Id";
pub const START_NODE_ID_PROPERTY: &str = "StartNodeId";
pub const END_NODE_ID_PROPERTY: &str = "EndNodeId";
pub const DIRECTION_PROPERTY: &str = "Direction";

/// Node or relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Relationship,
}

/// Direction flag stored on relationships
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipDirection {
    #[default]
    Outgoing,
    Incoming,
    Bidirectional,
}

impl RelationshipDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipDirection::Outgoing => "Outgoing",
            RelationshipDirection::Incoming => "Incoming",
            RelationshipDirection::Bidirectional => "Bidirectional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "outgoing" => Some(RelationshipDirection::Outgoing),
            "incoming" => Some(RelationshipDirection::Incoming),
            "bidirectional" => Some(RelationshipDirection::Bidirectional),
            _ => None,
        }
    }
}

impl GraphType for RelationshipDirection {
    fn value_type() -> ValueType {
        ValueType::Scalar(ScalarKind::Enum)
    }
}

/// Anything with a stable string identifier that the mapper can persist
pub trait GraphEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Type name used in error messages and mapping lookups
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Primary label for nodes, relationship type for relationships
    fn label() -> &'static str {
        Self::type_name()
    }

    /// Extra labels written alongside the primary label
    fn additional_labels() -> &'static [&'static str] {
        &[]
    }

    /// Declare the stored properties
    fn describe(properties: &mut PropertyListBuilder);

    fn entity_id(&self) -> &str;
}

/// Marker for entities stored as nodes
pub trait NodeEntity: GraphEntity {}

/// Entities stored as relationships between two nodes
pub trait RelationshipEntity: GraphEntity {
    fn start_node_id(&self) -> &str;

    fn end_node_id(&self) -> &str;

    fn direction(&self) -> RelationshipDirection {
        RelationshipDirection::Outgoing
    }
}

/// Reusable group of property declarations
pub trait PropertySet {
    fn describe(properties: &mut PropertyListBuilder);
}

/// Properties every node carries: `Id`
pub struct NodeProperties;

impl PropertySet for NodeProperties {
    fn describe(properties: &mut PropertyListBuilder) {
        properties.identifier(ID_PROPERTY);
    }
}

/// Properties every relationship carries
pub struct RelationshipProperties;

impl PropertySet for RelationshipProperties {
    fn describe(properties: &mut PropertyListBuilder) {
        properties
            .identifier(ID_PROPERTY)
            .start_node(START_NODE_ID_PROPERTY)
            .end_node(END_NODE_ID_PROPERTY)
            .direction(DIRECTION_PROPERTY);
    }
}

/// Generate a fresh entity identifier
pub fn new_entity_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// What a property means to the mapper beyond its value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PropertyRole {
    #[default]
    Data,
    Identifier,
    /// Filled from the relationship's start node, never stored
    StartNode,
    /// Filled from the relationship's end node, never stored
    EndNode,
    Direction,
}

impl PropertyRole {
    pub fn is_structural(self) -> bool {
        matches!(self, PropertyRole::StartNode | PropertyRole::EndNode)
    }
}

/// One declared property, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    pub name: &'static str,
    pub value_type: ValueType,
    pub role: PropertyRole,
    pub storage_name: Option<&'static str>,
    pub ignored: bool,
    pub indexed: bool,
    pub default: Option<GraphValue>,
}

impl PropertyDeclaration {
    pub fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            role: PropertyRole::Data,
            storage_name: None,
            ignored: false,
            indexed: false,
            default: None,
        }
    }
}

/// Collects property declarations for one type
#[derive(Debug, Default)]
pub struct PropertyListBuilder {
    own: Vec<PropertyDeclaration>,
    included: Vec<PropertyDeclaration>,
    including: bool,
    last: Option<(bool, usize)>,
}

impl PropertyListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a data property
    pub fn property<V: GraphType>(&mut self, name: &'static str) -> &mut Self {
        self.push(PropertyDeclaration::new(name, V::value_type()))
    }

    /// Declare a string identifier property
    pub fn identifier(&mut self, name: &'static str) -> &mut Self {
        self.push_with_role(name, String::value_type(), PropertyRole::Identifier)
    }

    pub fn start_node(&mut self, name: &'static str) -> &mut Self {
        self.push_with_role(name, String::value_type(), PropertyRole::StartNode)
    }

    pub fn end_node(&mut self, name: &'static str) -> &mut Self {
        self.push_with_role(name, String::value_type(), PropertyRole::EndNode)
    }

    pub fn direction(&mut self, name: &'static str) -> &mut Self {
        self.push_with_role(
            name,
            RelationshipDirection::value_type(),
            PropertyRole::Direction,
        )
    }

    /// Pull in a capability property set
    pub fn include<S: PropertySet>(&mut self) -> &mut Self {
        let previous = self.including;
        self.including = true;
        S::describe(self);
        self.including = previous;
        self.last = None;
        self
    }

    /// Exclude the last declared property from storage
    pub fn ignored(&mut self) -> &mut Self {
        self.modify_last(|decl| decl.ignored = true)
    }

    /// Mark the last declared property as indexed
    pub fn indexed(&mut self) -> &mut Self {
        self.modify_last(|decl| decl.indexed = true)
    }

    /// Store the last declared property under a different attribute name
    pub fn stored_as(&mut self, storage_name: &'static str) -> &mut Self {
        self.modify_last(|decl| decl.storage_name = Some(storage_name))
    }

    /// Value used when the stored entity has no value for the last property
    pub fn default_value(&mut self, value: impl Into<GraphValue>) -> &mut Self {
        let value = value.into();
        self.modify_last(|decl| decl.default = Some(value))
    }

    /// Final declaration list: included declarations not shadowed by the
    /// type's own, followed by the type's own.
    pub fn into_declarations(self) -> Vec<PropertyDeclaration> {
        let mut own: Vec<PropertyDeclaration> = Vec::with_capacity(self.own.len());
        for decl in self.own {
            match own.iter_mut().find(|existing| existing.name == decl.name) {
                Some(existing) => *existing = decl,
                None => own.push(decl),
            }
        }

        let mut merged: Vec<PropertyDeclaration> = Vec::new();
        for decl in self.included {
            let shadowed = own.iter().any(|o| o.name == decl.name)
                || merged.iter().any(|m| m.name == decl.name);
            if !shadowed {
                merged.push(decl);
            }
        }
        merged.extend(own);
        merged
    }

    fn push_with_role(
        &mut self,
        name: &'static str,
        value_type: ValueType,
        role: PropertyRole,
    ) -> &mut Self {
        let mut decl = PropertyDeclaration::new(name, value_type);
        decl.role = role;
        self.push(decl)
    }

    fn push(&mut self, decl: PropertyDeclaration) -> &mut Self {
        let list = if self.including {
            &mut self.included
        } else {
            &mut self.own
        };
        list.push(decl);
        let index = list.len() - 1;
        self.last = Some((self.including, index));
        self
    }

    fn modify_last(&mut self, apply: impl FnOnce(&mut PropertyDeclaration)) -> &mut Self {
        if let Some((included, index)) = self.last {
            let list = if included {
                &mut self.included
            } else {
                &mut self.own
            };
            if let Some(decl) = list.get_mut(index) {
                apply(decl);
            }
        }
        self
    }
}
