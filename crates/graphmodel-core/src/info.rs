//! `EntityInfo`: the type-erased pivot between domain objects and storage.

use crate::schema::EntitySchema;
use crate::types::ScalarKind;
use crate::value::{GraphValue, Parameters};
use std::collections::BTreeMap;

/// Value of a simple property
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleProperty {
    Value(GraphValue),
    Collection {
        element: ScalarKind,
        items: Vec<GraphValue>,
    },
}

impl SimpleProperty {
    pub fn null() -> Self {
        SimpleProperty::Value(GraphValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SimpleProperty::Value(GraphValue::Null))
    }

    /// Value as bound to a query parameter
    pub fn to_graph_value(&self) -> GraphValue {
        match self {
            SimpleProperty::Value(value) => value.clone(),
            SimpleProperty::Collection { items, .. } => GraphValue::List(items.clone()),
        }
    }
}

/// Value of a complex property
#[derive(Debug, Clone, PartialEq)]
pub enum ComplexProperty {
    Entity(Box<EntityInfo>),
    Collection(Vec<EntityInfo>),
}

impl ComplexProperty {
    /// Items in sequence order; a single entity has sequence number 0
    pub fn items(&self) -> Vec<&EntityInfo> {
        match self {
            ComplexProperty::Entity(info) => vec![info.as_ref()],
            ComplexProperty::Collection(items) => items.iter().collect(),
        }
    }
}

/// Snapshot of one entity or nested object, keyed by storage name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityInfo {
    declared_type: String,
    labels: Vec<String>,
    simple: BTreeMap<String, SimpleProperty>,
    complex: BTreeMap<String, ComplexProperty>,
}

impl EntityInfo {
    pub fn new(declared_type: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            declared_type: declared_type.into(),
            labels,
            simple: BTreeMap::new(),
            complex: BTreeMap::new(),
        }
    }

    /// Empty snapshot typed after a schema
    pub fn for_schema(schema: &EntitySchema) -> Self {
        Self::new(schema.type_name(), schema.labels().to_vec())
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    pub fn simple_properties(&self) -> &BTreeMap<String, SimpleProperty> {
        &self.simple
    }

    pub fn complex_properties(&self) -> &BTreeMap<String, ComplexProperty> {
        &self.complex
    }

    pub fn set_simple(&mut self, name: impl Into<String>, value: SimpleProperty) {
        self.simple.insert(name.into(), value);
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<GraphValue>) {
        self.simple
            .insert(name.into(), SimpleProperty::Value(value.into()));
    }

    pub fn set_complex(&mut self, name: impl Into<String>, value: ComplexProperty) {
        self.complex.insert(name.into(), value);
    }

    pub fn complex_mut(&mut self, name: &str) -> Option<&mut ComplexProperty> {
        self.complex.get_mut(name)
    }

    /// Simple property by storage name; exact match first, then ignoring case
    pub fn simple(&self, name: &str) -> Option<&SimpleProperty> {
        self.simple.get(name).or_else(|| {
            self.simple
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    /// Complex property by storage name; exact match first, then ignoring case
    pub fn complex(&self, name: &str) -> Option<&ComplexProperty> {
        self.complex.get(name).or_else(|| {
            self.complex
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    /// String value of a simple property, if present
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.simple(name)? {
            SimpleProperty::Value(GraphValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Attributes to store natively: every non-null simple property except
    /// structural ones (relationship endpoints)
    pub fn storage_properties(&self, schema: &EntitySchema) -> Parameters {
        self.simple
            .iter()
            .filter(|(name, value)| {
                !value.is_null()
                    && !schema
                        .property_by_storage_name(name)
                        .is_some_and(|p| p.is_structural())
            })
            .map(|(name, value)| (name.clone(), value.to_graph_value()))
            .collect()
    }
}
