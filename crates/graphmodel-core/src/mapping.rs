//! Declarative label and property-name mapping.
//!
//! A static lookup table consulted while schemas are built. It is populated
//! programmatically or deserialized from the `[mapping]` section of the
//! configuration file; members are addressed as `"Type.Member"`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    /// Type name to label (or relationship type)
    #[serde(default)]
    labels: BTreeMap<String, String>,
    /// `Type.Member` to storage attribute name
    #[serde(default)]
    property_names: BTreeMap<String, String>,
    /// `Type.Member` entries that are indexed
    #[serde(default)]
    indexed: BTreeSet<String>,
    /// `Type.Member` entries that are never stored
    #[serde(default)]
    ignored: BTreeSet<String>,
}

fn member_key(type_name: &str, member: &str) -> String {
    format!("{type_name}.{member}")
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        labels: BTreeMap<String, String>,
        property_names: BTreeMap<String, String>,
        indexed: BTreeSet<String>,
        ignored: BTreeSet<String>,
    ) -> Self {
        Self {
            labels,
            property_names,
            indexed,
            ignored,
        }
    }

    pub fn with_label(mut self, type_name: &str, label: &str) -> Self {
        self.labels.insert(type_name.to_string(), label.to_string());
        self
    }

    pub fn with_property_name(mut self, type_name: &str, member: &str, storage: &str) -> Self {
        self.property_names
            .insert(member_key(type_name, member), storage.to_string());
        self
    }

    pub fn with_indexed(mut self, type_name: &str, member: &str) -> Self {
        self.indexed.insert(member_key(type_name, member));
        self
    }

    pub fn with_ignored(mut self, type_name: &str, member: &str) -> Self {
        self.ignored.insert(member_key(type_name, member));
        self
    }

    pub fn label_for(&self, type_name: &str) -> Option<&str> {
        self.labels.get(type_name).map(String::as_str)
    }

    pub fn property_name_for(&self, type_name: &str, member: &str) -> Option<&str> {
        self.property_names
            .get(&member_key(type_name, member))
            .map(String::as_str)
    }

    pub fn is_indexed(&self, type_name: &str, member: &str) -> bool {
        self.indexed.contains(&member_key(type_name, member))
    }

    pub fn is_ignored(&self, type_name: &str, member: &str) -> bool {
        self.ignored.contains(&member_key(type_name, member))
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
            && self.property_names.is_empty()
            && self.indexed.is_empty()
            && self.ignored.is_empty()
    }

    /// Entries of `other` replace entries of `self`
    pub fn merge(&mut self, other: MappingTable) {
        self.labels.extend(other.labels);
        self.property_names.extend(other.property_names);
        self.indexed.extend(other.indexed);
        self.ignored.extend(other.ignored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let table = MappingTable::new()
            .with_label("Person", "Human")
            .with_property_name("Person", "FirstName", "first_name")
            .with_indexed("Person", "Email")
            .with_ignored("Person", "Scratch");

        assert_eq!(table.label_for("Person"), Some("Human"));
        assert_eq!(table.label_for("Company"), None);
        assert_eq!(
            table.property_name_for("Person", "FirstName"),
            Some("first_name")
        );
        assert!(table.is_indexed("Person", "Email"));
        assert!(!table.is_indexed("Company", "Email"));
        assert!(table.is_ignored("Person", "Scratch"));
    }

    #[test]
    fn test_deserializes_from_toml_shape() {
        let json = serde_json::json!({
            "labels": { "Person": "Human" },
            "ignored": ["Person.Scratch"]
        });
        let table: MappingTable = serde_json::from_value(json).unwrap();
        assert_eq!(table.label_for("Person"), Some("Human"));
        assert!(table.is_ignored("Person", "Scratch"));
        assert!(!table.is_indexed("Person", "Scratch"));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = MappingTable::new().with_label("Person", "Human");
        base.merge(MappingTable::new().with_label("Person", "Individual"));
        assert_eq!(base.label_for("Person"), Some("Individual"));
    }
}
