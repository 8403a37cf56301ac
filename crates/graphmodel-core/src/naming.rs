//! Reserved names used for complex-property storage.
//!
//! A complex property `HomeAddress` is stored as an auxiliary node reached
//! through a relationship of type `__PROPERTY__HomeAddress__`. The prefix
//! keeps synthesized relationship types apart from application ones.

/// Prefix of every synthesized complex-property relationship type
pub const PROPERTY_RELATIONSHIP_PREFIX: &str = "__PROPERTY__";

/// Suffix of every synthesized complex-property relationship type
pub const PROPERTY_RELATIONSHIP_SUFFIX: &str = "__";

/// Attribute on complex-property relationships holding the collection index
pub const SEQUENCE_NUMBER_PROPERTY: &str = "SequenceNumber";

/// Attribute identifying an auxiliary node
pub const AUX_ID_PROPERTY: &str = "__aux_id";

/// Nesting depth for schema construction and complex-property reads
pub const DEFAULT_DEPTH_ALLOWED: usize = 5;

/// Relationship type for a complex property
pub fn property_relationship_type(property: &str) -> String {
    format!("{PROPERTY_RELATIONSHIP_PREFIX}{property}{PROPERTY_RELATIONSHIP_SUFFIX}")
}

/// Property name encoded in a complex-property relationship type
pub fn property_name_from_relationship_type(relationship_type: &str) -> Option<&str> {
    relationship_type
        .strip_prefix(PROPERTY_RELATIONSHIP_PREFIX)?
        .strip_suffix(PROPERTY_RELATIONSHIP_SUFFIX)
        .filter(|name| !name.is_empty())
}

pub fn is_property_relationship(relationship_type: &str) -> bool {
    property_name_from_relationship_type(relationship_type).is_some()
}

/// Storage names starting with `__` belong to the mapper
pub fn is_reserved_storage_name(name: &str) -> bool {
    name.starts_with("__")
}
