//! Core types for graphmodel.
//!
//! This crate holds everything that does not depend on a query language or a
//! database driver:
//!
//! - entity traits and property declarations ([`GraphEntity`], [`PropertyListBuilder`])
//! - property classification and the cached [`SchemaRegistry`]
//! - the type-erased [`EntityInfo`] snapshot and the [`SerializerRegistry`]
//! - engine-neutral values ([`GraphValue`], [`Record`])
//! - the [`GraphEngine`] / [`EngineTransaction`] seam implemented by adapters
//! - the shared [`GraphError`] type
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graphmodel_core::{SchemaRegistry, SerializerRegistry};
//! use std::sync::Arc;
//!
//! let schemas = Arc::new(SchemaRegistry::default());
//! let serializers = SerializerRegistry::new(schemas);
//! let info = serializers.serialize(&person)?;
//! let back: Person = serializers.deserialize(&info)?;
//! ```

pub mod convert;
pub mod engine;
pub mod entity;
pub mod error;
pub mod info;
pub mod mapping;
pub mod naming;
pub mod schema;
pub mod serializer;
pub mod types;
pub mod value;

pub use engine::{AccessMode, EngineTransaction, GraphEngine, SessionOptions};
pub use entity::{
    new_entity_id, EntityKind, GraphEntity, NodeEntity, NodeProperties, PropertyDeclaration,
    PropertyListBuilder, PropertyRole, PropertySet, RelationshipDirection, RelationshipEntity,
    RelationshipProperties, DIRECTION_PROPERTY, END_NODE_ID_PROPERTY, ID_PROPERTY,
    START_NODE_ID_PROPERTY,
};
pub use error::{EngineError, ErrorKind, GraphError, GraphResult};
pub use info::{ComplexProperty, EntityInfo, SimpleProperty};
pub use mapping::MappingTable;
pub use schema::{EntitySchema, PropertySchema, SchemaKind, SchemaRegistry, TypeDescriptor};
pub use serializer::{EntitySerializer, ModelSerializer, SerializerRegistry};
pub use types::{classify, ComplexType, GraphType, PropertyClass, ScalarKind, ValueType};
pub use value::{
    GraphDuration, GraphValue, NodeRecord, Parameters, PathRecord, Point, Record,
    RelationshipRecord,
};
