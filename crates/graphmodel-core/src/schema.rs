//! Schema registry.
//!
//! Builds [`EntitySchema`]s from the property declarations of entity and
//! complex types, classifies every property once, and caches the result per
//! type for the lifetime of the registry.
//!
//! ## Cycles
//!
//! Complex types may reference each other (`A.b: B`, `B.a: Option<A>`).
//! While a schema is being built the types on the current build path are
//! tracked; meeting one of them again (or exceeding
//! [`DEFAULT_DEPTH_ALLOWED`]) yields a placeholder schema instead of
//! recursing. Placeholders remember how to build their type, so
//! [`SchemaRegistry::resolve`] can always hand back the full schema.

use crate::entity::{
    EntityKind, GraphEntity, PropertyDeclaration, PropertyListBuilder, PropertyRole,
};
use crate::error::{GraphError, GraphResult};
use crate::mapping::MappingTable;
use crate::naming::{is_reserved_storage_name, DEFAULT_DEPTH_ALLOWED};
use crate::types::{classify, ComplexRef, ComplexType, PropertyClass, ScalarKind, ValueType};
use crate::value::GraphValue;
use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Node,
    Relationship,
    Complex,
}

impl From<EntityKind> for SchemaKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Node => SchemaKind::Node,
            EntityKind::Relationship => SchemaKind::Relationship,
        }
    }
}

/// Where a type's property declarations come from
#[derive(Clone, Copy)]
enum Declarations {
    Entity(fn(&mut PropertyListBuilder)),
    Complex(ComplexRef),
}

/// How to build the schema of one type
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    kind: SchemaKind,
    label: &'static str,
    additional_labels: &'static [&'static str],
    declarations: Declarations,
}

impl TypeDescriptor {
    pub fn entity<T: GraphEntity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            kind: T::KIND.into(),
            label: T::label(),
            additional_labels: T::additional_labels(),
            declarations: Declarations::Entity(T::describe),
        }
    }

    pub fn complex<T: ComplexType>() -> Self {
        Self::from_complex_ref(ComplexRef::of::<T>())
    }

    fn from_complex_ref(reference: ComplexRef) -> Self {
        Self {
            type_id: reference.type_id(),
            type_name: reference.type_name(),
            kind: SchemaKind::Complex,
            label: reference.type_name(),
            additional_labels: &[],
            declarations: Declarations::Complex(reference),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    fn declarations(&self) -> Vec<PropertyDeclaration> {
        let mut builder = PropertyListBuilder::new();
        match self.declarations {
            Declarations::Entity(describe) => describe(&mut builder),
            Declarations::Complex(reference) => reference.describe_into(&mut builder),
        }
        builder.into_declarations()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// Classified metadata for one property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    /// Member name, the key used by serde
    pub name: String,
    /// Attribute name in the graph
    pub storage_name: String,
    pub class: PropertyClass,
    pub value_type: ValueType,
    /// Scalar kind of the value or of collection elements
    pub scalar: Option<ScalarKind>,
    /// Schema of the nested type for complex properties
    pub nested: Option<Arc<EntitySchema>>,
    pub nullable: bool,
    pub indexed: bool,
    pub role: PropertyRole,
    pub default: Option<GraphValue>,
}

impl PropertySchema {
    pub fn is_structural(&self) -> bool {
        self.role.is_structural()
    }

    pub fn is_collection(&self) -> bool {
        self.class.is_collection()
    }
}

/// Static per-type metadata
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    type_id: TypeId,
    type_name: String,
    kind: SchemaKind,
    labels: Vec<String>,
    simple: Vec<PropertySchema>,
    complex: Vec<PropertySchema>,
    placeholder: bool,
    origin: Option<DescriptorRef>,
}

/// Descriptor kept by placeholders so they can be resolved later
#[derive(Clone, Copy, PartialEq)]
struct DescriptorRef(TypeDescriptor);

impl fmt::Debug for DescriptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl EntitySchema {
    fn placeholder(descriptor: &TypeDescriptor, labels: Vec<String>) -> Self {
        Self {
            type_id: descriptor.type_id,
            type_name: descriptor.type_name.to_string(),
            kind: descriptor.kind,
            labels,
            simple: Vec::new(),
            complex: Vec::new(),
            placeholder: true,
            origin: Some(DescriptorRef(*descriptor)),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Primary label (relationship type for relationships)
    pub fn label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or(&self.type_name)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn simple_properties(&self) -> &[PropertySchema] {
        &self.simple
    }

    pub fn complex_properties(&self) -> &[PropertySchema] {
        &self.complex
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertySchema> {
        self.simple.iter().chain(self.complex.iter())
    }

    /// Whether this is a cycle placeholder without properties
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn has_complex_properties(&self) -> bool {
        !self.complex.is_empty()
    }

    /// Look up a property by member name, exact match first
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties()
            .find(|p| p.name == name)
            .or_else(|| self.properties().find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    /// Look up a property by storage name, exact match first
    pub fn property_by_storage_name(&self, storage_name: &str) -> Option<&PropertySchema> {
        self.properties()
            .find(|p| p.storage_name == storage_name)
            .or_else(|| {
                self.properties()
                    .find(|p| p.storage_name.eq_ignore_ascii_case(storage_name))
            })
    }

    pub fn property_with_role(&self, role: PropertyRole) -> Option<&PropertySchema> {
        self.simple.iter().find(|p| p.role == role)
    }

    pub fn identifier(&self) -> Option<&PropertySchema> {
        self.property_with_role(PropertyRole::Identifier)
    }
}

/// Cache of schemas keyed by type
pub struct SchemaRegistry {
    mapping: Arc<MappingTable>,
    cache: DashMap<TypeId, Arc<EntitySchema>>,
    subtypes: DashMap<TypeId, Vec<String>>,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("cached", &self.cache.len())
            .field("subtypes", &self.subtypes.len())
            .finish()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(MappingTable::default())
    }
}

impl SchemaRegistry {
    pub fn new(mapping: MappingTable) -> Self {
        Self {
            mapping: Arc::new(mapping),
            cache: DashMap::new(),
            subtypes: DashMap::new(),
        }
    }

    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    /// Schema of an entity type, built on first use
    pub fn schema_of<T: GraphEntity>(&self) -> GraphResult<Arc<EntitySchema>> {
        self.schema_for(&TypeDescriptor::entity::<T>())
    }

    /// Schema of a complex type, built on first use
    pub fn complex_schema_of<T: ComplexType>(&self) -> GraphResult<Arc<EntitySchema>> {
        self.schema_for(&TypeDescriptor::complex::<T>())
    }

    pub fn schema_for(&self, descriptor: &TypeDescriptor) -> GraphResult<Arc<EntitySchema>> {
        if let Some(schema) = self.cache.get(&descriptor.type_id) {
            return Ok(Arc::clone(schema.value()));
        }

        let mut path = Vec::new();
        let schema = self.build(descriptor, &mut path)?;
        debug!(
            type_name = descriptor.type_name,
            simple = schema.simple.len(),
            complex = schema.complex.len(),
            "Built entity schema"
        );

        // Concurrent first builds are fine: the first insert wins.
        let entry = self
            .cache
            .entry(descriptor.type_id)
            .or_insert(schema);
        Ok(Arc::clone(entry.value()))
    }

    /// Replace a placeholder with the full schema of its type
    pub fn resolve(&self, schema: &Arc<EntitySchema>) -> GraphResult<Arc<EntitySchema>> {
        match (&schema.placeholder, &schema.origin) {
            (true, Some(DescriptorRef(descriptor))) => self.schema_for(descriptor),
            _ => Ok(Arc::clone(schema)),
        }
    }

    /// Record `Sub` as a concrete subtype of `Base` for polymorphic queries
    pub fn register_subtype<Base: GraphEntity, Sub: GraphEntity>(&self) {
        let label = self
            .mapping
            .label_for(Sub::type_name())
            .unwrap_or(Sub::label())
            .to_string();
        let mut labels = self.subtypes.entry(TypeId::of::<Base>()).or_default();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    /// Labels a query over `schema` must match: the primary label followed
    /// by every registered subtype label
    pub fn polymorphic_labels(&self, schema: &EntitySchema) -> Vec<String> {
        let mut labels = vec![schema.label().to_string()];
        if let Some(subtypes) = self.subtypes.get(&schema.type_id) {
            for label in subtypes.iter() {
                if !labels.contains(label) {
                    labels.push(label.clone());
                }
            }
        }
        labels
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    fn labels_for(&self, descriptor: &TypeDescriptor) -> Vec<String> {
        let primary = self
            .mapping
            .label_for(descriptor.type_name)
            .unwrap_or(descriptor.label)
            .to_string();
        let mut labels = vec![primary];
        for extra in descriptor.additional_labels {
            if !labels.iter().any(|l| l == extra) {
                labels.push(extra.to_string());
            }
        }
        labels
    }

    fn build(
        &self,
        descriptor: &TypeDescriptor,
        path: &mut Vec<TypeId>,
    ) -> GraphResult<Arc<EntitySchema>> {
        let labels = self.labels_for(descriptor);
        if path.contains(&descriptor.type_id) || path.len() > DEFAULT_DEPTH_ALLOWED {
            return Ok(Arc::new(EntitySchema::placeholder(descriptor, labels)));
        }
        if !path.is_empty() {
            if let Some(cached) = self.cache.get(&descriptor.type_id) {
                return Ok(Arc::clone(cached.value()));
            }
        }

        path.push(descriptor.type_id);
        let result = self.build_properties(descriptor, labels, path);
        path.pop();
        result.map(Arc::new)
    }

    fn build_properties(
        &self,
        descriptor: &TypeDescriptor,
        labels: Vec<String>,
        path: &mut Vec<TypeId>,
    ) -> GraphResult<EntitySchema> {
        let type_name = descriptor.type_name;
        let mut simple = Vec::new();
        let mut complex = Vec::new();
        let mut storage_names = HashSet::new();

        for decl in descriptor.declarations() {
            if decl.ignored || self.mapping.is_ignored(type_name, decl.name) {
                continue;
            }

            let class = classify(&decl.value_type).map_err(|err| {
                GraphError::configuration(
                    type_name,
                    format!("property '{}' has an unsupported type: {err}", decl.name),
                )
            })?;

            let storage_name = self
                .mapping
                .property_name_for(type_name, decl.name)
                .or(decl.storage_name)
                .unwrap_or(decl.name)
                .to_string();
            if is_reserved_storage_name(&storage_name) {
                return Err(GraphError::configuration(
                    type_name,
                    format!("storage name '{storage_name}' is reserved"),
                ));
            }
            if !storage_names.insert(storage_name.to_ascii_lowercase()) {
                return Err(GraphError::configuration(
                    type_name,
                    format!("storage name '{storage_name}' is declared twice"),
                ));
            }

            let nested = match decl.value_type.complex_ref() {
                Some(reference) if !class.is_simple() => Some(
                    self.build(&TypeDescriptor::from_complex_ref(reference), path)?,
                ),
                _ => None,
            };

            let property = PropertySchema {
                name: decl.name.to_string(),
                storage_name,
                class,
                scalar: decl.value_type.scalar_kind(),
                nullable: decl.value_type.is_nullable(),
                indexed: decl.indexed || self.mapping.is_indexed(type_name, decl.name),
                role: decl.role,
                default: decl.default,
                value_type: decl.value_type,
                nested,
            };

            if class.is_simple() {
                simple.push(property);
            } else {
                complex.push(property);
            }
        }

        match descriptor.kind {
            SchemaKind::Relationship if !complex.is_empty() => {
                return Err(GraphError::configuration(
                    type_name,
                    "relationships cannot declare complex properties",
                ));
            }
            SchemaKind::Node | SchemaKind::Relationship
                if !simple.iter().any(|p| p.role == PropertyRole::Identifier) =>
            {
                return Err(GraphError::configuration(
                    type_name,
                    "no identifier property is declared",
                ));
            }
            _ => {}
        }

        Ok(EntitySchema {
            type_id: descriptor.type_id,
            type_name: type_name.to_string(),
            kind: descriptor.kind,
            labels,
            simple,
            complex,
            placeholder: false,
            origin: Some(DescriptorRef(*descriptor)),
        })
    }
}
