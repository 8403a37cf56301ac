//! Entity serializers and the serializer registry.
//!
//! [`ModelSerializer`] converts any [`GraphEntity`] to and from
//! [`EntityInfo`] by walking its cached schema over serde's JSON data model.
//! The [`SerializerRegistry`] is the only way the rest of the mapper reaches
//! a serializer, so custom implementations can be registered at runtime
//! without the engine knowing concrete types.

use crate::convert::{scalar_default_json, scalar_from_json, scalar_to_json};
use crate::entity::{GraphEntity, PropertyRole, RelationshipDirection};
use crate::error::{GraphError, GraphResult};
use crate::info::{ComplexProperty, EntityInfo, SimpleProperty};
use crate::schema::{EntitySchema, PropertySchema, SchemaRegistry};
use crate::types::PropertyClass;
use crate::value::GraphValue;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Converts one entity type to and from [`EntityInfo`]
pub trait EntitySerializer: Send + Sync {
    /// Type this serializer handles
    fn entity_type(&self) -> TypeId;

    fn type_name(&self) -> &str;

    fn schema(&self) -> GraphResult<Arc<EntitySchema>>;

    fn serialize(&self, entity: &dyn Any) -> GraphResult<EntityInfo>;

    fn deserialize(&self, info: &EntityInfo) -> GraphResult<Box<dyn Any + Send>>;
}

/// Schema-driven serializer for any [`GraphEntity`]
pub struct ModelSerializer<T> {
    schemas: Arc<SchemaRegistry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: GraphEntity> ModelSerializer<T> {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            schemas,
            _marker: PhantomData,
        }
    }

    pub fn to_info(&self, entity: &T) -> GraphResult<EntityInfo> {
        let schema = self.schemas.schema_of::<T>()?;
        let json = serde_json::to_value(entity).map_err(|e| {
            GraphError::serialization(format!("{} could not be serialized: {e}", T::type_name()))
        })?;
        info_from_json(&self.schemas, &schema, &json)
    }

    pub fn from_info(&self, info: &EntityInfo) -> GraphResult<T> {
        let schema = self.schemas.schema_of::<T>()?;
        let json = json_from_info(&self.schemas, &schema, info)?;
        serde_json::from_value(json).map_err(|e| {
            GraphError::serialization(format!("{} could not be deserialized: {e}", T::type_name()))
        })
    }
}

impl<T> fmt::Debug for ModelSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSerializer")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: GraphEntity> EntitySerializer for ModelSerializer<T> {
    fn entity_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &str {
        T::type_name()
    }

    fn schema(&self) -> GraphResult<Arc<EntitySchema>> {
        self.schemas.schema_of::<T>()
    }

    fn serialize(&self, entity: &dyn Any) -> GraphResult<EntityInfo> {
        let entity = entity.downcast_ref::<T>().ok_or_else(|| {
            GraphError::configuration(T::type_name(), "serializer received a value of another type")
        })?;
        self.to_info(entity)
    }

    fn deserialize(&self, info: &EntityInfo) -> GraphResult<Box<dyn Any + Send>> {
        Ok(Box::new(self.from_info(info)?))
    }
}

fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn property_error(schema: &EntitySchema, property: &PropertySchema, message: String) -> GraphError {
    GraphError::serialization(format!(
        "{}.{}: {message}",
        schema.type_name(),
        property.name
    ))
}

/// Build an [`EntityInfo`] from the serde form of a value
pub fn info_from_json(
    schemas: &SchemaRegistry,
    schema: &Arc<EntitySchema>,
    json: &Value,
) -> GraphResult<EntityInfo> {
    let schema = schemas.resolve(schema)?;
    let object = json.as_object().ok_or_else(|| {
        GraphError::serialization(format!(
            "{} does not serialize to an object",
            schema.type_name()
        ))
    })?;

    let mut info = EntityInfo::for_schema(&schema);
    for property in schema.properties() {
        let value = match field(object, &property.name) {
            Some(value) => value,
            None if property.nullable => &Value::Null,
            None => {
                return Err(GraphError::configuration(
                    schema.type_name(),
                    format!("declared property '{}' is not a serialized field", property.name),
                ))
            }
        };
        let storage = property.storage_name.clone();

        match (property.class, value) {
            (PropertyClass::Complex | PropertyClass::ComplexCollection, Value::Null) => {
                info.set_simple(storage, SimpleProperty::null());
            }
            (PropertyClass::Complex, value) => {
                let nested = nested_schema(&schema, property)?;
                let child = info_from_json(schemas, &nested, value)?;
                info.set_complex(storage, ComplexProperty::Entity(Box::new(child)));
            }
            (PropertyClass::ComplexCollection, Value::Array(items)) => {
                let nested = nested_schema(&schema, property)?;
                let children = items
                    .iter()
                    .map(|item| info_from_json(schemas, &nested, item))
                    .collect::<GraphResult<Vec<_>>>()?;
                info.set_complex(storage, ComplexProperty::Collection(children));
            }
            (PropertyClass::ComplexCollection, _) => {
                return Err(property_error(&schema, property, "expected an array".into()))
            }
            (PropertyClass::Simple | PropertyClass::SimpleCollection, value) => {
                let simple = simple_from_json(&schema, property, value)?;
                info.set_simple(storage, simple);
            }
        }
    }
    Ok(info)
}

fn simple_from_json(
    schema: &EntitySchema,
    property: &PropertySchema,
    value: &Value,
) -> GraphResult<SimpleProperty> {
    let kind = property
        .scalar
        .ok_or_else(|| property_error(schema, property, "no scalar kind".into()))?;
    match (property.class, value) {
        (PropertyClass::SimpleCollection, Value::Array(items)) => {
            let items = items
                .iter()
                .map(|item| scalar_from_json(kind, item))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|msg| property_error(schema, property, msg))?;
            Ok(SimpleProperty::Collection {
                element: kind,
                items,
            })
        }
        (PropertyClass::SimpleCollection, Value::Null) => Ok(SimpleProperty::null()),
        (PropertyClass::SimpleCollection, _) => {
            Err(property_error(schema, property, "expected an array".into()))
        }
        (_, value) => scalar_from_json(kind, value)
            .map(SimpleProperty::Value)
            .map_err(|msg| property_error(schema, property, msg)),
    }
}

fn nested_schema(
    schema: &EntitySchema,
    property: &PropertySchema,
) -> GraphResult<Arc<EntitySchema>> {
    property.nested.clone().ok_or_else(|| {
        GraphError::configuration(
            schema.type_name(),
            format!("complex property '{}' has no nested schema", property.name),
        )
    })
}

/// Rebuild the serde form of a value from an [`EntityInfo`]
pub fn json_from_info(
    schemas: &SchemaRegistry,
    schema: &Arc<EntitySchema>,
    info: &EntityInfo,
) -> GraphResult<Value> {
    let schema = schemas.resolve(schema)?;
    let mut object = Map::new();

    for property in schema.simple_properties() {
        let stored = match info.simple(&property.storage_name) {
            Some(SimpleProperty::Value(value)) if !value.is_null() => Some(value.clone()),
            Some(collection @ SimpleProperty::Collection { .. }) => {
                Some(collection.to_graph_value())
            }
            _ => None,
        };
        let json = match stored {
            Some(value) => simple_to_json(&schema, property, &value)?,
            None => missing_value(&schema, property)?,
        };
        object.insert(property.name.clone(), json);
    }

    for property in schema.complex_properties() {
        let nested = nested_schema(&schema, property)?;
        let json = match (property.class, info.complex(&property.storage_name)) {
            (PropertyClass::Complex, Some(stored)) => match stored.items().first() {
                Some(child) => json_from_info(schemas, &nested, child)?,
                None => missing_value(&schema, property)?,
            },
            (_, Some(stored)) => Value::Array(
                stored
                    .items()
                    .into_iter()
                    .map(|child| json_from_info(schemas, &nested, child))
                    .collect::<GraphResult<Vec<_>>>()?,
            ),
            (_, None) => missing_value(&schema, property)?,
        };
        object.insert(property.name.clone(), json);
    }

    Ok(Value::Object(object))
}

fn simple_to_json(
    schema: &EntitySchema,
    property: &PropertySchema,
    value: &GraphValue,
) -> GraphResult<Value> {
    let kind = property
        .scalar
        .ok_or_else(|| property_error(schema, property, "no scalar kind".into()))?;
    let result = match (property.class, value) {
        (PropertyClass::SimpleCollection, GraphValue::List(items)) => items
            .iter()
            .map(|item| scalar_to_json(kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (PropertyClass::SimpleCollection, other) => {
            Err(format!("expected a list but found {}", other.type_name()))
        }
        (_, value) => scalar_to_json(kind, value),
    };
    result.map_err(|msg| property_error(schema, property, msg))
}

/// Fallback for a property the stored entity has no value for
fn missing_value(schema: &EntitySchema, property: &PropertySchema) -> GraphResult<Value> {
    if let Some(default) = &property.default {
        return simple_to_json(schema, property, default);
    }
    match property.role {
        PropertyRole::Identifier => return Ok(Value::String(String::new())),
        PropertyRole::Direction => {
            return Ok(Value::String(
                RelationshipDirection::default().as_str().to_string(),
            ))
        }
        _ => {}
    }
    if property.nullable {
        return Ok(Value::Null);
    }
    match property.class {
        PropertyClass::SimpleCollection | PropertyClass::ComplexCollection => {
            Ok(Value::Array(Vec::new()))
        }
        PropertyClass::Simple => property
            .scalar
            .and_then(scalar_default_json)
            .ok_or_else(|| GraphError::required_missing(schema.type_name(), &property.name)),
        PropertyClass::Complex => Err(GraphError::required_missing(
            schema.type_name(),
            &property.name,
        )),
    }
}

/// Runtime map from entity type to serializer
pub struct SerializerRegistry {
    schemas: Arc<SchemaRegistry>,
    serializers: DashMap<TypeId, Arc<dyn EntitySerializer>>,
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("registered", &self.serializers.len())
            .finish()
    }
}

impl SerializerRegistry {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            schemas,
            serializers: DashMap::new(),
        }
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    /// Register a serializer, returning the one it replaced
    pub fn register(
        &self,
        serializer: Arc<dyn EntitySerializer>,
    ) -> Option<Arc<dyn EntitySerializer>> {
        self.serializers.insert(serializer.entity_type(), serializer)
    }

    pub fn get(&self, type_id: TypeId) -> Option<Arc<dyn EntitySerializer>> {
        self.serializers.get(&type_id).map(|s| s.value().clone())
    }

    pub fn contains<T: GraphEntity>(&self) -> bool {
        self.serializers.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Serializer for `T`, registering the schema-driven default on first use
    pub fn serializer_for<T: GraphEntity>(&self) -> Arc<dyn EntitySerializer> {
        self.serializers
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                let serializer: Arc<dyn EntitySerializer> =
                    Arc::new(ModelSerializer::<T>::new(Arc::clone(&self.schemas)));
                serializer
            })
            .value()
            .clone()
    }

    pub fn serialize<T: GraphEntity>(&self, entity: &T) -> GraphResult<EntityInfo> {
        self.serializer_for::<T>().serialize(entity)
    }

    pub fn deserialize<T: GraphEntity>(&self, info: &EntityInfo) -> GraphResult<T> {
        let serializer = self.serializer_for::<T>();
        let value = serializer.deserialize(info)?;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            GraphError::configuration(
                T::type_name(),
                format!(
                    "serializer registered for {} produced a different type",
                    serializer.type_name()
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{
        EntityKind, NodeProperties, PropertyListBuilder, RelationshipEntity,
        RelationshipProperties,
    };
    use crate::types::ComplexType;
    use crate::{graph_type, ErrorKind};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Address {
        street: String,
        city: String,
        zip: Option<String>,
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
    struct Person {
        id: String,
        first_name: String,
        age: i32,
        score: f64,
        born: NaiveDate,
        tags: Vec<String>,
        home_address: Option<Address>,
        previous_addresses: Vec<Address>,
        #[serde(skip)]
        scratch: String,
    }

    impl GraphEntity for Person {
        const KIND: EntityKind = EntityKind::Node;

        fn describe(p: &mut PropertyListBuilder) {
            p.include::<NodeProperties>()
                .property::<String>("FirstName")
                .property::<i32>("Age")
                .property::<f64>("Score")
                .property::<NaiveDate>("Born")
                .property::<Vec<String>>("Tags")
                .property::<Option<Address>>("HomeAddress")
                .property::<Vec<Address>>("PreviousAddresses");
        }

        fn entity_id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Knows {
        id: String,
        start_node_id: String,
        end_node_id: String,
        direction: RelationshipDirection,
        since: i32,
    }

    impl GraphEntity for Knows {
        const KIND: EntityKind = EntityKind::Relationship;

        fn label() -> &'static str {
            "KNOWS"
        }

        fn describe(p: &mut PropertyListBuilder) {
            p.include::<RelationshipProperties>()
                .property::<i32>("Since");
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

    fn registry() -> SerializerRegistry {
        SerializerRegistry::new(Arc::new(SchemaRegistry::default()))
    }

    fn address(street: &str, city: &str) -> Address {
        Address {
            street: street.into(),
            city: city.into(),
            zip: None,
        }
    }

    fn alice() -> Person {
        Person {
            id: "p-1".into(),
            first_name: "Alice".into(),
            age: 30,
            score: 4.5,
            born: NaiveDate::from_ymd_opt(1994, 5, 17).unwrap(),
            tags: vec!["admin".into(), "ops".into()],
            home_address: Some(address("1 Pike St", "Seattle")),
            previous_addresses: vec![
                address("A", "Austin"),
                address("B", "Boston"),
                address("C", "Chicago"),
            ],
            scratch: String::new(),
        }
    }

    #[test]
    fn test_serialize_splits_simple_and_complex() {
        let info = registry().serialize(&alice()).unwrap();

        assert_eq!(info.declared_type(), "Person");
        assert_eq!(info.labels(), ["Person".to_string()]);
        assert_eq!(info.string("FirstName"), Some("Alice"));
        assert_eq!(
            info.simple("Tags"),
            Some(&SimpleProperty::Collection {
                element: crate::ScalarKind::String,
                items: vec!["admin".into(), "ops".into()],
            })
        );
        match info.complex("PreviousAddresses").unwrap() {
            ComplexProperty::Collection(items) => {
                let cities: Vec<_> = items.iter().map(|i| i.string("City").unwrap()).collect();
                assert_eq!(cities, vec!["Austin", "Boston", "Chicago"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(info.simple("Scratch").is_none());
    }

    #[test]
    fn test_round_trip() {
        let registry = registry();
        let person = alice();
        let info = registry.serialize(&person).unwrap();
        let back: Person = registry.deserialize(&info).unwrap();
        assert_eq!(back, person);
    }

    #[test]
    fn test_null_complex_value_is_simple_null_marker() {
        let mut person = alice();
        person.home_address = None;
        let info = registry().serialize(&person).unwrap();
        assert!(info.simple("HomeAddress").unwrap().is_null());
        assert!(info.complex("HomeAddress").is_none());
    }

    #[test]
    fn test_deserialize_matches_keys_case_insensitively() {
        let registry = registry();
        let mut info = registry.serialize(&alice()).unwrap();
        info.set_value("firstname", "Bob");
        // Exact key still wins over the case-insensitive one.
        assert_eq!(registry.deserialize::<Person>(&info).unwrap().first_name, "Alice");

        let mut info = EntityInfo::new("Person", vec![]);
        info.set_value("id", "p-2");
        info.set_value("FIRSTNAME", "Bob");
        let person: Person = registry.deserialize(&info).unwrap();
        assert_eq!(person.id, "p-2");
        assert_eq!(person.first_name, "Bob");
    }

    #[test]
    fn test_missing_values_use_fallbacks() {
        let registry = registry();
        let mut info = EntityInfo::new("Person", vec![]);
        info.set_value("FirstName", "Carol");

        let person: Person = registry.deserialize(&info).unwrap();
        assert_eq!(person.id, "");
        assert_eq!(person.age, 0);
        assert_eq!(person.score, 0.0);
        assert_eq!(person.born, NaiveDate::default());
        assert!(person.tags.is_empty());
        assert!(person.home_address.is_none());
        assert!(person.previous_addresses.is_empty());
    }

    #[test]
    fn test_missing_required_string_fails() {
        let registry = registry();
        let mut info = EntityInfo::new("Person", vec![]);
        info.set_value("Id", "p-3");

        let err = registry.deserialize::<Person>(&info).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiredPropertyMissing);
        assert!(err.to_string().contains("FirstName"));
    }

    #[test]
    fn test_relationship_direction_defaults_to_outgoing() {
        let registry = registry();
        let mut info = EntityInfo::new("Knows", vec!["KNOWS".into()]);
        info.set_value("Id", "k-1");
        info.set_value("StartNodeId", "a");
        info.set_value("EndNodeId", "b");
        info.set_value("Since", 2020);

        let knows: Knows = registry.deserialize(&info).unwrap();
        assert_eq!(knows.direction, RelationshipDirection::Outgoing);
        assert_eq!(knows.since, 2020);
    }

    #[test]
    fn test_structural_properties_are_not_stored() {
        let registry = registry();
        let knows = Knows {
            id: "k-1".into(),
            start_node_id: "a".into(),
            end_node_id: "b".into(),
            direction: RelationshipDirection::Incoming,
            since: 2001,
        };
        let info = registry.serialize(&knows).unwrap();
        let schema = registry.schemas().schema_of::<Knows>().unwrap();
        let stored = info.storage_properties(&schema);
        assert!(stored.contains_key("Id"));
        assert!(stored.contains_key("Direction"));
        assert!(!stored.contains_key("StartNodeId"));
        assert!(!stored.contains_key("EndNodeId"));
        assert_eq!(stored.get("Direction"), Some(&GraphValue::from("Incoming")));
    }

    #[test]
    fn test_runtime_registration_replaces_default() {
        struct Fixed;

        impl EntitySerializer for Fixed {
            fn entity_type(&self) -> TypeId {
                TypeId::of::<Person>()
            }

            fn type_name(&self) -> &str {
                "Person"
            }

            fn schema(&self) -> GraphResult<Arc<EntitySchema>> {
                Err(GraphError::unsupported("fixed"))
            }

            fn serialize(&self, _entity: &dyn Any) -> GraphResult<EntityInfo> {
                Ok(EntityInfo::new("Fixed", vec!["Fixed".into()]))
            }

            fn deserialize(&self, _info: &EntityInfo) -> GraphResult<Box<dyn Any + Send>> {
                Ok(Box::new(alice()))
            }
        }

        let registry = registry();
        assert!(registry.register(Arc::new(Fixed)).is_none());
        assert_eq!(registry.serialize(&alice()).unwrap().declared_type(), "Fixed");
        let person: Person = registry.deserialize(&EntityInfo::default()).unwrap();
        assert_eq!(person.first_name, "Alice");
    }

    fn address_strategy() -> impl Strategy<Value = Address> {
        ("[a-z ]{0,12}", "[A-Za-z' ]{1,12}", proptest::option::of("[0-9]{5}"))
            .prop_map(|(street, city, zip)| Address { street, city, zip })
    }

    proptest! {
        #[test]
        fn prop_serialize_then_deserialize_is_identity(
            first_name in ".{0,16}",
            age in any::<i32>(),
            score in -1.0e6f64..1.0e6,
            (year, month, day) in (1900i32..2100, 1u32..=12, 1u32..=28),
            tags in proptest::collection::vec("[a-z]{1,6}", 0..4),
            home in proptest::option::of(address_strategy()),
            previous in proptest::collection::vec(address_strategy(), 0..4),
        ) {
            let registry = registry();
            let person = Person {
                id: crate::new_entity_id(),
                first_name,
                age,
                score,
                born: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
                tags,
                home_address: home,
                previous_addresses: previous,
                scratch: String::new(),
            };
            let info = registry.serialize(&person).unwrap();
            let back: Person = registry.deserialize(&info).unwrap();
            prop_assert_eq!(back, person);
        }
    }
}
