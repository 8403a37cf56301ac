//! Declared property types and their classification.
//!
//! Rust has no runtime reflection, so every property type reports its shape
//! through [`GraphType::value_type`]. The schema registry feeds that shape
//! into [`classify`] exactly once per type and caches the result.

use crate::entity::PropertyListBuilder;
use crate::error::{GraphError, GraphResult};
use crate::value::{GraphDuration, Point};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use uuid::Uuid;

/// Scalar kinds the graph engine can store natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
    Date,
    DateTime,
    LocalDateTime,
    Time,
    Duration,
    Point,
    /// Stored as its canonical hyphenated string
    Uuid,
    /// Unit-only enum, stored as the variant name
    Enum,
}

impl ScalarKind {
    /// Temporal kinds support member access such as `.year`
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ScalarKind::Date | ScalarKind::DateTime | ScalarKind::LocalDateTime | ScalarKind::Time
        )
    }

    pub fn is_textual(self) -> bool {
        matches!(self, ScalarKind::String | ScalarKind::Uuid | ScalarKind::Enum)
    }
}

/// Reference to a complex (nested object) type.
///
/// Holds function pointers rather than the type itself so that value types
/// stay `Clone` and comparable.
#[derive(Clone, Copy)]
pub struct ComplexRef {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    describe: fn(&mut PropertyListBuilder),
}

impl ComplexRef {
    pub fn of<T: ComplexType>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: T::type_name,
            describe: T::describe,
        }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    pub(crate) fn describe_into(&self, builder: &mut PropertyListBuilder) {
        (self.describe)(builder)
    }
}

impl fmt::Debug for ComplexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComplexRef").field(&self.type_name()).finish()
    }
}

impl PartialEq for ComplexRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

/// Shape of a declared property type
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Scalar(ScalarKind),
    Optional(Box<ValueType>),
    List(Box<ValueType>),
    Complex(ComplexRef),
    /// A type that has no graph representation; carries a short description
    Unsupported(&'static str),
}

impl ValueType {
    pub fn complex<T: ComplexType>() -> Self {
        ValueType::Complex(ComplexRef::of::<T>())
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ValueType::Optional(_))
    }

    /// The type with any `Optional` wrappers removed
    pub fn non_optional(&self) -> &ValueType {
        match self {
            ValueType::Optional(inner) => inner.non_optional(),
            other => other,
        }
    }

    /// Scalar kind of the value, or of the elements for a collection
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.non_optional() {
            ValueType::Scalar(kind) => Some(*kind),
            ValueType::List(inner) => match inner.non_optional() {
                ValueType::Scalar(kind) => Some(*kind),
                _ => None,
            },
            _ => None,
        }
    }

    /// Complex type referenced by the value, or by the elements for a collection
    pub fn complex_ref(&self) -> Option<ComplexRef> {
        match self.non_optional() {
            ValueType::Complex(reference) => Some(*reference),
            ValueType::List(inner) => match inner.non_optional() {
                ValueType::Complex(reference) => Some(*reference),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(kind) => write!(f, "{kind:?}"),
            ValueType::Optional(inner) => write!(f, "Option<{inner}>"),
            ValueType::List(inner) => write!(f, "List<{inner}>"),
            ValueType::Complex(reference) => f.write_str(reference.type_name()),
            ValueType::Unsupported(what) => write!(f, "unsupported ({what})"),
        }
    }
}

/// Classification of a property by storage shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyClass {
    Simple,
    SimpleCollection,
    Complex,
    ComplexCollection,
}

impl PropertyClass {
    pub fn is_simple(self) -> bool {
        matches!(self, PropertyClass::Simple | PropertyClass::SimpleCollection)
    }

    pub fn is_collection(self) -> bool {
        matches!(
            self,
            PropertyClass::SimpleCollection | PropertyClass::ComplexCollection
        )
    }
}

/// Classify a declared type.
///
/// `Option` is transparent. Collections of collections, maps and other
/// unsupported shapes are configuration errors.
pub fn classify(value_type: &ValueType) -> GraphResult<PropertyClass> {
    classify_within(value_type, value_type)
}

/// Classify `shape`, reporting errors against the declared `declared` type
fn classify_within(declared: &ValueType, shape: &ValueType) -> GraphResult<PropertyClass> {
    match shape {
        ValueType::Optional(inner) => classify_within(declared, inner),
        ValueType::Scalar(_) => Ok(PropertyClass::Simple),
        ValueType::Complex(_) => Ok(PropertyClass::Complex),
        ValueType::List(element) => classify_element(declared, element),
        ValueType::Unsupported(what) => Err(GraphError::configuration(
            declared.to_string(),
            format!("type is not storable: {what}"),
        )),
    }
}

fn classify_element(declared: &ValueType, element: &ValueType) -> GraphResult<PropertyClass> {
    match element {
        ValueType::Optional(inner) => classify_element(declared, inner),
        ValueType::Scalar(_) => Ok(PropertyClass::SimpleCollection),
        ValueType::Complex(_) => Ok(PropertyClass::ComplexCollection),
        ValueType::List(_) => Err(GraphError::configuration(
            declared.to_string(),
            "nested collections cannot be stored",
        )),
        ValueType::Unsupported(what) => Err(GraphError::configuration(
            declared.to_string(),
            format!("collection element type is not storable: {what}"),
        )),
    }
}

/// A Rust type that can appear as a property of a graph entity
pub trait GraphType {
    fn value_type() -> ValueType;
}

/// A nested object stored as an auxiliary node
pub trait ComplexType: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name used for the auxiliary node label and in error messages
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Declare the properties of this type
    fn describe(properties: &mut PropertyListBuilder);
}

/// Strip the module path from a type name (`my::mod::Person` -> `Person`)
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

macro_rules! scalar_graph_type {
    ($kind:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl GraphType for $ty {
                fn value_type() -> ValueType {
                    ValueType::Scalar(ScalarKind::$kind)
                }
            }
        )+
    };
}

scalar_graph_type!(Bool => bool);
scalar_graph_type!(Int => i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);
scalar_graph_type!(Float => f32, f64);
scalar_graph_type!(String => String, char);
scalar_graph_type!(Date => NaiveDate);
scalar_graph_type!(DateTime => DateTime<Utc>, DateTime<FixedOffset>);
scalar_graph_type!(LocalDateTime => NaiveDateTime);
scalar_graph_type!(Time => NaiveTime);
scalar_graph_type!(Duration => GraphDuration);
scalar_graph_type!(Point => Point);
scalar_graph_type!(Uuid => Uuid);

impl<T: GraphType> GraphType for Option<T> {
    fn value_type() -> ValueType {
        ValueType::Optional(Box::new(T::value_type()))
    }
}

impl<T: GraphType> GraphType for Box<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }
}

impl<T: GraphType> GraphType for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }
}

impl<T: GraphType> GraphType for VecDeque<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }
}

impl<T: GraphType> GraphType for HashSet<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }
}

impl<T: GraphType> GraphType for BTreeSet<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }
}

impl<K, V> GraphType for HashMap<K, V> {
    fn value_type() -> ValueType {
        ValueType::Unsupported("map")
    }
}

impl<K, V> GraphType for BTreeMap<K, V> {
    fn value_type() -> ValueType {
        ValueType::Unsupported("map")
    }
}

impl GraphType for serde_json::Value {
    fn value_type() -> ValueType {
        ValueType::Unsupported("untyped JSON")
    }
}

/// Implement [`GraphType`] for complex types or unit-only enums.
///
/// ```rust,ignore
/// graph_type!(complex Address, Phone);
/// graph_type!(enum Status);
/// ```
#[macro_export]
macro_rules! graph_type {
    (complex $($ty:ty),+ $(,)?) => {
        $(
            impl $crate::GraphType for $ty {
                fn value_type() -> $crate::ValueType {
                    $crate::ValueType::complex::<$ty>()
                }
            }
        )+
    };
    (enum $($ty:ty),+ $(,)?) => {
        $(
            impl $crate::GraphType for $ty {
                fn value_type() -> $crate::ValueType {
                    $crate::ValueType::Scalar($crate::ScalarKind::Enum)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(i32::value_type(), PropertyClass::Simple ; "integer")]
    #[test_case(Option::<String>::value_type(), PropertyClass::Simple ; "optional string")]
    #[test_case(Vec::<f64>::value_type(), PropertyClass::SimpleCollection ; "float list")]
    #[test_case(Option::<Vec<NaiveDate>>::value_type(), PropertyClass::SimpleCollection ; "optional date list")]
    #[test_case(HashSet::<String>::value_type(), PropertyClass::SimpleCollection ; "string set")]
    #[test_case(Point::value_type(), PropertyClass::Simple ; "point")]
    fn test_classify_simple_shapes(value_type: ValueType, expected: PropertyClass) {
        assert_eq!(classify(&value_type).unwrap(), expected);
    }

    #[test]
    fn test_classify_rejects_unstorable_shapes() {
        for value_type in [
            HashMap::<String, i32>::value_type(),
            Vec::<Vec<i32>>::value_type(),
            Vec::<BTreeMap<String, String>>::value_type(),
            serde_json::Value::value_type(),
        ] {
            let err = classify(&value_type).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Configuration, "{value_type}");
        }
    }

    #[test]
    fn test_classify_sees_through_nested_options() {
        let nested = ValueType::Optional(Box::new(ValueType::List(Box::new(
            ValueType::Optional(Box::new(ValueType::Optional(Box::new(ValueType::Scalar(
                ScalarKind::String,
            ))))),
        ))));
        assert_eq!(classify(&nested).unwrap(), PropertyClass::SimpleCollection);

        let lists = ValueType::List(Box::new(ValueType::Optional(Box::new(ValueType::List(
            Box::new(ValueType::Scalar(ScalarKind::Int)),
        )))));
        let err = classify(&lists).unwrap_err();
        assert!(err.to_string().contains("nested collections"), "{err}");
    }

    #[test]
    fn test_classify_is_deterministic() {
        let value_type = Option::<Vec<String>>::value_type();
        assert_eq!(classify(&value_type).unwrap(), classify(&value_type).unwrap());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("app::model::Person"), "Person");
        assert_eq!(short_type_name("Person"), "Person");
        assert_eq!(short_type_name("app::Wrapper<app::Inner>"), "Wrapper");
    }
}
