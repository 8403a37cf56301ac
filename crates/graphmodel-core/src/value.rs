//! Engine-neutral values.
//!
//! [`GraphValue`] is what flows across the engine boundary in both
//! directions: query parameters on the way in, record columns on the way out.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Named query parameters, ordered for deterministic rendering
pub type Parameters = BTreeMap<String, GraphValue>;

/// Calendar-aware duration, matching the graph engine's native duration type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphDuration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanoseconds: i32,
}

impl GraphDuration {
    pub fn days(days: i64) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn seconds(seconds: i64) -> Self {
        Self {
            seconds,
            ..Self::default()
        }
    }
}

/// Spatial point with a coordinate reference system id
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub srid: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Point {
    /// WGS-84 geographic point (srid 4326)
    pub fn geographic(longitude: f64, latitude: f64) -> Self {
        Self {
            srid: 4326,
            x: longitude,
            y: latitude,
            z: None,
        }
    }

    /// Cartesian point (srid 7203)
    pub fn cartesian(x: f64, y: f64) -> Self {
        Self {
            srid: 7203,
            x,
            y,
            z: None,
        }
    }
}

/// A node as returned by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    pub element_id: String,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, GraphValue>,
}

/// A relationship as returned by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipRecord {
    pub element_id: String,
    pub relationship_type: String,
    pub start_element_id: String,
    pub end_element_id: String,
    pub properties: BTreeMap<String, GraphValue>,
}

/// An alternating node/relationship sequence as returned by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathRecord {
    pub nodes: Vec<NodeRecord>,
    pub relationships: Vec<RelationshipRecord>,
}

/// A value that can be bound as a parameter or read from a record
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GraphValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    Time(NaiveTime),
    Duration(GraphDuration),
    Point(Point),
    List(Vec<GraphValue>),
    Map(BTreeMap<String, GraphValue>),
    Node(NodeRecord),
    Relationship(RelationshipRecord),
    Path(PathRecord),
}

impl GraphValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GraphValue::Int(i) => Some(*i),
            GraphValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GraphValue::Float(f) => Some(*f),
            GraphValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GraphValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, GraphValue>> {
        match self {
            GraphValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRecord> {
        match self {
            GraphValue::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&RelationshipRecord> {
        match self {
            GraphValue::Relationship(rel) => Some(rel),
            _ => None,
        }
    }

    /// Short name of the value's variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            GraphValue::Null => "null",
            GraphValue::Bool(_) => "boolean",
            GraphValue::Int(_) => "integer",
            GraphValue::Float(_) => "float",
            GraphValue::String(_) => "string",
            GraphValue::Bytes(_) => "bytes",
            GraphValue::Date(_) => "date",
            GraphValue::DateTime(_) => "datetime",
            GraphValue::LocalDateTime(_) => "local datetime",
            GraphValue::Time(_) => "time",
            GraphValue::Duration(_) => "duration",
            GraphValue::Point(_) => "point",
            GraphValue::List(_) => "list",
            GraphValue::Map(_) => "map",
            GraphValue::Node(_) => "node",
            GraphValue::Relationship(_) => "relationship",
            GraphValue::Path(_) => "path",
        }
    }

    /// Untyped conversion to JSON, used for projections whose target type
    /// is only known to serde.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            GraphValue::Null => Value::Null,
            GraphValue::Bool(b) => Value::Bool(*b),
            GraphValue::Int(i) => Value::from(*i),
            GraphValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            GraphValue::String(s) => Value::String(s.clone()),
            GraphValue::Bytes(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            GraphValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            GraphValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            GraphValue::LocalDateTime(dt) => Value::String(format!("{dt:?}")),
            GraphValue::Time(t) => Value::String(format!("{t:?}")),
            GraphValue::Duration(d) => serde_json::to_value(d).unwrap_or(Value::Null),
            GraphValue::Point(p) => serde_json::to_value(p).unwrap_or(Value::Null),
            GraphValue::List(items) => Value::Array(items.iter().map(GraphValue::to_json).collect()),
            GraphValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            GraphValue::Node(node) => Value::Object(
                node.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            GraphValue::Relationship(rel) => Value::Object(
                rel.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            GraphValue::Path(path) => serde_json::json!({
                "nodes": path.nodes.iter().map(|n| GraphValue::Node(n.clone()).to_json()).collect::<Vec<_>>(),
                "relationships": path.relationships.iter().map(|r| GraphValue::Relationship(r.clone()).to_json()).collect::<Vec<_>>(),
            }),
        }
    }
}

macro_rules! impl_from_for_graph_value {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for GraphValue {
                fn from(value: $ty) -> Self {
                    GraphValue::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_from_for_graph_value! {
    bool => Bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => String,
    NaiveDate => Date,
    DateTime<FixedOffset> => DateTime,
    NaiveDateTime => LocalDateTime,
    NaiveTime => Time,
    GraphDuration => Duration,
    Point => Point,
    NodeRecord => Node,
    RelationshipRecord => Relationship,
    PathRecord => Path,
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        GraphValue::String(value.to_string())
    }
}

impl From<&String> for GraphValue {
    fn from(value: &String) -> Self {
        GraphValue::String(value.clone())
    }
}

impl From<DateTime<Utc>> for GraphValue {
    fn from(value: DateTime<Utc>) -> Self {
        GraphValue::DateTime(value.fixed_offset())
    }
}

impl From<Uuid> for GraphValue {
    fn from(value: Uuid) -> Self {
        GraphValue::String(value.to_string())
    }
}

impl<T: Into<GraphValue>> From<Option<T>> for GraphValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(GraphValue::Null)
    }
}

impl<T: Into<GraphValue>> From<Vec<T>> for GraphValue {
    fn from(value: Vec<T>) -> Self {
        GraphValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, GraphValue>> for GraphValue {
    fn from(value: BTreeMap<String, GraphValue>) -> Self {
        GraphValue::Map(value)
    }
}

/// One result row: return alias to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: BTreeMap<String, GraphValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<GraphValue>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&GraphValue> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_columns(self) -> BTreeMap<String, GraphValue> {
        self.columns
    }
}

impl FromIterator<(String, GraphValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, GraphValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
