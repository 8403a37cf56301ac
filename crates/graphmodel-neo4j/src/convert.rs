//! Conversions between [`GraphValue`] and Bolt values.
//!
//! Parameters go out as [`BoltType`]; row columns come back as
//! [`GraphValue`]. Bolt 4 has no element ids, so the numeric entity id is
//! used as the element id of nodes and relationships.

use crate::error::{Neo4jError, Neo4jResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use graphmodel_core::{
    GraphDuration, GraphValue, NodeRecord, PathRecord, Point, Record, RelationshipRecord,
};
use neo4rs::{
    BoltBoolean, BoltBytes, BoltDuration, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNode,
    BoltNull, BoltPath, BoltPoint2D, BoltPoint3D, BoltRelation, BoltString, BoltType,
    BoltUnboundedRelation, Row,
};
use std::collections::BTreeMap;

fn conversion(message: impl Into<String>) -> Neo4jError {
    Neo4jError::Conversion(message.into())
}

/// Bind a parameter value
pub fn to_bolt(value: &GraphValue) -> Neo4jResult<BoltType> {
    Ok(match value {
        GraphValue::Null => BoltType::Null(BoltNull),
        GraphValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        GraphValue::Int(i) => BoltType::Integer(BoltInteger::new(*i)),
        GraphValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        GraphValue::String(s) => BoltType::String(BoltString::new(s)),
        GraphValue::Bytes(b) => BoltType::Bytes(BoltBytes::new(bytes::Bytes::copy_from_slice(b))),
        GraphValue::Date(d) => BoltType::from(*d),
        GraphValue::DateTime(dt) => BoltType::from(*dt),
        GraphValue::LocalDateTime(dt) => BoltType::from(*dt),
        GraphValue::Time(t) => BoltType::from(*t),
        GraphValue::Duration(d) => BoltType::Duration(BoltDuration::new(
            BoltInteger::new(d.months),
            BoltInteger::new(d.days),
            BoltInteger::new(d.seconds),
            BoltInteger::new(i64::from(d.nanoseconds)),
        )),
        GraphValue::Point(p) => match p.z {
            None => BoltType::Point2D(BoltPoint2D {
                sr_id: BoltInteger::new(i64::from(p.srid)),
                x: BoltFloat::new(p.x),
                y: BoltFloat::new(p.y),
            }),
            Some(z) => BoltType::Point3D(BoltPoint3D {
                sr_id: BoltInteger::new(i64::from(p.srid)),
                x: BoltFloat::new(p.x),
                y: BoltFloat::new(p.y),
                z: BoltFloat::new(z),
            }),
        },
        GraphValue::List(items) => BoltType::List(BoltList::from(
            items.iter().map(to_bolt).collect::<Neo4jResult<Vec<_>>>()?,
        )),
        GraphValue::Map(entries) => {
            let mut map = BoltMap::with_capacity(entries.len());
            for (key, value) in entries {
                map.put(BoltString::new(key), to_bolt(value)?);
            }
            BoltType::Map(map)
        }
        other @ (GraphValue::Node(_) | GraphValue::Relationship(_) | GraphValue::Path(_)) => {
            return Err(conversion(format!(
                "a {} cannot be bound as a parameter",
                other.type_name()
            )))
        }
    })
}

/// Read a column value
pub fn from_bolt(value: BoltType) -> Neo4jResult<GraphValue> {
    Ok(match value {
        BoltType::Null(_) => GraphValue::Null,
        BoltType::Boolean(b) => GraphValue::Bool(b.value),
        BoltType::Integer(i) => GraphValue::Int(i.value),
        BoltType::Float(f) => GraphValue::Float(f.value),
        BoltType::String(s) => GraphValue::String(s.value),
        BoltType::Bytes(b) => GraphValue::Bytes(b.value.to_vec()),
        BoltType::List(list) => GraphValue::List(
            list.value
                .into_iter()
                .map(from_bolt)
                .collect::<Neo4jResult<Vec<_>>>()?,
        ),
        BoltType::Map(map) => GraphValue::Map(properties(map)?),
        BoltType::Node(node) => GraphValue::Node(node_record(node)?),
        BoltType::Relation(rel) => GraphValue::Relationship(relationship_record(rel)?),
        BoltType::UnboundedRelation(rel) => {
            GraphValue::Relationship(unbounded_record(rel, String::new(), String::new())?)
        }
        BoltType::Path(path) => GraphValue::Path(path_record(path)?),
        BoltType::Point2D(p) => GraphValue::Point(Point {
            srid: srid(p.sr_id.value)?,
            x: p.x.value,
            y: p.y.value,
            z: None,
        }),
        BoltType::Point3D(p) => GraphValue::Point(Point {
            srid: srid(p.sr_id.value)?,
            x: p.x.value,
            y: p.y.value,
            z: Some(p.z.value),
        }),
        BoltType::Duration(d) => {
            // The driver only exposes the total as a std duration
            let total: std::time::Duration = d.into();
            GraphValue::Duration(GraphDuration {
                seconds: i64::try_from(total.as_secs())
                    .map_err(|_| conversion("duration out of range"))?,
                nanoseconds: i32::try_from(total.subsec_nanos())
                    .map_err(|_| conversion("duration out of range"))?,
                ..GraphDuration::default()
            })
        }
        BoltType::Date(d) => {
            let date: NaiveDate = d.try_into().map_err(|e| conversion(format!("{e:?}")))?;
            GraphValue::Date(date)
        }
        BoltType::LocalTime(t) => {
            let time: NaiveTime = t.into();
            GraphValue::Time(time)
        }
        BoltType::Time(t) => {
            let (time, _offset): (NaiveTime, FixedOffset) = t.into();
            GraphValue::Time(time)
        }
        BoltType::LocalDateTime(dt) => {
            let local: NaiveDateTime = dt.try_into().map_err(|e| conversion(format!("{e:?}")))?;
            GraphValue::LocalDateTime(local)
        }
        BoltType::DateTime(dt) => {
            let zoned: DateTime<FixedOffset> =
                dt.try_into().map_err(|e| conversion(format!("{e:?}")))?;
            GraphValue::DateTime(zoned)
        }
        BoltType::DateTimeZoneId(dt) => {
            let zoned: DateTime<FixedOffset> =
                (&dt).try_into().map_err(|e| conversion(format!("{e:?}")))?;
            GraphValue::DateTime(zoned)
        }
    })
}

fn srid(value: i64) -> Neo4jResult<u32> {
    u32::try_from(value).map_err(|_| conversion(format!("invalid srid {value}")))
}

fn string_list(list: BoltList) -> Neo4jResult<Vec<String>> {
    list.value
        .into_iter()
        .map(|item| match item {
            BoltType::String(s) => Ok(s.value),
            other => Err(conversion(format!("expected a string, got {other:?}"))),
        })
        .collect()
}

fn properties(map: BoltMap) -> Neo4jResult<BTreeMap<String, GraphValue>> {
    map.value
        .into_iter()
        .map(|(key, value)| Ok((key.value, from_bolt(value)?)))
        .collect()
}

fn node_record(node: BoltNode) -> Neo4jResult<NodeRecord> {
    Ok(NodeRecord {
        element_id: node.id.value.to_string(),
        labels: string_list(node.labels)?,
        properties: properties(node.properties)?,
    })
}

fn relationship_record(rel: BoltRelation) -> Neo4jResult<RelationshipRecord> {
    Ok(RelationshipRecord {
        element_id: rel.id.value.to_string(),
        relationship_type: rel.typ.value,
        start_element_id: rel.start_node_id.value.to_string(),
        end_element_id: rel.end_node_id.value.to_string(),
        properties: properties(rel.properties)?,
    })
}

fn unbounded_record(
    rel: BoltUnboundedRelation,
    start: String,
    end: String,
) -> Neo4jResult<RelationshipRecord> {
    Ok(RelationshipRecord {
        element_id: rel.id.value.to_string(),
        relationship_type: rel.typ.value,
        start_element_id: start,
        end_element_id: end,
        properties: properties(rel.properties)?,
    })
}

fn path_record(path: BoltPath) -> Neo4jResult<PathRecord> {
    let nodes = path
        .nodes
        .value
        .into_iter()
        .map(|node| match node {
            BoltType::Node(node) => node_record(node),
            other => Err(conversion(format!("path node is {other:?}"))),
        })
        .collect::<Neo4jResult<Vec<_>>>()?;
    let relationships = path
        .rels
        .value
        .into_iter()
        .map(|rel| match rel {
            BoltType::UnboundedRelation(rel) => unbounded_record(rel, String::new(), String::new()),
            other => Err(conversion(format!("path relationship is {other:?}"))),
        })
        .collect::<Neo4jResult<Vec<_>>>()?;
    let indices = path
        .indices
        .value
        .into_iter()
        .map(|index| match index {
            BoltType::Integer(i) => Ok(i.value),
            other => Err(conversion(format!("path index is {other:?}"))),
        })
        .collect::<Neo4jResult<Vec<_>>>()?;
    assemble_path(nodes, relationships, &indices)
}

/// Walk a Bolt path's index sequence.
///
/// `indices` alternates relationship and node positions. Relationship
/// positions are 1-based and negative when the relationship is traversed
/// against its direction; node positions index into `nodes`, whose first
/// entry is the path's start.
pub fn assemble_path(
    nodes: Vec<NodeRecord>,
    relationships: Vec<RelationshipRecord>,
    indices: &[i64],
) -> Neo4jResult<PathRecord> {
    if indices.len() % 2 != 0 {
        return Err(conversion("path indices must come in pairs"));
    }
    let start = nodes
        .first()
        .cloned()
        .ok_or_else(|| conversion("path has no nodes"))?;

    let mut path = PathRecord {
        nodes: vec![start],
        relationships: Vec::with_capacity(indices.len() / 2),
    };
    let mut previous = 0usize;
    for pair in indices.chunks(2) {
        let (rel_index, node_index) = (pair[0], pair[1]);
        let node_index =
            usize::try_from(node_index).map_err(|_| conversion("negative node index"))?;
        let node = nodes
            .get(node_index)
            .ok_or_else(|| conversion(format!("node index {node_index} out of range")))?;
        let position = usize::try_from(rel_index.unsigned_abs())
            .ok()
            .and_then(|i| i.checked_sub(1))
            .ok_or_else(|| conversion(format!("invalid relationship index {rel_index}")))?;
        let mut relationship = relationships
            .get(position)
            .cloned()
            .ok_or_else(|| conversion(format!("relationship index {rel_index} out of range")))?;

        let (from, to) = (&nodes[previous].element_id, &node.element_id);
        if rel_index > 0 {
            relationship.start_element_id = from.clone();
            relationship.end_element_id = to.clone();
        } else {
            relationship.start_element_id = to.clone();
            relationship.end_element_id = from.clone();
        }
        path.relationships.push(relationship);
        path.nodes.push(node.clone());
        previous = node_index;
    }
    Ok(path)
}

/// Convert a driver row into a record keyed by return alias
pub fn record_from_row(row: &Row) -> Neo4jResult<Record> {
    let mut record = Record::new();
    for key in row.keys() {
        let value: BoltType = row.get(&key.value)?;
        record.insert(key.value.clone(), from_bolt(value)?);
    }
    Ok(record)
}
