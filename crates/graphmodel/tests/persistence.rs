//! Writes through the façade and the stored layout they produce.

mod common;

use common::{graph, Address, Knows, Person};
use graphmodel::test_support::{complex_entry, node, ExecutedQuery, MockEngine};
use graphmodel::{ErrorKind, Graph};
use graphmodel_core::naming::AUX_ID_PROPERTY;
use graphmodel_core::{EngineError, GraphValue, Record};
use std::collections::HashMap;
use std::sync::Arc;

fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let from = text.find(start).expect("start marker") + start.len();
    let to = from + text[from..].find(end).expect("end marker");
    &text[from..to]
}

/// Rebuild the collected complex column a read would return from the
/// auxiliary writes the engine received
fn complex_column_from_writes(queries: &[ExecutedQuery]) -> GraphValue {
    let mut positions: HashMap<String, (Vec<String>, Vec<i64>)> = HashMap::new();
    let mut entries = Vec::new();

    for query in queries.iter().filter(|q| q.text.contains("$sequence")) {
        let relationship_type = between(&query.text, "CREATE (parent)-[:", " {").to_string();
        let label = between(&query.text, "(aux:", " $properties");
        let sequence = query.parameters["sequence"].as_i64().expect("sequence");
        let GraphValue::Map(properties) = &query.parameters["properties"] else {
            panic!("properties bind as a map");
        };
        let aux_id = properties[AUX_ID_PROPERTY].as_str().expect("aux id").to_string();

        let (mut path, mut seq) = if query.text.contains(AUX_ID_PROPERTY) {
            let parent = query.parameters["parent_id"].as_str().expect("parent id");
            positions[parent].clone()
        } else {
            (Vec::new(), Vec::new())
        };
        path.push(relationship_type);
        seq.push(sequence);

        let steps: Vec<&str> = path.iter().map(String::as_str).collect();
        entries.push(complex_entry(&steps, &seq, node(&[label], properties.clone())));
        positions.insert(aux_id, (path, seq));
    }
    GraphValue::List(entries)
}

#[tokio::test]
async fn test_complex_properties_read_back_as_written() -> anyhow::Result<()> {
    let engine = MockEngine::new();
    let graph = graph(&engine);
    let mut alice = Person::new("p-1", "Alice", "Smith", 30);
    alice.home_address = Some(Address::new("1 Pike St", "Seattle").tagged(&["home"]));
    alice.previous_addresses = vec![
        Address::new("2 Elm St", "Oslo").tagged(&["cold", "fjord"]),
        Address::new("3 Oak Ave", "Lima"),
        Address::new("4 Bay Rd", "Pune").tagged(&["warm"]),
    ];

    graph.create_node(&alice, None).await?;

    let writes = engine.queries();
    let GraphValue::Map(stored) = &writes[0].parameters["properties"] else {
        panic!("properties bind as a map");
    };
    engine.respond(
        "MATCH (n1:Person)",
        vec![Record::new()
            .with("n1", node(&["Person"], stored.clone()))
            .with("n1_complex", complex_column_from_writes(&writes))],
    );

    let loaded: Person = graph.get_node("p-1", None).await?;
    assert_eq!(loaded, alice);
    let cities: Vec<&str> = loaded
        .previous_addresses
        .iter()
        .map(|a| a.city.as_str())
        .collect();
    assert_eq!(cities, ["Oslo", "Lima", "Pune"]);
    Ok(())
}

#[tokio::test]
async fn test_second_write_failure_rolls_back_the_first() {
    let engine = MockEngine::new();
    engine.fail_on(
        "__PROPERTY__HomeAddress__",
        EngineError::new("constraint violated"),
    );
    let mut alice = Person::new("p-1", "Alice", "Smith", 30);
    alice.home_address = Some(Address::new("1 Pike St", "Seattle"));

    let err = graph(&engine).create_node(&alice, None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(engine.query_texts().len(), 2);
    assert_eq!(engine.commits(), 0);
    assert_eq!(engine.rollbacks(), 1);
    assert_eq!(engine.sessions_closed(), 1);
}

#[tokio::test]
async fn test_nesting_past_the_configured_depth_is_rejected() {
    let engine = MockEngine::new();
    let graph = Graph::builder(Arc::new(engine.clone()))
        .complex_property_depth(1)
        .build();
    let mut alice = Person::new("p-1", "Alice", "Smith", 30);
    alice.home_address = Some(Address::new("1 Pike St", "Seattle").tagged(&["home"]));

    let err = graph.create_node(&alice, None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(engine.query_texts().len(), 1);
    assert_eq!(engine.commits(), 0);
    assert_eq!(engine.rollbacks(), 1);
}

#[tokio::test]
async fn test_failure_inside_explicit_transaction_leaves_it_to_the_caller() -> anyhow::Result<()> {
    let engine = MockEngine::new();
    engine.fail_on("__PROPERTY__HomeAddress__", EngineError::new("boom"));
    let graph = graph(&engine);
    let tx = graph.begin_transaction().await?;

    let mut alice = Person::new("p-1", "Alice", "Smith", 30);
    alice.home_address = Some(Address::new("1 Pike St", "Seattle"));
    assert!(graph.create_node(&alice, Some(&tx)).await.is_err());
    assert!(tx.is_active());
    assert_eq!(engine.rollbacks(), 0);

    tx.rollback().await?;
    assert_eq!(engine.rollbacks(), 1);
    Ok(())
}

#[tokio::test]
async fn test_relationship_round_trip() -> anyhow::Result<()> {
    let engine = MockEngine::new();
    engine.respond("CREATE (a)-[r:KNOWS", vec![Record::new().with("created", 1i64)]);
    let graph = graph(&engine);
    let knows = Knows::new("k-1", "p-1", "p-2", 2019);

    graph.create_relationship(&knows, None).await?;
    let created = &engine.queries()[0];
    assert_eq!(created.parameters["start"], GraphValue::from("p-1"));
    let GraphValue::Map(properties) = &created.parameters["properties"] else {
        panic!("properties bind as a map");
    };
    assert!(!properties.contains_key("StartNodeId"));
    assert!(!properties.contains_key("EndNodeId"));

    let mut stored = properties.clone();
    stored.insert("Id".to_string(), GraphValue::from("k-1"));
    engine.respond(
        "MATCH (n1)-[r1:KNOWS]->(n2)",
        vec![Record::new()
            .with("r1", graphmodel::test_support::relationship("KNOWS", stored))
            .with("r1_start", "p-1")
            .with("r1_end", "p-2")],
    );
    let loaded: Knows = graph.get_relationship("k-1", None).await?;
    assert_eq!(loaded, knows);
    Ok(())
}

#[tokio::test]
async fn test_deleting_a_missing_relationship_is_not_found() {
    let engine = MockEngine::new();
    let err = graph(&engine)
        .delete_relationship::<Knows>("k-404", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(engine.rollbacks(), 1);
}
