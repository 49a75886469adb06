// tests/planner/join_path_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;

use querywright::catalog::{JoinKind, SemanticCatalog};
use querywright::planner::{JoinPath, JoinPathError, JoinPathFinder, QueryPlan, TieBreak};

/// Every step starts from an entity already in the tree and adds a new one.
fn assert_tree(path: &JoinPath) {
    let mut seen: HashSet<&str> = HashSet::from([path.root.as_str()]);
    for step in &path.steps {
        assert!(seen.contains(step.from.as_str()), "{} not yet joined", step.from);
        assert!(seen.insert(step.to.as_str()), "{} joined twice", step.to);
    }
}

#[test]
fn test_single_entity_has_empty_path() {
    let catalog = common::catalog();
    let path = JoinPathFinder::new(&catalog)
        .connect(&["Company"], &[])
        .unwrap();
    assert_eq!(path, JoinPath::single("Company"));
    assert!(path.is_empty());
}

#[test]
fn test_direct_join_either_direction() {
    let catalog = common::catalog();
    let finder = JoinPathFinder::new(&catalog).with_tie_break(TieBreak::Lexical);

    let path = finder.connect(&["Person", "Company"], &[]).unwrap();
    assert_eq!(path.root, "Company");
    assert_eq!(path.len(), 1);
    let step = &path.steps[0];
    assert_eq!((step.from.as_str(), step.to.as_str()), ("Company", "Person"));
    assert_eq!(step.kind, JoinKind::OneToMany);
    assert_eq!(step.from_columns, vec!["id"]);
    assert_eq!(step.to_columns, vec!["company_id"]);
    assert!(path.causes_fanout());
}

#[test]
fn test_three_entities_minimal_tree() {
    let catalog = common::catalog();
    let path = JoinPathFinder::new(&catalog)
        .connect(&["Deal", "Company", "Person"], &[])
        .unwrap();

    assert_eq!(path.len(), 2);
    assert_tree(&path);
    for id in ["Deal", "Company", "Person"] {
        assert!(path.contains(id));
    }
}

#[test]
fn test_tie_break_prefers_most_referenced_root() {
    let catalog = common::catalog();
    let finder = JoinPathFinder::new(&catalog);

    let path = finder
        .connect(&["Deal", "Company", "Person"], &["Person", "Deal", "Person"])
        .unwrap();
    assert_eq!(path.root, "Person");

    let path = JoinPathFinder::new(&catalog)
        .with_tie_break(TieBreak::MostRecent)
        .connect(&["Deal", "Company", "Person"], &["Person", "Deal", "Person", "Deal"])
        .unwrap();
    assert_eq!(path.root, "Deal");
}

#[test]
fn test_resolution_is_deterministic() {
    let catalog = common::catalog();
    let finder = JoinPathFinder::new(&catalog);
    let first = finder.connect(&["Person", "Deal", "Company"], &[]).unwrap();
    for _ in 0..10 {
        assert_eq!(finder.connect(&["Person", "Deal", "Company"], &[]).unwrap(), first);
    }
}

#[test]
fn test_disconnected_names_unreachable() {
    let catalog = common::catalog();
    let finder = JoinPathFinder::new(&catalog);

    assert_eq!(
        finder.connect(&["Company", "Weather"], &[]),
        Err(JoinPathError::Disconnected {
            unreachable: vec!["Weather".into()]
        })
    );
    assert_eq!(
        finder.connect(&["Weather", "Company", "Person"], &[]),
        Err(JoinPathError::Disconnected {
            unreachable: vec!["Weather".into()]
        })
    );
}

#[test]
fn test_resolve_plan() {
    let catalog = common::catalog();
    let plan = QueryPlan::builder()
        .select("Company.industry")
        .select("Weather.city")
        .build()
        .unwrap();
    assert!(matches!(
        JoinPathFinder::new(&catalog).resolve(&plan),
        Err(JoinPathError::Disconnected { .. })
    ));
}

#[test]
fn test_pairwise_no_path() {
    let catalog = common::catalog();
    let finder = JoinPathFinder::new(&catalog);

    assert_eq!(
        finder.shortest_path("Weather", "Company"),
        Err(JoinPathError::NoPath {
            from: "Weather".into(),
            to: "Company".into()
        })
    );
    let direct = finder.shortest_path("Person", "Deal").unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct.steps[0].to_columns, vec!["owner_id"]);
}

#[test]
fn test_unknown_and_empty_requests() {
    let catalog = common::catalog();
    let finder = JoinPathFinder::new(&catalog);
    let none: [&str; 0] = [];

    assert_eq!(finder.connect(&none, &[]), Err(JoinPathError::EmptyRequest));
    assert_eq!(
        finder.connect(&["Company", "Invoice"], &[]),
        Err(JoinPathError::UnknownEntity("Invoice".into()))
    );
}

#[test]
fn test_cyclic_catalog_terminates() {
    let catalog = SemanticCatalog::from_json(
        r#"{"entities": [
            {"id": "A", "table": "a", "joins": [
                {"target": "B", "kind": "one_to_one", "local_columns": ["b_id"], "remote_columns": ["id"]}]},
            {"id": "B", "table": "b", "joins": [
                {"target": "C", "kind": "one_to_one", "local_columns": ["c_id"], "remote_columns": ["id"]}]},
            {"id": "C", "table": "c", "joins": [
                {"target": "A", "kind": "one_to_one", "local_columns": ["a_id"], "remote_columns": ["id"]},
                {"target": "D", "kind": "one_to_one", "local_columns": ["d_id"], "remote_columns": ["id"]}]},
            {"id": "D", "table": "d"}
        ]}"#,
    )
    .unwrap();

    let path = JoinPathFinder::new(&catalog)
        .connect(&["A", "D"], &[])
        .unwrap();
    assert_eq!(path.len(), 2);
    assert_tree(&path);
}

fn join_to(target: &str) -> String {
    format!(
        r#"{{"target": "{target}", "kind": "many_to_one", "local_columns": ["{}_id"], "remote_columns": ["id"]}}"#,
        target.to_lowercase()
    )
}

fn entity(id: &str, joins: &[&str]) -> String {
    let joins: Vec<String> = joins.iter().map(|t| join_to(t)).collect();
    format!(
        r#"{{"id": "{id}", "table": "{}", "joins": [{}]}}"#,
        id.to_lowercase(),
        joins.join(", ")
    )
}

fn catalog_of(entities: &[String]) -> SemanticCatalog {
    SemanticCatalog::from_json(&format!(r#"{{"entities": [{}]}}"#, entities.join(", "))).unwrap()
}

#[test]
fn test_tree_may_pass_through_unrequested_hub() {
    // Z reaches B, C and D directly; each connector P links only one pair.
    let catalog = catalog_of(&[
        entity("B", &[]),
        entity("C", &[]),
        entity("D", &[]),
        entity("Z", &["B", "C", "D"]),
        entity("P1", &["B", "C"]),
        entity("P2", &["C", "D"]),
        entity("P3", &["B", "D"]),
    ]);

    let path = JoinPathFinder::new(&catalog)
        .connect(&["B", "C", "D"], &[])
        .unwrap();

    assert_eq!(path.len(), 3);
    assert_eq!(path.root, "B");
    assert!(path.contains("Z"));
    assert_tree(&path);
}

#[test]
fn test_hub_tree_keeps_preferred_root() {
    let catalog = catalog_of(&[
        entity("B", &[]),
        entity("C", &[]),
        entity("D", &[]),
        entity("Z", &["B", "C", "D"]),
        entity("P1", &["B", "C"]),
        entity("P3", &["B", "D"]),
    ]);

    let path = JoinPathFinder::new(&catalog)
        .connect(&["B", "C", "D"], &["D", "D", "C"])
        .unwrap();
    assert_eq!(path.root, "D");
    assert_eq!(path.len(), 3);
    assert_tree(&path);
}

#[test]
fn test_large_request_spans_chain() {
    // More entities than the exact search handles.
    let ids: Vec<String> = (0..10).map(|i| format!("E{i}")).collect();
    let entities: Vec<String> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| match i {
            0 => entity(id, &[]),
            _ => entity(id, &[ids[i - 1].as_str()]),
        })
        .collect();
    let catalog = catalog_of(&entities);

    let path = JoinPathFinder::new(&catalog).connect(&ids, &[]).unwrap();
    assert_eq!(path.len(), 9);
    assert_tree(&path);
    for id in &ids {
        assert!(path.contains(id));
    }
}
