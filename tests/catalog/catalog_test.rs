// tests/catalog/catalog_test.rs
#[path = "../common/mod.rs"]
mod common;

use querywright::catalog::{
    AggregationKind, CatalogDefinition, CatalogError, Field, JoinKind, SemanticCatalog, ValueType,
};

fn definition(json: &str) -> CatalogDefinition {
    CatalogDefinition::from_json(json).unwrap()
}

#[test]
fn test_lookup_entity() {
    let catalog = common::catalog();
    let company = catalog.lookup_entity("Company").unwrap();

    assert_eq!(company.table, "companies");
    assert_eq!(catalog.len(), 4);
    assert_eq!(
        company.dimension("industry").unwrap().value_type,
        ValueType::String
    );
    assert_eq!(
        company.measure("revenue").unwrap().aggregation,
        AggregationKind::Sum
    );
}

#[test]
fn test_lookup_missing_entity() {
    let catalog = common::catalog();
    let err = catalog.lookup_entity("Invoice").unwrap_err();
    assert_eq!(err, CatalogError::NotFound("Invoice".into()));
    assert!(!err.is_structural());
}

#[test]
fn test_columns_default_to_field_name() {
    let catalog = common::catalog();
    let company = catalog.lookup_entity("Company").unwrap();

    assert_eq!(company.dimension("industry").unwrap().column, "industry");
    assert_eq!(company.dimension("founded").unwrap().column, "founded_on");
    assert!(matches!(company.field("revenue"), Some(Field::Measure(_))));
    assert!(company.field("unknown").is_none());
}

#[test]
fn test_entity_by_table_is_case_insensitive() {
    let catalog = common::catalog();
    assert_eq!(catalog.entity_by_table("PEOPLE").unwrap().id, "Person");
    assert!(catalog.entity_by_table("invoices").is_none());
}

#[test]
fn test_undeclared_join_target_fails_fast() {
    let def = definition(
        r#"{"entities": [{
            "id": "Order", "table": "orders",
            "joins": [{"target": "Customer", "kind": "many_to_one",
                       "local_columns": ["customer_id"], "remote_columns": ["id"]}]
        }]}"#,
    );
    let err = SemanticCatalog::from_definition(def).unwrap_err();
    assert_eq!(
        err,
        CatalogError::UndeclaredJoinTarget {
            entity: "Order".into(),
            target: "Customer".into()
        }
    );
    assert!(err.is_structural());
}

#[test]
fn test_duplicate_entity_rejected() {
    let def = definition(
        r#"{"entities": [
            {"id": "A", "table": "a"},
            {"id": "A", "table": "a2"}
        ]}"#,
    );
    assert_eq!(
        SemanticCatalog::from_definition(def).unwrap_err(),
        CatalogError::DuplicateEntity("A".into())
    );
}

#[test]
fn test_duplicate_field_rejected() {
    let def = definition(
        r#"{"entities": [{
            "id": "A", "table": "a",
            "dimensions": [{"name": "x", "type": "string"}],
            "measures": [{"name": "x", "aggregation": "sum"}]
        }]}"#,
    );
    assert!(matches!(
        SemanticCatalog::from_definition(def),
        Err(CatalogError::DuplicateField { .. })
    ));
}

#[test]
fn test_join_key_checks() {
    let mismatch = definition(
        r#"{"entities": [
            {"id": "A", "table": "a",
             "joins": [{"target": "B", "kind": "one_to_one",
                        "local_columns": ["x", "y"], "remote_columns": ["x"]}]},
            {"id": "B", "table": "b"}
        ]}"#,
    );
    assert!(matches!(
        SemanticCatalog::from_definition(mismatch),
        Err(CatalogError::JoinKeyMismatch {
            local: 2,
            remote: 1,
            ..
        })
    ));

    let empty = definition(
        r#"{"entities": [
            {"id": "A", "table": "a",
             "joins": [{"target": "B", "kind": "one_to_one",
                        "local_columns": [], "remote_columns": []}]},
            {"id": "B", "table": "b"}
        ]}"#,
    );
    assert!(matches!(
        SemanticCatalog::from_definition(empty),
        Err(CatalogError::EmptyJoinKeys { .. })
    ));
}

#[test]
fn test_malformed_definition() {
    let err = CatalogDefinition::from_json(r#"{"entities": [{"id": "A"}]}"#).unwrap_err();
    assert!(matches!(err, CatalogError::Definition(_)));
}

#[test]
fn test_join_kind_reverse() {
    assert_eq!(JoinKind::ManyToOne.reverse(), JoinKind::OneToMany);
    assert!(JoinKind::OneToMany.causes_fanout());
    assert!(!JoinKind::ManyToOne.causes_fanout());
}
