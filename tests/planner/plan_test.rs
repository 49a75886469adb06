// tests/planner/plan_test.rs
use querywright::planner::{
    FieldRef, FilterOp, FilterValue, PlanProposal, QueryPlan, StructuralError,
};

fn proposal(json: &str) -> PlanProposal {
    PlanProposal::from_json(json).unwrap()
}

#[test]
fn test_proposal_to_plan() {
    let plan = QueryPlan::try_from_proposal(&proposal(
        r#"{
            "entities": ["Company"],
            "select": ["Company.industry", "Company.revenue"],
            "filters": [
                {"field": "Company.region", "op": "in", "value": ["EU", "NA"]},
                {"field": "Company.founded", "op": "is not null"}
            ],
            "group_by": ["Company.industry"],
            "order_by": [{"field": "Company.revenue", "direction": "DESC"}],
            "limit": 25
        }"#,
    ))
    .unwrap();

    assert_eq!(plan.entities(), ["Company".to_string()]);
    assert_eq!(plan.select()[1], "Company.revenue".parse::<FieldRef>().unwrap());
    assert_eq!(plan.filters()[0].op, FilterOp::In);
    assert_eq!(
        plan.filters()[0].value,
        Some(FilterValue::List(vec!["EU".into(), "NA".into()]))
    );
    assert_eq!(plan.filters()[1].op, FilterOp::IsNotNull);
    assert_eq!(plan.filters()[1].value, None);
    assert!(plan.order_by()[0].descending);
    assert_eq!(plan.limit(), Some(25));
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = PlanProposal::from_json(r#"{"entities": ["A"], "select": ["A.x"], "having": []}"#)
        .unwrap_err();
    assert!(matches!(err, StructuralError::Malformed(_)));
}

#[test]
fn test_structural_rejections() {
    let cases = [
        (r#"{"entities": [], "select": ["A.x"]}"#, StructuralError::EmptyEntities),
        (r#"{"entities": ["A"], "select": []}"#, StructuralError::EmptySelection),
        (
            r#"{"entities": ["A"], "select": ["x"]}"#,
            StructuralError::InvalidFieldRef("x".into()),
        ),
        (
            r#"{"entities": ["A"], "select": ["A.b.c"]}"#,
            StructuralError::InvalidFieldRef("A.b.c".into()),
        ),
        (
            r#"{"entities": ["A"], "select": ["A.x"], "limit": 0}"#,
            StructuralError::InvalidLimit(0),
        ),
        (
            r#"{"entities": ["A"], "select": ["A.x"], "limit": -5}"#,
            StructuralError::InvalidLimit(-5),
        ),
        (
            r#"{"entities": ["A"], "select": ["A.x", "A.x"]}"#,
            StructuralError::DuplicateSelection("A.x".into()),
        ),
        (
            r#"{"entities": ["A"], "select": ["A.x"], "filters": [{"field": "A.x", "op": "~", "value": 1}]}"#,
            StructuralError::UnknownOperator("~".into()),
        ),
        (
            r#"{"entities": ["A"], "select": ["A.x"], "order_by": [{"field": "A.x", "direction": "up"}]}"#,
            StructuralError::InvalidDirection("up".into()),
        ),
        (
            r#"{"entities": ["A"], "select": ["B.x"]}"#,
            StructuralError::FieldOutsidePlan {
                field: "B.x".into(),
                entity: "B".into(),
            },
        ),
    ];

    for (json, expected) in cases {
        assert_eq!(
            QueryPlan::try_from_proposal(&proposal(json)),
            Err(expected),
            "proposal: {json}"
        );
    }
}

#[test]
fn test_filter_shape_rejections() {
    let in_scalar = proposal(
        r#"{"entities": ["A"], "select": ["A.x"],
            "filters": [{"field": "A.x", "op": "in", "value": 3}]}"#,
    );
    assert!(matches!(
        QueryPlan::try_from_proposal(&in_scalar),
        Err(StructuralError::InvalidFilter { index: 0, .. })
    ));

    let missing_value = proposal(
        r#"{"entities": ["A"], "select": ["A.x"],
            "filters": [{"field": "A.x", "op": "="}]}"#,
    );
    assert!(matches!(
        QueryPlan::try_from_proposal(&missing_value),
        Err(StructuralError::InvalidFilter { .. })
    ));

    let missing_field = proposal(
        r#"{"entities": ["A"], "select": ["A.x"],
            "filters": [{"op": "=", "value": 1}]}"#,
    );
    assert!(matches!(
        QueryPlan::try_from_proposal(&missing_field),
        Err(StructuralError::InvalidFilter { index: 0, .. })
    ));

    let nested = proposal(
        r#"{"entities": ["A"], "select": ["A.x"],
            "filters": [{"field": "A.x", "op": "in", "value": [[1]]}]}"#,
    );
    assert!(matches!(
        QueryPlan::try_from_proposal(&nested),
        Err(StructuralError::InvalidFilter { .. })
    ));
}

#[test]
fn test_builder_infers_entities_from_selection() {
    let plan = QueryPlan::builder()
        .select("Person.name")
        .select("Company.name")
        .select("Person.name2")
        .build()
        .unwrap();
    assert_eq!(plan.entities(), ["Person".to_string(), "Company".to_string()]);
    assert_eq!(
        plan.reference_sequence(),
        vec!["Person", "Company", "Person"]
    );
}

#[test]
fn test_operator_spellings() {
    assert_eq!("<>".parse::<FilterOp>(), Ok(FilterOp::Ne));
    assert_eq!("IS   NOT  NULL".parse::<FilterOp>(), Ok(FilterOp::IsNotNull));
    assert_eq!("gte".parse::<FilterOp>(), Ok(FilterOp::Gte));
    assert!("between".parse::<FilterOp>().is_err());
}
