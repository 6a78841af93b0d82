// ABOUTME: Integration tests for plan building and spec construction.
// ABOUTME: Tier subsets, provisioning-output templating, and plan errors.

mod support;

use caravel::config::{ProvisioningOutputs, Tier};
use caravel::orchestrator::{ExecutionPlan, GraphError, PlanError, build_specs};
use std::collections::BTreeMap;
use support::{declaration, unit, unit_decl};

#[test]
fn plan_reports_tier_subsets_in_execution_order() {
    let decl = declaration(vec![
        unit_decl("db", Tier::Infrastructure, 5432, &[]),
        unit_decl("broker", Tier::Platform, 50005, &["db"]),
        unit_decl("api", Tier::Services, 3001, &["broker"]),
        unit_decl("web", Tier::Services, 9001, &["api"]),
    ]);

    let plan = ExecutionPlan::build(&decl).unwrap();
    assert_eq!(plan.units_in_tier(Tier::Infrastructure), &[unit("db")]);
    assert_eq!(plan.units_in_tier(Tier::Platform), &[unit("broker")]);
    assert_eq!(plan.units_in_tier(Tier::Services), &[unit("api"), unit("web")]);
}

#[test]
fn dangling_dependency_fails_plan() {
    let decl = declaration(vec![unit_decl("api", Tier::Services, 3001, &["ghost"])]);

    match ExecutionPlan::build(&decl) {
        Err(PlanError::Graph(GraphError::UnknownDependency { dependency, .. })) => {
            assert_eq!(dependency.as_str(), "ghost");
        }
        other => panic!("expected unknown dependency, got {other:?}"),
    }
}

#[test]
fn provisioning_outputs_are_templated_into_service_env() {
    let mut decl = declaration(vec![
        unit_decl("postgres", Tier::Infrastructure, 5432, &[]),
        unit_decl("orders", Tier::Services, 3001, &["postgres"]),
    ]);
    decl.units
        .iter_mut()
        .find(|u| u.name.as_str() == "orders")
        .unwrap()
        .env
        .insert(
            "DATABASE_URL".to_string(),
            "${output:postgres.connection-string}".to_string(),
        );

    let outputs: ProvisioningOutputs = BTreeMap::from([(
        "postgres".to_string(),
        BTreeMap::from([(
            "connection-string".to_string(),
            "postgres://managed-db:5432/app".to_string(),
        )]),
    )]);

    let specs = build_specs(&decl, &outputs).unwrap();
    assert_eq!(
        specs[&unit("orders")]
            .environment
            .get("DATABASE_URL")
            .map(String::as_str),
        Some("postgres://managed-db:5432/app")
    );
}

#[test]
fn missing_provisioning_output_names_the_reference() {
    let mut decl = declaration(vec![unit_decl("orders", Tier::Services, 3001, &[])]);
    decl.units.head.env.insert(
        "DATABASE_URL".to_string(),
        "${output:postgres.connection-string}".to_string(),
    );

    match build_specs(&decl, &ProvisioningOutputs::default()) {
        Err(PlanError::MissingOutput { unit: u, reference }) => {
            assert_eq!(u.as_str(), "orders");
            assert_eq!(reference, "postgres.connection-string");
        }
        other => panic!("expected missing output, got {other:?}"),
    }
}
