// ABOUTME: Integration tests for sidecar configuration and enrichment.
// ABOUTME: Port determinism, eligibility rules, and config merge semantics.

use caravel::config::Environment;
use caravel::sidecar::{SidecarError, SidecarManager, launch_command, sidecar_http_port};
use caravel::types::{AppId, AppIdError};
use caravel::unit::ContainerSpec;
use proptest::prelude::*;

#[test]
fn gateway_range_ports() {
    // App port 9001 in development: sidecar HTTP 50001, gRPC 60001.
    let manager = SidecarManager::new(Environment::Development);
    let config = manager.build_default_config(&AppId::new("gateway").unwrap(), 9001);

    assert_eq!(config.http_port, 50001);
    assert_eq!(config.grpc_port, 60001);
}

proptest! {
    #[test]
    fn http_port_is_deterministic(app_port in 1u16..=u16::MAX) {
        prop_assert_eq!(sidecar_http_port(app_port), sidecar_http_port(app_port));
    }

    #[test]
    fn grpc_port_is_http_plus_ten_thousand(app_port in 1u16..=u16::MAX) {
        for environment in [
            Environment::Development,
            Environment::Staging,
            Environment::Production,
        ] {
            let manager = SidecarManager::new(environment);
            let config = manager.build_default_config(&AppId::new("app").unwrap(), app_port);
            prop_assert_eq!(config.grpc_port, config.http_port + 10000);
        }
    }

    #[test]
    fn derived_ports_stay_in_range(app_port in 1u16..=u16::MAX) {
        let manager = SidecarManager::new(Environment::Development);
        let config = manager.build_default_config(&AppId::new("app").unwrap(), app_port);
        prop_assert!(config.http_port >= 50000);
        prop_assert!(config.profile_port < u16::MAX);
    }
}

#[test]
fn app_id_naming_rule() {
    assert!(AppId::new("order-processor").is_ok());
    assert!(matches!(
        AppId::new("order_processor"),
        Err(AppIdError::InvalidChar { ch: '_', .. })
    ));
    assert!(matches!(
        AppId::new("orders.v2"),
        Err(AppIdError::InvalidChar { ch: '.', .. })
    ));
    assert!(matches!(AppId::new("-orders"), Err(AppIdError::StartsWithHyphen)));
    assert!(matches!(AppId::new("orders-"), Err(AppIdError::EndsWithHyphen)));
    assert!(AppId::new(&"x".repeat(60)).is_ok());
    assert!(matches!(AppId::new(&"x".repeat(61)), Err(AppIdError::TooLong)));
}

#[test]
fn eligibility_requires_sidecar_enabled() {
    let manager = SidecarManager::new(Environment::Development);
    let plain = ContainerSpec::builder("redis", "redis:7-alpine", 6379)
        .no_health_endpoint()
        .build()
        .unwrap();

    match manager.validate_eligibility(&plain) {
        Err(SidecarError::IneligibleTarget { unit, .. }) => assert_eq!(unit.as_str(), "redis"),
        other => panic!("expected ineligible target, got {other:?}"),
    }

    let enabled = ContainerSpec::builder("orders", "ghcr.io/acme/orders:v1", 3001)
        .dapr("orders")
        .build()
        .unwrap();
    assert!(manager.validate_eligibility(&enabled).is_ok());
}

#[test]
fn enrichment_is_a_noop_without_sidecar() {
    let manager = SidecarManager::new(Environment::Development);
    let spec = ContainerSpec::builder("redis", "redis:7-alpine", 6379)
        .no_health_endpoint()
        .build()
        .unwrap();

    let enriched = manager.enrich_spec(&spec).unwrap();
    assert!(enriched.environment.is_empty());
    assert!(enriched.dapr.is_none());
}

#[test]
fn enrichment_injects_discovery_environment() {
    let manager = SidecarManager::new(Environment::Development);
    let spec = ContainerSpec::builder("gateway", "ghcr.io/acme/gateway:v1", 9001)
        .dapr("gateway")
        .build()
        .unwrap();

    let enriched = manager.enrich_spec(&spec).unwrap();

    assert_eq!(
        enriched.environment.get("DAPR_HTTP_PORT").map(String::as_str),
        Some("50001")
    );
    assert_eq!(
        enriched.environment.get("DAPR_GRPC_PORT").map(String::as_str),
        Some("60001")
    );

    let config = &enriched.dapr.as_ref().unwrap().config;
    assert_eq!(config["httpPort"], serde_json::json!(50001));
    assert_eq!(config["logLevel"], serde_json::json!("debug"));

    // The input spec is untouched.
    assert!(spec.environment.is_empty());
    assert!(spec.dapr.as_ref().unwrap().config.is_empty());
}

#[test]
fn enrichment_preserves_caller_overrides() {
    let manager = SidecarManager::new(Environment::Staging);
    let spec = ContainerSpec::builder("orders", "ghcr.io/acme/orders:v1", 3001)
        .dapr("orders")
        .dapr_config("httpPort", serde_json::json!(51000))
        .dapr_config("logLevel", serde_json::json!("error"))
        .build()
        .unwrap();

    let enriched = manager.enrich_spec(&spec).unwrap();
    let config = &enriched.dapr.as_ref().unwrap().config;

    assert_eq!(config["httpPort"], serde_json::json!(51000));
    assert_eq!(config["logLevel"], serde_json::json!("error"));
    // Non-overridden keys still get computed defaults.
    assert_eq!(config["grpcPort"], serde_json::json!(60011));
    // The discovery environment follows the override.
    assert_eq!(
        enriched.environment.get("DAPR_HTTP_PORT").map(String::as_str),
        Some("51000")
    );
}

#[test]
fn launch_command_is_reproducible_per_environment() {
    let app_id = AppId::new("inventory").unwrap();

    for environment in [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ] {
        let manager = SidecarManager::new(environment);
        let config = manager.build_default_config(&app_id, 3101);
        let first = launch_command(&config);
        let second = launch_command(&manager.build_default_config(&app_id, 3101));
        assert_eq!(first, second);
        assert_eq!(first[0], "./daprd");
    }
}
