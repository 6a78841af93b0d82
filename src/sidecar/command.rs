// ABOUTME: Deterministic daprd launch command rendering.
// ABOUTME: Flag order is fixed so rendered commands are reproducible.

use super::SidecarConfig;

/// Render the sidecar's argv from its configuration.
///
/// The flag order is fixed: identity, ports, placement, tuning, then
/// conditional profiling and metrics flags. Reproducible output keeps logs
/// and tests stable.
pub fn launch_command(config: &SidecarConfig) -> Vec<String> {
    let mut argv = vec![
        "./daprd".to_string(),
        "--app-id".to_string(),
        config.app_id.to_string(),
        "--app-port".to_string(),
        config.app_port.to_string(),
        "--dapr-http-port".to_string(),
        config.http_port.to_string(),
        "--dapr-grpc-port".to_string(),
        config.grpc_port.to_string(),
        "--placement-host-address".to_string(),
        config.placement_address.clone(),
        "--log-level".to_string(),
        config.log_level.to_string(),
        "--app-max-concurrency".to_string(),
        config.max_concurrency.to_string(),
    ];

    if config.profiling_enabled {
        argv.push("--enable-profiling".to_string());
        argv.push("--profile-port".to_string());
        argv.push(config.profile_port.to_string());
    }

    if config.metrics_enabled {
        argv.push("--enable-metrics".to_string());
        argv.push("--metrics-port".to_string());
        argv.push(config.metrics_port.to_string());
    }

    argv
}
