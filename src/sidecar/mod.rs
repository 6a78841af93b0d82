// ABOUTME: Sidecar configuration, eligibility validation, and spec enrichment.
// ABOUTME: All values derive deterministically from (app ID, app port, environment).

mod command;

pub use command::launch_command;

use crate::config::Environment;
use crate::types::{AppId, AppIdError, UnitName};
use crate::unit::{ContainerSpec, ResourceLimits};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("unit '{unit}' is not eligible for sidecar injection: {reason}")]
    IneligibleTarget { unit: UnitName, reason: String },

    #[error(transparent)]
    InvalidAppId(#[from] AppIdError),
}

/// Fully computed configuration for one injected sidecar.
///
/// Recomputed on demand from `(app_id, app_port, environment)`; never cached
/// across environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    pub app_id: AppId,
    pub app_port: u16,
    pub http_port: u16,
    pub grpc_port: u16,
    pub metrics_port: u16,
    pub profile_port: u16,
    pub placement_address: String,
    pub log_level: &'static str,
    pub profiling_enabled: bool,
    pub metrics_enabled: bool,
    /// Maximum concurrent requests the sidecar admits; -1 means unlimited.
    pub max_concurrency: i32,
    pub resources: ResourceLimits,
}

/// Sidecar HTTP port as a pure function of the application port.
///
/// Application ports are partitioned into named ranges, each mapping onto a
/// dense block of sidecar ports, so sidecar ports stay predictable without a
/// central registry.
pub fn sidecar_http_port(app_port: u16) -> u16 {
    match app_port {
        9000..=9999 => 50000 + app_port % 10,
        3100..=3199 => 50020 + app_port % 10,
        3200..=3299 => 50030 + app_port % 10,
        3000..=3099 => 50010 + app_port % 10,
        _ => 50100 + app_port % 100,
    }
}

/// Computes sidecar configuration and enriches specifications for one
/// environment.
#[derive(Debug, Clone, Copy)]
pub struct SidecarManager {
    environment: Environment,
}

impl SidecarManager {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    /// Compute the default sidecar configuration for an application.
    pub fn build_default_config(&self, app_id: &AppId, app_port: u16) -> SidecarConfig {
        let http_port = sidecar_http_port(app_port);

        let placement_address = match self.environment {
            Environment::Development => "localhost:50005".to_string(),
            env => format!("dapr-placement.{}:50005", env.platform_domain()),
        };

        let (log_level, max_concurrency, resources) = match self.environment {
            Environment::Development => (
                "debug",
                -1,
                ResourceLimits {
                    cpu_request: "100m".to_string(),
                    cpu_limit: "200m".to_string(),
                    memory_request: "128Mi".to_string(),
                    memory_limit: "256Mi".to_string(),
                },
            ),
            Environment::Staging => (
                "info",
                100,
                ResourceLimits {
                    cpu_request: "250m".to_string(),
                    cpu_limit: "500m".to_string(),
                    memory_request: "256Mi".to_string(),
                    memory_limit: "512Mi".to_string(),
                },
            ),
            Environment::Production => (
                "warn",
                500,
                ResourceLimits {
                    cpu_request: "500m".to_string(),
                    cpu_limit: "1000m".to_string(),
                    memory_request: "512Mi".to_string(),
                    memory_limit: "1Gi".to_string(),
                },
            ),
        };

        SidecarConfig {
            app_id: app_id.clone(),
            app_port,
            http_port,
            grpc_port: http_port + 10000,
            metrics_port: http_port + 5000,
            profile_port: http_port + 6000,
            placement_address,
            log_level,
            profiling_enabled: self.environment.is_development(),
            metrics_enabled: !self.environment.is_development(),
            max_concurrency,
            resources,
        }
    }

    /// Check that a specification can carry a sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`SidecarError::IneligibleTarget`] when the sidecar is not
    /// enabled or the application port is unusable. App-ID naming violations
    /// surface as [`SidecarError::InvalidAppId`] when the ID is constructed.
    pub fn validate_eligibility(&self, spec: &ContainerSpec) -> Result<(), SidecarError> {
        let Some(dapr) = &spec.dapr else {
            return Err(SidecarError::IneligibleTarget {
                unit: spec.name.clone(),
                reason: "sidecar is not enabled for this unit".to_string(),
            });
        };

        if dapr.app_port == 0 {
            return Err(SidecarError::IneligibleTarget {
                unit: spec.name.clone(),
                reason: "application port must be greater than zero".to_string(),
            });
        }

        // Re-apply the naming rule so specs deserialized from outside the
        // builder path get the same guarantee.
        AppId::new(dapr.app_id.as_str())?;

        Ok(())
    }

    /// Merge the computed sidecar configuration into a specification.
    ///
    /// No-op for units without a sidecar. Caller-supplied configuration
    /// entries are preserved; `DAPR_HTTP_PORT`/`DAPR_GRPC_PORT` are injected
    /// into the container environment so application code can discover its
    /// sidecar. Returns a fresh specification; the input is never mutated.
    ///
    /// # Errors
    ///
    /// Returns [`SidecarError`] when the spec is not an eligible target.
    pub fn enrich_spec(&self, spec: &ContainerSpec) -> Result<ContainerSpec, SidecarError> {
        if !spec.dapr_enabled() {
            return Ok(spec.clone());
        }

        self.validate_eligibility(spec)?;

        let mut enriched = spec.clone();
        let dapr = enriched.dapr.as_mut().expect("eligibility checked above");
        let computed = self.build_default_config(&dapr.app_id, dapr.app_port);

        let defaults = [
            ("httpPort", json!(computed.http_port)),
            ("grpcPort", json!(computed.grpc_port)),
            ("metricsPort", json!(computed.metrics_port)),
            ("placementAddress", json!(computed.placement_address)),
            ("logLevel", json!(computed.log_level)),
            ("maxConcurrency", json!(computed.max_concurrency)),
            ("profilingEnabled", json!(computed.profiling_enabled)),
            ("cpuRequest", json!(computed.resources.cpu_request)),
            ("cpuLimit", json!(computed.resources.cpu_limit)),
            ("memoryRequest", json!(computed.resources.memory_request)),
            ("memoryLimit", json!(computed.resources.memory_limit)),
        ];
        for (key, value) in defaults {
            dapr.config.entry(key.to_string()).or_insert(value);
        }

        // Effective ports may differ from computed ones when the caller
        // overrode them; the injected environment must match what the
        // sidecar will actually bind.
        let http_port = dapr.config["httpPort"]
            .as_u64()
            .unwrap_or(u64::from(computed.http_port));
        let grpc_port = dapr.config["grpcPort"]
            .as_u64()
            .unwrap_or(u64::from(computed.grpc_port));

        enriched
            .environment
            .insert("DAPR_HTTP_PORT".to_string(), http_port.to_string());
        enriched
            .environment
            .insert("DAPR_GRPC_PORT".to_string(), grpc_port.to_string());

        Ok(enriched)
    }
}
