// ABOUTME: Container specification value object for one deployable unit.
// ABOUTME: Immutable after build; clones share no mutable sub-structures.

mod builder;

pub use builder::SpecBuilder;

use crate::types::{AppId, AppIdError, ImageRef, ParseImageRefError, UnitName, UnitNameError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from validating a container specification.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("unit name is missing or invalid: {0}")]
    Name(#[from] UnitNameError),

    #[error("image reference is missing or invalid: {0}")]
    Image(#[from] ParseImageRefError),

    #[error("primary port must be greater than zero")]
    MissingPort,

    #[error("sidecar enabled without an app ID")]
    DaprWithoutAppId,

    #[error("invalid sidecar app ID: {0}")]
    DaprAppId(#[from] AppIdError),
}

/// Specification of one deployable container.
///
/// Constructed once per unit at plan-build time via [`SpecBuilder`] and never
/// mutated afterwards. Every per-call modification (sidecar enrichment,
/// provisioning-output injection) produces a fresh value; all collections are
/// owned, so a `clone()` shares no mutable state with the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: UnitName,
    pub image: ImageRef,
    pub port: u16,
    pub command: Option<Vec<String>>,
    pub environment: BTreeMap<String, String>,
    pub health_endpoint: Option<String>,
    pub resources: ResourceLimits,
    pub volumes: Vec<VolumeMount>,
    pub dapr: Option<DaprSettings>,
    pub extension: ProviderExtension,
}

impl ContainerSpec {
    /// Start building a specification with environment-appropriate defaults.
    pub fn builder(name: &str, image: &str, port: u16) -> SpecBuilder {
        SpecBuilder::new(name, image, port)
    }

    pub fn dapr_enabled(&self) -> bool {
        self.dapr.is_some()
    }
}

/// Sidecar settings attached to a service unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaprSettings {
    pub app_id: AppId,
    /// Application port the sidecar fronts.
    pub app_port: u16,
    /// Sidecar configuration map. Caller-supplied entries win over computed
    /// defaults during enrichment.
    pub config: BTreeMap<String, serde_json::Value>,
}

/// CPU and memory sizing, as request/limit quantity strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_request: "250m".to_string(),
            cpu_limit: "500m".to_string(),
            memory_request: "256Mi".to_string(),
            memory_limit: "512Mi".to_string(),
        }
    }
}

/// Volume mount configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Source path or volume name on the host.
    pub source: String,
    /// Target path in the container.
    pub target: String,
    /// Read-only flag.
    pub read_only: bool,
}

/// Provider-specific extension of a specification.
///
/// A sum type rather than two optional fields: the local and cloud variants
/// can never both be populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderExtension {
    #[default]
    None,
    Local(LocalExtension),
    Cloud(CloudExtension),
}

/// Local-engine specifics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalExtension {
    /// Bridge network override. Defaults to the provider's deployment network.
    #[serde(default)]
    pub network: Option<String>,

    #[serde(default)]
    pub restart_policy: RestartPolicy,

    /// Extra arguments appended verbatim to the engine `run` invocation.
    #[serde(default)]
    pub extra_run_args: Vec<String>,
}

/// Restart policy for locally deployed containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    Always,
    #[default]
    UnlessStopped,
}

impl RestartPolicy {
    pub fn as_engine_flag(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
        }
    }
}

/// Managed-platform specifics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudExtension {
    /// Expose the unit's ingress outside the platform environment.
    #[serde(default)]
    pub external_ingress: bool,

    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,

    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,

    /// Scaling rules, passed through to the platform as-is.
    #[serde(default)]
    pub scale_rules: BTreeMap<String, serde_json::Value>,
}

impl Default for CloudExtension {
    fn default() -> Self {
        Self {
            external_ingress: false,
            min_replicas: default_min_replicas(),
            max_replicas: default_max_replicas(),
            scale_rules: BTreeMap::new(),
        }
    }
}

fn default_min_replicas() -> u32 {
    1
}

fn default_max_replicas() -> u32 {
    3
}
