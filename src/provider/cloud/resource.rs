// ABOUTME: Declarative container-app resource model for the managed platform.
// ABOUTME: Translates a ContainerSpec into the platform's deployment unit.

use crate::config::Environment;
use crate::unit::{CloudExtension, ContainerSpec, ProviderExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One managed-platform deployment unit, submitted as a declarative
/// resource. The platform owns reconciliation; success is the resource
/// reaching a provisioned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAppResource {
    pub name: String,
    pub environment: String,
    pub image: String,
    pub resources: ContainerResources,
    pub ingress: IngressSpec,
    pub scale: ScaleSpec,
    pub dapr: DaprCapability,
    pub env: Vec<EnvVar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// CPU cores and memory as structured platform quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerResources {
    pub cpu: f64,
    pub memory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    pub external: bool,
    pub target_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleSpec {
    pub min_replicas: u32,
    pub max_replicas: u32,
    #[serde(default)]
    pub rules: BTreeMap<String, serde_json::Value>,
}

/// Sidecar expressed as a first-class platform capability. The platform
/// manages the sidecar lifecycle itself; these flags are all it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaprCapability {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_port: Option<u16>,
    pub app_protocol: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl ContainerAppResource {
    pub fn from_spec(spec: &ContainerSpec, environment: Environment) -> Self {
        let extension = match &spec.extension {
            ProviderExtension::Cloud(ext) => ext.clone(),
            _ => CloudExtension::default(),
        };

        let dapr = match &spec.dapr {
            Some(settings) => DaprCapability {
                enabled: true,
                app_id: Some(settings.app_id.to_string()),
                app_port: Some(settings.app_port),
                app_protocol: "http".to_string(),
                log_level: settings
                    .config
                    .get("logLevel")
                    .and_then(|v| v.as_str())
                    .unwrap_or("info")
                    .to_string(),
            },
            None => DaprCapability {
                enabled: false,
                app_id: None,
                app_port: None,
                app_protocol: "http".to_string(),
                log_level: "info".to_string(),
            },
        };

        ContainerAppResource {
            name: spec.name.to_string(),
            environment: environment.to_string(),
            image: spec.image.to_string(),
            resources: ContainerResources {
                cpu: cpu_cores(&spec.resources.cpu_limit),
                memory: spec.resources.memory_limit.clone(),
            },
            ingress: IngressSpec {
                external: extension.external_ingress,
                target_port: spec.port,
            },
            scale: ScaleSpec {
                min_replicas: extension.min_replicas,
                max_replicas: extension.max_replicas,
                rules: extension.scale_rules,
            },
            dapr,
            env: spec
                .environment
                .iter()
                .map(|(name, value)| EnvVar {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            command: spec.command.clone(),
        }
    }
}

/// Parse a CPU quantity string into fractional cores. Unparseable input
/// falls back to a quarter core rather than failing the whole translation.
fn cpu_cores(quantity: &str) -> f64 {
    if let Some(millis) = quantity.strip_suffix('m') {
        millis.parse::<f64>().map(|m| m / 1000.0).unwrap_or(0.25)
    } else {
        quantity.parse().unwrap_or(0.25)
    }
}
