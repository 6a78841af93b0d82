// ABOUTME: Fluent builder for container specifications.
// ABOUTME: Validation happens in the terminal build() call, never mid-chain.

use super::{
    CloudExtension, ContainerSpec, DaprSettings, LocalExtension, ProviderExtension,
    ResourceLimits, SpecError, VolumeMount,
};
use crate::types::{AppId, ImageRef, UnitName};
use std::collections::BTreeMap;

/// Builder for [`ContainerSpec`].
///
/// Chaining methods never fail; `build()` validates everything at once and
/// reports the first violated invariant.
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    name: String,
    image: String,
    port: u16,
    command: Option<Vec<String>>,
    environment: BTreeMap<String, String>,
    health_endpoint: Option<String>,
    probe_http: bool,
    resources: ResourceLimits,
    volumes: Vec<VolumeMount>,
    dapr_enabled: bool,
    dapr_app_id: Option<String>,
    dapr_port: Option<u16>,
    dapr_config: BTreeMap<String, serde_json::Value>,
    extension: ProviderExtension,
}

impl SpecBuilder {
    pub(super) fn new(name: &str, image: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            port,
            command: None,
            environment: BTreeMap::new(),
            health_endpoint: None,
            probe_http: true,
            resources: ResourceLimits::default(),
            volumes: Vec::new(),
            dapr_enabled: false,
            dapr_app_id: None,
            dapr_port: None,
            dapr_config: BTreeMap::new(),
            extension: ProviderExtension::None,
        }
    }

    /// Enable sidecar injection under the given app ID.
    pub fn dapr(mut self, app_id: &str) -> Self {
        self.dapr_enabled = true;
        self.dapr_app_id = Some(app_id.to_string());
        self
    }

    /// Override the application port the sidecar fronts (defaults to the
    /// primary port).
    pub fn dapr_port(mut self, port: u16) -> Self {
        self.dapr_port = Some(port);
        self
    }

    /// Add a sidecar configuration entry. Entries set here win over computed
    /// defaults during enrichment.
    pub fn dapr_config(mut self, key: &str, value: serde_json::Value) -> Self {
        self.dapr_config.insert(key.to_string(), value);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs(mut self, vars: BTreeMap<String, String>) -> Self {
        self.environment.extend(vars);
        self
    }

    pub fn resources(mut self, resources: ResourceLimits) -> Self {
        self.resources = resources;
        self
    }

    pub fn command(mut self, argv: Vec<String>) -> Self {
        self.command = Some(argv);
        self
    }

    pub fn volume(mut self, source: &str, target: &str, read_only: bool) -> Self {
        self.volumes.push(VolumeMount {
            source: source.to_string(),
            target: target.to_string(),
            read_only,
        });
        self
    }

    /// Override the derived health endpoint URL.
    pub fn health_endpoint(mut self, url: &str) -> Self {
        self.health_endpoint = Some(url.to_string());
        self
    }

    /// The unit exposes no HTTP health endpoint; only runtime status is
    /// probed.
    pub fn no_health_endpoint(mut self) -> Self {
        self.probe_http = false;
        self.health_endpoint = None;
        self
    }

    /// Attach local-engine specifics. Replaces any cloud extension.
    pub fn local(mut self, extension: LocalExtension) -> Self {
        self.extension = ProviderExtension::Local(extension);
        self
    }

    /// Attach managed-platform specifics. Replaces any local extension.
    pub fn cloud(mut self, extension: CloudExtension) -> Self {
        self.extension = ProviderExtension::Cloud(extension);
        self
    }

    /// Validate and produce the specification.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] naming the first violated invariant: missing or
    /// invalid name, image, or port, or sidecar enabled without a usable
    /// app ID.
    pub fn build(self) -> Result<ContainerSpec, SpecError> {
        let name = UnitName::new(&self.name)?;
        let image = ImageRef::parse(&self.image)?;

        if self.port == 0 {
            return Err(SpecError::MissingPort);
        }

        let dapr = if self.dapr_enabled {
            let raw_app_id = self.dapr_app_id.ok_or(SpecError::DaprWithoutAppId)?;
            if raw_app_id.is_empty() {
                return Err(SpecError::DaprWithoutAppId);
            }
            Some(DaprSettings {
                app_id: AppId::new(&raw_app_id)?,
                app_port: self.dapr_port.unwrap_or(self.port),
                config: self.dapr_config,
            })
        } else {
            None
        };

        let health_endpoint = match (self.probe_http, self.health_endpoint) {
            (false, _) => None,
            (true, Some(url)) => Some(url),
            (true, None) => Some(format!("http://localhost:{}/health", self.port)),
        };

        Ok(ContainerSpec {
            name,
            image,
            port: self.port,
            command: self.command,
            environment: self.environment,
            health_endpoint,
            resources: self.resources,
            volumes: self.volumes,
            dapr,
            extension: self.extension,
        })
    }
}
