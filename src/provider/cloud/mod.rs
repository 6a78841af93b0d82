// ABOUTME: Managed-cloud backend speaking the platform's declarative API.
// ABOUTME: Sidecars are a platform capability; provisioning state gates deploys.

mod client;
mod resource;

pub use client::{
    HttpPlatformClient, PLATFORM_TOKEN_VAR, PLATFORM_URL_VAR, PlatformClient, ProvisioningState,
    ResourceStatus,
};
pub use resource::ContainerAppResource;

use crate::config::Environment;
use crate::health::{HealthCheckResult, HealthError, HealthTarget, HealthVerifier};
use crate::provider::error::{NotDeployedSnafu, ProviderError, ProvisioningFailedSnafu};
use crate::provider::{CLOUD_HEALTH_TIMEOUT, Provider};
use crate::types::{ImageRef, UnitName};
use crate::unit::ContainerSpec;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const PROVISION_POLL_INTERVAL: Duration = Duration::from_secs(5);
const PROVISION_TIMEOUT: Duration = Duration::from_secs(180);

/// Deploys units as container-app resources on the managed platform.
pub struct CloudProvider {
    client: Arc<dyn PlatformClient>,
    environment: Environment,
    verifier: HealthVerifier,
    deployed: Mutex<HashMap<UnitName, ContainerSpec>>,
}

impl CloudProvider {
    pub fn new(client: Arc<dyn PlatformClient>, environment: Environment) -> Self {
        Self {
            client,
            environment,
            verifier: HealthVerifier::default(),
            deployed: Mutex::new(HashMap::new()),
        }
    }

    /// Poll the resource until provisioning settles.
    async fn await_provisioned(&self, name: &str) -> Result<(), ProviderError> {
        let started = tokio::time::Instant::now();

        loop {
            let status = self.client.get_app(name).await?;
            let state = match &status {
                Some(status) => status.provisioning_state,
                None => ProvisioningState::InProgress,
            };

            match state {
                ProvisioningState::Succeeded => return Ok(()),
                ProvisioningState::Failed | ProvisioningState::Canceled => {
                    return ProvisioningFailedSnafu {
                        resource: name.to_string(),
                        state: format!("{state:?}"),
                    }
                    .fail();
                }
                ProvisioningState::InProgress => {
                    if started.elapsed() >= PROVISION_TIMEOUT {
                        return ProvisioningFailedSnafu {
                            resource: name.to_string(),
                            state: "InProgress (provisioning timeout)".to_string(),
                        }
                        .fail();
                    }
                    tokio::time::sleep(PROVISION_POLL_INTERVAL).await;
                }
            }
        }
    }
}

#[async_trait]
impl HealthTarget for CloudProvider {
    async fn status(&self, unit: &UnitName) -> Result<String, ProviderError> {
        let status = self.client.get_app(unit.as_str()).await?;
        let Some(status) = status else {
            return NotDeployedSnafu {
                unit: unit.to_string(),
            }
            .fail();
        };

        Ok(match status.provisioning_state {
            ProvisioningState::InProgress => "provisioning".to_string(),
            ProvisioningState::Failed | ProvisioningState::Canceled => "failed".to_string(),
            ProvisioningState::Succeeded => status
                .running_status
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or_else(|| "running".to_string()),
        })
    }

    fn health_endpoint(&self, unit: &UnitName) -> Option<String> {
        let deployed = self.deployed.lock();
        let spec = deployed.get(unit)?;
        let configured = spec.health_endpoint.as_ref()?;

        // The configured endpoint is container-local; probe the platform
        // ingress at the same path instead.
        let path = reqwest::Url::parse(configured)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| "/health".to_string());
        Some(format!(
            "https://{unit}.{}{path}",
            self.environment.platform_domain()
        ))
    }
}

#[async_trait]
impl Provider for CloudProvider {
    fn name(&self) -> &'static str {
        "managed-cloud"
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        // Credential and connectivity check; the platform needs no other
        // preparation.
        self.client.list_apps().await?;
        Ok(())
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), ProviderError> {
        // The platform pulls images itself when the resource is applied.
        tracing::debug!(%image, "image pull is platform-managed");
        Ok(())
    }

    async fn deploy(&self, spec: &ContainerSpec) -> Result<(), ProviderError> {
        let resource = ContainerAppResource::from_spec(spec, self.environment);
        self.client.put_app(&resource).await?;
        self.await_provisioned(&resource.name).await?;

        tracing::info!(unit = %spec.name, "container app provisioned");
        self.deployed.lock().insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn inject_sidecar(&self, spec: &ContainerSpec) -> Result<(), ProviderError> {
        // Sidecar lifecycle is platform-managed; the capability flags were
        // set during resource translation.
        tracing::debug!(unit = %spec.name, "sidecar is platform-managed");
        Ok(())
    }

    async fn stop(&self, unit: &UnitName) -> Result<(), ProviderError> {
        self.client.delete_app(unit.as_str()).await
    }

    async fn is_running(&self, unit: &UnitName) -> Result<bool, ProviderError> {
        match self.client.get_app(unit.as_str()).await? {
            Some(status) => Ok(status.provisioning_state == ProvisioningState::Succeeded),
            None => Ok(false),
        }
    }

    fn endpoint(&self, unit: &UnitName) -> Option<String> {
        if !self.deployed.lock().contains_key(unit) {
            return None;
        }
        Some(format!(
            "https://{unit}.{}",
            self.environment.platform_domain()
        ))
    }

    async fn logs(&self, unit: &UnitName, lines: usize) -> Result<String, ProviderError> {
        self.client.fetch_logs(unit.as_str(), lines).await
    }

    async fn list(&self) -> Result<Vec<String>, ProviderError> {
        self.client.list_apps().await
    }

    async fn cleanup(&self) -> Result<(), ProviderError> {
        let units: Vec<UnitName> = self.deployed.lock().keys().cloned().collect();
        for unit in units {
            self.client.delete_app(unit.as_str()).await?;
        }
        self.deployed.lock().clear();
        Ok(())
    }

    async fn wait_healthy(
        &self,
        unit: &UnitName,
        timeout: Duration,
    ) -> Result<HealthCheckResult, HealthError> {
        self.verifier.wait_until_healthy(self, unit, timeout).await
    }

    fn health_timeout(&self) -> Duration {
        CLOUD_HEALTH_TIMEOUT
    }
}
