// ABOUTME: Polymorphic container provider boundary.
// ABOUTME: One trait, two backends: local engine and managed cloud platform.

mod error;
pub mod cloud;
pub mod local;

pub use cloud::{CloudProvider, HttpPlatformClient, PlatformClient};
pub use error::{ProviderError, ProviderErrorKind};
pub use local::LocalEngineProvider;

use crate::config::Environment;
use crate::health::{HealthCheckResult, HealthError, HealthTarget};
use crate::types::{ImageRef, UnitName};
use crate::unit::ContainerSpec;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default readiness budget for the local engine.
pub const LOCAL_HEALTH_TIMEOUT: Duration = Duration::from_secs(60);
/// Default readiness budget for the managed platform, reflecting realistic
/// cold-start differences.
pub const CLOUD_HEALTH_TIMEOUT: Duration = Duration::from_secs(180);

/// The execution boundary the orchestrator drives.
///
/// Both backends are substitutable behind this trait; only provider
/// selection is backend-aware. Runtime status and health endpoints come from
/// the [`HealthTarget`] supertrait so the health verifier can probe any
/// provider without knowing which one it is.
#[async_trait]
pub trait Provider: HealthTarget {
    /// Short backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Prepare backend prerequisites (networks, connectivity). Idempotent.
    async fn initialize(&self) -> Result<(), ProviderError>;

    async fn pull_image(&self, image: &ImageRef) -> Result<(), ProviderError>;

    /// Deploy a unit. Redeploying the same name replaces any previous
    /// instance.
    async fn deploy(&self, spec: &ContainerSpec) -> Result<(), ProviderError>;

    /// Launch or enable the unit's sidecar. The local engine starts a second
    /// co-located process; the managed platform handles sidecar lifecycle
    /// itself, so its implementation only confirms the capability flags.
    async fn inject_sidecar(&self, spec: &ContainerSpec) -> Result<(), ProviderError>;

    async fn stop(&self, unit: &UnitName) -> Result<(), ProviderError>;

    async fn is_running(&self, unit: &UnitName) -> Result<bool, ProviderError>;

    /// Public endpoint of a deployed unit, if known to this provider.
    fn endpoint(&self, unit: &UnitName) -> Option<String>;

    async fn logs(&self, unit: &UnitName, lines: usize) -> Result<String, ProviderError>;

    /// Names of units this provider currently manages. Best-effort
    /// discovery: malformed records are skipped with a logged note.
    async fn list(&self) -> Result<Vec<String>, ProviderError>;

    /// Tear down everything this provider deployed.
    async fn cleanup(&self) -> Result<(), ProviderError>;

    /// Block until the unit is healthy, delegating to the health verifier
    /// with this provider as the status/endpoint source.
    async fn wait_healthy(
        &self,
        unit: &UnitName,
        timeout: Duration,
    ) -> Result<HealthCheckResult, HealthError>;

    /// Default per-unit readiness budget for this backend.
    fn health_timeout(&self) -> Duration;
}

/// Select the backend for an environment. Called once at startup; everything
/// downstream sees only `dyn Provider`.
///
/// # Errors
///
/// Returns [`ProviderError::MissingCredential`] when the managed platform's
/// credentials are absent from the process environment.
pub fn select(
    environment: Environment,
    engine_binary: &str,
) -> Result<Arc<dyn Provider>, ProviderError> {
    match environment {
        Environment::Development => Ok(Arc::new(LocalEngineProvider::new(
            engine_binary,
            environment,
        ))),
        Environment::Staging | Environment::Production => {
            let client = HttpPlatformClient::from_env(environment)?;
            Ok(Arc::new(CloudProvider::new(Arc::new(client), environment)))
        }
    }
}
