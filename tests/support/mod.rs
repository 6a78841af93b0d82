// ABOUTME: Test support utilities.
// ABOUTME: Fake provider and fake health target driven by scripted statuses.

use async_trait::async_trait;
use caravel::config::{DeploymentDeclaration, Tier, UnitDeclaration};
use caravel::health::{HealthCheckResult, HealthError, HealthTarget, HealthVerifier};
use caravel::provider::{Provider, ProviderError};
use caravel::types::{AppId, ImageRef, UnitName};
use caravel::unit::ContainerSpec;
use nonempty::NonEmpty;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

// Each test binary only uses some of these helpers, so allow dead_code.

/// In-memory provider with scripted statuses and a call log.
#[allow(dead_code)]
pub struct FakeProvider {
    calls: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, String>>,
    deploy_failures: Mutex<HashSet<String>>,
    verifier: HealthVerifier,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            deploy_failures: Mutex::new(HashSet::new()),
            verifier: HealthVerifier::new(Duration::from_millis(10), Duration::from_secs(1)),
        }
    }

    /// Script the status reported for a unit (deployed units default to
    /// "running").
    pub fn set_status(&self, unit: &str, status: &str) {
        self.statuses
            .lock()
            .insert(unit.to_string(), status.to_string());
    }

    /// Make deployment of the given unit fail.
    pub fn fail_deploy(&self, unit: &str) {
        self.deploy_failures.lock().insert(unit.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl HealthTarget for FakeProvider {
    async fn status(&self, unit: &UnitName) -> Result<String, ProviderError> {
        match self.statuses.lock().get(unit.as_str()) {
            Some(status) => Ok(status.clone()),
            None => Err(ProviderError::NotDeployed {
                unit: unit.to_string(),
            }),
        }
    }

    fn health_endpoint(&self, _unit: &UnitName) -> Option<String> {
        None
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        self.record("initialize".to_string());
        Ok(())
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), ProviderError> {
        self.record(format!("pull:{image}"));
        Ok(())
    }

    async fn deploy(&self, spec: &ContainerSpec) -> Result<(), ProviderError> {
        self.record(format!("deploy:{}", spec.name));

        if self.deploy_failures.lock().contains(spec.name.as_str()) {
            return Err(ProviderError::CommandFailed {
                binary: "fake".to_string(),
                subcommand: "run".to_string(),
                code: 125,
                stderr: "scripted deploy failure".to_string(),
            });
        }

        self.statuses
            .lock()
            .entry(spec.name.to_string())
            .or_insert_with(|| "running".to_string());
        Ok(())
    }

    async fn inject_sidecar(&self, spec: &ContainerSpec) -> Result<(), ProviderError> {
        self.record(format!("sidecar:{}", spec.name));
        Ok(())
    }

    async fn stop(&self, unit: &UnitName) -> Result<(), ProviderError> {
        self.record(format!("stop:{unit}"));
        self.statuses
            .lock()
            .insert(unit.to_string(), "exited".to_string());
        Ok(())
    }

    async fn is_running(&self, unit: &UnitName) -> Result<bool, ProviderError> {
        Ok(self
            .statuses
            .lock()
            .get(unit.as_str())
            .is_some_and(|s| s == "running"))
    }

    fn endpoint(&self, unit: &UnitName) -> Option<String> {
        self.statuses
            .lock()
            .contains_key(unit.as_str())
            .then(|| format!("http://localhost/{unit}"))
    }

    async fn logs(&self, unit: &UnitName, _lines: usize) -> Result<String, ProviderError> {
        Ok(format!("log output for {unit}\n"))
    }

    async fn list(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.statuses.lock().keys().cloned().collect())
    }

    async fn cleanup(&self) -> Result<(), ProviderError> {
        self.record("cleanup".to_string());
        self.statuses.lock().clear();
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
        Duration::from_millis(200)
    }
}

/// Health target with per-unit status scripts: each probe consumes the next
/// status, the last one repeats.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeChecker {
    scripts: Mutex<HashMap<String, VecDeque<String>>>,
    endpoints: HashMap<String, String>,
    error_units: HashSet<String>,
    polls: Mutex<usize>,
}

#[allow(dead_code)]
impl FakeChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the given statuses in order; the last repeats forever.
    pub fn script(self, unit: &str, statuses: &[&str]) -> Self {
        self.scripts.lock().insert(
            unit.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Status probes for this unit always error.
    pub fn erroring(mut self, unit: &str) -> Self {
        self.error_units.insert(unit.to_string());
        self
    }

    pub fn with_endpoint(mut self, unit: &str, endpoint: &str) -> Self {
        self.endpoints.insert(unit.to_string(), endpoint.to_string());
        self
    }

    pub fn poll_count(&self) -> usize {
        *self.polls.lock()
    }
}

#[async_trait]
impl HealthTarget for FakeChecker {
    async fn status(&self, unit: &UnitName) -> Result<String, ProviderError> {
        *self.polls.lock() += 1;

        if self.error_units.contains(unit.as_str()) {
            return Err(ProviderError::NotDeployed {
                unit: unit.to_string(),
            });
        }

        let mut scripts = self.scripts.lock();
        let script = scripts.get_mut(unit.as_str());
        match script {
            Some(statuses) => {
                let status = if statuses.len() > 1 {
                    statuses.pop_front().unwrap_or_default()
                } else {
                    statuses.front().cloned().unwrap_or_default()
                };
                Ok(status)
            }
            None => Ok("running".to_string()),
        }
    }

    fn health_endpoint(&self, unit: &UnitName) -> Option<String> {
        self.endpoints.get(unit.as_str()).cloned()
    }
}

/// Shorthand verifier with test-friendly timing.
#[allow(dead_code)]
pub fn fast_verifier() -> HealthVerifier {
    HealthVerifier::new(Duration::from_millis(10), Duration::from_secs(1))
}

#[allow(dead_code)]
pub fn unit(name: &str) -> UnitName {
    UnitName::new(name).unwrap()
}

/// Minimal service-tier unit declaration for orchestrator tests.
#[allow(dead_code)]
pub fn unit_decl(name: &str, tier: Tier, port: u16, deps: &[&str]) -> UnitDeclaration {
    UnitDeclaration {
        name: unit(name),
        tier,
        image: ImageRef::parse(&format!("ghcr.io/test/{name}:latest")).unwrap(),
        port,
        env: BTreeMap::new(),
        command: None,
        health_endpoint: None,
        status_only: true,
        dapr_app_id: None,
        depends_on: deps.iter().map(|d| unit(d)).collect(),
    }
}

/// Same, but sidecar-enabled.
#[allow(dead_code)]
pub fn dapr_unit_decl(name: &str, tier: Tier, port: u16, deps: &[&str]) -> UnitDeclaration {
    UnitDeclaration {
        dapr_app_id: Some(AppId::new(name).unwrap()),
        ..unit_decl(name, tier, port, deps)
    }
}

#[allow(dead_code)]
pub fn declaration(units: Vec<UnitDeclaration>) -> DeploymentDeclaration {
    DeploymentDeclaration {
        units: NonEmpty::from_vec(units).expect("test declarations are non-empty"),
        health_timeout: None,
    }
}
