// ABOUTME: Typestate deployment run: Planned -> Executed -> Validated.
// ABOUTME: Each transition consumes self; failures name the unit and step.

use super::plan::{ExecutionPlan, PlanError};
use crate::config::Environment;
use crate::health::{HealthCheckResult, HealthError, HealthSummary, HealthVerifier};
use crate::provider::{Provider, ProviderError};
use crate::sidecar::{SidecarError, SidecarManager};
use crate::types::UnitName;
use crate::unit::ContainerSpec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Step of the per-unit deployment sequence, for failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStep {
    Enrich,
    Pull,
    Deploy,
    Sidecar,
    Health,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStep::Enrich => "sidecar enrichment",
            DeployStep::Pull => "image pull",
            DeployStep::Deploy => "deployment",
            DeployStep::Sidecar => "sidecar injection",
            DeployStep::Health => "health verification",
        };
        write!(f, "{name}")
    }
}

/// Underlying cause of a per-unit failure.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Health(#[from] HealthError),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("provider initialization failed: {source}")]
    Init { source: ProviderError },

    /// A unit failed mid-plan. The remaining sequence was aborted; units
    /// deployed before it are left running for operator intervention.
    #[error("unit '{unit}' failed during {step}: {source}")]
    UnitFailed {
        unit: UnitName,
        step: DeployStep,
        source: StepError,
    },

    #[error("post-deployment validation failed in {environment}: {unhealthy} unit(s) unhealthy")]
    ValidationFailed {
        environment: Environment,
        unhealthy: usize,
        issues: Vec<String>,
    },

    #[error("cleanup failed: {source}")]
    Cleanup { source: ProviderError },
}

fn unit_failed(
    unit: &UnitName,
    step: DeployStep,
    source: impl Into<StepError>,
) -> OrchestratorError {
    OrchestratorError::UnitFailed {
        unit: unit.clone(),
        step,
        source: source.into(),
    }
}

/// A deployment run, parameterized by its current state.
///
/// The state type carries state-specific data, so a run cannot be executed
/// before a plan exists or validated before execution finished.
#[derive(Debug)]
pub struct DeploymentRun<S> {
    environment: Environment,
    state: S,
}

/// Plan built, nothing touched yet.
#[derive(Debug)]
pub struct Planned {
    plan: ExecutionPlan,
    specs: BTreeMap<UnitName, ContainerSpec>,
    health_timeout: Option<Duration>,
}

/// Every unit deployed and individually healthy.
#[derive(Debug)]
pub struct Executed {
    deployed: Vec<UnitName>,
}

/// Whole-set health validation finished.
#[derive(Debug)]
pub struct Validated {
    deployed: Vec<UnitName>,
    results: BTreeMap<UnitName, HealthCheckResult>,
    summary: HealthSummary,
}

impl<S> DeploymentRun<S> {
    pub fn environment(&self) -> Environment {
        self.environment
    }
}

impl DeploymentRun<Planned> {
    pub(super) fn new(
        environment: Environment,
        plan: ExecutionPlan,
        specs: BTreeMap<UnitName, ContainerSpec>,
        health_timeout: Option<Duration>,
    ) -> Self {
        Self {
            environment,
            state: Planned {
                plan,
                specs,
                health_timeout,
            },
        }
    }

    pub fn order(&self) -> &[UnitName] {
        self.state.plan.order()
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.state.plan
    }

    pub fn spec(&self, unit: &UnitName) -> Option<&ContainerSpec> {
        self.state.specs.get(unit)
    }

    /// Drive the provider through the plan, one unit at a time.
    ///
    /// Strictly sequential: ordering is a correctness requirement, not a
    /// throughput target. The first failure aborts the remaining sequence.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::UnitFailed`] naming the unit and the step that
    /// failed.
    #[must_use = "deployment run state must be used"]
    pub async fn execute(
        self,
        provider: &dyn Provider,
        sidecars: &SidecarManager,
    ) -> Result<DeploymentRun<Executed>, OrchestratorError> {
        let Planned {
            plan,
            specs,
            health_timeout,
        } = self.state;
        let timeout = health_timeout.unwrap_or_else(|| provider.health_timeout());

        let mut deployed = Vec::with_capacity(plan.len());

        for unit in plan.order() {
            let spec = specs
                .get(unit)
                .expect("plan and specs derive from the same declaration");

            tracing::info!(unit = %unit, image = %spec.image, "deploying unit");

            let spec = sidecars
                .enrich_spec(spec)
                .map_err(|e| unit_failed(unit, DeployStep::Enrich, e))?;

            provider
                .pull_image(&spec.image)
                .await
                .map_err(|e| unit_failed(unit, DeployStep::Pull, e))?;

            provider
                .deploy(&spec)
                .await
                .map_err(|e| unit_failed(unit, DeployStep::Deploy, e))?;

            if spec.dapr_enabled() {
                provider
                    .inject_sidecar(&spec)
                    .await
                    .map_err(|e| unit_failed(unit, DeployStep::Sidecar, e))?;
            }

            match provider.wait_healthy(unit, timeout).await {
                Ok(result) => {
                    tracing::info!(unit = %unit, status = %result.status, "unit healthy");
                }
                Err(e) => {
                    attach_log_diagnostics(provider, unit).await;
                    return Err(unit_failed(unit, DeployStep::Health, e));
                }
            }

            deployed.push(unit.clone());
        }

        Ok(DeploymentRun {
            environment: self.environment,
            state: Executed { deployed },
        })
    }
}

/// Best-effort: surface the failed unit's recent output next to the error.
async fn attach_log_diagnostics(provider: &dyn Provider, unit: &UnitName) {
    match provider.logs(unit, 40).await {
        Ok(logs) if !logs.trim().is_empty() => {
            tracing::warn!(unit = %unit, "last output from failed unit:\n{logs}");
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(unit = %unit, error = %e, "could not fetch logs"),
    }
}

impl DeploymentRun<Executed> {
    pub fn deployed(&self) -> &[UnitName] {
        &self.state.deployed
    }

    /// Concurrently check every deployed unit and summarize.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::ValidationFailed`] when units are unhealthy and
    /// the environment treats that as fatal. In development the failures are
    /// logged and the run continues.
    #[must_use = "deployment run state must be used"]
    pub async fn validate(
        self,
        provider: &dyn Provider,
        verifier: &HealthVerifier,
    ) -> Result<DeploymentRun<Validated>, OrchestratorError> {
        let Executed { deployed } = self.state;

        let results = verifier.check_many(provider, &deployed).await;
        let summary = HealthVerifier::summarize(&results);

        if !summary.all_healthy() {
            for issue in &summary.issues {
                tracing::warn!(%issue, "unit unhealthy after deployment");
            }
            if self.environment.health_validation_is_fatal() {
                return Err(OrchestratorError::ValidationFailed {
                    environment: self.environment,
                    unhealthy: summary.unhealthy,
                    issues: summary.issues,
                });
            }
        }

        Ok(DeploymentRun {
            environment: self.environment,
            state: Validated {
                deployed,
                results,
                summary,
            },
        })
    }
}

impl DeploymentRun<Validated> {
    pub fn summary(&self) -> &HealthSummary {
        &self.state.summary
    }

    /// Consume the run and produce the final readiness report.
    pub fn report(self, provider: &dyn Provider) -> DeploymentReport {
        let Validated {
            deployed,
            results,
            summary,
        } = self.state;

        let units = deployed
            .iter()
            .map(|unit| {
                let result = results.get(unit);
                UnitReport {
                    unit: unit.clone(),
                    endpoint: provider.endpoint(unit),
                    healthy: result.map(|r| r.healthy).unwrap_or(false),
                    status: result.map(|r| r.status.clone()).unwrap_or_default(),
                }
            })
            .collect();

        DeploymentReport {
            environment: self.environment,
            provider: provider.name().to_string(),
            units,
            healthy: summary.healthy,
            unhealthy: summary.unhealthy,
        }
    }
}

/// Final readiness report for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub environment: Environment,
    pub provider: String,
    pub units: Vec<UnitReport>,
    pub healthy: usize,
    pub unhealthy: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: UnitName,
    pub endpoint: Option<String>,
    pub healthy: bool,
    pub status: String,
}
