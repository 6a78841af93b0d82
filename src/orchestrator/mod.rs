// ABOUTME: Runtime orchestrator driving providers through dependency-ordered plans.
// ABOUTME: Plan building, sequential execution, and post-deployment validation.

mod graph;
mod plan;
mod run;

pub use graph::{DependencyGraph, GraphError};
pub use plan::{ExecutionPlan, PlanError, build_specs};
pub use run::{
    DeployStep, DeploymentReport, DeploymentRun, Executed, OrchestratorError, Planned, StepError,
    UnitReport, Validated,
};

use crate::config::{DeploymentDeclaration, Environment, ProvisioningOutputs};
use crate::health::{HealthCheckResult, HealthSummary, HealthVerifier};
use crate::provider::Provider;
use crate::sidecar::SidecarManager;
use crate::types::UnitName;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Owns one deployment run at a time: builds the plan, drives the selected
/// provider through it in dependency order, and gates progress on health.
///
/// Everything is constructor-injected; there is no process-wide state. The
/// orchestrator sees only the [`Provider`] trait, never a concrete backend.
pub struct Orchestrator {
    environment: Environment,
    declaration: DeploymentDeclaration,
    outputs: ProvisioningOutputs,
    provider: Arc<dyn Provider>,
    sidecars: SidecarManager,
    verifier: HealthVerifier,
}

impl Orchestrator {
    pub fn new(
        environment: Environment,
        declaration: DeploymentDeclaration,
        outputs: ProvisioningOutputs,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            environment,
            declaration,
            outputs,
            provider,
            sidecars: SidecarManager::new(environment),
            verifier: HealthVerifier::default(),
        }
    }

    /// Build the execution plan and per-unit specifications. No side
    /// effects: cycle detection and spec validation both happen here, before
    /// any container is touched.
    ///
    /// # Errors
    ///
    /// [`PlanError`] for cyclic declarations, invalid specifications, or
    /// dangling provisioning-output references.
    pub fn plan(&self) -> Result<DeploymentRun<Planned>, PlanError> {
        let plan = ExecutionPlan::build(&self.declaration)?;
        let specs = build_specs(&self.declaration, &self.outputs)?;

        tracing::debug!(
            environment = %self.environment,
            units = plan.len(),
            "execution plan built"
        );

        Ok(DeploymentRun::new(
            self.environment,
            plan,
            specs,
            self.declaration.health_timeout,
        ))
    }

    /// Run a full deployment: plan, execute in order, validate, report.
    ///
    /// # Errors
    ///
    /// Fails before any side effect on plan errors; mid-plan failures abort
    /// the remaining sequence and name the unit and step. Post-deployment
    /// validation failures are fatal outside development.
    pub async fn deploy(&self) -> Result<DeploymentReport, OrchestratorError> {
        let planned = self.plan()?;

        self.provider
            .initialize()
            .await
            .map_err(|source| OrchestratorError::Init { source })?;

        let executed = planned
            .execute(self.provider.as_ref(), &self.sidecars)
            .await?;
        let validated = executed
            .validate(self.provider.as_ref(), &self.verifier)
            .await?;

        Ok(validated.report(self.provider.as_ref()))
    }

    /// Concurrent health check of every declared unit, without deploying.
    pub async fn status(&self) -> (BTreeMap<UnitName, HealthCheckResult>, HealthSummary) {
        let units: Vec<UnitName> = self
            .declaration
            .units
            .iter()
            .map(|u| u.name.clone())
            .collect();

        let results = self
            .verifier
            .check_many(self.provider.as_ref(), &units)
            .await;
        let summary = HealthVerifier::summarize(&results);
        (results, summary)
    }

    /// Stop every unit in reverse dependency order, then clean up provider
    /// resources. Individual stop failures are logged and skipped so one
    /// stubborn unit cannot strand the rest.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Plan`] if the declaration does not form a valid
    /// plan, [`OrchestratorError::Cleanup`] if the final cleanup fails.
    pub async fn down(&self) -> Result<(), OrchestratorError> {
        let planned = self.plan()?;

        for unit in planned.order().iter().rev() {
            match self.provider.is_running(unit).await {
                Ok(true) => {
                    tracing::info!(unit = %unit, "stopping unit");
                    if let Err(e) = self.provider.stop(unit).await {
                        tracing::warn!(unit = %unit, error = %e, "failed to stop unit");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(unit = %unit, error = %e, "could not determine unit state");
                }
            }
        }

        self.provider
            .cleanup()
            .await
            .map_err(|source| OrchestratorError::Cleanup { source })
    }
}
