// ABOUTME: Execution plan derivation from the unit declaration table.
// ABOUTME: Topological order, per-tier subsets, and per-unit spec construction.

use super::graph::{DependencyGraph, GraphError};
use crate::config::{DeploymentDeclaration, ProvisioningOutputs, Tier, UnitDeclaration};
use crate::types::UnitName;
use crate::unit::{ContainerSpec, SpecError};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("specification for unit '{unit}' is invalid: {source}")]
    Spec { unit: UnitName, source: SpecError },

    #[error("unit '{unit}' references missing provisioning output '{reference}'")]
    MissingOutput { unit: UnitName, reference: String },
}

/// The topologically sorted unit sequence, plus tier subsets for reporting.
/// Immutable once computed.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    order: Vec<UnitName>,
    tiers: BTreeMap<Tier, Vec<UnitName>>,
}

impl ExecutionPlan {
    /// Derive the plan from a declaration.
    ///
    /// # Errors
    ///
    /// [`PlanError::Graph`] for cyclic or dangling dependency declarations;
    /// nothing is deployed in that case.
    pub fn build(declaration: &DeploymentDeclaration) -> Result<Self, PlanError> {
        let mut graph = DependencyGraph::new();
        for unit in declaration.units.iter() {
            graph.add_unit(unit.name.clone(), unit.depends_on.iter().cloned());
        }

        let order = graph.topological_order()?;

        let mut tiers: BTreeMap<Tier, Vec<UnitName>> = BTreeMap::new();
        for name in &order {
            if let Some(unit) = declaration.get(name) {
                tiers.entry(unit.tier).or_default().push(name.clone());
            }
        }

        Ok(Self { order, tiers })
    }

    pub fn order(&self) -> &[UnitName] {
        &self.order
    }

    pub fn units_in_tier(&self, tier: Tier) -> &[UnitName] {
        self.tiers.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Build the immutable per-unit specifications for a plan.
///
/// Environment templates may reference provisioning outputs with
/// `${output:unit.key}` placeholders; they are resolved here, at plan-build
/// time, so execution never touches the provisioning boundary.
///
/// # Errors
///
/// [`PlanError::Spec`] for declaration entries violating spec invariants,
/// [`PlanError::MissingOutput`] for dangling output references.
pub fn build_specs(
    declaration: &DeploymentDeclaration,
    outputs: &ProvisioningOutputs,
) -> Result<BTreeMap<UnitName, ContainerSpec>, PlanError> {
    let mut specs = BTreeMap::new();

    for unit in declaration.units.iter() {
        let spec = build_spec(unit, outputs)?;
        specs.insert(unit.name.clone(), spec);
    }

    Ok(specs)
}

fn build_spec(
    unit: &UnitDeclaration,
    outputs: &ProvisioningOutputs,
) -> Result<ContainerSpec, PlanError> {
    let mut builder = ContainerSpec::builder(unit.name.as_str(), &unit.image.to_string(), unit.port);

    for (key, template) in &unit.env {
        let value = resolve_output_refs(template, outputs).map_err(|reference| {
            PlanError::MissingOutput {
                unit: unit.name.clone(),
                reference,
            }
        })?;
        builder = builder.env(key, &value);
    }

    if let Some(command) = &unit.command {
        builder = builder.command(command.clone());
    }

    if unit.status_only {
        builder = builder.no_health_endpoint();
    } else if let Some(endpoint) = &unit.health_endpoint {
        builder = builder.health_endpoint(endpoint);
    }

    if let Some(app_id) = &unit.dapr_app_id {
        builder = builder.dapr(app_id.as_str());
    }

    builder.build().map_err(|source| PlanError::Spec {
        unit: unit.name.clone(),
        source,
    })
}

/// Replace every `${output:unit.key}` placeholder in a template. Returns the
/// unresolved reference on failure.
fn resolve_output_refs(
    template: &str,
    outputs: &ProvisioningOutputs,
) -> Result<String, String> {
    const OPEN: &str = "${output:";

    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        resolved.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find('}') else {
            return Err(after_open.to_string());
        };
        let reference = &after_open[..end];

        let value = reference
            .split_once('.')
            .and_then(|(unit, key)| outputs.get(unit)?.get(key));
        match value {
            Some(value) => resolved.push_str(value),
            None => return Err(reference.to_string()),
        }

        rest = &after_open[end + 1..];
    }

    resolved.push_str(rest);
    Ok(resolved)
}
