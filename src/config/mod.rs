// ABOUTME: Configuration types for caravel.
// ABOUTME: Environment selection and the declarative unit table.

mod declaration;
mod environment;

pub use declaration::{DeploymentDeclaration, Tier, UnitDeclaration};
pub use environment::{Environment, ParseEnvironmentError};

use std::collections::BTreeMap;

/// Named outputs produced by the external provisioning layer, keyed by
/// infrastructure unit name. The orchestrator only reads these; it does not
/// know how they were produced.
pub type ProvisioningOutputs = BTreeMap<String, BTreeMap<String, String>>;
