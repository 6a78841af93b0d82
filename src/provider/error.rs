// ABOUTME: Provider error types with SNAFU pattern.
// ABOUTME: Unifies engine CLI and platform API failures for programmatic handling.

use snafu::Snafu;

/// Unified error for container engine and managed-platform failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("failed to spawn '{binary}': {source}"))]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[snafu(display("'{binary} {subcommand}' exited with code {code}: {stderr}"))]
    CommandFailed {
        binary: String,
        subcommand: String,
        code: i32,
        stderr: String,
    },

    #[snafu(display("platform request failed: {source}"))]
    PlatformRequest { source: reqwest::Error },

    #[snafu(display("platform returned {status} for '{resource}': {message}"))]
    PlatformRejected {
        status: u16,
        resource: String,
        message: String,
    },

    #[snafu(display("resource '{resource}' reached provisioning state '{state}'"))]
    ProvisioningFailed { resource: String, state: String },

    #[snafu(display("unit '{unit}' has not been deployed by this provider"))]
    NotDeployed { unit: String },

    #[snafu(display("unexpected engine output: {message}"))]
    MalformedOutput { message: String },

    #[snafu(display("missing platform credential: {variable}"))]
    MissingCredential { variable: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The engine binary could not be executed at all.
    EngineUnavailable,
    /// An engine command ran and failed.
    EngineCommand,
    /// The platform API was unreachable or rejected the call.
    Platform,
    /// The provider was asked about a unit it never deployed.
    UnknownUnit,
    /// Output from the engine could not be interpreted.
    BadOutput,
    /// Platform credentials are missing from the environment.
    Credentials,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Spawn { .. } => ProviderErrorKind::EngineUnavailable,
            ProviderError::CommandFailed { .. } => ProviderErrorKind::EngineCommand,
            ProviderError::PlatformRequest { .. }
            | ProviderError::PlatformRejected { .. }
            | ProviderError::ProvisioningFailed { .. } => ProviderErrorKind::Platform,
            ProviderError::NotDeployed { .. } => ProviderErrorKind::UnknownUnit,
            ProviderError::MalformedOutput { .. } => ProviderErrorKind::BadOutput,
            ProviderError::MissingCredential { .. } => ProviderErrorKind::Credentials,
        }
    }
}
