// ABOUTME: Application-wide error types for caravel.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("declaration file not found: {0}")]
    DeclarationNotFound(PathBuf),

    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error(transparent)]
    Plan(#[from] crate::orchestrator::PlanError),

    #[error(transparent)]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),

    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
