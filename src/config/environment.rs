// ABOUTME: Deployment environment definition.
// ABOUTME: Selects provider backend, sidecar sizing, and validation strictness.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown environment '{0}' (expected development, staging, or production)")]
pub struct ParseEnvironmentError(String);

/// Target environment for a deployment run.
///
/// The environment is injected at construction time and decides which
/// provider backend runs the plan, how the sidecar is sized, and whether
/// post-deployment health validation is advisory or fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Local iteration tolerates flakiness; post-deployment validation only
    /// warns in development but fails the run in staging and production.
    pub fn health_validation_is_fatal(&self) -> bool {
        !matches!(self, Environment::Development)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// DNS suffix for managed-platform ingress endpoints.
    pub fn platform_domain(&self) -> &'static str {
        match self {
            Environment::Development => "localhost",
            Environment::Staging => "staging.apps.internal",
            Environment::Production => "apps.internal",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ParseEnvironmentError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn validation_strictness_per_environment() {
        assert!(!Environment::Development.health_validation_is_fatal());
        assert!(Environment::Staging.health_validation_is_fatal());
        assert!(Environment::Production.health_validation_is_fatal());
    }
}
