// ABOUTME: Health verification engine for deployed units.
// ABOUTME: Single and concurrent status/HTTP probes with bounded polling.

use crate::provider::ProviderError;
use crate::types::UnitName;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Something whose units can be health-probed: a runtime status string plus
/// an optional HTTP endpoint. Both provider backends implement this, and the
/// verifier depends on nothing else.
#[async_trait]
pub trait HealthTarget: Send + Sync {
    /// Current runtime status of the unit.
    async fn status(&self, unit: &UnitName) -> Result<String, ProviderError>;

    /// Configured HTTP health endpoint, if the unit has one.
    fn health_endpoint(&self, unit: &UnitName) -> Option<String>;
}

/// Outcome of a single probe. Produced fresh on every check, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub unit: UnitName,
    pub healthy: bool,
    pub status: String,
    pub message: String,
    pub endpoint: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Terminal failure states: polling further cannot help.
pub fn status_is_terminal_failure(status: &str) -> bool {
    matches!(
        status.to_ascii_lowercase().as_str(),
        "failed" | "unhealthy" | "dead"
    )
}

fn status_is_running(status: &str) -> bool {
    matches!(
        status.to_ascii_lowercase().as_str(),
        "running" | "healthy" | "succeeded"
    )
}

#[derive(Debug, Error)]
pub enum HealthError {
    /// The unit reported a terminal failure state. Not retried: retrying a
    /// declared failure wastes the deployment window.
    #[error("unit '{unit}' reported terminal status '{status}': {message}")]
    Failed {
        unit: UnitName,
        status: String,
        message: String,
    },

    #[error("unit '{unit}' did not become healthy within {timeout_secs}s")]
    Timeout { unit: UnitName, timeout_secs: u64 },
}

/// Aggregate view over a set of probe results.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub healthy: usize,
    pub unhealthy: usize,
    pub issues: Vec<String>,
}

impl HealthSummary {
    pub fn all_healthy(&self) -> bool {
        self.unhealthy == 0
    }
}

/// Polls runtime status and, where configured, an HTTP endpoint.
///
/// Multi-unit checks are fire-and-collect rather than fail-fast: a single
/// unhealthy container must not hide the status of its peers during
/// diagnosis.
pub struct HealthVerifier {
    http: reqwest::Client,
    poll_interval: Duration,
}

impl Default for HealthVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT)
    }
}

impl HealthVerifier {
    pub fn new(poll_interval: Duration, probe_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .expect("HTTP client options are static and valid");
        Self {
            http,
            poll_interval,
        }
    }

    /// Probe one unit once.
    ///
    /// A terminal runtime status short-circuits without touching HTTP. A
    /// running unit with no endpoint is healthy by definition. Probe errors
    /// are folded into an unhealthy result, never propagated, so concurrent
    /// callers always collect a result per unit.
    pub async fn check_one<T: HealthTarget + ?Sized>(
        &self,
        target: &T,
        unit: &UnitName,
    ) -> HealthCheckResult {
        let status = match target.status(unit).await {
            Ok(status) => status,
            Err(e) => {
                return self.result(unit, false, "unknown", format!("status probe failed: {e}"), None);
            }
        };

        if status_is_terminal_failure(&status) {
            return self.result(
                unit,
                false,
                &status,
                format!("unit is in terminal state '{status}'"),
                None,
            );
        }

        if !status_is_running(&status) {
            return self.result(unit, false, &status, format!("unit not ready: '{status}'"), None);
        }

        let Some(endpoint) = target.health_endpoint(unit) else {
            return self.result(
                unit,
                true,
                &status,
                "running, no endpoint configured".to_string(),
                None,
            );
        };

        match self.http.get(&endpoint).send().await {
            Ok(response) if response.status().is_success() => self.result(
                unit,
                true,
                &status,
                format!("endpoint returned {}", response.status()),
                Some(endpoint),
            ),
            Ok(response) => self.result(
                unit,
                false,
                &status,
                format!("endpoint returned {}", response.status()),
                Some(endpoint),
            ),
            Err(e) => self.result(
                unit,
                false,
                &status,
                format!("endpoint probe failed: {e}"),
                Some(endpoint),
            ),
        }
    }

    /// Poll one unit until it is healthy.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::Failed`] as soon as a terminal status is
    /// observed and [`HealthError::Timeout`] when the budget elapses.
    /// Dropping the returned future aborts the polling loop immediately.
    pub async fn wait_until_healthy<T: HealthTarget + ?Sized>(
        &self,
        target: &T,
        unit: &UnitName,
        timeout: Duration,
    ) -> Result<HealthCheckResult, HealthError> {
        let started = Instant::now();

        loop {
            let result = self.check_one(target, unit).await;

            if result.healthy {
                return Ok(result);
            }

            if status_is_terminal_failure(&result.status) {
                return Err(HealthError::Failed {
                    unit: unit.clone(),
                    status: result.status,
                    message: result.message,
                });
            }

            tracing::debug!(unit = %unit, status = %result.status, "not healthy yet");

            if started.elapsed() >= timeout {
                return Err(HealthError::Timeout {
                    unit: unit.clone(),
                    timeout_secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Probe every unit concurrently and collect all results.
    ///
    /// One probe per unit; the cost of N checks is the cost of the slowest,
    /// not the sum. Results are write-once per probe and read only after the
    /// join.
    pub async fn check_many<T: HealthTarget + ?Sized>(
        &self,
        target: &T,
        units: &[UnitName],
    ) -> BTreeMap<UnitName, HealthCheckResult> {
        let checks = units.iter().map(|unit| async move {
            let result = self.check_one(target, unit).await;
            (unit.clone(), result)
        });

        futures::future::join_all(checks).await.into_iter().collect()
    }

    /// Poll the whole set until every unit is healthy.
    ///
    /// # Errors
    ///
    /// Fails fast with [`HealthError::Failed`] when any unit reports a
    /// terminal status, [`HealthError::Timeout`] when the budget elapses.
    pub async fn wait_many_until_healthy<T: HealthTarget + ?Sized>(
        &self,
        target: &T,
        units: &[UnitName],
        timeout: Duration,
    ) -> Result<BTreeMap<UnitName, HealthCheckResult>, HealthError> {
        let started = Instant::now();

        loop {
            let results = self.check_many(target, units).await;

            for result in results.values() {
                if status_is_terminal_failure(&result.status) {
                    return Err(HealthError::Failed {
                        unit: result.unit.clone(),
                        status: result.status.clone(),
                        message: result.message.clone(),
                    });
                }
            }

            if results.values().all(|r| r.healthy) {
                return Ok(results);
            }

            if started.elapsed() >= timeout {
                return Err(HealthError::Timeout {
                    unit: results
                        .values()
                        .find(|r| !r.healthy)
                        .map(|r| r.unit.clone())
                        .unwrap_or_else(|| units[0].clone()),
                    timeout_secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Condense a result set into counts plus one issue line per unhealthy
    /// unit.
    pub fn summarize(results: &BTreeMap<UnitName, HealthCheckResult>) -> HealthSummary {
        let healthy = results.values().filter(|r| r.healthy).count();
        let issues = results
            .values()
            .filter(|r| !r.healthy)
            .map(|r| format!("{}: {} ({})", r.unit, r.status, r.message))
            .collect::<Vec<_>>();

        HealthSummary {
            healthy,
            unhealthy: results.len() - healthy,
            issues,
        }
    }

    fn result(
        &self,
        unit: &UnitName,
        healthy: bool,
        status: &str,
        message: String,
        endpoint: Option<String>,
    ) -> HealthCheckResult {
        HealthCheckResult {
            unit: unit.clone(),
            healthy,
            status: status.to_string(),
            message,
            endpoint,
            checked_at: Utc::now(),
        }
    }
}
