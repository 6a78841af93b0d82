// ABOUTME: Local container engine backend, shelling out to the engine binary.
// ABOUTME: Bridge network, run-args translation, co-located sidecar injection.

mod cli;

pub use cli::{CliOutput, EngineCli};

use crate::config::Environment;
use crate::health::{HealthCheckResult, HealthError, HealthTarget, HealthVerifier};
use crate::provider::error::ProviderError;
use crate::provider::{LOCAL_HEALTH_TIMEOUT, Provider};
use crate::sidecar::{SidecarManager, launch_command};
use crate::types::{ContainerId, ImageRef, NetworkId, UnitName};
use crate::unit::{ContainerSpec, ProviderExtension, RestartPolicy};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Bridge network all locally deployed units share.
const DEPLOY_NETWORK: &str = "caravel";
/// Sidecar runtime image launched next to dapr-enabled units.
const DAPRD_IMAGE: &str = "daprio/daprd:1.13.5";

/// Deploys units as containers on a local engine (`docker` or `podman`),
/// one bridge network per deployment, sidecars as co-located containers
/// sharing the unit's network namespace.
pub struct LocalEngineProvider {
    cli: EngineCli,
    network: NetworkId,
    sidecars: SidecarManager,
    verifier: HealthVerifier,
    deployed: Mutex<HashMap<UnitName, DeployedUnit>>,
}

struct DeployedUnit {
    spec: ContainerSpec,
    container: ContainerId,
}

impl LocalEngineProvider {
    pub fn new(engine_binary: &str, environment: Environment) -> Self {
        Self {
            cli: EngineCli::new(engine_binary),
            network: NetworkId::new(DEPLOY_NETWORK.to_string()),
            sidecars: SidecarManager::new(environment),
            verifier: HealthVerifier::default(),
            deployed: Mutex::new(HashMap::new()),
        }
    }

    fn sidecar_container_name(unit: &UnitName) -> String {
        format!("{unit}-daprd")
    }

    /// Translate a specification into `run` arguments. Flag order is fixed
    /// so invocations are reproducible in logs and tests.
    fn build_run_args(&self, spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            spec.name.to_string(),
            "--label".to_string(),
            "caravel.managed=true".to_string(),
            "--label".to_string(),
            format!("caravel.unit={}", spec.name),
        ];

        let network = match &spec.extension {
            ProviderExtension::Local(ext) => ext.network.as_deref().unwrap_or(self.network.as_str()),
            _ => self.network.as_str(),
        };
        args.push("--network".to_string());
        args.push(network.to_string());
        // The unit name doubles as the network alias for discovery.
        args.push("--network-alias".to_string());
        args.push(spec.name.to_string());

        args.push("-p".to_string());
        args.push(format!("{}:{}", spec.port, spec.port));

        // The sidecar shares this container's network namespace, so its HTTP
        // port has to be published here.
        if let Some(dapr) = &spec.dapr {
            let config = self.sidecars.build_default_config(&dapr.app_id, dapr.app_port);
            args.push("-p".to_string());
            args.push(format!("{0}:{0}", config.http_port));
        }

        for (key, value) in &spec.environment {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        if let Some(cpus) = cpu_flag_value(&spec.resources.cpu_limit) {
            args.push("--cpus".to_string());
            args.push(cpus);
        }
        args.push("--memory".to_string());
        args.push(memory_flag_value(&spec.resources.memory_limit));

        let restart = match &spec.extension {
            ProviderExtension::Local(ext) => ext.restart_policy,
            _ => RestartPolicy::default(),
        };
        args.push("--restart".to_string());
        args.push(restart.as_engine_flag().to_string());

        if let Some(endpoint) = &spec.health_endpoint {
            args.push("--health-cmd".to_string());
            args.push(format!("wget -q --spider {endpoint}"));
            args.push("--health-interval".to_string());
            args.push("5s".to_string());
            args.push("--health-timeout".to_string());
            args.push("10s".to_string());
            args.push("--health-retries".to_string());
            args.push("3".to_string());
        }

        for volume in &spec.volumes {
            let suffix = if volume.read_only { ":ro" } else { "" };
            args.push("-v".to_string());
            args.push(format!("{}:{}{}", volume.source, volume.target, suffix));
        }

        if let ProviderExtension::Local(ext) = &spec.extension {
            args.extend(ext.extra_run_args.iter().cloned());
        }

        args.push(spec.image.to_string());

        if let Some(command) = &spec.command {
            args.extend(command.iter().cloned());
        }

        args
    }

    /// Create the deployment network if it does not exist yet. Inspect
    /// before create keeps this idempotent across runs.
    async fn ensure_network(&self) -> Result<(), ProviderError> {
        if self
            .cli
            .run_check(&["network", "inspect", self.network.as_str()])
            .await
        {
            return Ok(());
        }

        self.cli
            .run(&["network", "create", "--driver", "bridge", self.network.as_str()])
            .await?;
        tracing::info!(network = %self.network, "created deployment network");
        Ok(())
    }
}

#[async_trait]
impl HealthTarget for LocalEngineProvider {
    async fn status(&self, unit: &UnitName) -> Result<String, ProviderError> {
        let output = self
            .cli
            .run(&[
                "inspect",
                "-f",
                "{{.State.Status}};{{if .State.Health}}{{.State.Health.Status}}{{end}}",
                unit.as_str(),
            ])
            .await?;

        let raw = output.stdout.trim();
        let (state, health) = raw.split_once(';').unwrap_or((raw, ""));

        // An embedded health check is more precise than the bare state.
        if !health.is_empty() {
            return Ok(health.to_string());
        }

        Ok(match state {
            "exited" | "dead" => "failed".to_string(),
            other => other.to_string(),
        })
    }

    fn health_endpoint(&self, unit: &UnitName) -> Option<String> {
        self.deployed
            .lock()
            .get(unit)
            .and_then(|d| d.spec.health_endpoint.clone())
    }
}

#[async_trait]
impl Provider for LocalEngineProvider {
    fn name(&self) -> &'static str {
        "local-engine"
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        self.cli.run(&["version", "--format", "{{.Client.Version}}"]).await?;
        self.ensure_network().await
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), ProviderError> {
        self.cli.run(&["pull", &image.to_string()]).await?;
        Ok(())
    }

    async fn deploy(&self, spec: &ContainerSpec) -> Result<(), ProviderError> {
        // Idempotent redeploy: any previous instance of this name goes first.
        self.cli.run_check(&["rm", "-f", spec.name.as_str()]).await;
        self.cli
            .run_check(&["rm", "-f", &Self::sidecar_container_name(&spec.name)])
            .await;

        let args = self.build_run_args(spec);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.cli.run(&arg_refs).await?;

        let container = ContainerId::new(output.stdout.trim().to_string());
        tracing::info!(unit = %spec.name, container = %container, "deployed container");

        self.deployed.lock().insert(
            spec.name.clone(),
            DeployedUnit {
                spec: spec.clone(),
                container,
            },
        );
        Ok(())
    }

    async fn inject_sidecar(&self, spec: &ContainerSpec) -> Result<(), ProviderError> {
        let Some(dapr) = &spec.dapr else {
            return Ok(());
        };

        let config = self.sidecars.build_default_config(&dapr.app_id, dapr.app_port);
        let argv = launch_command(&config);
        let sidecar_name = Self::sidecar_container_name(&spec.name);

        self.cli.run(&["pull", DAPRD_IMAGE]).await?;

        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            sidecar_name.clone(),
            "--label".to_string(),
            "caravel.managed=true".to_string(),
            "--label".to_string(),
            format!("caravel.unit={sidecar_name}"),
            // Share the unit's network namespace so sidecar and app talk
            // over localhost.
            "--network".to_string(),
            format!("container:{}", spec.name),
            "--entrypoint".to_string(),
            argv[0].clone(),
            DAPRD_IMAGE.to_string(),
        ];
        args.extend(argv[1..].iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.cli.run(&arg_refs).await?;

        tracing::info!(
            unit = %spec.name,
            app_id = %config.app_id,
            http_port = config.http_port,
            grpc_port = config.grpc_port,
            "injected sidecar"
        );
        Ok(())
    }

    async fn stop(&self, unit: &UnitName) -> Result<(), ProviderError> {
        self.cli
            .run_check(&["stop", &Self::sidecar_container_name(unit)])
            .await;
        self.cli.run(&["stop", unit.as_str()]).await?;
        Ok(())
    }

    async fn is_running(&self, unit: &UnitName) -> Result<bool, ProviderError> {
        if !self.cli.run_check(&["inspect", unit.as_str()]).await {
            return Ok(false);
        }
        let status = self.status(unit).await?;
        Ok(matches!(status.as_str(), "running" | "healthy" | "starting"))
    }

    fn endpoint(&self, unit: &UnitName) -> Option<String> {
        self.deployed
            .lock()
            .get(unit)
            .map(|d| format!("http://localhost:{}", d.spec.port))
    }

    async fn logs(&self, unit: &UnitName, lines: usize) -> Result<String, ProviderError> {
        // Prefer the recorded container ID; the name still resolves for
        // units deployed by an earlier run.
        let target = self
            .deployed
            .lock()
            .get(unit)
            .map(|d| d.container.to_string())
            .unwrap_or_else(|| unit.to_string());

        let output = self
            .cli
            .run(&["logs", "--tail", &lines.to_string(), &target])
            .await?;
        // The engine writes container output to both streams.
        Ok(format!("{}{}", output.stdout, output.stderr))
    }

    async fn list(&self) -> Result<Vec<String>, ProviderError> {
        let output = self
            .cli
            .run(&[
                "ps",
                "--filter",
                "label=caravel.managed=true",
                "--format",
                "{{json .}}",
            ])
            .await?;

        let mut units = Vec::new();
        for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
            let record: serde_json::Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    // Best-effort discovery, not correctness-critical.
                    tracing::warn!(error = %e, "skipping malformed container record");
                    continue;
                }
            };
            match record.get("Names").and_then(|n| n.as_str()) {
                Some(name) if !name.ends_with("-daprd") => units.push(name.to_string()),
                Some(_) => {}
                None => {
                    tracing::warn!(%record, "skipping container record without a name");
                }
            }
        }
        Ok(units)
    }

    async fn cleanup(&self) -> Result<(), ProviderError> {
        for name in self.list().await? {
            self.cli.run_check(&["rm", "-f", &name]).await;
            self.cli.run_check(&["rm", "-f", &format!("{name}-daprd")]).await;
        }
        self.cli
            .run_check(&["network", "rm", self.network.as_str()])
            .await;
        self.deployed.lock().clear();
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
        LOCAL_HEALTH_TIMEOUT
    }
}

/// Convert a CPU quantity string ("500m", "1") to the engine's fractional
/// `--cpus` value.
fn cpu_flag_value(quantity: &str) -> Option<String> {
    if let Some(millis) = quantity.strip_suffix('m') {
        let millis: f64 = millis.parse().ok()?;
        Some(format!("{}", millis / 1000.0))
    } else {
        quantity.parse::<f64>().ok().map(|v| format!("{v}"))
    }
}

/// Convert a memory quantity string ("512Mi", "1Gi") to the engine's
/// `--memory` format.
fn memory_flag_value(quantity: &str) -> String {
    if let Some(mebibytes) = quantity.strip_suffix("Mi") {
        format!("{mebibytes}m")
    } else if let Some(gibibytes) = quantity.strip_suffix("Gi") {
        format!("{gibibytes}g")
    } else {
        quantity.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalEngineProvider {
        LocalEngineProvider::new("docker", Environment::Development)
    }

    #[test]
    fn cpu_quantities() {
        assert_eq!(cpu_flag_value("500m").as_deref(), Some("0.5"));
        assert_eq!(cpu_flag_value("1000m").as_deref(), Some("1"));
        assert_eq!(cpu_flag_value("2").as_deref(), Some("2"));
        assert_eq!(cpu_flag_value("lots"), None);
    }

    #[test]
    fn memory_quantities() {
        assert_eq!(memory_flag_value("512Mi"), "512m");
        assert_eq!(memory_flag_value("1Gi"), "1g");
        assert_eq!(memory_flag_value("1073741824"), "1073741824");
    }

    #[test]
    fn run_args_for_plain_unit() {
        let spec = ContainerSpec::builder("redis", "redis:7-alpine", 6379)
            .no_health_endpoint()
            .build()
            .unwrap();

        let args = provider().build_run_args(&spec);
        let joined = args.join(" ");

        assert!(joined.starts_with("run -d --name redis"));
        assert!(joined.contains("--network caravel"));
        assert!(joined.contains("-p 6379:6379"));
        assert!(joined.contains("--label caravel.unit=redis"));
        assert!(!joined.contains("--health-cmd"));
        assert!(joined.ends_with("redis:7-alpine"));
    }

    #[test]
    fn run_args_publish_sidecar_port() {
        let spec = ContainerSpec::builder("gateway", "ghcr.io/acme/gateway:v1", 9001)
            .dapr("gateway")
            .build()
            .unwrap();

        let args = provider().build_run_args(&spec);
        let joined = args.join(" ");

        assert!(joined.contains("-p 9001:9001"));
        assert!(joined.contains("-p 50001:50001"));
        assert!(joined.contains("--health-cmd"));
    }

    #[test]
    fn run_args_include_env_and_command() {
        let spec = ContainerSpec::builder("api", "nginx", 8080)
            .env("LOG_LEVEL", "debug")
            .command(vec!["serve".to_string(), "--port".to_string(), "8080".to_string()])
            .build()
            .unwrap();

        let args = provider().build_run_args(&spec);
        let joined = args.join(" ");

        assert!(joined.contains("-e LOG_LEVEL=debug"));
        assert!(joined.ends_with("nginx:latest serve --port 8080"));
    }

    #[test]
    fn run_args_are_deterministic() {
        let spec = ContainerSpec::builder("api", "nginx", 8080)
            .env("B", "2")
            .env("A", "1")
            .build()
            .unwrap();

        let provider = provider();
        assert_eq!(provider.build_run_args(&spec), provider.build_run_args(&spec));
    }
}
