// ABOUTME: Entry point for the caravel CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use caravel::config::{DeploymentDeclaration, ProvisioningOutputs, Tier};
use caravel::error::{Error, Result};
use caravel::orchestrator::{ExecutionPlan, Orchestrator};
use caravel::output::{Output, OutputMode};
use caravel::provider;
use clap::Parser;
use cli::{Cli, Commands, TargetArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let result = run(cli.command, Output::new(mode)).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: Output) -> Result<()> {
    match command {
        Commands::Deploy { target, outputs } => deploy(target, outputs, output).await,
        Commands::Plan { target } => plan(target, output),
        Commands::Status { target } => status(target, output).await,
        Commands::Down { target } => down(target, output).await,
    }
}

fn load_declaration(target: &TargetArgs) -> Result<DeploymentDeclaration> {
    match &target.declaration {
        Some(path) => {
            if !path.exists() {
                return Err(Error::DeclarationNotFound(path.clone()));
            }
            DeploymentDeclaration::load(path)
        }
        None => Ok(DeploymentDeclaration::default_application()),
    }
}

fn load_outputs(path: Option<&PathBuf>) -> Result<ProvisioningOutputs> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&contents)?)
        }
        None => Ok(ProvisioningOutputs::default()),
    }
}

/// Deploy every declared unit in dependency order.
async fn deploy(target: TargetArgs, outputs: Option<PathBuf>, mut output: Output) -> Result<()> {
    let declaration = load_declaration(&target)?;
    let outputs = load_outputs(outputs.as_ref())?;
    let provider = provider::select(target.environment, &target.engine)?;

    output.start_timer();
    output.progress(&format!(
        "Deploying {} unit(s) to {} via {}",
        declaration.units.len(),
        target.environment,
        provider.name()
    ));

    let orchestrator = Orchestrator::new(target.environment, declaration, outputs, provider);
    let report = orchestrator.deploy().await?;

    for unit in &report.units {
        let marker = if unit.healthy { "✓" } else { "✗" };
        let endpoint = unit.endpoint.as_deref().unwrap_or("-");
        output.progress(&format!(
            "  {marker} {} ({endpoint}) {}",
            unit.unit, unit.status
        ));
    }

    output.json(&report);
    output.success(&format!(
        "Deployment complete: {}/{} unit(s) healthy",
        report.healthy,
        report.units.len()
    ));
    Ok(())
}

/// Print the computed execution plan. No provider is needed and nothing is
/// deployed.
fn plan(target: TargetArgs, output: Output) -> Result<()> {
    let declaration = load_declaration(&target)?;
    let plan = ExecutionPlan::build(&declaration)?;

    output.progress(&format!(
        "Execution plan for {} ({} units):",
        target.environment,
        plan.len()
    ));

    for tier in [Tier::Infrastructure, Tier::Platform, Tier::Services] {
        let units = plan.units_in_tier(tier);
        if !units.is_empty() {
            let names: Vec<&str> = units.iter().map(|u| u.as_str()).collect();
            output.progress(&format!("  {}: {}", tier.as_str(), names.join(", ")));
        }
    }

    for (index, unit) in plan.order().iter().enumerate() {
        output.progress(&format!("{:>3}. {unit}", index + 1));
    }

    output.json(&serde_json::json!({
        "environment": target.environment,
        "order": plan.order(),
    }));
    Ok(())
}

/// Concurrently check the health of every declared unit.
async fn status(target: TargetArgs, output: Output) -> Result<()> {
    let declaration = load_declaration(&target)?;
    let provider = provider::select(target.environment, &target.engine)?;
    let orchestrator = Orchestrator::new(
        target.environment,
        declaration,
        ProvisioningOutputs::default(),
        provider,
    );

    let (results, summary) = orchestrator.status().await;

    for result in results.values() {
        let marker = if result.healthy { "✓" } else { "✗" };
        output.progress(&format!(
            "  {marker} {} {} - {}",
            result.unit, result.status, result.message
        ));
    }

    output.json(&summary);
    if summary.all_healthy() {
        output.success(&format!("All {} unit(s) healthy", summary.healthy));
    } else {
        output.warning(&format!(
            "{} unit(s) unhealthy: {}",
            summary.unhealthy,
            summary.issues.join("; ")
        ));
    }
    Ok(())
}

/// Stop all units in reverse dependency order and clean up.
async fn down(target: TargetArgs, mut output: Output) -> Result<()> {
    let declaration = load_declaration(&target)?;
    let provider = provider::select(target.environment, &target.engine)?;

    output.start_timer();
    output.progress(&format!(
        "Tearing down {} unit(s) in {}",
        declaration.units.len(),
        target.environment
    ));

    let orchestrator = Orchestrator::new(
        target.environment,
        declaration,
        ProvisioningOutputs::default(),
        provider,
    );
    orchestrator.down().await?;

    output.success("Teardown complete");
    Ok(())
}
