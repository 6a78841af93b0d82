// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use caravel::config::Environment;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caravel")]
#[command(about = "Dependency-ordered container deployment for local engines and managed platforms")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct TargetArgs {
    /// Target environment (development, staging, production)
    #[arg(short, long, default_value = "development")]
    pub environment: Environment,

    /// Declaration file (the built-in application when omitted)
    #[arg(short, long)]
    pub declaration: Option<PathBuf>,

    /// Local container engine binary
    #[arg(long, default_value = "docker")]
    pub engine: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy every declared unit in dependency order
    Deploy {
        #[command(flatten)]
        target: TargetArgs,

        /// Provisioning outputs file (YAML map: unit -> key -> value)
        #[arg(short, long)]
        outputs: Option<PathBuf>,
    },

    /// Print the computed execution plan without deploying anything
    Plan {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Concurrently check the health of every declared unit
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Stop all units in reverse dependency order and clean up
    Down {
        #[command(flatten)]
        target: TargetArgs,
    },
}
