//! Clap derive structures for the `poolbridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use poolbridge_core::ScalarValue;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// poolbridge -- mirror a pool controller into an object/state store
#[derive(Debug, Parser)]
#[command(
    name = "poolbridge",
    version,
    about = "Bridge a pool controller to a home-automation object store",
    long_about = "Polls a pool controller, materializes every sensor and relay as\n\
        store objects, writes only changed values, and turns platform writes\n\
        on relay entries into device commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "POOLBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device address (overrides device.address)
    #[arg(long, short = 'a', global = true)]
    pub address: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge against the simulated device
    Run(RunArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Snapshot fixture served by the device (overrides device.fixture)
    #[arg(long, short = 'f')]
    pub fixture: Option<PathBuf>,

    /// Poll interval in seconds (overrides device.poll_interval_secs)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Stop after this many completed poll cycles
    #[arg(long, short = 'n')]
    pub cycles: Option<u64>,

    /// Platform write to inject after the first cycle (repeatable)
    #[arg(long = "set", value_name = "PATH=VALUE", value_parser = parse_assignment)]
    pub set: Vec<Assignment>,

    /// Print the final store contents as JSON
    #[arg(long)]
    pub dump: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

// ── Assignments ──────────────────────────────────────────────────────

/// A `PATH=VALUE` platform write.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: String,
    pub value: ScalarValue,
}

fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got '{raw}'"))?;
    let path = path.trim();
    if path.is_empty() {
        return Err("empty path".into());
    }
    Ok(Assignment {
        path: path.to_owned(),
        value: parse_scalar(value.trim()),
    })
}

fn parse_scalar(raw: &str) -> ScalarValue {
    match raw {
        "true" | "on" => ScalarValue::Bool(true),
        "false" | "off" => ScalarValue::Bool(false),
        _ => raw
            .parse::<f64>()
            .map_or_else(|_| ScalarValue::from(raw), ScalarValue::Number),
    }
}
