//! Clap derive structures for the `tcc-bridge` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use tcc_core::{SetpointKind, SystemMode};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tcc-bridge -- keep a Total Connect Comfort thermostat in sync with a
/// local smart-home protocol bridge
#[derive(Debug, Parser)]
#[command(
    name = "tcc-bridge",
    version,
    about = "Sync a Total Connect Comfort thermostat with a smart-home protocol bridge",
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
    #[arg(long, env = "TCC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the poll loop and relay bridge commands until interrupted
    Run(RunArgs),

    /// Poll the portal once and print the device states as JSON
    Poll,

    /// Log in fresh and list thermostats to verify credentials
    TestCredentials(TestCredentialsArgs),

    /// Change the system mode
    SetMode(SetModeArgs),

    /// Change the heat or cool setpoint (in the thermostat's display unit)
    SetSetpoint(SetSetpointArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Poll and persist only; do not talk to the protocol bridge
    #[arg(long)]
    pub no_bridge: bool,
}

#[derive(Debug, Args)]
pub struct TestCredentialsArgs {
    /// Username to test instead of the configured one
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Password to test instead of the configured one
    #[arg(long, env = "TCC_TEST_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct SetModeArgs {
    pub mode: ModeArg,

    /// Target device id (defaults to the first thermostat)
    #[arg(long, short = 'd')]
    pub device: Option<i64>,
}

#[derive(Debug, Args)]
pub struct SetSetpointArgs {
    pub kind: SetpointArg,

    /// New setpoint, e.g. 68.5
    pub value: f64,

    /// Target device id (defaults to the first thermostat)
    #[arg(long, short = 'd')]
    pub device: Option<i64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Off,
    Heat,
    Cool,
    Auto,
    /// Emergency heat
    Emergency,
}

impl From<ModeArg> for SystemMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Off => Self::Off,
            ModeArg::Heat => Self::Heat,
            ModeArg::Cool => Self::Cool,
            ModeArg::Auto => Self::Auto,
            ModeArg::Emergency => Self::Emergency,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SetpointArg {
    Heat,
    Cool,
}

impl From<SetpointArg> for SetpointKind {
    fn from(kind: SetpointArg) -> Self {
        match kind {
            SetpointArg::Heat => Self::Heat,
            SetpointArg::Cool => Self::Cool,
        }
    }
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
    /// Print the effective configuration (passwords redacted)
    Show,
}
