//! Clap derive structures for the `poolsync` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use poolsync_core::UnitSystem;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// poolsync -- local-network control of PoolSync pool controllers
#[derive(Debug, Parser)]
#[command(
    name = "poolsync",
    version,
    about = "Pair with and monitor PoolSync pool controllers on your local network",
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
    /// Device profile to use
    #[arg(long, short = 'p', env = "POOLSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub address (overrides profile)
    #[arg(long, short = 'a', env = "POOLSYNC_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "POOLSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Temperature scale the hub is configured for (overrides profile)
    #[arg(long, global = true)]
    pub units: Option<UnitSystem>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "POOLSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pair with a hub via its push-link button
    Pair(PairArgs),

    /// Show every known value of the paired hub
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Keep polling and print each refresh
    Watch(WatchArgs),

    /// Print the raw value at a dotted path
    Get(GetArgs),

    /// Change a writable setting
    Set(SetArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Pair ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PairArgs {
    /// IP address or host name of the hub
    pub address: String,

    /// Seconds to wait for the button press
    #[arg(long, default_value = "120")]
    pub wait: u64,
}

// ── Status / Watch ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Include fields the hub did not report
    #[arg(long)]
    pub all: bool,

    /// Print the redacted diagnostics document instead
    #[arg(long)]
    pub diagnostics: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds (overrides profile, minimum 10)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Only print these fields (repeatable)
    #[arg(long, short = 'f')]
    pub field: Vec<String>,

    /// Stop after this many refreshes
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Get / Set ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Dotted path, e.g. `devices.0.config.mode` or `poolSync.faults.[0]`
    pub path: String,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Field to write: chlor_output, hp_setpoint, or hp_mode
    pub field: String,

    /// New value; hp_mode also accepts off, heat, or cool
    pub value: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration (secrets hidden)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
