//! Clap derive structures for the `onuctl` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// onuctl -- bulk ONU provisioning for GPON OLTs
#[derive(Debug, Parser)]
#[command(
    name = "onuctl",
    version,
    about = "Register and configure ONUs on a GPON OLT in bulk",
    long_about = "Drives the OLT command shell over SSH to register subscriber units \
        from a CSV work order, waits for the device to commit them, then pushes \
        per-subscriber service configuration.\n\n\
        Every outcome is recorded in a status ledger, so a work order can be re-run \
        safely: only unfinished units are touched again.",
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

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// OLT profile to use
    #[arg(long, short = 'p', env = "ONUCTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// OLT management address (overrides profile)
    #[arg(long, short = 'H', env = "ONUCTL_HOST", global = true)]
    pub host: Option<String>,

    /// SSH port (overrides profile)
    #[arg(long, env = "ONUCTL_PORT", global = true)]
    pub port: Option<u16>,

    /// SSH username (overrides profile)
    #[arg(long, short = 'u', env = "ONUCTL_USERNAME", global = true)]
    pub username: Option<String>,

    /// Status ledger CSV (overrides config defaults)
    #[arg(long, env = "ONUCTL_LEDGER", global = true)]
    pub ledger: Option<PathBuf>,

    /// Append raw device output to this file
    #[arg(long, env = "ONUCTL_TRANSCRIPT", global = true)]
    pub transcript: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ONUCTL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Colorize status cells
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print errors only
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, env = "ONUCTL_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Rounded table
    Table,
    /// Indented JSON
    Json,
    /// JSON on one line
    JsonCompact,
    /// YAML
    Yaml,
    /// One unit or port per line
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    /// Always
    Always,
    /// Never
    Never,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision one or more CSV work orders
    Run(RunArgs),

    /// Show the status ledger
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Manage OLT profiles and defaults
    Config(ConfigArgs),

    /// Print a shell completion script
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RUN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Work order CSV files, one port each
    #[arg(required = true, value_name = "CSV")]
    pub files: Vec<PathBuf>,

    /// Phases to run
    #[arg(long, short = 'm', default_value = "full")]
    pub mode: RunModeArg,

    /// Configuration workers per port (default: automatic)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Ports provisioned concurrently when several files are given (1-8)
    #[arg(long)]
    pub pool: Option<usize>,

    /// Persist with `write` on every buffer flush
    #[arg(long)]
    pub auto_write: bool,

    /// VLAN profile name prefix (overrides profile)
    #[arg(long)]
    pub vlan_prefix: Option<String>,

    /// ONU type declared at registration (overrides profile)
    #[arg(long)]
    pub onu_type: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RunModeArg {
    /// Register, then configure
    Full,
    /// Register only
    Register,
    /// Configure already registered units only
    Config,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATUS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only units on this port
    #[arg(long, short = 'i')]
    pub interface: Option<String>,

    /// Only units in this state
    #[arg(long, short = 's')]
    pub status: Option<UnitStatusArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UnitStatusArg {
    Pending,
    Registered,
    Success,
    Error,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Add or replace a profile interactively
    Init,

    /// Print the configuration with passwords masked
    Show,

    /// Store the active profile's password in the system keyring
    SetPassword,

    /// List profiles, marking the default with *
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Print the config file location
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
