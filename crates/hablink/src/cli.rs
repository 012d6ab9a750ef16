//! Clap derive structures for the `hablink` CLI.
//!
//! Defines the command tree, global flags, and shared enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hablink -- poll and control home devices from the command line
#[derive(Debug, Parser)]
#[command(
    name = "hablink",
    version,
    about = "Poll and control home automation devices from the command line",
    long_about = "Keeps sessions with Jablotron alarm panels, Efergy energy meters,\n\
        Smarwi window openers and Philips TVs, polls them on a schedule and\n\
        prints every channel change.",
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
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "HABLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HABLINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Output, Color & Log Enums ────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
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

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start polling and print updates until Ctrl-C
    Run(RunArgs),

    /// Run one poll cycle and print the device's channels
    Poll(PollArgs),

    /// Send one command to a device channel
    Send(SendArgs),

    /// List configured devices or discover Jablotron services
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage the configuration file and stored secrets
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run / Poll / Send ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Only start these devices (repeatable; default: all)
    #[arg(long = "device", short = 'd')]
    pub devices: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PollArgs {
    /// Device id from the config file
    pub device: String,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Device id from the config file
    pub device: String,

    /// Channel name (e.g. statusA, control, volume)
    pub channel: String,

    /// Command: ON, OFF, UP, DOWN, STOP, REFRESH, 0-100, a number or text
    #[arg(allow_hyphen_values = true)]
    pub command: String,

    /// Wait for the confirmation polls and print the resulting channels
    #[arg(long, short = 'w')]
    pub wait: bool,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Log in with this Jablotron device's account and list its services
    #[arg(long, value_name = "DEVICE")]
    pub discover: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the loaded configuration (secrets masked)
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store a device secret in the system keyring
    SetPassword {
        /// Device id from the config file
        device: String,

        /// Which secret to store: password, code or token
        /// (default: the device's login secret)
        #[arg(long)]
        secret: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
