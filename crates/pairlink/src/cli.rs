//! Clap derive structures for the `pairlink` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pairlink -- pair, watch and unlink the messaging bridge
#[derive(Debug, Parser)]
#[command(
    name = "pairlink",
    version,
    about = "Pair and unlink the QR-paired messaging bridge",
    long_about = "Keeps track of the messaging bridge's linked account.\n\n\
        Shows the pairing code to scan, waits until the bridge reports a\n\
        session, and drives the unlink procedure when the account changes.",
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
    /// Bridge profile to use
    #[arg(long, short = 'p', env = "PAIRLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bridge gateway URL (overrides profile)
    #[arg(long, short = 'b', env = "PAIRLINK_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Admin key for privileged bridge endpoints
    #[arg(long, env = "PAIRLINK_ADMIN_KEY", global = true, hide_env = true)]
    pub admin_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PAIRLINK_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "PAIRLINK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "PAIRLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default, interactive)
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
    /// Show whether the bridge holds a linked session
    #[command(alias = "st")]
    Status,

    /// Show the pairing code and wait until it is scanned
    Pair(PairArgs),

    /// Unlink the current account and show a fresh pairing code
    Unlink(UnlinkArgs),

    /// Close the bridge socket but keep its credentials
    CloseSession,

    /// Send an appointment confirmation through the bridge
    Notify(NotifyArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Pairing ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Give up if nobody scans within this long (e.g. "90s", "5m")
    #[arg(long)]
    pub max_wait: Option<humantime::Duration>,
}

#[derive(Debug, Args)]
pub struct UnlinkArgs {
    /// Keep waiting until the new pairing code is scanned
    #[arg(long, short = 'w')]
    pub wait: bool,

    /// With --wait, give up if nobody scans within this long
    #[arg(long, requires = "wait")]
    pub max_wait: Option<humantime::Duration>,
}

// ── Notifications ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NotifyArgs {
    /// Destination number, country prefix included (e.g. 56912345678)
    #[arg(long, short = 'n')]
    pub number: String,

    /// Owner's name
    #[arg(long)]
    pub name: String,

    /// Patient name(s)
    #[arg(long)]
    pub patient: String,

    /// Appointment date as shown to the owner
    #[arg(long)]
    pub date: String,

    /// Appointment time
    #[arg(long)]
    pub time: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g., "bridge", "poll_interval_ms")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the active profile's admin key in the system keyring
    SetKey,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
