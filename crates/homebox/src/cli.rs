//! Clap derive structures for the `homebox` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homebox -- keep a local view of a Homebox inventory in sync
#[derive(Debug, Parser)]
#[command(
    name = "homebox",
    version,
    about = "Sync and inspect a Homebox inventory from the command line",
    long_about = "Fetches assets and locations from a Homebox server, validates the\n\
        location tree, and reports changes as they happen. Acts as a minimal\n\
        host for the homebox-core update coordinator.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "HOMEBOX_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "HOMEBOX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Homebox server address (overrides profile)
    #[arg(long, short = 's', env = "HOMEBOX_SERVER", global = true)]
    pub server: Option<String>,

    /// Account email (overrides profile)
    #[arg(long, short = 'u', env = "HOMEBOX_USERNAME", global = true)]
    pub username: Option<String>,

    /// Account password
    #[arg(long, env = "HOMEBOX_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Only sync items carrying this label
    #[arg(long, global = true)]
    pub label: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMEBOX_OUTPUT",
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "HOMEBOX_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "HOMEBOX_TIMEOUT", global = true)]
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
    /// Fetch once and summarize the snapshot
    #[command(alias = "snap")]
    Snapshot,

    /// List assets
    #[command(alias = "a")]
    Assets(AssetsArgs),

    /// List locations as a validated tree
    #[command(alias = "loc", alias = "l")]
    Locations,

    /// Re-fetch a single asset
    Refresh(RefreshArgs),

    /// Move an asset to another location
    #[command(name = "move", alias = "mv")]
    Move(MoveArgs),

    /// Keep syncing and print changes until interrupted
    Watch(WatchArgs),

    /// Manage the Homebox webhook used for push refreshes
    Webhook(WebhookArgs),

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Assets ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AssetsArgs {
    /// Only assets directly in this location (id)
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Asset id
    pub asset: String,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Asset id
    pub asset: String,

    /// Destination location id
    pub location: String,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

// ── Webhook ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WebhookArgs {
    #[command(subcommand)]
    pub command: WebhookCommand,
}

#[derive(Debug, Subcommand)]
pub enum WebhookCommand {
    /// Print this profile's webhook id, generating one if needed
    Id {
        /// Persist a newly generated id to the profile
        #[arg(long)]
        save: bool,
    },

    /// Register the webhook URL with Homebox
    Register {
        /// Externally reachable base URL of the host receiving webhooks
        #[arg(long)]
        external_url: Option<String>,
    },
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

    /// Show the effective configuration (passwords redacted)
    Show,

    /// List profiles
    Profiles,

    /// Store a profile's password in the system keyring
    /// (taken from --password, else read from stdin)
    SetPassword,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
