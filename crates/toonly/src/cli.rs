//! Clap derive structures for the `toonly` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use toonly_core::TemperatureState;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// toonly -- control a Toon thermostat from the command line
#[derive(Debug, Parser)]
#[command(
    name = "toonly",
    version,
    about = "Control a Toon thermostat from the command line",
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
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, env = "TOONLY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Agreement (thermostat) to bind before running the command
    #[arg(long, short = 'a', env = "TOONLY_AGREEMENT_ID", global = true)]
    pub agreement: Option<String>,

    /// OAuth access token
    #[arg(long, env = "TOONLY_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub access_token: Option<String>,

    /// OAuth refresh token
    #[arg(long, env = "TOONLY_REFRESH_TOKEN", global = true, hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TOONLY_OUTPUT",
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
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain `key=value` lines (scripting)
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

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the URL to visit to authorize toonly
    AuthorizeUrl {
        /// Opaque value echoed back on the redirect
        #[arg(long)]
        state: Option<String>,
    },

    /// Exchange an authorization code for tokens
    Authorize {
        /// The `code` query parameter from the redirect
        code: String,
    },

    /// Refresh the access token
    Refresh,

    /// List the thermostats available to the account
    #[command(alias = "ls")]
    Agreements,

    /// Show the thermostat status
    #[command(alias = "st")]
    Status,

    /// Set the target temperature
    SetTemp {
        /// Temperature in °C
        #[arg(allow_negative_numbers = true)]
        celsius: f64,
    },

    /// Activate a preset
    SetState {
        #[arg(value_enum)]
        state: PresetArg,
    },

    /// Turn the weekly program on or off
    Program {
        #[arg(value_enum)]
        mode: Toggle,
    },

    /// Poll the thermostat and print events until interrupted
    Watch {
        /// Poll interval in seconds (defaults to the configured interval)
        #[arg(long, short = 'i', value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PresetArg {
    Comfort,
    Home,
    Sleep,
    Away,
}

impl From<PresetArg> for TemperatureState {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Comfort => Self::Comfort,
            PresetArg::Home => Self::Home,
            PresetArg::Sleep => Self::Sleep,
            PresetArg::Away => Self::Away,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
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
    /// Print the effective configuration (secrets masked)
    Show,
}
