use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use weekmix_core::EngineSettings;

/// Top-level CLI entrypoint.
#[derive(Parser, Debug, Clone)]
#[command(name = "weekmix", version, about, long_about = None)]
pub struct Cli {
    /// Use this config.toml instead of the default location.
    #[arg(long, global = true, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless WEEKMIX_LOG or RUST_LOG say otherwise.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Supported subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate a new week, print it, and store it.
    #[command(alias = "gen")]
    Generate(GenerateArgs),
    /// Print the stored week, generating one if none is usable.
    Show(ShowArgs),
    /// Request caption, visual direction and hashtags for one stored day.
    Content(ContentArgs),
    /// Run many generations and verify every calendar rule.
    Check(CheckArgs),
    /// Inspect or initialize the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Clone, Args, Default)]
pub struct GenerateArgs {
    /// Seed for a reproducible plan.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Rejection-sampling attempts per theme before falling back.
    #[arg(long = "max-attempts", value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Print without replacing the stored calendar.
    #[arg(long = "no-save", action = ArgAction::SetTrue)]
    pub no_save: bool,

    /// Print the calendar as JSON.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Show a diff against the previously stored calendar.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "json")]
    pub diff: bool,
}

impl GenerateArgs {
    /// Layers the command line flags over the configured engine settings.
    pub fn engine_settings(&self, configured: EngineSettings) -> EngineSettings {
        EngineSettings {
            max_attempts: self.max_attempts.unwrap_or(configured.max_attempts),
            seed: self.seed.or(configured.seed),
        }
    }
}

#[derive(Debug, Clone, Args, Default)]
pub struct ShowArgs {
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ContentArgs {
    /// Day name as it appears in the calendar (case-insensitive).
    pub day: String,

    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Number of calendars to generate.
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u32).range(1..))]
    pub trials: u32,

    /// Seed the trial run for a repeatable report.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file location.
    Path,
    /// Write the default configuration.
    Init {
        /// Overwrite an existing file.
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Print the effective configuration as TOML.
    Show,
}
