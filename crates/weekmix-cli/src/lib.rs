//! Command handlers behind the `weekmix` binary.

pub mod cli_args;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::warn;
use weekmix_core::render::{diff_calendars, render_calendar};
use weekmix_core::{
    CalendarStore, ConfigSource, ContentClient, Engine, FileConfig, GenerationOutcome, RngSource,
    WeeklyCalendar, load_config, save_config,
};

pub use cli_args::{
    CheckArgs, Cli, Command, ConfigCommand, ContentArgs, GenerateArgs, ShowArgs,
};

/// Runs one CLI invocation, writing command output to `out`.
///
/// Non-fatal configuration warnings go to stderr.
pub async fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let load = load_config(cli.config.as_deref());
    for warning in &load.warnings {
        eprintln!("Warning: {warning}");
    }
    let config = load.config;

    match cli.command {
        Command::Generate(args) => generate(&config, &args, out),
        Command::Show(args) => show(&config, &args, out),
        Command::Content(args) => content(&config, &args, out).await,
        Command::Check(args) => check(&config, &args, out),
        Command::Config(command) => config_command(command, &load.path, load.source, &config, out),
    }
}

fn generate(config: &FileConfig, args: &GenerateArgs, out: &mut dyn Write) -> Result<()> {
    let settings = args.engine_settings(config.engine);
    let engine = Engine::new(config.catalog()?, settings);
    let store = CalendarStore::new(config.storage.calendar_path());

    let previous = if args.diff {
        store.load().unwrap_or_else(|err| {
            warn!(error = %err, "Ignoring unreadable stored calendar for diff");
            None
        })
    } else {
        None
    };

    let outcome = engine.generate()?;
    report_fallbacks(&outcome);

    if args.json {
        print_json(&outcome.calendar, out)?;
    } else {
        write!(out, "{}", render_calendar(&outcome.calendar))?;
    }
    if args.diff {
        match previous {
            Some(previous) => {
                writeln!(out)?;
                diff_calendars(out, &previous, &outcome.calendar)?;
            }
            None => writeln!(out, "\nNo previous calendar to compare against.")?,
        }
    }

    if !args.no_save {
        store
            .save(&outcome.calendar)
            .with_context(|| format!("Failed to save calendar to {}", store.path().display()))?;
        if !args.json {
            writeln!(out, "\nSaved calendar to {}", store.path().display())?;
        }
    }
    Ok(())
}

fn show(config: &FileConfig, args: &ShowArgs, out: &mut dyn Write) -> Result<()> {
    let engine = Engine::from_config(config)?;
    let store = CalendarStore::new(config.storage.calendar_path());
    let stored = match store.load() {
        Ok(stored) => stored,
        Err(err) => {
            eprintln!("Warning: {err}. Generating a new calendar.");
            None
        }
    };

    // A calendar saved under an older configuration may no longer fit it.
    let stored = stored.filter(|calendar| {
        let violations = calendar.violations(engine.catalog());
        if violations.is_empty() {
            return true;
        }
        warn!(count = violations.len(), "Stored calendar no longer matches the configuration");
        eprintln!("Warning: the stored calendar does not match the current configuration:");
        for violation in &violations {
            eprintln!("  - {violation}");
        }
        eprintln!("Generating a new calendar.");
        false
    });

    let calendar = match stored {
        Some(calendar) => calendar,
        None => {
            let outcome = engine.generate()?;
            report_fallbacks(&outcome);
            store
                .save(&outcome.calendar)
                .with_context(|| format!("Failed to save calendar to {}", store.path().display()))?;
            outcome.calendar
        }
    };

    if args.json {
        print_json(&calendar, out)
    } else {
        write!(out, "{}", render_calendar(&calendar))?;
        Ok(())
    }
}

async fn content(config: &FileConfig, args: &ContentArgs, out: &mut dyn Write) -> Result<()> {
    let store = CalendarStore::new(config.storage.calendar_path());
    let calendar = store
        .load()
        .context("Failed to read the stored calendar")?
        .ok_or_else(|| anyhow!("No stored calendar. Run `weekmix generate` first."))?;
    let Some(day) = calendar.day(&args.day) else {
        let known: Vec<&str> = calendar.iter().map(|entry| entry.day.as_str()).collect();
        bail!(
            "No day named '{}' in the stored calendar (expected one of: {})",
            args.day,
            known.join(", ")
        );
    };

    let client = ContentClient::new(&config.content)?;
    let post = client.generate(day).await.with_context(|| {
        format!(
            "Content generation for {} failed; the calendar is unchanged. Retry with `weekmix content {}`",
            day.day, day.day
        )
    })?;

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&post)?)?;
        return Ok(());
    }
    writeln!(out, "{} | {} | {} | {}", day.day, day.theme, day.pillar, day.format)?;
    writeln!(out, "\nCaption:\n{}", post.caption)?;
    writeln!(out, "\nVisual direction:\n{}", post.visual_description)?;
    if !post.hashtags.is_empty() {
        writeln!(out, "\n{}", post.hashtags.join(" "))?;
    }
    Ok(())
}

/// Summary of a `check` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    pub trials: u32,
    pub failures: u32,
    pub invalid_calendars: u32,
    pub fallbacks: BTreeMap<String, u32>,
}

impl CheckSummary {
    pub fn passed(&self) -> bool {
        self.failures == 0 && self.invalid_calendars == 0
    }
}

/// Generates `trials` calendars and tallies failures, rule violations and fallbacks.
pub fn run_trials(engine: &Engine, trials: u32, seed: Option<u64>) -> CheckSummary {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut summary = CheckSummary {
        trials,
        ..CheckSummary::default()
    };

    for trial in 0..trials {
        match engine.generate_with(RngSource::new(&mut rng)) {
            Ok(outcome) => {
                let violations = outcome.calendar.violations(engine.catalog());
                if !violations.is_empty() {
                    warn!(trial, ?violations, "Generated calendar breaks a rule");
                    summary.invalid_calendars += 1;
                }
                for theme in outcome.report.themes.iter().filter(|theme| theme.fell_back()) {
                    *summary
                        .fallbacks
                        .entry(theme.theme.to_string())
                        .or_default() += 1;
                }
            }
            Err(err) => {
                warn!(trial, error = %err, "Generation failed");
                summary.failures += 1;
            }
        }
    }
    summary
}

fn check(config: &FileConfig, args: &CheckArgs, out: &mut dyn Write) -> Result<()> {
    let engine = Engine::from_config(config)?;
    let summary = run_trials(&engine, args.trials, args.seed);

    writeln!(out, "Trials:            {}", summary.trials)?;
    writeln!(out, "Failed runs:       {}", summary.failures)?;
    writeln!(out, "Invalid calendars: {}", summary.invalid_calendars)?;
    if summary.fallbacks.is_empty() {
        writeln!(out, "Fallbacks:         none")?;
    } else {
        writeln!(out, "Fallbacks:")?;
        for (theme, count) in &summary.fallbacks {
            writeln!(out, "  {theme}: {count}")?;
        }
    }

    if !summary.passed() {
        bail!(
            "{} of {} trials failed or broke a calendar rule",
            summary.failures + summary.invalid_calendars,
            summary.trials
        );
    }
    Ok(())
}

fn config_command(
    command: ConfigCommand,
    path: &Path,
    source: ConfigSource,
    config: &FileConfig,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        ConfigCommand::Path => {
            let state = match source {
                ConfigSource::File => "",
                ConfigSource::Default => " (not in use; defaults apply)",
            };
            writeln!(out, "{}{state}", path.display())?;
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists. Pass --force to overwrite it.",
                    path.display()
                );
            }
            let written = save_config(&FileConfig::default(), Some(path))?;
            writeln!(out, "Wrote default configuration to {}", written.display())?;
        }
        ConfigCommand::Show => {
            write!(out, "{}", toml::to_string_pretty(config)?)?;
        }
    }
    Ok(())
}

fn report_fallbacks(outcome: &GenerationOutcome) {
    for theme in outcome.report.themes.iter().filter(|theme| theme.fell_back()) {
        eprintln!(
            "Warning: theme '{}' used fallback pillars after {} attempts.",
            theme.theme, theme.attempts
        );
    }
}

fn print_json(calendar: &WeeklyCalendar, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(calendar)?)?;
    Ok(())
}
