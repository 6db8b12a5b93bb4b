use std::fmt;

use thiserror::Error;

use crate::catalog::ThemeName;
use crate::pool::EmptyPoolError;

/// Which of a theme's three pools an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Pillar,
    Engagement,
    Format,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PoolKind::Pillar => "pillar",
            PoolKind::Engagement => "engagement",
            PoolKind::Format => "format",
        };
        f.write_str(label)
    }
}

/// Theme or schedule configuration that cannot produce a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("schedule must cover exactly {expected} days, found {found}")]
    ScheduleLength { expected: usize, found: usize },
    #[error("day '{0}' appears more than once in the schedule")]
    DuplicateDay(String),
    #[error("theme '{0}' is defined more than once")]
    DuplicateTheme(ThemeName),
    #[error("{day} uses unknown theme '{theme}'{}", did_you_mean(.suggestion))]
    UnknownTheme {
        day: String,
        theme: ThemeName,
        suggestion: Option<ThemeName>,
    },
    #[error("theme '{theme}' has an empty {pool} pool")]
    EmptyPool { theme: ThemeName, pool: PoolKind },
    #[error("theme '{theme}' has a blank value in its {pool} pool")]
    BlankValue { theme: ThemeName, pool: PoolKind },
    #[error("theme '{theme}' lists pillar '{value}' more than once")]
    DuplicatePillar { theme: ThemeName, value: String },
    #[error(
        "theme '{theme}' needs {demand} distinct pillars but its pool only holds {available}"
    )]
    InsufficientPillars {
        theme: ThemeName,
        demand: usize,
        available: usize,
    },
    #[error("fallback for theme '{theme}' is invalid: {reason}")]
    InvalidFallback { theme: ThemeName, reason: String },
    #[error("no pillar assignment keeps every theme unique; the pools overlap too heavily")]
    Unsatisfiable,
}

fn did_you_mean(suggestion: &Option<ThemeName>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{name}'?)"),
        None => String::new(),
    }
}

/// Failures surfaced by calendar generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    /// A draw hit an exhausted pool although the allocator guaranteed supply.
    #[error("pool for theme '{theme}' ran dry during allocation: {source}")]
    EmptyPool {
        theme: ThemeName,
        #[source]
        source: EmptyPoolError,
    },
    /// No constraint-satisfying completion was left for a theme.
    #[error("no constraint-satisfying pillars remain for theme '{0}'")]
    Unsatisfiable(ThemeName),
}

impl EngineError {
    pub(crate) fn empty_pool(theme: &ThemeName) -> impl FnOnce(EmptyPoolError) -> Self {
        move |source| EngineError::EmptyPool {
            theme: theme.clone(),
            source,
        }
    }
}
