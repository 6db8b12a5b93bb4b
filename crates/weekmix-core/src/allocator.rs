//! Constrained pillar allocation.
//!
//! Themes are resolved one at a time. Each theme draws from its own pool minus
//! the pillars earlier themes already took, and a draw is only kept when every
//! theme still waiting can complete its week without reusing a pillar. Draws
//! that would strand a later theme are rejected and redrawn from scratch; once
//! the retry budget is spent a deterministic fallback takes over.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{Catalog, PillarPolicy, ThemeName, ThemePool};
use crate::error::EngineError;
use crate::feasibility::{self, Demand};
use crate::pool::{IndexSource, Pool};
use crate::retry::retry_or_fallback;

/// Where a theme's pillars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PickOrigin {
    Drawn,
    ConfiguredFallback,
    DerivedFallback,
}

/// Per-theme outcome of one allocation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeReport {
    pub theme: ThemeName,
    pub attempts: u32,
    pub origin: PickOrigin,
}

impl ThemeReport {
    pub fn fell_back(&self) -> bool {
        self.origin != PickOrigin::Drawn
    }
}

/// Resolution record for every scheduled theme, in resolution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    pub themes: Vec<ThemeReport>,
}

impl AllocationReport {
    pub fn fallback_count(&self) -> usize {
        self.themes.iter().filter(|report| report.fell_back()).count()
    }

    pub fn fell_back(&self) -> bool {
        self.fallback_count() > 0
    }
}

/// Pillar chosen for every schedule slot, in day order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pillars: Vec<String>,
    report: AllocationReport,
}

impl Allocation {
    pub fn pillar(&self, day_index: usize) -> Option<&str> {
        self.pillars.get(day_index).map(String::as_str)
    }

    pub fn pillars(&self) -> &[String] {
        &self.pillars
    }

    pub fn report(&self) -> &AllocationReport {
        &self.report
    }

    pub fn into_report(self) -> AllocationReport {
        self.report
    }
}

#[derive(Debug, Clone)]
struct Pick {
    /// One pillar per day of the theme, in day order.
    values: Vec<String>,
    origin: PickOrigin,
}

/// Order in which themes are resolved.
///
/// Unique themes with the most slack (pool size minus demand) go first so the
/// tightest themes are protected by the acceptance check of every theme before
/// them; ties keep schedule order. Independent themes come last.
pub fn resolution_order(catalog: &Catalog) -> Vec<&ThemePool> {
    let mut themes = catalog.scheduled_themes();
    themes.sort_by_key(|theme| {
        let independent = theme.policy == PillarPolicy::Independent;
        let slack = theme
            .pillars
            .len()
            .saturating_sub(catalog.demand(&theme.name));
        (independent, Reverse(slack))
    });
    themes
}

/// Assigns one pillar to every scheduled day.
///
/// Within a unique theme no pillar repeats, no pillar is shared between two
/// themes, and every accepted draw leaves the remaining themes satisfiable.
pub fn allocate(
    catalog: &Catalog,
    max_attempts: u32,
    source: &mut dyn IndexSource,
) -> Result<Allocation, EngineError> {
    let order = resolution_order(catalog);
    let mut consumed: HashSet<String> = HashSet::new();
    let mut assigned: Vec<Option<String>> = vec![None; catalog.schedule().len()];
    let mut report = AllocationReport::default();

    for (position, theme) in order.iter().enumerate() {
        let later = &order[position + 1..];
        let days = catalog.days_for(&theme.name);
        let working = theme.pillars.without(consumed.iter().map(String::as_str));

        let retried = retry_or_fallback(
            max_attempts,
            |_| draw_for(theme, &working, days.len(), &mut *source),
            |pick| leaves_remaining_satisfiable(catalog, later, &consumed, &pick.values),
            || fallback_for(catalog, theme, &working, later, &consumed, days.len()),
        )?;

        let Pick { values, origin } = retried.value;
        if retried.fell_back {
            warn!(
                theme = %theme.name,
                attempts = retried.attempts,
                origin = ?origin,
                pillars = ?values,
                "Retry budget exhausted; using fallback pillars"
            );
        } else {
            debug!(
                theme = %theme.name,
                attempts = retried.attempts,
                pillars = ?values,
                "Accepted pillar draw"
            );
        }

        for (day, value) in days.iter().zip(&values) {
            assigned[*day] = Some(value.clone());
        }
        consumed.extend(values);
        report.themes.push(ThemeReport {
            theme: theme.name.clone(),
            attempts: retried.attempts,
            origin,
        });
    }

    let pillars = assigned
        .into_iter()
        .zip(catalog.schedule())
        .map(|(pillar, slot)| pillar.ok_or_else(|| EngineError::Unsatisfiable(slot.theme.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Allocation { pillars, report })
}

fn draw_for(
    theme: &ThemePool,
    working: &Pool,
    days: usize,
    source: &mut dyn IndexSource,
) -> Result<Pick, EngineError> {
    let values = match theme.policy {
        PillarPolicy::Unique => {
            working
                .draw_many(days, source)
                .map_err(EngineError::empty_pool(&theme.name))?
                .0
        }
        PillarPolicy::Independent => (0..days)
            .map(|_| working.sample_one(source))
            .collect::<Result<Vec<_>, _>>()
            .map_err(EngineError::empty_pool(&theme.name))?,
    };
    Ok(Pick {
        values,
        origin: PickOrigin::Drawn,
    })
}

fn leaves_remaining_satisfiable(
    catalog: &Catalog,
    later: &[&ThemePool],
    consumed: &HashSet<String>,
    picked: &[String],
) -> bool {
    if later.is_empty() {
        return true;
    }
    let mut taken = consumed.clone();
    taken.extend(picked.iter().cloned());
    let demands: Vec<Demand<'_>> = later.iter().map(|theme| catalog.demand_of(theme)).collect();
    feasibility::is_satisfiable(&demands, &taken)
}

fn fallback_for(
    catalog: &Catalog,
    theme: &ThemePool,
    working: &Pool,
    later: &[&ThemePool],
    consumed: &HashSet<String>,
    days: usize,
) -> Result<Pick, EngineError> {
    let configured = &theme.fallback;
    if !configured.is_empty()
        && configured.iter().all(|value| working.contains(value))
        && leaves_remaining_satisfiable(catalog, later, consumed, configured)
    {
        return Ok(Pick {
            values: configured.clone(),
            origin: PickOrigin::ConfiguredFallback,
        });
    }
    if !configured.is_empty() {
        warn!(
            theme = %theme.name,
            "Configured fallback pillars are unavailable this week; deriving a replacement"
        );
    }

    let demands: Vec<Demand<'_>> = std::iter::once(theme)
        .chain(later.iter().copied())
        .map(|pending| catalog.demand_of(pending))
        .collect();
    let mut assignment = feasibility::complete_assignment(&demands, consumed)
        .ok_or_else(|| EngineError::Unsatisfiable(theme.name.clone()))?;
    let own = assignment.swap_remove(0);

    let values = match theme.policy {
        PillarPolicy::Unique => own,
        PillarPolicy::Independent => {
            let value = own
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::Unsatisfiable(theme.name.clone()))?;
            vec![value; days]
        }
    };

    Ok(Pick {
        values,
        origin: PickOrigin::DerivedFallback,
    })
}
