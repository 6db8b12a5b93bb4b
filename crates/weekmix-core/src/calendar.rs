//! Weekly calendar records and the assembler that builds them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allocator::Allocation;
use crate::catalog::{Catalog, PillarPolicy, ThemeName};
use crate::error::EngineError;
use crate::pool::IndexSource;

/// One calendar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDay {
    /// Unique per generation so renderers can tell regenerated days apart.
    pub id: Uuid,
    pub day: String,
    pub theme: ThemeName,
    pub pillar: String,
    pub engagement: String,
    pub format: String,
}

impl GeneratedDay {
    /// Compares every field except the identifier.
    pub fn plan_eq(&self, other: &GeneratedDay) -> bool {
        self.day == other.day
            && self.theme == other.theme
            && self.pillar == other.pillar
            && self.engagement == other.engagement
            && self.format == other.format
    }
}

/// Ordered week of generated days, in schedule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyCalendar {
    days: Vec<GeneratedDay>,
}

impl WeeklyCalendar {
    pub fn new(days: Vec<GeneratedDay>) -> Self {
        Self { days }
    }

    pub fn days(&self) -> &[GeneratedDay] {
        &self.days
    }

    pub fn into_days(self) -> Vec<GeneratedDay> {
        self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeneratedDay> {
        self.days.iter()
    }

    /// Looks a day up by name, ignoring case and surrounding whitespace.
    pub fn day(&self, name: &str) -> Option<&GeneratedDay> {
        let wanted = name.trim();
        self.days
            .iter()
            .find(|entry| entry.day.eq_ignore_ascii_case(wanted))
    }

    pub fn plan_eq(&self, other: &WeeklyCalendar) -> bool {
        self.days.len() == other.days.len()
            && self
                .days
                .iter()
                .zip(&other.days)
                .all(|(left, right)| left.plan_eq(right))
    }

    /// Checks the calendar against the schedule and pool rules of `catalog`.
    pub fn violations(&self, catalog: &Catalog) -> Vec<Violation> {
        let mut found = Vec::new();
        let schedule = catalog.schedule();

        if self.days.len() != schedule.len() {
            found.push(Violation::WrongLength {
                expected: schedule.len(),
                found: self.days.len(),
            });
        }

        for (entry, slot) in self.days.iter().zip(schedule) {
            if entry.day != slot.day || entry.theme != slot.theme {
                found.push(Violation::OutOfOrder {
                    expected: slot.day.clone(),
                    found: entry.day.clone(),
                });
                continue;
            }
            let Some(theme) = catalog.theme(&entry.theme) else {
                continue;
            };
            let in_pools = theme.pillars.contains(&entry.pillar)
                && theme.engagements.contains(&entry.engagement)
                && theme.formats.contains(&entry.format);
            if !in_pools {
                found.push(Violation::ForeignValue {
                    day: entry.day.clone(),
                });
            }
        }

        let mut seen_in_theme: HashSet<(&ThemeName, &str)> = HashSet::new();
        let mut owner: HashMap<&str, &ThemeName> = HashMap::new();
        for entry in &self.days {
            let unique = catalog
                .theme(&entry.theme)
                .is_none_or(|theme| theme.policy == PillarPolicy::Unique);
            if unique && !seen_in_theme.insert((&entry.theme, entry.pillar.as_str())) {
                found.push(Violation::RepeatedPillar {
                    theme: entry.theme.clone(),
                    pillar: entry.pillar.clone(),
                });
            }
            let first = *owner.entry(entry.pillar.as_str()).or_insert(&entry.theme);
            if first != &entry.theme {
                found.push(Violation::SharedAcrossThemes {
                    pillar: entry.pillar.clone(),
                    themes: (first.clone(), entry.theme.clone()),
                });
            }
        }

        found
    }
}

impl<'a> IntoIterator for &'a WeeklyCalendar {
    type Item = &'a GeneratedDay;
    type IntoIter = std::slice::Iter<'a, GeneratedDay>;

    fn into_iter(self) -> Self::IntoIter {
        self.days.iter()
    }
}

/// A broken calendar rule found by [`WeeklyCalendar::violations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    WrongLength { expected: usize, found: usize },
    OutOfOrder { expected: String, found: String },
    ForeignValue { day: String },
    RepeatedPillar { theme: ThemeName, pillar: String },
    SharedAcrossThemes {
        pillar: String,
        themes: (ThemeName, ThemeName),
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::WrongLength { expected, found } => {
                write!(f, "expected {expected} days, found {found}")
            }
            Violation::OutOfOrder { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Violation::ForeignValue { day } => {
                write!(f, "{day} uses a value outside its theme's pools")
            }
            Violation::RepeatedPillar { theme, pillar } => {
                write!(f, "pillar '{pillar}' repeats within theme '{theme}'")
            }
            Violation::SharedAcrossThemes { pillar, themes } => write!(
                f,
                "pillar '{pillar}' is used by both '{}' and '{}'",
                themes.0, themes.1
            ),
        }
    }
}

/// Builds the week from allocated pillars plus independently sampled
/// engagement endings and formats.
pub fn assemble(
    catalog: &Catalog,
    allocation: &Allocation,
    source: &mut dyn IndexSource,
) -> Result<WeeklyCalendar, EngineError> {
    let mut days = Vec::with_capacity(catalog.schedule().len());

    for (index, slot) in catalog.schedule().iter().enumerate() {
        let theme = catalog
            .theme(&slot.theme)
            .ok_or_else(|| EngineError::Unsatisfiable(slot.theme.clone()))?;
        let pillar = allocation
            .pillar(index)
            .ok_or_else(|| EngineError::Unsatisfiable(slot.theme.clone()))?;
        let engagement = theme
            .engagements
            .sample_one(source)
            .map_err(EngineError::empty_pool(&theme.name))?;
        let format = theme
            .formats
            .sample_one(source)
            .map_err(EngineError::empty_pool(&theme.name))?;

        days.push(GeneratedDay {
            id: Uuid::new_v4(),
            day: slot.day.clone(),
            theme: slot.theme.clone(),
            pillar: pillar.to_string(),
            engagement,
            format,
        });
    }

    Ok(WeeklyCalendar::new(days))
}
