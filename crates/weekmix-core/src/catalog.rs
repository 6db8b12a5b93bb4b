//! Validated theme pools and the weekly day/theme schedule.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::error::{ConfigurationError, PoolKind};
use crate::feasibility::{self, Demand};
use crate::pool::Pool;

/// Days in one generated calendar.
pub const WEEK_LENGTH: usize = 7;

const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Name of a configured theme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeName(String);

impl ThemeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThemeName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ThemeName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How a theme's pillars are chosen across its days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PillarPolicy {
    /// Every day of the theme gets a different pillar.
    #[default]
    Unique,
    /// Each day samples independently; repeats within the theme are allowed.
    Independent,
}

/// Attribute pools for one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePool {
    pub name: ThemeName,
    /// Messaging pillars.
    pub pillars: Pool,
    /// Engagement endings, sampled with replacement.
    pub engagements: Pool,
    /// Post formats, sampled with replacement.
    pub formats: Pool,
    #[serde(default)]
    pub policy: PillarPolicy,
    /// Pillars used, in day order, when rejection sampling runs out of attempts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<String>,
}

impl ThemePool {
    pub fn new(
        name: impl Into<ThemeName>,
        pillars: impl Into<Pool>,
        engagements: impl Into<Pool>,
        formats: impl Into<Pool>,
    ) -> Self {
        Self {
            name: name.into(),
            pillars: pillars.into(),
            engagements: engagements.into(),
            formats: formats.into(),
            policy: PillarPolicy::Unique,
            fallback: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: PillarPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fallback<I, S>(mut self, fallback: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback = fallback.into_iter().map(Into::into).collect();
        self
    }
}

/// One entry of the weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlot {
    pub day: String,
    pub theme: ThemeName,
}

impl DaySlot {
    pub fn new(day: impl Into<String>, theme: impl Into<ThemeName>) -> Self {
        Self {
            day: day.into(),
            theme: theme.into(),
        }
    }
}

/// Theme pools and schedule that passed validation.
///
/// Every scheduled theme exists, has non-empty pools without duplicate
/// pillars, and at least one complete constraint-satisfying pillar assignment
/// exists for the whole week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    themes: Vec<ThemePool>,
    schedule: Vec<DaySlot>,
}

impl Catalog {
    pub fn new(
        themes: Vec<ThemePool>,
        schedule: Vec<DaySlot>,
    ) -> Result<Self, ConfigurationError> {
        let catalog = Self { themes, schedule };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn themes(&self) -> &[ThemePool] {
        &self.themes
    }

    pub fn schedule(&self) -> &[DaySlot] {
        &self.schedule
    }

    pub fn theme(&self, name: &ThemeName) -> Option<&ThemePool> {
        self.themes.iter().find(|theme| &theme.name == name)
    }

    /// Number of scheduled days using `name`.
    pub fn demand(&self, name: &ThemeName) -> usize {
        self.schedule
            .iter()
            .filter(|slot| &slot.theme == name)
            .count()
    }

    /// Schedule indices of the days using `name`, in day order.
    pub fn days_for(&self, name: &ThemeName) -> Vec<usize> {
        self.schedule
            .iter()
            .enumerate()
            .filter(|(_, slot)| &slot.theme == name)
            .map(|(index, _)| index)
            .collect()
    }

    /// Scheduled themes in order of first appearance.
    pub fn scheduled_themes(&self) -> Vec<&ThemePool> {
        let mut seen = HashSet::new();
        self.schedule
            .iter()
            .filter(|slot| seen.insert(&slot.theme))
            .filter_map(|slot| self.theme(&slot.theme))
            .collect()
    }

    /// Pillars configured in more than one theme's pool.
    pub fn shared_pillars(&self) -> BTreeSet<String> {
        let mut owners: HashMap<&str, HashSet<&ThemeName>> = HashMap::new();
        for theme in &self.themes {
            for pillar in theme.pillars.values() {
                owners.entry(pillar.as_str()).or_default().insert(&theme.name);
            }
        }
        owners
            .into_iter()
            .filter(|(_, themes)| themes.len() > 1)
            .map(|(pillar, _)| pillar.to_string())
            .collect()
    }

    /// Outstanding matching demand for a theme that has not been resolved yet.
    pub(crate) fn demand_of<'a>(&self, theme: &'a ThemePool) -> Demand<'a> {
        let days = self.demand(&theme.name);
        let slots = match theme.policy {
            PillarPolicy::Unique => days,
            PillarPolicy::Independent => days.min(1),
        };
        Demand::new(theme.pillars.values(), slots)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.schedule.len() != WEEK_LENGTH {
            return Err(ConfigurationError::ScheduleLength {
                expected: WEEK_LENGTH,
                found: self.schedule.len(),
            });
        }

        let mut days = HashSet::new();
        for slot in &self.schedule {
            if !days.insert(slot.day.trim().to_ascii_lowercase()) {
                return Err(ConfigurationError::DuplicateDay(slot.day.clone()));
            }
        }

        let mut names = HashSet::new();
        for theme in &self.themes {
            if !names.insert(&theme.name) {
                return Err(ConfigurationError::DuplicateTheme(theme.name.clone()));
            }
        }

        for slot in &self.schedule {
            if self.theme(&slot.theme).is_none() {
                return Err(ConfigurationError::UnknownTheme {
                    day: slot.day.clone(),
                    theme: slot.theme.clone(),
                    suggestion: self.closest_theme(&slot.theme),
                });
            }
        }

        for theme in self.scheduled_themes() {
            validate_theme(theme, self.demand(&theme.name))?;
        }

        let demands: Vec<Demand<'_>> = self
            .scheduled_themes()
            .into_iter()
            .map(|theme| self.demand_of(theme))
            .collect();
        if !feasibility::is_satisfiable(&demands, &HashSet::new()) {
            return Err(ConfigurationError::Unsatisfiable);
        }

        Ok(())
    }

    fn closest_theme(&self, unknown: &ThemeName) -> Option<ThemeName> {
        let target = unknown.as_str().to_ascii_lowercase();
        self.themes
            .iter()
            .map(|theme| {
                let score = jaro_winkler(&target, &theme.name.as_str().to_ascii_lowercase());
                (score, &theme.name)
            })
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name.clone())
    }
}

fn validate_theme(theme: &ThemePool, demand: usize) -> Result<(), ConfigurationError> {
    for (pool, kind) in [
        (&theme.pillars, PoolKind::Pillar),
        (&theme.engagements, PoolKind::Engagement),
        (&theme.formats, PoolKind::Format),
    ] {
        if pool.is_empty() {
            return Err(ConfigurationError::EmptyPool {
                theme: theme.name.clone(),
                pool: kind,
            });
        }
        if pool.values().iter().any(|value| value.trim().is_empty()) {
            return Err(ConfigurationError::BlankValue {
                theme: theme.name.clone(),
                pool: kind,
            });
        }
    }

    let mut seen = HashSet::new();
    for pillar in theme.pillars.values() {
        if !seen.insert(pillar.as_str()) {
            return Err(ConfigurationError::DuplicatePillar {
                theme: theme.name.clone(),
                value: pillar.clone(),
            });
        }
    }

    if theme.policy == PillarPolicy::Unique && theme.pillars.len() < demand {
        return Err(ConfigurationError::InsufficientPillars {
            theme: theme.name.clone(),
            demand,
            available: theme.pillars.len(),
        });
    }

    if theme.fallback.is_empty() {
        return Ok(());
    }

    let invalid = |reason: String| ConfigurationError::InvalidFallback {
        theme: theme.name.clone(),
        reason,
    };
    if theme.fallback.len() != demand {
        return Err(invalid(format!(
            "expected {demand} pillars, found {}",
            theme.fallback.len()
        )));
    }
    if let Some(stray) = theme
        .fallback
        .iter()
        .find(|value| !theme.pillars.contains(value))
    {
        return Err(invalid(format!("'{stray}' is not one of the theme's pillars")));
    }
    if theme.policy == PillarPolicy::Unique {
        let distinct: HashSet<_> = theme.fallback.iter().collect();
        if distinct.len() != theme.fallback.len() {
            return Err(invalid("pillars must be distinct".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAYS: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];

    fn schedule(themes: [&str; 7]) -> Vec<DaySlot> {
        DAYS.iter()
            .zip(themes)
            .map(|(day, theme)| DaySlot::new(*day, theme))
            .collect()
    }

    fn abc_themes() -> Vec<ThemePool> {
        vec![
            ThemePool::new(
                "A",
                Pool::new(["a1", "a2", "a3", "a4", "a5"]),
                Pool::new(["e1"]),
                Pool::new(["Reel"]),
            ),
            ThemePool::new(
                "B",
                Pool::new(["b1", "b2", "s1", "s2"]),
                Pool::new(["e2"]),
                Pool::new(["Reel"]),
            ),
            ThemePool::new(
                "C",
                Pool::new(["s1", "s2", "c1", "c2"]),
                Pool::new(["e3"]),
                Pool::new(["Carousel"]),
            ),
        ]
    }

    fn abc_schedule() -> Vec<DaySlot> {
        schedule(["A", "B", "A", "B", "C", "C", "C"])
    }

    #[test]
    fn reference_shape_validates() {
        let catalog = Catalog::new(abc_themes(), abc_schedule()).unwrap();
        assert_eq!(catalog.demand(&"A".into()), 2);
        assert_eq!(catalog.demand(&"C".into()), 3);
        assert_eq!(catalog.days_for(&"B".into()), vec![1, 3]);
        let order: Vec<_> = catalog
            .scheduled_themes()
            .iter()
            .map(|theme| theme.name.as_str())
            .collect();
        assert_eq!(order, ["A", "B", "C"]);
    }

    #[test]
    fn shared_pillars_are_derived_from_pools() {
        let catalog = Catalog::new(abc_themes(), abc_schedule()).unwrap();
        let shared: Vec<_> = catalog.shared_pillars().into_iter().collect();
        assert_eq!(shared, ["s1", "s2"]);
    }

    #[test]
    fn shared_pillars_follow_pool_changes() {
        let mut themes = abc_themes();
        themes[0].pillars = Pool::new(["a1", "a2", "c1"]);
        let catalog = Catalog::new(themes, abc_schedule()).unwrap();
        let shared: Vec<_> = catalog.shared_pillars().into_iter().collect();
        assert_eq!(shared, ["c1", "s1", "s2"]);
    }

    #[test]
    fn schedule_must_cover_a_week() {
        let mut days = abc_schedule();
        days.pop();
        assert_eq!(
            Catalog::new(abc_themes(), days),
            Err(ConfigurationError::ScheduleLength {
                expected: 7,
                found: 6
            })
        );
    }

    #[test]
    fn duplicate_days_are_rejected() {
        let mut days = abc_schedule();
        days[6].day = "monday".to_string();
        assert_eq!(
            Catalog::new(abc_themes(), days),
            Err(ConfigurationError::DuplicateDay("monday".to_string()))
        );
    }

    #[test]
    fn unknown_theme_suggests_close_match() {
        let days = schedule([
            "A",
            "B",
            "A",
            "B",
            "Connection",
            "Connection",
            "Connection",
        ]);
        let mut themes = abc_themes();
        themes[2].name = "Conection".into();
        let err = Catalog::new(themes, days).unwrap_err();
        match err {
            ConfigurationError::UnknownTheme {
                day, suggestion, ..
            } => {
                assert_eq!(day, "Friday");
                assert_eq!(suggestion, Some("Conection".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_secondary_pool_is_a_configuration_error() {
        let mut themes = abc_themes();
        themes[1].formats = Pool::default();
        assert_eq!(
            Catalog::new(themes, abc_schedule()),
            Err(ConfigurationError::EmptyPool {
                theme: "B".into(),
                pool: PoolKind::Format
            })
        );
    }

    #[test]
    fn blank_pool_values_are_rejected() {
        let mut themes = abc_themes();
        themes[0].pillars = Pool::new(["a1", "", "a2"]);
        assert_eq!(
            Catalog::new(themes, abc_schedule()),
            Err(ConfigurationError::BlankValue {
                theme: "A".into(),
                pool: PoolKind::Pillar
            })
        );

        let mut themes = abc_themes();
        themes[1].engagements = Pool::new([""]);
        assert_eq!(
            Catalog::new(themes, abc_schedule()),
            Err(ConfigurationError::BlankValue {
                theme: "B".into(),
                pool: PoolKind::Engagement
            })
        );

        let mut themes = abc_themes();
        themes[2].formats = Pool::new(["Reel", " "]);
        assert_eq!(
            Catalog::new(themes, abc_schedule()),
            Err(ConfigurationError::BlankValue {
                theme: "C".into(),
                pool: PoolKind::Format
            })
        );
    }

    #[test]
    fn pool_smaller_than_demand_is_rejected() {
        let mut themes = abc_themes();
        themes[2].pillars = Pool::new(["c1", "c2"]);
        assert_eq!(
            Catalog::new(themes, abc_schedule()),
            Err(ConfigurationError::InsufficientPillars {
                theme: "C".into(),
                demand: 3,
                available: 2
            })
        );
    }

    #[test]
    fn independent_theme_tolerates_a_small_pool() {
        let mut themes = abc_themes();
        themes[2].pillars = Pool::new(["c1"]);
        themes[2].policy = PillarPolicy::Independent;
        assert!(Catalog::new(themes, abc_schedule()).is_ok());
    }

    #[test]
    fn duplicate_pillars_are_rejected() {
        let mut themes = abc_themes();
        themes[0].pillars = Pool::new(["a1", "a1", "a2"]);
        assert!(matches!(
            Catalog::new(themes, abc_schedule()),
            Err(ConfigurationError::DuplicatePillar { .. })
        ));
    }

    #[test]
    fn overlapping_pools_without_enough_supply_are_unsatisfiable() {
        let mut themes = abc_themes();
        themes[1].pillars = Pool::new(["s1", "s2"]);
        themes[2].pillars = Pool::new(["s1", "s2", "c1"]);
        assert_eq!(
            Catalog::new(themes, abc_schedule()),
            Err(ConfigurationError::Unsatisfiable)
        );
    }

    #[test]
    fn fallback_must_match_demand_and_pool() {
        let mut themes = abc_themes();
        themes[1] = themes[1].clone().with_fallback(["b1"]);
        assert!(matches!(
            Catalog::new(themes.clone(), abc_schedule()),
            Err(ConfigurationError::InvalidFallback { .. })
        ));

        themes[1] = themes[1].clone().with_fallback(["b1", "zz"]);
        assert!(matches!(
            Catalog::new(themes.clone(), abc_schedule()),
            Err(ConfigurationError::InvalidFallback { .. })
        ));

        themes[1] = themes[1].clone().with_fallback(["b1", "b2"]);
        assert!(Catalog::new(themes, abc_schedule()).is_ok());
    }
}
