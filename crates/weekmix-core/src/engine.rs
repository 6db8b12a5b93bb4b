//! Generation entry point tying allocation and assembly together.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::allocator::{AllocationReport, allocate};
use crate::calendar::{WeeklyCalendar, assemble};
use crate::catalog::Catalog;
use crate::config::{EngineSettings, FileConfig};
use crate::error::{ConfigurationError, EngineError};
use crate::pool::{IndexSource, RngSource};

/// A complete week plus the record of how its pillars were chosen.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub calendar: WeeklyCalendar,
    pub report: AllocationReport,
}

/// Generates weekly calendars from a validated catalog.
///
/// Every call works on private copies of the pools, so one engine can serve
/// overlapping requests.
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: Catalog,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(catalog: Catalog, settings: EngineSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn from_config(config: &FileConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::new(config.catalog()?, config.engine))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Generates with the configured seed, or fresh thread randomness.
    pub fn generate(&self) -> Result<GenerationOutcome, EngineError> {
        match self.settings.seed {
            Some(seed) => self.generate_with(RngSource::new(StdRng::seed_from_u64(seed))),
            None => self.generate_with(RngSource::new(rand::rng())),
        }
    }

    pub fn generate_with<S: IndexSource>(
        &self,
        mut source: S,
    ) -> Result<GenerationOutcome, EngineError> {
        let allocation = allocate(&self.catalog, self.settings.max_attempts, &mut source)?;
        let calendar = assemble(&self.catalog, &allocation, &mut source)?;
        let report = allocation.into_report();

        if report.fell_back() {
            warn!(
                fallbacks = report.fallback_count(),
                "Calendar generated with fallback pillars"
            );
        }
        info!(
            days = calendar.len(),
            seeded = self.settings.seed.is_some(),
            "Generated weekly calendar"
        );

        Ok(GenerationOutcome { calendar, report })
    }
}
