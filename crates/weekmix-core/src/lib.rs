//! Core library for weekmix: constrained random assignment of pillars,
//! engagement endings and formats to a seven-day content calendar.

pub mod allocator;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod feasibility;
pub mod logging;
pub mod pool;
pub mod render;
pub mod retry;
pub mod store;

pub use allocator::{Allocation, AllocationReport, PickOrigin, ThemeReport, allocate};
pub use calendar::{GeneratedDay, Violation, WeeklyCalendar, assemble};
pub use catalog::{Catalog, DaySlot, PillarPolicy, ThemeName, ThemePool, WEEK_LENGTH};
pub use config::{
    ConfigError, ConfigLoadResult, ConfigSource, ContentSettings, EngineSettings, FileConfig,
    StorageSettings, config_directory, config_path, load_config, save_config,
};
pub use content::{ContentClient, ContentError, PostContent};
pub use engine::{Engine, GenerationOutcome};
pub use error::{ConfigurationError, EngineError, PoolKind};
pub use logging::{
    FilterSource, LoggingDestination, LoggingError, Verbosity, current_log_path, init_logging,
    log_directory,
};
pub use pool::{EmptyPoolError, IndexSource, Pool, RngSource, ScriptedSource};
pub use store::{CalendarStore, StoreError};
