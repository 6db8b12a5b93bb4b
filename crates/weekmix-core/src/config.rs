use crate::catalog::{Catalog, DaySlot, ThemePool};
use crate::error::ConfigurationError;
use crate::pool::Pool;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "weekmix";
const CONFIG_FILE_NAME: &str = "config.toml";
const CALENDAR_FILE_NAME: &str = "calendar.json";
const CURRENT_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_CONTENT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const BRAND_IDENTITY_THEME: &str = "Brand Identity";
pub const CONNECTION_THEME: &str = "Connection";
pub const ENTERTAINMENT_THEME: &str = "Entertainment";

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
    pub path: PathBuf,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No persisted configuration was found or usable; defaults were synthesized.
    Default,
    /// Configuration was read from `config.toml`.
    File,
}

/// Errors that can occur when persisting configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Ser(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {err}"),
            ConfigError::Ser(err) => write!(f, "TOML serialization error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Ser(value)
    }
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub content: ContentSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default = "default_themes")]
    pub themes: Vec<ThemePool>,
    #[serde(default = "default_schedule")]
    pub schedule: Vec<DaySlot>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            engine: EngineSettings::default(),
            content: ContentSettings::default(),
            storage: StorageSettings::default(),
            themes: default_themes(),
            schedule: default_schedule(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }

    /// Validates themes and schedule into a [`Catalog`].
    pub fn catalog(&self) -> Result<Catalog, ConfigurationError> {
        Catalog::new(self.themes.clone(), self.schedule.clone())
    }
}

/// Allocation tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Rejection-sampling attempts per theme before the fallback is used.
    pub max_attempts: u32,
    /// Fixed seed for reproducible calendars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: None,
        }
    }
}

/// Settings for the post content service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub endpoint: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_CONTENT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            endpoint: DEFAULT_COMPLETIONS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_path: Option<String>,
}

impl StorageSettings {
    /// Where the current calendar is persisted; `~` is expanded.
    pub fn calendar_path(&self) -> PathBuf {
        match self
            .calendar_path
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            Some(value) => PathBuf::from(shellexpand::tilde(value).into_owned()),
            None => config_directory().join(CALENDAR_FILE_NAME),
        }
    }
}

pub(crate) fn default_themes() -> Vec<ThemePool> {
    let formats = ["Reel", "Single Image", "Carousel"];
    let community_endings = ["Comment an Emoji", "Tag a Friend", "Challenge or Task"];
    vec![
        ThemePool::new(
            BRAND_IDENTITY_THEME,
            Pool::new([
                "Authority",
                "Brand Building",
                "Problem Solving",
                "Social Proof",
                "Educational",
            ]),
            Pool::new([
                "Soft Promo (Offer Trigger)",
                "Question Prompt",
                "Call to Share",
            ]),
            Pool::new(formats),
        ),
        ThemePool::new(
            CONNECTION_THEME,
            Pool::new([
                "Storytelling",
                "Behind-the-Scenes",
                "Inspiration/Motivation",
                "Interactive",
            ]),
            Pool::new(community_endings),
            Pool::new(formats),
        )
        .with_fallback(["Storytelling", "Behind-the-Scenes"]),
        ThemePool::new(
            ENTERTAINMENT_THEME,
            Pool::new([
                "Humor and Relatability",
                "Interactive",
                "Trends",
                "Inspiration/Motivation",
            ]),
            Pool::new(community_endings),
            Pool::new(formats),
        ),
    ]
}

pub(crate) fn default_schedule() -> Vec<DaySlot> {
    vec![
        DaySlot::new("Monday", BRAND_IDENTITY_THEME),
        DaySlot::new("Tuesday", CONNECTION_THEME),
        DaySlot::new("Wednesday", BRAND_IDENTITY_THEME),
        DaySlot::new("Thursday", CONNECTION_THEME),
        DaySlot::new("Friday", ENTERTAINMENT_THEME),
        DaySlot::new("Saturday", ENTERTAINMENT_THEME),
        DaySlot::new("Sunday", ENTERTAINMENT_THEME),
    ]
}

/// Path to the configuration directory.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path to `config.toml`.
pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Load the configuration from `path` (or the default location), falling back to defaults.
pub fn load_config(path: Option<&Path>) -> ConfigLoadResult {
    let mut warnings = Vec::new();
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);

    if path.exists() {
        match fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg);
                    warnings.append(&mut sanitize_warnings);
                    return ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                        path,
                    };
                }
                Err(err) => {
                    warnings.push(format!(
                        "Failed to parse {} as TOML: {}. Falling back to defaults.",
                        path.display(),
                        err
                    ));
                }
            },
            Err(err) => {
                warnings.push(format!(
                    "Failed to read {}: {}. Falling back to defaults.",
                    path.display(),
                    err
                ));
            }
        }
    }

    // Default fallback
    ConfigLoadResult {
        config: FileConfig::default(),
        warnings,
        source: ConfigSource::Default,
        path,
    }
}

/// Persist the configuration to `path` (or the default location).
pub fn save_config(config: &FileConfig, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(config)?;
    fs::write(&path, serialized)?;
    Ok(path)
}

fn sanitize_config(mut config: FileConfig) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schema_version != CURRENT_SCHEMA_VERSION {
        warnings.push(format!(
            "Unknown config schema version {}. Resetting to {}.",
            config.schema_version, CURRENT_SCHEMA_VERSION
        ));
        return (FileConfig::default(), warnings);
    }

    for theme in &mut config.themes {
        let (pillars, duplicates) = {
            let mut seen = HashSet::new();
            let mut duplicates = Vec::new();
            let mut pillars = Vec::new();
            for pillar in theme.pillars.values() {
                if seen.insert(pillar.as_str()) {
                    pillars.push(pillar.clone());
                } else {
                    duplicates.push(pillar.clone());
                }
            }
            (pillars, duplicates)
        };
        if !duplicates.is_empty() {
            warnings.push(format!(
                "Theme '{}' lists duplicate pillars: {}. Keeping the first occurrence.",
                theme.name,
                duplicates.join(", ")
            ));
            theme.pillars = Pool::from(pillars);
        }
    }

    if config.engine.max_attempts == 0 {
        warnings.push(
            "engine.max_attempts is 0; every theme will use its fallback pillars.".to_string(),
        );
    }

    let temperature = config.content.temperature;
    if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
        warnings.push(format!(
            "content.temperature {temperature} is outside 0.0-2.0. Resetting to {DEFAULT_TEMPERATURE}."
        ));
        config.content.temperature = DEFAULT_TEMPERATURE;
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_a_valid_catalog() {
        let catalog = FileConfig::default().catalog().unwrap();
        let shared: Vec<_> = catalog.shared_pillars().into_iter().collect();
        assert_eq!(shared, ["Inspiration/Motivation", "Interactive"]);
        assert_eq!(catalog.demand(&ENTERTAINMENT_THEME.into()), 3);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine]\nseed = 42\n").unwrap();

        let load = load_config(Some(&path));
        assert_eq!(load.source, ConfigSource::File);
        assert!(load.warnings.is_empty(), "{:?}", load.warnings);
        assert_eq!(load.config.engine.seed, Some(42));
        assert_eq!(load.config.engine.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(load.config.themes, default_themes());
    }

    #[test]
    fn unparsable_file_falls_back_with_warning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "themes = \"not a list\"").unwrap();

        let load = load_config(Some(&path));
        assert_eq!(load.source, ConfigSource::Default);
        assert_eq!(load.warnings.len(), 1);
        assert_eq!(load.config, FileConfig::default());
    }

    #[test]
    fn missing_file_uses_defaults_silently() {
        let dir = tempdir().unwrap();
        let load = load_config(Some(&dir.path().join("absent.toml")));
        assert_eq!(load.source, ConfigSource::Default);
        assert!(load.warnings.is_empty());
    }

    #[test]
    fn unknown_schema_version_resets() {
        let mut config = FileConfig::default();
        config.schema_version = 99;
        config.engine.seed = Some(5);
        let (sanitized, warnings) = sanitize_config(config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(sanitized, FileConfig::default());
    }

    #[test]
    fn duplicate_pillars_are_removed() {
        let mut config = FileConfig::default();
        config.themes[0].pillars = Pool::new(["Authority", "Educational", "Authority"]);
        let (sanitized, warnings) = sanitize_config(config);
        assert_eq!(
            sanitized.themes[0].pillars.values(),
            ["Authority", "Educational"]
        );
        assert!(warnings[0].contains("Authority"));
    }

    #[test]
    fn out_of_range_temperature_is_reset() {
        let mut config = FileConfig::default();
        config.content.temperature = 7.5;
        let (sanitized, warnings) = sanitize_config(config);
        assert_eq!(sanitized.content.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = FileConfig::default();
        config.engine.seed = Some(9);
        config.storage.calendar_path = Some("/tmp/week.json".to_string());

        let written = save_config(&config, Some(&path)).unwrap();
        assert_eq!(written, path);
        let load = load_config(Some(&path));
        assert_eq!(load.source, ConfigSource::File);
        assert_eq!(load.config, config);
    }

    #[test]
    fn calendar_path_defaults_into_config_directory() {
        let storage = StorageSettings::default();
        assert_eq!(
            storage.calendar_path(),
            config_directory().join(CALENDAR_FILE_NAME)
        );

        let custom = StorageSettings {
            calendar_path: Some(" /var/tmp/plan.json ".to_string()),
        };
        assert_eq!(custom.calendar_path(), PathBuf::from("/var/tmp/plan.json"));
    }
}
