//! Durable storage for the current weekly calendar.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::{GeneratedDay, WeeklyCalendar};

const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("calendar storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("stored calendar is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stored calendar uses schema version {found}, expected {expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

/// On-disk envelope around the flat list of generated days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCalendar {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub days: Vec<GeneratedDay>,
}

/// Reads and writes the most recently generated calendar.
#[derive(Debug, Clone)]
pub struct CalendarStore {
    path: PathBuf,
}

impl CalendarStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the stored calendar. Each save writes its own sibling temp
    /// file before renaming it over the store, so readers only ever see a
    /// complete save and concurrent savers never share a temp file.
    pub fn save(&self, calendar: &WeeklyCalendar) -> Result<(), StoreError> {
        let envelope = StoredCalendar {
            schema_version: STORE_SCHEMA_VERSION,
            generated_at: Utc::now(),
            days: calendar.days().to_vec(),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let serialized = serde_json::to_string_pretty(&envelope)?;
        let temp_path = build_temp_path(&self.path, Uuid::new_v4());
        let written = fs::write(&temp_path, format!("{serialized}\n"))
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(err.into());
        }

        info!(path = %self.path.display(), days = calendar.len(), "Saved calendar");
        Ok(())
    }

    /// Loads the stored calendar; `None` when nothing usable has been saved yet.
    pub fn load(&self) -> Result<Option<WeeklyCalendar>, StoreError> {
        Ok(self.load_envelope()?.map(|stored| WeeklyCalendar::new(stored.days)))
    }

    pub fn load_envelope(&self) -> Result<Option<StoredCalendar>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored calendar");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let stored: StoredCalendar = serde_json::from_str(&raw)?;
        if stored.schema_version != STORE_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                found: stored.schema_version,
                expected: STORE_SCHEMA_VERSION,
            });
        }
        if stored.days.is_empty() {
            return Ok(None);
        }
        Ok(Some(stored))
    }
}

fn build_temp_path(path: &Path, token: Uuid) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => {
            temp_path.set_extension(format!("{ext}.{token}.tmp"));
        }
        _ => {
            temp_path.set_extension(format!("{token}.tmp"));
        }
    }
    temp_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use crate::engine::Engine;
    use tempfile::tempdir;

    fn generated() -> WeeklyCalendar {
        Engine::from_config(&FileConfig::default())
            .unwrap()
            .generate()
            .unwrap()
            .calendar
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let dir = tempdir().unwrap();
        let store = CalendarStore::new(dir.path().join("data").join("calendar.json"));
        let calendar = generated();

        store.save(&calendar).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, calendar);

        let leftovers: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, [std::ffi::OsString::from("calendar.json")]);
    }

    #[test]
    fn concurrent_saves_to_one_path_all_succeed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calendar.json");
        let calendar = generated();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let store = CalendarStore::new(&path);
                    for _ in 0..25 {
                        store.save(&calendar).unwrap();
                    }
                });
            }
        });

        assert_eq!(CalendarStore::new(&path).load().unwrap().unwrap(), calendar);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        // A directory at the store path makes the final rename fail.
        let path = dir.path().join("calendar.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let err = CalendarStore::new(&path).save(&generated()).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_or_empty_store_loads_nothing() {
        let dir = tempdir().unwrap();
        let store = CalendarStore::new(dir.path().join("calendar.json"));
        assert!(store.load().unwrap().is_none());

        store.save(&WeeklyCalendar::default()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn unreadable_payload_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calendar.json");
        fs::write(&path, "[{\"day\": ").unwrap();
        let err = CalendarStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calendar.json");
        fs::write(
            &path,
            r#"{"schema_version": 7, "generated_at": "2025-01-06T09:00:00Z", "days": []}"#,
        )
        .unwrap();
        let err = CalendarStore::new(&path).load().unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaMismatch {
                found: 7,
                expected: 1
            }
        ));
    }

    #[test]
    fn temp_path_keeps_the_original_extension() {
        let token = Uuid::nil();
        assert_eq!(
            build_temp_path(Path::new("/tmp/calendar.json"), token),
            PathBuf::from(format!("/tmp/calendar.json.{token}.tmp"))
        );
        assert_eq!(
            build_temp_path(Path::new("/tmp/calendar"), token),
            PathBuf::from(format!("/tmp/calendar.{token}.tmp"))
        );
        assert_ne!(
            build_temp_path(Path::new("/tmp/calendar.json"), Uuid::new_v4()),
            build_temp_path(Path::new("/tmp/calendar.json"), Uuid::new_v4())
        );
    }
}
