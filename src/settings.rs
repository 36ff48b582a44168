//! Persisted user settings.
//!
//! The engine itself never reads settings; hosts load them through a
//! [`ConfigStore`] and build an [`ExtractionConfig`] per call.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::compress::CompressionLevel;
use crate::extract::ExtractionConfig;
use crate::filter::FileTypeSet;

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything a host persists between sessions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub file_types: FileTypeSet,
    pub compression_level: CompressionLevel,
    /// Free-form host preferences, e.g. `display_height`.
    pub preferences: BTreeMap<String, Value>,
}

impl Settings {
    /// Extraction options seeded from these settings.
    pub fn extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig {
            file_types: self.file_types.clone(),
            compression_level: self.compression_level,
            ..Default::default()
        }
    }
}

/// Storage for [`Settings`].
///
/// Implementors provide `load` and `save`; the typed accessors are
/// read-modify-write on top of them.
pub trait ConfigStore {
    fn load(&self) -> Result<Settings, SettingsError>;

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError>;

    fn file_types(&self) -> Result<FileTypeSet, SettingsError> {
        Ok(self.load()?.file_types)
    }

    fn set_file_types(&mut self, file_types: FileTypeSet) -> Result<(), SettingsError> {
        let mut settings = self.load()?;
        settings.file_types = file_types;
        self.save(&settings)
    }

    fn compression_level(&self) -> Result<CompressionLevel, SettingsError> {
        Ok(self.load()?.compression_level)
    }

    fn set_compression_level(&mut self, level: CompressionLevel) -> Result<(), SettingsError> {
        let mut settings = self.load()?;
        settings.compression_level = level;
        self.save(&settings)
    }

    fn preference(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.load()?.preferences.get(key).cloned())
    }

    fn set_preference(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut settings = self.load()?;
        settings.preferences.insert(key.to_string(), value);
        self.save(&settings)
    }
}

/// Settings kept as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/ctxpack/settings.json`.
    pub fn default_location() -> Result<Self, SettingsError> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(dir.join("ctxpack").join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigStore for JsonFileStore {
    /// A missing file yields defaults.
    fn load(&self) -> Result<Settings, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write to a temp file beside the target, then rename over it.
    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| self.io_error(e))?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| self.io_error(e))?;
        let write = |temp: &mut NamedTempFile| -> io::Result<()> {
            temp.write_all(json.as_bytes())?;
            temp.write_all(b"\n")?;
            temp.as_file().sync_all()
        };
        write(&mut temp).map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// In-memory settings for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    settings: Settings,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        Ok(self.settings.clone())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        self.settings = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("none.json"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/settings.json");

        let mut store = JsonFileStore::new(&path);
        store.set_file_types(".ts,.md".parse().unwrap()).unwrap();
        store.set_compression_level(CompressionLevel::Light).unwrap();
        store.set_preference("display_height", json!(240)).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.file_types().unwrap().to_string(), ".md,.ts");
        assert_eq!(reopened.compression_level().unwrap(), CompressionLevel::Light);
        assert_eq!(reopened.preference("display_height").unwrap(), Some(json!(240)));
        assert_eq!(reopened.preference("missing").unwrap(), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"compression_level": "full"}"#).unwrap();

        let settings = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(settings.compression_level, CompressionLevel::Full);
        assert_eq!(settings.file_types, FileTypeSet::default());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"file_types": [""]}"#).unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::default();
        store.set_compression_level(CompressionLevel::Full).unwrap();
        assert_eq!(store.compression_level().unwrap(), CompressionLevel::Full);
        assert_eq!(store.file_types().unwrap(), FileTypeSet::default());
    }

    #[test]
    fn test_extraction_config_from_settings() {
        let settings = Settings {
            file_types: ".py".parse().unwrap(),
            compression_level: CompressionLevel::Light,
            ..Default::default()
        };
        let config = settings.extraction_config();
        assert!(config.file_types.contains("py"));
        assert_eq!(config.compression_level, CompressionLevel::Light);
    }
}
