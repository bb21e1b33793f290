//! Settings repository for bridge dialog state
//!
//! Host dialogs persist user choices (checkbox states, combo selections) as
//! loose key/value pairs. The repository is an explicit injected dependency
//! rather than a shared global; the installer does not use it at all.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key/value store for persisted dialog settings.
pub trait SettingsRepository {
    /// Look up a raw value by key.
    fn get(&self, key: &str) -> Option<&Value>;

    /// Store a raw value under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: Value);

    /// Typed lookup with a fall-back default.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, Value::Bool(value));
    }

    fn set_str(&mut self, key: &str, value: &str) {
        self.set(key, Value::String(value.to_string()));
    }
}

/// In-memory settings, for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: BTreeMap<String, Value>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsRepository for MemorySettings {
    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }
}

/// Settings persisted to a JSON file.
///
/// Loading a missing file yields an empty repository; `save` writes the whole
/// map back. Writes are explicit, nothing is flushed implicitly on drop.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl JsonFileSettings {
    /// Load settings from `path`, or start empty if the file does not exist.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let values = if path.is_file() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse settings file {}", path.display()))?
        } else {
            debug!("Settings file {} not found; starting empty", path.display());
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    /// Persist the current values back to the settings file.
    pub fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write settings file {}", self.path.display()))?;
        debug!("Saved {} settings to {}", self.values.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsRepository for JsonFileSettings {
    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }
}
