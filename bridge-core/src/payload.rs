//! Embedded-resource namespace for bundled plugin payloads
//!
//! Payloads are read-only resources shipped inside the plugin's own
//! distribution. A `PayloadStore` resolves a relative payload name to its
//! bytes; it never mutates anything and never reaches the network.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors raised while resolving an embedded payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("no embedded payload named `{0}`")]
    NotFound(String),

    #[error("invalid payload name `{0}`")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only namespace mapping payload names to their bytes.
pub trait PayloadStore: Send + Sync {
    /// Open the named payload for reading.
    fn open(&self, name: &str) -> Result<Box<dyn Read>, PayloadError>;

    /// Whether the store can resolve `name`.
    fn contains(&self, name: &str) -> bool;
}

/// Payloads compiled into the plugin binary, typically via `include_bytes!`.
#[derive(Debug, Default)]
pub struct StaticPayloadStore {
    payloads: HashMap<String, &'static [u8]>,
}

impl StaticPayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload under `name`.
    pub fn register(mut self, name: &str, bytes: &'static [u8]) -> Self {
        self.payloads.insert(name.to_string(), bytes);
        self
    }
}

impl PayloadStore for StaticPayloadStore {
    fn open(&self, name: &str) -> Result<Box<dyn Read>, PayloadError> {
        let bytes = self
            .payloads
            .get(name)
            .ok_or_else(|| PayloadError::NotFound(name.to_string()))?;
        Ok(Box::new(Cursor::new(*bytes)))
    }

    fn contains(&self, name: &str) -> bool {
        self.payloads.contains_key(name)
    }
}

/// Payloads shipped as files under the plugin's packaging directory.
#[derive(Debug, Clone)]
pub struct DirPayloadStore {
    root: PathBuf,
}

impl DirPayloadStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, PayloadError> {
        let relative = Path::new(name);
        // Payload names are relative identifiers, not arbitrary paths.
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return Err(PayloadError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl PayloadStore for DirPayloadStore {
    fn open(&self, name: &str) -> Result<Box<dyn Read>, PayloadError> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(PayloadError::NotFound(name.to_string()));
        }
        Ok(Box::new(File::open(path)?))
    }

    fn contains(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }
}
