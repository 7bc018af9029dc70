//! Persistent key/value settings backed by sled
//!
//! Keys are `<section>\u{1f}<key>`; values are JSON encoded so strings, string
//! arrays and integers share one tree.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// Separator between section and key (ASCII unit separator)
const KEY_SEPARATOR: char = '\u{1f}';

/// Section names used by the session and queue
pub mod sections {
    pub const SEQUENCER: &str = "ToucanSequencer";
    pub const EDITING_SESSION: &str = "ToucanEditingSession";
    pub const ASSET_METADATA: &str = "ToucanAssetMetadata";
    /// Prefix of per-device discovery sections (`ToucanMidiController.Device:<name>`)
    pub const DEVICE_PREFIX: &str = "ToucanMidiController.Device:";
}

/// Settings store handle (cheap to clone; clones share the same tree)
#[derive(Clone)]
pub struct SettingsStore {
    db: sled::Db,
}

impl SettingsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        debug!("Settings store opened at {}", path.as_ref().display());
        Ok(Self { db })
    }

    /// In-memory store removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn make_key(section: &str, key: &str) -> String {
        format!("{}{}{}", section, KEY_SEPARATOR, key)
    }

    fn get_json<T: DeserializeOwned>(&self, section: &str, key: &str) -> Option<T> {
        let raw = match self.db.get(Self::make_key(section, key)) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read setting {}/{}: {}", section, key, e);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring malformed setting {}/{}: {}", section, key, e);
                None
            }
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, section: &str, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.insert(Self::make_key(section, key), bytes)?;
        Ok(())
    }

    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.get_json(section, key)
    }

    pub fn set_string(&self, section: &str, key: &str, value: &str) -> Result<()> {
        self.set_json(section, key, value)
    }

    /// Ordered string list
    pub fn get_array(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get_json(section, key)
    }

    pub fn set_array(&self, section: &str, key: &str, values: &[String]) -> Result<()> {
        self.set_json(section, key, values)
    }

    pub fn get_int(&self, section: &str, key: &str) -> Option<i64> {
        self.get_json(section, key)
    }

    pub fn set_int(&self, section: &str, key: &str, value: i64) -> Result<()> {
        self.set_json(section, key, &value)
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        self.get_json(section, key)
    }

    pub fn set_bool(&self, section: &str, key: &str, value: bool) -> Result<()> {
        self.set_json(section, key, &value)
    }

    /// Remove a key; `true` when it existed
    pub fn remove(&self, section: &str, key: &str) -> Result<bool> {
        Ok(self.db.remove(Self::make_key(section, key))?.is_some())
    }

    /// Distinct section names, sorted
    pub fn section_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for entry in self.db.iter().keys() {
            match entry {
                Ok(key) => {
                    if let Some((section, _)) = std::str::from_utf8(&key)
                        .ok()
                        .and_then(|k| k.split_once(KEY_SEPARATOR))
                    {
                        names.insert(section.to_string());
                    }
                }
                Err(e) => warn!("Failed to scan settings: {}", e),
            }
        }
        names.into_iter().collect()
    }

    /// Keys of one section, sorted
    pub fn keys(&self, section: &str) -> Vec<String> {
        let prefix = format!("{}{}", section, KEY_SEPARATOR);
        let mut keys = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()).keys() {
            match entry {
                Ok(key) => {
                    if let Some(k) = std::str::from_utf8(&key)
                        .ok()
                        .and_then(|k| k.strip_prefix(prefix.as_str()))
                    {
                        keys.push(k.to_string());
                    }
                }
                Err(e) => warn!("Failed to scan section {}: {}", section, e),
            }
        }
        keys
    }

    /// Device names declared through `ToucanMidiController.Device:<name>` sections
    pub fn discovered_devices(&self) -> Vec<String> {
        self.section_names()
            .into_iter()
            .filter_map(|s| s.strip_prefix(sections::DEVICE_PREFIX).map(str::to_string))
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
