//! Per-device mapping store with write-through JSON files
//!
//! File layout: `<dir>/<device>_<rig>.json`, a JSON object keyed by decimal control
//! ids. Memory is authoritative once a device is initialized; every mutation
//! rewrites the whole device file.

use super::{DeviceMapping, MappedAction};
use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Mapping store owning the active devices' mappings
#[derive(Debug)]
pub struct MappingStore {
    dir: PathBuf,
    devices: HashMap<String, DeviceMapping>,
}

impl MappingStore {
    /// Create a store over a mapping directory (nothing is read yet)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            devices: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the mapping file for a device and rig
    pub fn file_path(&self, device: &str, rig: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", device, rig))
    }

    /// Load a device's mappings the first time it is seen
    ///
    /// Later calls for the same device keep the in-memory map.
    pub fn initialize(&mut self, device: &str, rig: &str) {
        if self.devices.contains_key(device) {
            debug!(device, "Mappings already active");
            return;
        }

        let path = self.file_path(device, rig);
        let controls = load_file(&path);
        info!(
            device,
            rig,
            "Loaded {} mapping(s) from {}",
            controls.len(),
            path.display()
        );

        self.devices.insert(
            device.to_string(),
            DeviceMapping {
                rig: rig.to_string(),
                controls,
            },
        );
    }

    pub fn get(&self, device: &str, control_id: i32) -> Option<&MappedAction> {
        self.devices.get(device)?.controls.get(&control_id)
    }

    /// Insert or replace a mapping and write the device file
    ///
    /// A device not yet initialized is created with an empty rig name.
    pub fn set(&mut self, device: &str, control_id: i32, action: MappedAction) -> Result<()> {
        let mapping = self
            .devices
            .entry(device.to_string())
            .or_insert_with(|| DeviceMapping::new(""));
        mapping.controls.insert(control_id, action);
        debug!(device, control_id, "Mapping set");
        self.save_device(device)
    }

    /// Remove a mapping; `false` when nothing was bound
    pub fn remove(&mut self, device: &str, control_id: i32) -> Result<bool> {
        let removed = self
            .devices
            .get_mut(device)
            .map(|m| m.controls.remove(&control_id).is_some())
            .unwrap_or(false);

        if removed {
            debug!(device, control_id, "Mapping removed");
            self.save_device(device)?;
        }
        Ok(removed)
    }

    /// Flush a device file and evict the device from memory
    pub fn deactivate_device(&mut self, device: &str) -> Result<()> {
        if !self.devices.contains_key(device) {
            return Ok(());
        }
        let saved = self.save_device(device);
        self.devices.remove(device);
        info!(device, "Mappings deactivated");
        saved
    }

    /// Flush every active device
    pub fn save_all(&self) -> Result<()> {
        for device in self.devices.keys() {
            self.save_device(device)?;
        }
        Ok(())
    }

    /// Active device names, sorted
    pub fn devices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn mappings(&self, device: &str) -> Option<&BTreeMap<i32, MappedAction>> {
        self.devices.get(device).map(|m| &m.controls)
    }

    pub fn rig_for(&self, device: &str) -> Option<&str> {
        self.devices.get(device).map(|m| m.rig.as_str())
    }

    pub fn is_active(&self, device: &str) -> bool {
        self.devices.contains_key(device)
    }

    fn save_device(&self, device: &str) -> Result<()> {
        let Some(mapping) = self.devices.get(device) else {
            return Ok(());
        };

        fs::create_dir_all(&self.dir)?;
        let path = self.file_path(device, &mapping.rig);
        fs::write(&path, Self::to_json(&mapping.controls)?)?;
        debug!(device, "Mappings saved to {}", path.display());
        Ok(())
    }

    /// Serialize one device map
    pub fn to_json(controls: &BTreeMap<i32, MappedAction>) -> Result<String> {
        Ok(serde_json::to_string_pretty(controls)?)
    }

    /// Parse one device map, skipping malformed entries
    pub fn from_json(json: &str) -> Result<BTreeMap<i32, MappedAction>> {
        let root: Map<String, Value> = serde_json::from_str(json)?;
        let mut controls = BTreeMap::new();

        for (key, value) in root {
            let Ok(control_id) = key.trim().parse::<i32>() else {
                warn!("Skipping mapping with non-integer key '{}'", key);
                continue;
            };
            if !value.is_object() {
                warn!("Skipping mapping {}: value is not an object", control_id);
                continue;
            }
            match serde_json::from_value::<MappedAction>(value) {
                Ok(action) => {
                    controls.insert(control_id, action);
                }
                Err(e) => warn!("Skipping mapping {}: {}", control_id, e),
            }
        }

        Ok(controls)
    }
}

/// Missing file is an empty map; unreadable content is an empty map with a warning
fn load_file(path: &Path) -> BTreeMap<i32, MappedAction> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };

    MappingStore::from_json(&json).unwrap_or_else(|e| {
        warn!("Failed to parse {}: {}", path.display(), e);
        BTreeMap::new()
    })
}
