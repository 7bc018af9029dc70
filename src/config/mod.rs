//! Configuration management for Toucan MIDI
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Rig used when neither the device nor the session names one
pub const DEFAULT_RIG: &str = "DefaultRig";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub sequencer: SequencerConfig,
    #[serde(default)]
    pub rigs: Vec<RigConfig>,
}

/// MIDI client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Interval between port scans for connect/disconnect detection
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// One MIDI controller
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub name: String,
    /// Case-insensitive substring of the input port name (defaults to `name`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Rig override for this device's mapping file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rig: Option<String>,
}

impl DeviceConfig {
    pub fn port_pattern(&self) -> &str {
        self.port.as_deref().unwrap_or(&self.name)
    }
}

/// Editing session defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_rig")]
    pub default_rig: String,
    #[serde(default = "default_output_folder")]
    pub output_folder: String,
    /// Length in frames of a freshly loaded animation
    #[serde(default = "default_length")]
    pub default_length: i32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_rig: default_rig(),
            output_folder: default_output_folder(),
            default_length: default_length(),
            frame_rate: default_frame_rate(),
        }
    }
}

/// Step sizes and thresholds for sequencer actions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SequencerConfig {
    #[serde(default = "default_small_step")]
    pub small_step: i32,
    #[serde(default = "default_normal_step")]
    pub normal_step: i32,
    #[serde(default = "default_large_step")]
    pub large_step: i32,
    /// Used when both modifier buttons are held
    #[serde(default = "default_combined_step")]
    pub combined_step: i32,
    /// Values above this count as a press for trigger actions
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            small_step: default_small_step(),
            normal_step: default_normal_step(),
            large_step: default_large_step(),
            combined_step: default_combined_step(),
            trigger_threshold: default_trigger_threshold(),
        }
    }
}

/// Rig description used for control introspection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RigConfig {
    pub name: String,
    #[serde(default)]
    pub controls: Vec<RigControlConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RigControlConfig {
    pub name: String,
    #[serde(default)]
    pub kind: crate::sequencer::RigControlKind,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let rig_names: HashSet<&str> = self.rigs.iter().map(|r| r.name.as_str()).collect();

        for (idx, rig) in self.rigs.iter().enumerate() {
            if rig.name.is_empty() {
                anyhow::bail!("Rig {} name cannot be empty", idx);
            }
        }
        if rig_names.len() != self.rigs.len() {
            anyhow::bail!("Rig names must be unique");
        }

        let mut device_names = HashSet::new();
        for (idx, device) in self.devices.iter().enumerate() {
            if device.name.trim().is_empty() {
                anyhow::bail!("Device {} name cannot be empty", idx);
            }
            if !device_names.insert(device.name.as_str()) {
                anyhow::bail!("Device '{}' is defined more than once", device.name);
            }
            if let Some(rig) = &device.rig {
                if !rig_names.is_empty() && !rig_names.contains(rig.as_str()) {
                    anyhow::bail!("Device '{}' references unknown rig '{}'", device.name, rig);
                }
            }
        }

        let seq = &self.sequencer;
        for (name, step) in [
            ("small_step", seq.small_step),
            ("normal_step", seq.normal_step),
            ("large_step", seq.large_step),
            ("combined_step", seq.combined_step),
        ] {
            if step <= 0 {
                anyhow::bail!("sequencer.{} must be > 0 (got {})", name, step);
            }
        }
        if !(0.0..1.0).contains(&seq.trigger_threshold) {
            anyhow::bail!(
                "sequencer.trigger_threshold must be in [0, 1) (got {})",
                seq.trigger_threshold
            );
        }

        if self.session.frame_rate <= 0.0 {
            anyhow::bail!("session.frame_rate must be > 0");
        }
        if self.session.default_length <= 0 {
            anyhow::bail!("session.default_length must be > 0");
        }

        Ok(())
    }

    /// Rig override configured for a device
    pub fn device_rig(&self, device: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| d.name == device)
            .and_then(|d| d.rig.as_deref())
    }

    /// Rig scoping a device's mapping file: device override, else the session rig
    pub fn rig_for_device<'a>(&'a self, device: &str, session_rig: &'a str) -> &'a str {
        self.device_rig(device).unwrap_or(session_rig)
    }

    pub fn rig(&self, name: &str) -> Option<&RigConfig> {
        self.rigs.iter().find(|r| r.name == name)
    }
}

// Default value functions
fn default_client_name() -> String { "Toucan MIDI".to_string() }
fn default_poll_interval() -> u64 { 2000 }
fn default_rig() -> String { DEFAULT_RIG.to_string() }
fn default_output_folder() -> String { "/Game/ToucanTemp/Output".to_string() }
fn default_length() -> i32 { 150 }
fn default_frame_rate() -> f64 { 30.0 }
fn default_small_step() -> i32 { 1 }
fn default_normal_step() -> i32 { 5 }
fn default_large_step() -> i32 { 10 }
fn default_combined_step() -> i32 { 20 }
fn default_trigger_threshold() -> f32 { 0.5 }
