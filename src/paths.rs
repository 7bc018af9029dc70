//! Application path resolution for dev, portable and installed modes.
//!
//! - **Dev mode** (debug builds): `toucan.yaml` in the current directory
//!   keeps every file beside it.
//! - **Portable mode**: a `.portable` marker next to the executable keeps
//!   every file beside the executable.
//! - **Installed mode** (default): files live under
//!   `dirs::data_dir()/Toucan MIDI`.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the platform data dir
const APP_NAME: &str = "Toucan MIDI";

/// Configuration file name
pub const CONFIG_FILE: &str = "toucan.yaml";

/// Application paths for config, state, mappings, bakes and logs
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// State directory (settings store and mapping files)
    pub state_dir: PathBuf,
    /// Root that content output folders are resolved against
    pub bake_root: PathBuf,
    pub logs_dir: PathBuf,
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect paths from the environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!(
                    "[paths] Running in DEV mode ({} found in {})",
                    CONFIG_FILE,
                    cwd.display()
                );
                return Self::rooted(&cwd, true);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::rooted(&exe_dir, true);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform data dir, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] Running in INSTALLED mode (data dir: {})", app_data.display());

        Self {
            is_portable: false,
            state_dir: app_data.join("state"),
            ..Self::rooted(&app_data, false)
        }
    }

    /// Layout with every file under `base`
    pub fn rooted(base: &Path, is_portable: bool) -> Self {
        Self {
            config: base.join(CONFIG_FILE),
            state_dir: base.join(".state"),
            bake_root: base.join("Content"),
            logs_dir: base.join("logs"),
            is_portable,
        }
    }

    /// Use an explicit config file (from `--config`); other paths are unchanged
    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = config.into();
        self
    }

    /// Settings store (sled) directory
    pub fn settings_dir(&self) -> PathBuf {
        self.state_dir.join("settings")
    }

    /// Mapping files directory
    pub fn mappings_dir(&self) -> PathBuf {
        self.state_dir.join("MidiMappings")
    }

    /// Create the state, mapping, bake and log directories
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.state_dir, &self.mappings_dir(), &self.bake_root, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        Ok(())
    }
}
