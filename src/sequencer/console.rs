//! Console sequencer - logs every call and keeps an in-memory timeline
//!
//! Useful for:
//! - Testing control mappings without the host editor
//! - Debugging action flow
//! - Producing bake records on disk

use super::{BakeRequest, FrameRange, KeyValue, LoadRequest, RigControl, Sequencer};
use crate::config::RigConfig;
use crate::error::{MapperError, Result};
use crate::queue::asset_name;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// One keyframe in the open sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyRecord {
    pub rig: String,
    pub control: String,
    pub frame: i32,
    pub value: KeyValue,
}

/// Sequence opened by `load_animation`
#[derive(Debug, Clone)]
struct OpenSequence {
    animation: String,
    mesh: String,
    rig: String,
    frame: i32,
    playing: bool,
    range: FrameRange,
    keys: Vec<KeyRecord>,
}

/// Bake file contents
#[derive(Serialize)]
struct BakeRecord<'a> {
    animation: &'a str,
    mesh: &'a str,
    rig: &'a str,
    range: FrameRange,
    baked_at: String,
    keys: &'a [KeyRecord],
}

pub struct ConsoleSequencer {
    name: String,
    default_length: i32,
    rigs: RwLock<HashMap<String, Vec<RigControl>>>,
    sequence: Mutex<Option<OpenSequence>>,
    /// Call counter for debugging
    call_count: AtomicU64,
}

impl ConsoleSequencer {
    pub fn new(name: impl Into<String>, default_length: i32) -> Self {
        Self {
            name: name.into(),
            default_length: default_length.max(1),
            rigs: RwLock::new(HashMap::new()),
            sequence: Mutex::new(None),
            call_count: AtomicU64::new(0),
        }
    }

    /// Replace the known rigs (startup and config reload)
    pub fn set_rigs(&self, rigs: &[RigConfig]) {
        let table = rigs
            .iter()
            .map(|rig| {
                let controls = rig
                    .controls
                    .iter()
                    .map(|c| RigControl::new(c.name.clone(), c.kind))
                    .collect();
                (rig.name.clone(), controls)
            })
            .collect();
        *self.rigs.write() = table;
        debug!("ConsoleSequencer '{}' knows {} rig(s)", self.name, rigs.len());
    }

    pub fn is_open(&self) -> bool {
        self.sequence.lock().is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.sequence.lock().as_ref().map(|s| s.playing).unwrap_or(false)
    }

    /// Keys recorded in the open sequence
    pub fn keys(&self) -> Vec<KeyRecord> {
        self.sequence
            .lock()
            .as_ref()
            .map(|s| s.keys.clone())
            .unwrap_or_default()
    }

    pub fn open_animation(&self) -> Option<String> {
        self.sequence.lock().as_ref().map(|s| s.animation.clone())
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    fn log_call(&self, call: &str, detail: std::fmt::Arguments<'_>) {
        let n = self.call_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "🎬 [{}] Sequencer '{}' → {} {} [call #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.name,
            call,
            detail,
            n
        );
    }

    fn with_open<T>(&self, f: impl FnOnce(&mut OpenSequence) -> T) -> Result<T> {
        let mut guard = self.sequence.lock();
        match guard.as_mut() {
            Some(seq) => Ok(f(seq)),
            None => {
                warn!("Sequencer '{}': no open sequence", self.name);
                Err(MapperError::NoOpenSequence)
            }
        }
    }
}

impl Sequencer for ConsoleSequencer {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_frame(&self) -> Option<i32> {
        self.sequence.lock().as_ref().map(|s| s.frame)
    }

    fn set_frame(&self, frame: i32) -> Result<()> {
        self.with_open(|seq| seq.frame = frame)?;
        self.log_call("set_frame", format_args!("{}", frame));
        Ok(())
    }

    fn set_playing(&self, playing: bool) -> Result<()> {
        let changed =
            self.with_open(|seq| std::mem::replace(&mut seq.playing, playing) != playing)?;
        if changed {
            self.log_call("set_playing", format_args!("{}", playing));
        }
        Ok(())
    }

    fn playback_range(&self) -> Option<FrameRange> {
        self.sequence.lock().as_ref().map(|s| s.range)
    }

    fn set_playback_range(&self, range: FrameRange) -> Result<()> {
        if range.is_empty() {
            return Err(MapperError::InvalidParameter(format!("empty range {}", range)));
        }
        self.with_open(|seq| seq.range = range)?;
        self.log_call("set_playback_range", format_args!("{}", range));
        Ok(())
    }

    fn rig_controls(&self, rig: &str) -> Vec<RigControl> {
        self.rigs.read().get(rig).cloned().unwrap_or_default()
    }

    fn key_control(&self, rig: &str, control: &str, frame: i32, value: KeyValue) -> Result<()> {
        self.with_open(|seq| {
            // One key per (control, frame)
            seq.keys.retain(|k| !(k.rig == rig && k.control == control && k.frame == frame));
            seq.keys.push(KeyRecord {
                rig: rig.to_string(),
                control: control.to_string(),
                frame,
                value,
            });
        })?;
        self.log_call("key", format_args!("{}.{} @{} = {:?}", rig, control, frame, value));
        Ok(())
    }

    fn load_animation(&self, request: &LoadRequest) -> Result<()> {
        if request.animation.is_empty() {
            return Err(MapperError::InvalidParameter("empty animation path".to_string()));
        }
        *self.sequence.lock() = Some(OpenSequence {
            animation: request.animation.clone(),
            mesh: request.mesh.clone(),
            rig: request.rig.clone(),
            frame: 0,
            playing: false,
            range: FrameRange::new(0, self.default_length - 1),
            keys: Vec::new(),
        });
        self.log_call(
            "load_animation",
            format_args!("{} (mesh {}, rig {})", request.animation, request.mesh, request.rig),
        );
        Ok(())
    }

    fn bake(&self, request: &BakeRequest) -> Result<PathBuf> {
        let guard = self.sequence.lock();
        let Some(seq) = guard.as_ref() else {
            warn!("Sequencer '{}': nothing to bake", self.name);
            return Err(MapperError::NoOpenSequence);
        };

        fs::create_dir_all(&request.folder)?;
        let path = request
            .folder
            .join(format!("{}_Baked.json", asset_name(&request.animation)));

        let record = BakeRecord {
            animation: &request.animation,
            mesh: &seq.mesh,
            rig: if request.rig.is_empty() { seq.rig.as_str() } else { request.rig.as_str() },
            range: seq.range,
            baked_at: chrono::Local::now().to_rfc3339(),
            keys: &seq.keys,
        };
        fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        drop(guard);

        self.log_call("bake", format_args!("{}", path.display()));
        Ok(path)
    }
}
