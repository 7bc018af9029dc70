//! Editing session: queue, selected mesh/rig/output folder and the sequencer
//!
//! Selections are persisted in the `ToucanEditingSession` settings section.

mod output;

pub use output::{OutputFolder, DEFAULT_OUTPUT_FOLDER};

use crate::config::SessionConfig;
use crate::queue::{asset_name, AnimationQueue};
use crate::sequencer::{BakeRequest, LoadRequest, Sequencer};
use crate::settings::{sections, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const MESH_KEY: &str = "LastSelectedMesh";
const RIG_KEY: &str = "LastSelectedRig";

/// Callback notified with the new rig name
pub type RigObserver = Arc<dyn Fn(&str) + Send + Sync>;

pub struct EditingSession {
    queue: AnimationQueue,
    sequencer: Arc<dyn Sequencer>,
    settings: SettingsStore,
    mesh: Option<String>,
    rig: String,
    output: OutputFolder,
    /// Directory content folders are resolved against for bakes
    bake_root: PathBuf,
    rig_observers: Vec<RigObserver>,
}

impl EditingSession {
    /// Restore the session (queue and selections) from the settings store
    pub fn new(
        sequencer: Arc<dyn Sequencer>,
        settings: SettingsStore,
        config: &SessionConfig,
        bake_root: impl Into<PathBuf>,
    ) -> Self {
        let queue = AnimationQueue::load(settings.clone());
        let mesh = settings
            .get_string(sections::EDITING_SESSION, MESH_KEY)
            .filter(|m| !m.is_empty());
        let rig = Self::restored_rig(&settings, config);
        let output = settings
            .get_string(sections::EDITING_SESSION, output::OUTPUT_FOLDER_KEY)
            .filter(|f| !f.is_empty())
            .map(OutputFolder::new)
            .unwrap_or_else(|| OutputFolder::new(config.output_folder.clone()));

        info!(
            "Session restored (mesh: {}, rig: {}, output: {})",
            mesh.as_deref().unwrap_or("none"),
            rig,
            output.get()
        );

        Self {
            queue,
            sequencer,
            settings,
            mesh,
            rig,
            output,
            bake_root: bake_root.into(),
            rig_observers: Vec::new(),
        }
    }

    /// Rig persisted by the last session, else the configured default
    pub fn restored_rig(settings: &SettingsStore, config: &SessionConfig) -> String {
        settings
            .get_string(sections::EDITING_SESSION, RIG_KEY)
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| config.default_rig.clone())
    }

    pub fn queue(&self) -> &AnimationQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut AnimationQueue {
        &mut self.queue
    }

    pub fn sequencer(&self) -> &Arc<dyn Sequencer> {
        &self.sequencer
    }

    pub fn mesh(&self) -> Option<&str> {
        self.mesh.as_deref()
    }

    pub fn rig(&self) -> &str {
        &self.rig
    }

    /// Asset name of the selected rig, which scopes mapping files
    pub fn mapping_rig(&self) -> &str {
        asset_name(&self.rig)
    }

    pub fn output_folder(&self) -> &str {
        self.output.get()
    }

    fn store(&self, key: &str, value: &str) {
        if let Err(e) = self.settings.set_string(sections::EDITING_SESSION, key, value) {
            warn!("Failed to persist {}: {}", key, e);
        }
    }

    pub fn select_mesh(&mut self, mesh: &str) {
        self.mesh = Some(mesh.to_string()).filter(|m| !m.is_empty());
        self.store(MESH_KEY, mesh);
        info!("Mesh selected: {}", mesh);
    }

    /// Select a rig; observers run only when the rig actually changes
    pub fn select_rig(&mut self, rig: &str) -> bool {
        if rig.is_empty() || rig == self.rig {
            return false;
        }
        self.rig = rig.to_string();
        self.store(RIG_KEY, rig);
        info!("Rig selected: {}", rig);
        for observer in &self.rig_observers {
            observer(rig);
        }
        true
    }

    pub fn on_rig_changed(&mut self, observer: RigObserver) {
        self.rig_observers.push(observer);
    }

    pub fn set_output_folder(&mut self, folder: &str) {
        self.output.set(folder);
        self.store(output::OUTPUT_FOLDER_KEY, folder);
        info!("Output folder: {}", folder);
    }

    /// Advance the queue and open the new current animation
    ///
    /// The cursor advances even when no mesh is selected or loading fails.
    pub fn load_next(&mut self) -> Option<usize> {
        let index = self.queue.next()?;
        let Some(anim) = self.queue.current().cloned() else {
            return Some(index);
        };

        let Some(mesh) = self.mesh.clone() else {
            warn!("No skeletal mesh selected, not loading {}", anim.path);
            return Some(index);
        };

        let request = LoadRequest {
            animation: anim.path.clone(),
            mesh,
            rig: self.rig.clone(),
        };
        match self.sequencer.load_animation(&request) {
            Ok(()) => info!("Loaded [{}] {}", index, anim.display_name),
            Err(e) => warn!("Failed to load {}: {}", anim.path, e),
        }
        Some(index)
    }

    /// Bake the current entry into today's output subfolder and mark it processed
    pub fn bake_and_save(&mut self) -> Option<PathBuf> {
        let Some(anim) = self.queue.current().cloned() else {
            warn!("Nothing selected in the queue to bake");
            return None;
        };

        let folder = self.output.today();
        let request = BakeRequest {
            animation: anim.path.clone(),
            rig: self.rig.clone(),
            folder: OutputFolder::resolve(&self.bake_root, &folder),
        };

        match self.sequencer.bake(&request) {
            Ok(path) => {
                info!("Baked {} to {}", anim.display_name, path.display());
                self.queue.mark_processed(&anim.path);
                Some(path)
            }
            Err(e) => {
                warn!("Bake failed for {}: {}", anim.path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::ConsoleSequencer;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    fn session(
        settings: SettingsStore,
        root: &std::path::Path,
    ) -> (EditingSession, Arc<ConsoleSequencer>) {
        let console = Arc::new(ConsoleSequencer::new("test", 50));
        let config = SessionConfig::default();
        let session = EditingSession::new(console.clone(), settings, &config, root);
        (session, console)
    }

    #[test]
    fn test_defaults_from_config() {
        let temp = tempdir().unwrap();
        let (session, _) = session(SettingsStore::temporary().unwrap(), temp.path());
        assert_eq!(session.rig(), "DefaultRig");
        assert_eq!(session.mesh(), None);
        assert_eq!(session.output_folder(), DEFAULT_OUTPUT_FOLDER);
    }

    #[test]
    fn test_selections_survive_reopen() {
        let temp = tempdir().unwrap();
        let settings = SettingsStore::temporary().unwrap();
        {
            let (mut s, _) = session(settings.clone(), temp.path());
            s.select_mesh("/Game/Hero");
            s.select_rig("Face");
            s.set_output_folder("/Game/Baked");
            s.queue_mut().add("/Game/A.A");
        }
        let (s, _) = session(settings, temp.path());
        assert_eq!(s.mesh(), Some("/Game/Hero"));
        assert_eq!(s.rig(), "Face");
        assert_eq!(s.output_folder(), "/Game/Baked");
        assert_eq!(s.queue().len(), 1);
    }

    #[test]
    fn test_mapping_rig_is_asset_name() {
        let temp = tempdir().unwrap();
        let settings = SettingsStore::temporary().unwrap();
        settings
            .set_string(sections::EDITING_SESSION, RIG_KEY, "/Game/Rigs/Face_CR.Face_CR")
            .unwrap();
        assert_eq!(
            EditingSession::restored_rig(&settings, &SessionConfig::default()),
            "/Game/Rigs/Face_CR.Face_CR"
        );

        let (mut s, _) = session(settings, temp.path());
        assert_eq!(s.mapping_rig(), "Face_CR");
        s.select_rig("Body");
        assert_eq!(s.mapping_rig(), "Body");
    }

    #[test]
    fn test_rig_observers_fire_on_change_only() {
        let temp = tempdir().unwrap();
        let (mut s, _) = session(SettingsStore::temporary().unwrap(), temp.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        s.on_rig_changed(Arc::new(move |rig: &str| sink.lock().push(rig.to_string())));

        assert!(s.select_rig("Face"));
        assert!(!s.select_rig("Face"));
        assert!(!s.select_rig(""));
        assert_eq!(*seen.lock(), vec!["Face"]);
    }

    #[test]
    fn test_load_next_without_mesh_still_advances() {
        let temp = tempdir().unwrap();
        let (mut s, console) = session(SettingsStore::temporary().unwrap(), temp.path());
        assert_eq!(s.load_next(), None);

        s.queue_mut().add("/Game/A.A");
        assert_eq!(s.load_next(), Some(0));
        assert!(!console.is_open());

        s.select_mesh("/Game/Hero");
        assert_eq!(s.load_next(), Some(0));
        assert_eq!(console.open_animation().as_deref(), Some("/Game/A.A"));
    }

    #[test]
    fn test_bake_marks_processed() {
        let temp = tempdir().unwrap();
        let (mut s, _) = session(SettingsStore::temporary().unwrap(), temp.path());
        assert!(s.bake_and_save().is_none());

        s.select_mesh("/Game/Hero");
        s.queue_mut().add("/Game/Anims/Walk.Walk");
        s.load_next();

        let path = s.bake_and_save().unwrap();
        assert!(path.starts_with(temp.path().join("Game/ToucanTemp/Output")));
        assert!(path.ends_with("Walk_Baked.json"));
        assert!(path.exists());
        assert!(s.queue().is_processed("/Game/Anims/Walk.Walk"));
    }
}
