//! Animation queue with a cursor
//!
//! The cursor is `None` or a valid index into the list. Every mutation is
//! persisted to the `ToucanSequencer` settings section when a store is attached.

use crate::error::{MapperError, Result};
use crate::session::OutputFolder;
use crate::settings::{sections, SettingsStore};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const QUEUE_KEY: &str = "Queue";
const CURRENT_INDEX_KEY: &str = "CurrentIndex";

/// File extension of animation assets on disk
const ANIMATION_EXTENSION: &str = "uasset";

/// Callback fired after every queue mutation with the items and cursor
pub type QueueObserver = Arc<dyn Fn(&[QueuedAnim], Option<usize>) + Send + Sync>;

/// Queue entry; equality by path
#[derive(Debug, Clone, Eq)]
pub struct QueuedAnim {
    pub path: String,
    pub display_name: String,
}

impl PartialEq for QueuedAnim {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl QueuedAnim {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let display_name = asset_name(&path).to_string();
        Self { path, display_name }
    }

    pub fn with_name(path: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: display_name.into(),
        }
    }
}

/// Asset name of an object path: text after the last `.`, else after the last `/`
pub fn asset_name(path: &str) -> &str {
    if let Some((_, name)) = path.rsplit_once('.') {
        if !name.is_empty() && !name.contains('/') {
            return name;
        }
    }
    path.rsplit('/').next().unwrap_or(path)
}

/// Object paths of every animation asset under a content folder, recursively
///
/// `folder` is a content path (`/Game/Anims`) resolved against `content_root`.
/// `<root>/Game/Anims/Walk.uasset` becomes `/Game/Anims/Walk.Walk`. Depth-first, by file name.
pub fn animations_in_folder(content_root: &Path, folder: &str) -> Result<Vec<String>> {
    let dir = OutputFolder::resolve(content_root, folder);
    if !dir.is_dir() {
        return Err(MapperError::InvalidParameter(format!(
            "content folder not found: {}",
            folder
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        let is_animation = entry.file_type().is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(ANIMATION_EXTENSION);
        if !is_animation {
            continue;
        }
        let (Ok(relative), Some(stem)) = (
            path.strip_prefix(content_root),
            path.file_stem().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        let mut object = String::new();
        for part in relative.parent().into_iter().flat_map(Path::iter) {
            object.push('/');
            object.push_str(&part.to_string_lossy());
        }
        paths.push(format!("{}/{}.{}", object, stem, stem));
    }

    debug!("Found {} animation(s) under {}", paths.len(), folder);
    Ok(paths)
}

/// Ordered animation queue
#[derive(Default)]
pub struct AnimationQueue {
    items: Vec<QueuedAnim>,
    current: Option<usize>,
    processed: HashSet<String>,
    settings: Option<SettingsStore>,
    observers: Vec<QueueObserver>,
}

impl AnimationQueue {
    /// Queue without persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the queue from the settings store and persist future changes there
    ///
    /// A stored cursor outside the restored list is dropped.
    pub fn load(settings: SettingsStore) -> Self {
        let paths = settings
            .get_array(sections::SEQUENCER, QUEUE_KEY)
            .unwrap_or_default();

        let mut queue = Self {
            settings: Some(settings),
            ..Self::default()
        };
        for path in paths {
            if !path.is_empty() && !queue.contains(&path) {
                queue.items.push(QueuedAnim::new(path));
            }
        }

        let stored = queue
            .settings
            .as_ref()
            .and_then(|s| s.get_int(sections::SEQUENCER, CURRENT_INDEX_KEY))
            .unwrap_or(-1);
        queue.current = usize::try_from(stored)
            .ok()
            .filter(|&i| i < queue.items.len());

        info!(
            "Restored queue: {} item(s), cursor {:?}",
            queue.items.len(),
            queue.current
        );
        queue
    }

    pub fn on_changed(&mut self, observer: QueueObserver) {
        self.observers.push(observer);
    }

    fn contains(&self, path: &str) -> bool {
        self.items.iter().any(|a| a.path == path)
    }

    pub fn add(&mut self, path: &str) -> bool {
        self.add_entry(QueuedAnim::new(path))
    }

    pub fn add_with_name(&mut self, path: &str, display_name: &str) -> bool {
        self.add_entry(QueuedAnim::with_name(path, display_name))
    }

    fn add_entry(&mut self, anim: QueuedAnim) -> bool {
        if anim.path.is_empty() {
            debug!("Ignoring empty queue path");
            return false;
        }
        if self.contains(&anim.path) {
            debug!("Already queued: {}", anim.path);
            return false;
        }
        debug!("Queued {}", anim.path);
        self.items.push(anim);
        self.changed();
        true
    }

    /// Remove the entry at `index`; `false` when out of range
    pub fn remove_at(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.items.remove(index);
        self.current = match self.current {
            Some(c) if index < c => Some(c - 1),
            Some(c) if index == c => None,
            other => other,
        };
        self.changed();
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current = None;
        self.changed();
    }

    /// Advance the cursor, wrapping at the end
    ///
    /// Empty queue: no-op and `None`. No cursor yet: index 0.
    pub fn next(&mut self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let next = match self.current {
            None => 0,
            Some(c) => (c + 1) % self.items.len(),
        };
        self.current = Some(next);
        self.changed();
        Some(next)
    }

    /// Set the cursor; `None` or an out-of-range index resets it
    pub fn set_current_index(&mut self, index: Option<usize>) {
        self.current = index.filter(|&i| i < self.items.len());
        self.changed();
    }

    pub fn current(&self) -> Option<&QueuedAnim> {
        self.current.and_then(|i| self.items.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn items(&self) -> &[QueuedAnim] {
        &self.items
    }

    /// Owned copy of the entries
    pub fn get_all(&self) -> Vec<QueuedAnim> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Flag an asset as processed (stored as asset metadata, not in the queue)
    pub fn mark_processed(&mut self, path: &str) {
        self.processed.insert(path.to_string());
        if let Some(settings) = &self.settings {
            if let Err(e) = settings.set_bool(sections::ASSET_METADATA, path, true) {
                warn!("Failed to store processed flag for {}: {}", path, e);
            }
        }
    }

    pub fn is_processed(&self, path: &str) -> bool {
        self.processed.contains(path)
            || self
                .settings
                .as_ref()
                .and_then(|s| s.get_bool(sections::ASSET_METADATA, path))
                .unwrap_or(false)
    }

    /// Drop every processed entry; returns how many were removed
    pub fn remove_processed(&mut self) -> usize {
        let mut removed = 0;
        let mut index = 0;
        while index < self.items.len() {
            if self.is_processed(&self.items[index].path) {
                self.remove_at(index);
                removed += 1;
            } else {
                index += 1;
            }
        }
        removed
    }

    /// Write the paths and cursor to the settings store
    pub fn persist(&self) -> Result<()> {
        let Some(settings) = &self.settings else {
            return Ok(());
        };
        let paths: Vec<String> = self.items.iter().map(|a| a.path.clone()).collect();
        settings.set_array(sections::SEQUENCER, QUEUE_KEY, &paths)?;
        let index = self.current.map(|i| i as i64).unwrap_or(-1);
        settings.set_int(sections::SEQUENCER, CURRENT_INDEX_KEY, index)?;
        Ok(())
    }

    fn changed(&self) {
        if let Err(e) = self.persist() {
            warn!("Failed to persist queue: {}", e);
        }
        for observer in &self.observers {
            observer(&self.items, self.current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn queue_of(paths: &[&str]) -> AnimationQueue {
        let mut q = AnimationQueue::new();
        for p in paths {
            q.add(p);
        }
        q
    }

    #[test]
    fn test_asset_name() {
        assert_eq!(asset_name("/Game/Anims/Walk.Walk"), "Walk");
        assert_eq!(asset_name("/Game/Anims/Run"), "Run");
        assert_eq!(asset_name("Jump"), "Jump");
    }

    #[test]
    fn test_animations_in_folder_recurses() {
        let root = tempfile::tempdir().unwrap();
        let anims = root.path().join("Game").join("Anims");
        std::fs::create_dir_all(anims.join("Face")).unwrap();
        std::fs::write(anims.join("Walk.uasset"), b"").unwrap();
        std::fs::write(anims.join("Face").join("Smile.uasset"), b"").unwrap();
        std::fs::write(anims.join("notes.txt"), b"").unwrap();

        let found = animations_in_folder(root.path(), "/Game/Anims").unwrap();
        assert_eq!(found, vec!["/Game/Anims/Face/Smile.Smile", "/Game/Anims/Walk.Walk"]);

        let mut q = AnimationQueue::new();
        for path in &found {
            q.add(path);
        }
        assert_eq!(q.items()[1].display_name, "Walk");

        assert!(animations_in_folder(root.path(), "/Game/Missing").is_err());
    }

    #[test]
    fn test_add_dedupes_and_ignores_empty() {
        let mut q = AnimationQueue::new();
        assert!(q.add("/Game/A.A"));
        assert!(!q.add("/Game/A.A"));
        assert!(!q.add(""));
        assert!(q.add_with_name("/Game/B.B", "Custom"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.items()[0].display_name, "A");
        assert_eq!(q.items()[1].display_name, "Custom");
    }

    #[test]
    fn test_add_add_remove_first() {
        let mut q = queue_of(&["A", "B"]);
        assert!(q.remove_at(0));
        assert_eq!(q.get_all(), vec![QueuedAnim::new("B")]);
        assert!(!q.remove_at(5));
    }

    #[test]
    fn test_cursor_rules_on_remove() {
        let mut q = queue_of(&["A", "B", "C"]);
        q.set_current_index(Some(1));
        q.remove_at(0);
        assert_eq!(q.current_index(), Some(0));
        assert_eq!(q.current().unwrap().path, "B");

        q.remove_at(1);
        assert_eq!(q.current_index(), Some(0));

        q.remove_at(0);
        assert_eq!(q.current_index(), None);
    }

    #[test]
    fn test_next_wraps_and_empty_is_noop() {
        let mut empty = AnimationQueue::new();
        assert_eq!(empty.next(), None);
        assert_eq!(empty.current_index(), None);

        let mut q = queue_of(&["A", "B"]);
        assert_eq!(q.next(), Some(0));
        assert_eq!(q.next(), Some(1));
        assert_eq!(q.next(), Some(0));
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut q = queue_of(&["A", "B"]);
        q.next();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.current_index(), None);
    }

    #[test]
    fn test_set_current_index_out_of_range_resets() {
        let mut q = queue_of(&["A"]);
        q.set_current_index(Some(0));
        q.set_current_index(Some(3));
        assert_eq!(q.current_index(), None);
    }

    #[test]
    fn test_processed_entries_are_removed() {
        let mut q = queue_of(&["A", "B", "C"]);
        q.set_current_index(Some(2));
        q.mark_processed("A");
        q.mark_processed("B");
        assert!(q.is_processed("A"));
        assert!(!q.is_processed("C"));

        assert_eq!(q.remove_processed(), 2);
        assert_eq!(q.get_all(), vec![QueuedAnim::new("C")]);
        assert_eq!(q.current_index(), Some(0));
    }

    #[test]
    fn test_queue_survives_reload() {
        let settings = SettingsStore::temporary().unwrap();
        {
            let mut q = AnimationQueue::load(settings.clone());
            q.add("/Game/A.A");
            q.add("/Game/B.B");
            q.next();
            q.next();
            q.mark_processed("/Game/A.A");
        }

        let q = AnimationQueue::load(settings.clone());
        assert_eq!(q.len(), 2);
        assert_eq!(q.current_index(), Some(1));
        assert_eq!(q.current().unwrap().display_name, "B");
        assert!(q.is_processed("/Game/A.A"));
        assert_eq!(settings.get_int("ToucanSequencer", "CurrentIndex"), Some(1));
    }

    #[test]
    fn test_stale_cursor_is_dropped_on_load() {
        let settings = SettingsStore::temporary().unwrap();
        settings
            .set_array("ToucanSequencer", "Queue", &["A".to_string()])
            .unwrap();
        settings.set_int("ToucanSequencer", "CurrentIndex", 4).unwrap();

        let q = AnimationQueue::load(settings);
        assert_eq!(q.len(), 1);
        assert_eq!(q.current_index(), None);
    }

    #[test]
    fn test_observers_see_every_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut q = AnimationQueue::new();
        q.on_changed(Arc::new(move |items, cursor| {
            sink.lock().push((items.len(), cursor));
        }));

        q.add("A");
        q.next();
        q.clear();
        assert_eq!(*seen.lock(), vec![(1, None), (1, Some(0)), (0, None)]);
    }

    #[derive(Debug, Clone)]
    enum QueueOp {
        Add(u8),
        Remove(usize),
        Next,
        Clear,
    }

    fn arb_op() -> impl Strategy<Value = QueueOp> {
        prop_oneof![
            (0..8u8).prop_map(QueueOp::Add),
            (0..10usize).prop_map(QueueOp::Remove),
            Just(QueueOp::Next),
            Just(QueueOp::Clear),
        ]
    }

    proptest! {
        #[test]
        fn prop_cursor_stays_valid(ops in prop::collection::vec(arb_op(), 0..40)) {
            let mut q = AnimationQueue::new();
            for op in ops {
                match op {
                    QueueOp::Add(n) => { q.add(&format!("/Game/Anim{}", n)); }
                    QueueOp::Remove(i) => { q.remove_at(i); }
                    QueueOp::Next => { q.next(); }
                    QueueOp::Clear => q.clear(),
                }
                if let Some(c) = q.current_index() {
                    prop_assert!(c < q.len());
                }
                let mut paths: Vec<_> = q.items().iter().map(|a| a.path.clone()).collect();
                paths.sort();
                paths.dedup();
                prop_assert_eq!(paths.len(), q.len());
            }
        }
    }
}
