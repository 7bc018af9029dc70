//! Output folder selection and dated bake subfolders

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Output folder used when nothing was selected yet
pub const DEFAULT_OUTPUT_FOLDER: &str = "/Game/ToucanTemp/Output";

/// Settings key of the selected folder
pub const OUTPUT_FOLDER_KEY: &str = "LastSelectedOutputFolder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFolder {
    folder: String,
}

impl Default for OutputFolder {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_FOLDER)
    }
}

impl OutputFolder {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn get(&self) -> &str {
        &self.folder
    }

    pub fn set(&mut self, folder: impl Into<String>) {
        self.folder = folder.into();
    }

    /// `<folder>/<YYYY-MM-DD>` with doubled separators collapsed
    pub fn dated_subfolder(&self, date: NaiveDate) -> String {
        let mut path = format!("{}/{}", self.folder, date.format("%Y-%m-%d"));
        while path.contains("//") {
            path = path.replace("//", "/");
        }
        path
    }

    /// Dated subfolder for the local date
    pub fn today(&self) -> String {
        self.dated_subfolder(chrono::Local::now().date_naive())
    }

    /// Map a content folder (`/Game/...`) onto the bake root on disk
    pub fn resolve(root: &Path, folder: &str) -> PathBuf {
        folder
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn test_dated_subfolder() {
        let out = OutputFolder::default();
        assert_eq!(out.dated_subfolder(date()), "/Game/ToucanTemp/Output/2026-10-17");
    }

    #[test]
    fn test_doubled_separators_collapse() {
        let out = OutputFolder::new("/Game//Baked/");
        assert_eq!(out.dated_subfolder(date()), "/Game/Baked/2026-10-17");
    }

    #[test]
    fn test_resolve_under_root() {
        let root = Path::new("/data/output");
        assert_eq!(
            OutputFolder::resolve(root, "/Game/Baked/../2026-10-17"),
            PathBuf::from("/data/output/Game/Baked/2026-10-17")
        );
    }
}
