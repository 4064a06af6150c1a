//! Directory scanner for discovering source fragments

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name of per-folder object fragments
pub const OBJECTS_FILE: &str = "objects.json";
/// Directory of preset fragments under the database root
pub const PRESETS_DIR: &str = "presets";
/// Legacy single-file presets under the database root
pub const PRESETS_FILE: &str = "presets.json";

/// Kind of source fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Preset,
    Objects,
}

/// A discovered source fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

/// Result of scanning the database root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSet {
    /// Root directory that was scanned
    pub root: PathBuf,
    /// Sources in load order: presets first, then objects files
    pub files: Vec<SourceFile>,
}

impl SourceSet {
    /// All source paths in load order
    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }

    /// Only the per-folder objects files
    pub fn object_files(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|f| f.kind == SourceKind::Objects)
            .map(|f| f.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Scan a database root for source fragments
///
/// Order is `presets/*.json` (sorted), then `presets.json`, then every
/// `objects.json` below the root (sorted by path). This order defines the
/// first-seen order used by duplicate collapsing.
pub fn scan_database<P: AsRef<Path>>(root: P) -> Result<SourceSet> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::DatabaseNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();

    let presets_dir = root.join(PRESETS_DIR);
    if presets_dir.is_dir() {
        let mut presets: Vec<PathBuf> = WalkDir::new(&presets_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        presets.sort();
        if presets.is_empty() {
            tracing::warn!("presets folder has no json files: {}", presets_dir.display());
        }
        files.extend(presets.into_iter().map(|path| SourceFile {
            path,
            kind: SourceKind::Preset,
        }));
    }

    let presets_file = root.join(PRESETS_FILE);
    if presets_file.is_file() {
        files.push(SourceFile {
            path: presets_file,
            kind: SourceKind::Preset,
        });
    }

    let mut objects = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == OBJECTS_FILE {
            objects.push(entry.into_path());
        }
    }
    objects.sort();
    files.extend(objects.into_iter().map(|path| SourceFile {
        path,
        kind: SourceKind::Objects,
    }));

    tracing::debug!("scanned {} source fragments under {}", files.len(), root.display());

    Ok(SourceSet {
        root: root.to_path_buf(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "[]").unwrap();
    }

    #[test]
    fn test_scan_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("presets/b.json"));
        touch(&root.join("presets/a.json"));
        touch(&root.join("presets/notes.txt"));
        touch(&root.join("presets.json"));
        touch(&root.join("dz/weapons/objects.json"));
        touch(&root.join("dz/gear/objects.json"));
        touch(&root.join("dz/gear/other.json"));

        let set = scan_database(root).unwrap();
        let rel: Vec<PathBuf> = set
            .paths()
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("presets/a.json"),
                PathBuf::from("presets/b.json"),
                PathBuf::from("presets.json"),
                PathBuf::from("dz/gear/objects.json"),
                PathBuf::from("dz/weapons/objects.json"),
            ]
        );
        assert_eq!(set.object_files().count(), 2);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_database(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::DatabaseNotFound(_)));
    }
}
