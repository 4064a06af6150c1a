//! Source fragment loading and saving
//!
//! A fragment is one JSON file holding either a single object record or a
//! list of them. Rows are kept as raw JSON objects so that rewriting a
//! fragment only changes what the pipeline actually touched.

use crate::error::{Error, Result};
use crate::record::{ObjectRecord, KEY_IMAGE};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A parsed source file
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Source file path
    pub path: PathBuf,
    /// Raw object rows, in file order
    pub rows: Vec<Map<String, Value>>,
}

impl Fragment {
    /// Number of rows in the fragment
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Convert rows into normalized object records
    pub fn records(&self) -> Vec<ObjectRecord> {
        self.rows
            .iter()
            .cloned()
            .map(|mut row| {
                normalize_row(&mut row);
                ObjectRecord::from_json(row)
            })
            .collect()
    }

    /// Write the fragment back as a pretty-printed list
    pub fn save(&self) -> Result<()> {
        let mut content = serde_json::to_string_pretty(&self.rows)?;
        content.push('\n');
        write_atomic(&self.path, content.as_bytes())
    }
}

/// Load a fragment from disk
pub fn load_fragment<P: AsRef<Path>>(path: P) -> Result<Fragment> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_fragment_str(&content, path)
}

/// Parse fragment text (useful for testing)
pub fn parse_fragment_str<P: AsRef<Path>>(content: &str, source: P) -> Result<Fragment> {
    let path = source.as_ref().to_path_buf();
    let value: Value = serde_json::from_str(content).map_err(|e| Error::FragmentParse {
        path: path.clone(),
        source: e,
    })?;

    let rows = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    };

    Ok(Fragment { path, rows })
}

/// Lower-case an image path component-wise so comparisons are stable
pub fn normalize_image(image: &str) -> String {
    let lowered = image.to_lowercase();
    let parts: Vec<&str> = lowered
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    let joined = parts.join("/");
    if lowered.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

fn normalize_row(row: &mut Map<String, Value>) {
    if let Some(Value::String(image)) = row.get_mut(KEY_IMAGE) {
        *image = normalize_image(image);
    }
}

/// Mode for files that did not exist before a write
#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Replace a file through a temporary sibling so readers never observe a
/// partial write. An existing file keeps its permissions; a new one gets
/// the usual `0644`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::FileWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
    }
    tmp.persist(path).map_err(|e| Error::Persist {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
