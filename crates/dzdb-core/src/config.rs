//! Build configuration
//!
//! Every path is relative to the project root unless it is absolute.

use crate::error::{Error, Result};
use crate::fragment::write_atomic;
use crate::geometry::GeometryRules;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name looked up in the project root
pub const CONFIG_FILE: &str = "dzdb.json";

/// Settings for one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildConfig {
    /// Source fragment tree
    pub database_dir: PathBuf,
    /// Canonical dataset, backup, ledger
    pub data_dir: PathBuf,
    /// Published static site root
    pub static_dir: PathBuf,
    /// Sidecar override file
    pub overrides_file: PathBuf,
    /// Optional identifier → bounding box input
    pub donor_map_file: PathBuf,
    /// Optional aggregated types XML copied to the static site
    pub types_xml_file: PathBuf,
    /// Review sheets written by the report commands
    pub reports_dir: PathBuf,
    /// Prefix for denormalized image URLs in the snapshot
    pub image_base_url: String,
    /// Snapshot directory name under `static/api`
    pub api_version: String,
    #[serde(flatten)]
    pub geometry: GeometryRules,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            database_dir: PathBuf::from("database"),
            data_dir: PathBuf::from("data"),
            static_dir: PathBuf::from("static"),
            overrides_file: PathBuf::from("database/overrides.json"),
            donor_map_file: PathBuf::from("data/bbox_donors.json"),
            types_xml_file: PathBuf::from("data/types_aggregated.xml"),
            reports_dir: PathBuf::from("reports"),
            image_base_url: "/static/images".to_string(),
            api_version: "v1".to_string(),
            geometry: GeometryRules::default(),
        }
    }
}

impl BuildConfig {
    /// Load a config file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| Error::FragmentParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `<root>/dzdb.json` if present, otherwise use defaults
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Self> {
        let candidate = root.as_ref().join(CONFIG_FILE);
        if candidate.is_file() {
            tracing::debug!("using config {}", candidate.display());
            Self::load(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the config file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        write_atomic(path.as_ref(), content.as_bytes())
    }
}

/// Config paths resolved against a project root
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub database_dir: PathBuf,
    pub data_dir: PathBuf,
    pub static_dir: PathBuf,
    pub overrides_file: PathBuf,
    pub donor_map_file: PathBuf,
    pub types_xml_file: PathBuf,
    pub reports_dir: PathBuf,
    pub canonical_json: PathBuf,
    pub backup_json: PathBuf,
    pub tombstones_json: PathBuf,
    pub static_data_dir: PathBuf,
    pub api_dir: PathBuf,
}

impl ProjectLayout {
    pub fn resolve<P: AsRef<Path>>(root: P, config: &BuildConfig) -> Self {
        let root = root.as_ref().to_path_buf();
        let at = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { root.join(p) };
        let data_dir = at(&config.data_dir);
        let static_dir = at(&config.static_dir);
        Self {
            database_dir: at(&config.database_dir),
            overrides_file: at(&config.overrides_file),
            donor_map_file: at(&config.donor_map_file),
            types_xml_file: at(&config.types_xml_file),
            reports_dir: at(&config.reports_dir),
            canonical_json: data_dir.join("dayz_objects.json"),
            backup_json: data_dir.join("dayz_objects_last_version.json"),
            tombstones_json: data_dir.join("tombstones.json"),
            static_data_dir: static_dir.join("data"),
            api_dir: static_dir.join("api").join(&config.api_version),
            data_dir,
            static_dir,
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let text = r#"{ "imageBaseUrl": "https://cdn.example/img", "rawModelType": "Mesh" }"#;
        let config: BuildConfig = serde_json::from_str(text).unwrap();
        assert_eq!(config.image_base_url, "https://cdn.example/img");
        assert_eq!(config.geometry.raw_model_type, "Mesh");
        assert_eq!(config.geometry.gameplay_model_type, "Config");
        assert_eq!(config.database_dir, PathBuf::from("database"));
    }

    #[test]
    fn test_layout_resolution() {
        let layout = ProjectLayout::resolve("/project", &BuildConfig::default());
        assert_eq!(layout.canonical_json, PathBuf::from("/project/data/dayz_objects.json"));
        assert_eq!(layout.api_dir, PathBuf::from("/project/static/api/v1"));
        assert_eq!(layout.overrides_file, PathBuf::from("/project/database/overrides.json"));
    }

    #[test]
    fn test_save_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BuildConfig::default();
        config.api_version = "v2".to_string();
        config.save(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(BuildConfig::discover(dir.path()).unwrap(), config);
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(BuildConfig::discover(empty.path()).unwrap(), BuildConfig::default());
    }
}
