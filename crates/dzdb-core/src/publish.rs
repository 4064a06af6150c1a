//! Published artifacts
//!
//! Everything is assembled in memory first; [`write_artifacts`] only runs
//! once the build has passed every fatal check, and each file is replaced
//! atomically. [`verify_outputs`] re-reads what was written and fails the
//! build if any row count disagrees with the metadata descriptor.

use crate::config::ProjectLayout;
use crate::error::{Error, Result};
use crate::fragment::write_atomic;
use crate::history::TombstoneLedger;
use crate::record::{ObjectRecord, KEY_IMAGE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILE: &str = "objects.json";
pub const NAMES_FILE: &str = "names.json";
pub const CONFIG_NAMES_FILE: &str = "config_names.json";
pub const META_FILE: &str = "meta.json";
const KEY_IMAGE_URL: &str = "imageUrl";

/// One row of a name index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameEntry {
    pub id: String,
    pub object_name: String,
}

/// Row counts and generation time for the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDescriptor {
    pub api_version: String,
    pub generated_at: String,
    pub object_count: usize,
    pub name_count: usize,
    pub config_name_count: usize,
}

/// Everything a build publishes, ready to be written
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub canonical: Vec<ObjectRecord>,
    pub snapshot: Vec<Map<String, Value>>,
    pub names: Vec<NameEntry>,
    pub config_names: Vec<NameEntry>,
    pub meta: MetaDescriptor,
}

/// Paths written by [`write_artifacts`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub files_written: Vec<PathBuf>,
    pub backup: Option<PathBuf>,
    pub types_xml_copied: bool,
}

fn record_id(record: &ObjectRecord) -> &str {
    record
        .object_id
        .as_deref()
        .or_else(|| record.trimmed_id())
        .unwrap_or("")
}

/// Join the image base URL and a relative image path
pub fn image_url(base: &str, image: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        image.trim().trim_start_matches('/')
    )
}

/// Record as published in the snapshot, with its absolute image URL
pub fn snapshot_record(record: &ObjectRecord, image_base_url: &str) -> Map<String, Value> {
    let mut map = record.to_json();
    let image = record.image_str().trim();
    if !image.is_empty() {
        let url = image_url(image_base_url, image);
        // keep the URL next to the image it was derived from
        let mut with_url = Map::new();
        for (key, value) in map {
            let is_image = key == KEY_IMAGE;
            with_url.insert(key, value);
            if is_image {
                with_url.insert(KEY_IMAGE_URL.to_string(), Value::String(url.clone()));
            }
        }
        map = with_url;
    }
    map
}

/// `{id, objectName}` pairs sorted by lower-cased name, then id
pub fn name_index<'a, I>(records: I) -> Vec<NameEntry>
where
    I: IntoIterator<Item = &'a ObjectRecord>,
{
    let mut entries: Vec<NameEntry> = records
        .into_iter()
        .map(|record| NameEntry {
            id: record_id(record).to_string(),
            object_name: record.name().to_string(),
        })
        .collect();
    entries.sort_by(|a, b| {
        a.object_name
            .to_lowercase()
            .cmp(&b.object_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    entries
}

/// Assemble all artifacts from the finalized dataset
pub fn build_artifacts(
    records: Vec<ObjectRecord>,
    image_base_url: &str,
    gameplay_model_type: &str,
    api_version: &str,
    generated_at: &str,
) -> Artifacts {
    let mut sorted: Vec<&ObjectRecord> = records.iter().collect();
    sorted.sort_by(|a, b| record_id(a).cmp(record_id(b)));
    let snapshot: Vec<Map<String, Value>> = sorted
        .iter()
        .map(|record| snapshot_record(record, image_base_url))
        .collect();

    let names = name_index(&records);
    let config_names = name_index(
        records
            .iter()
            .filter(|record| record.has_model_type(gameplay_model_type)),
    );

    let meta = MetaDescriptor {
        api_version: api_version.to_string(),
        generated_at: generated_at.to_string(),
        object_count: snapshot.len(),
        name_count: names.len(),
        config_name_count: config_names.len(),
    };

    Artifacts {
        canonical: records,
        snapshot,
        names,
        config_names,
        meta,
    }
}

fn to_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    Ok(content.into_bytes())
}

fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    report: &mut PublishReport,
) -> Result<()> {
    write_atomic(path, &to_pretty(value)?)?;
    report.files_written.push(path.to_path_buf());
    Ok(())
}

/// Load a previously published canonical dataset; missing means empty
pub fn load_published<P: AsRef<Path>>(path: P) -> Result<Vec<ObjectRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_json(path)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| Error::FragmentParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write every artifact, rotating the previous canonical dataset into the
/// backup slot first
pub fn write_artifacts(
    layout: &ProjectLayout,
    artifacts: &Artifacts,
    ledger: &TombstoneLedger,
) -> Result<PublishReport> {
    let mut report = PublishReport::default();

    fs::create_dir_all(&layout.data_dir)?;
    fs::create_dir_all(&layout.static_data_dir)?;
    fs::create_dir_all(&layout.api_dir)?;

    if layout.canonical_json.exists() {
        fs::copy(&layout.canonical_json, &layout.backup_json).map_err(|e| Error::FileWrite {
            path: layout.backup_json.clone(),
            source: e,
        })?;
        report.backup = Some(layout.backup_json.clone());
    }

    let canonical = to_pretty(&artifacts.canonical)?;
    write_atomic(&layout.canonical_json, &canonical)?;
    report.files_written.push(layout.canonical_json.clone());
    let static_copy = layout.static_data_dir.join("dayz_objects.json");
    write_atomic(&static_copy, &canonical)?;
    report.files_written.push(static_copy);

    write_json(&layout.api_dir.join(SNAPSHOT_FILE), &artifacts.snapshot, &mut report)?;
    write_json(&layout.api_dir.join(NAMES_FILE), &artifacts.names, &mut report)?;
    write_json(
        &layout.api_dir.join(CONFIG_NAMES_FILE),
        &artifacts.config_names,
        &mut report,
    )?;
    write_json(&layout.api_dir.join(META_FILE), &artifacts.meta, &mut report)?;

    ledger.save(&layout.tombstones_json)?;
    report.files_written.push(layout.tombstones_json.clone());

    if layout.types_xml_file.is_file() {
        let target = layout.static_data_dir.join(
            layout
                .types_xml_file
                .file_name()
                .unwrap_or_else(|| "types_aggregated.xml".as_ref()),
        );
        fs::copy(&layout.types_xml_file, &target).map_err(|e| Error::FileWrite {
            path: target.clone(),
            source: e,
        })?;
        report.types_xml_copied = true;
        report.files_written.push(target);
    } else {
        tracing::warn!(
            "types_aggregated.xml not found at {}",
            layout.types_xml_file.display()
        );
    }

    Ok(report)
}

fn check_count(path: &Path, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::IntegrityMismatch {
            path: path.to_path_buf(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Re-read the published files and compare their row counts with the
/// metadata descriptor
pub fn verify_outputs(layout: &ProjectLayout) -> Result<MetaDescriptor> {
    let meta: MetaDescriptor = read_json(&layout.api_dir.join(META_FILE))?;

    let snapshot_path = layout.api_dir.join(SNAPSHOT_FILE);
    let snapshot: Vec<Value> = read_json(&snapshot_path)?;
    check_count(&snapshot_path, meta.object_count, snapshot.len())?;

    let canonical: Vec<Value> = read_json(&layout.canonical_json)?;
    check_count(&layout.canonical_json, meta.object_count, canonical.len())?;

    let names_path = layout.api_dir.join(NAMES_FILE);
    let names: Vec<NameEntry> = read_json(&names_path)?;
    check_count(&names_path, meta.name_count, names.len())?;

    let config_path = layout.api_dir.join(CONFIG_NAMES_FILE);
    let config_names: Vec<NameEntry> = read_json(&config_path)?;
    check_count(&config_path, meta.config_name_count, config_names.len())?;

    Ok(meta)
}
