//! Maintenance reports over the source tree and the published dataset
//!
//! These never feed back into a build. They exist so a maintainer can
//! review names, class names, folder sizes and unresolved geometry by hand.

use crate::error::{Error, Result};
use crate::fragment::{load_fragment, write_atomic};
use crate::geometry::{path_family, TOKEN_PREFIXES};
use crate::record::DimensionsSource;
use crate::record::{
    parse_vec3, KEY_BBOX_MAX, KEY_BBOX_MIN, KEY_DIMENSIONS, KEY_DIMENSIONS_SOURCE, KEY_ID,
    KEY_IMAGE, KEY_LINKED_FROM_ID, KEY_MODEL_TYPE, KEY_OBJECT_NAME, KEY_PATH, KEY_SEARCH_TAGS,
};
use crate::scanner::SourceSet;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const NAMES_CSV: &str = "unique_object_names.csv";
pub const LINKS_CSV: &str = "config_variant_link_candidates.csv";
pub const LINKS_JSON: &str = "config_variant_link_candidates.json";
pub const COUNTS_FILE: &str = "object_count.txt";

/// Keys tried in order when looking for a display name
const NAME_KEYS: &[&str] = &[KEY_OBJECT_NAME, "name", "Name"];

/// Keys tried in order when looking for a class name
const CLASS_NAME_KEYS: &[&str] = &[KEY_OBJECT_NAME, "className", "classname", "name"];

/// Path prefixes listed by the class-name report when none are given
pub const DEFAULT_CLASS_PREFIXES: &[&str] = &["dz/characters", "dz/gear", "dz/weapons"];

/// Column order of the link review sheet
pub const LINK_HEADERS: &[&str] = &[
    "id",
    "objectName",
    "modelType",
    "path",
    "image",
    "category",
    "searchTags",
    "dimensionsSource",
    "baseVariantKey",
    "pathFamily",
    "candidateStatus",
    "candidateMethod",
    "candidateConfidence",
    "candidateCount",
    "donorId",
    "donorObjectName",
    "donorPath",
    "donorImage",
    "donorDimensionsVisual",
    "notes",
];

/// Colour, camouflage and map tokens that distinguish variants of one model
const VARIANT_TOKENS: &[&str] = &[
    "black", "white", "blue", "green", "red", "yellow", "orange", "brown", "grey", "gray", "tan",
    "beige", "pink", "purple", "violet", "olive", "khaki", "camo", "camo1", "camouflaged",
    "woodland", "desert", "winter", "summer", "autumn", "fall", "dark", "light", "lightblue",
    "darkblue", "darkgreen", "darkgrey", "lightgrey", "navy", "maroon", "gold", "silver", "police",
    "medic", "mil", "military", "de", "chernarus", "livonia", "sakhal", "ttsko",
];

type Row = Map<String, Value>;

fn str_field<'a>(row: &'a Row, key: &str) -> &'a str {
    row.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Load the published dataset as raw rows, derived fields included
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<Row>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "run a build first"),
        });
    }
    Ok(load_fragment(path)?.rows)
}

fn sort_names(names: &mut Vec<String>) {
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    names.dedup();
}

fn finish_csv<W: std::io::Write>(writer: csv::Writer<W>) -> csv::Result<W> {
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

fn write_csv(path: &Path, render: impl FnOnce() -> csv::Result<Vec<u8>>) -> Result<()> {
    let bytes = render().map_err(|e| Error::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_atomic(path, &bytes)
}

// Names

/// Distinct trimmed names, sorted case-insensitively
pub fn unique_object_names(rows: &[Row]) -> Vec<String> {
    let mut names: Vec<String> = rows
        .iter()
        .filter_map(|row| {
            NAME_KEYS
                .iter()
                .map(|key| str_field(row, key).trim())
                .find(|name| !name.is_empty())
                .map(str::to_string)
        })
        .collect();
    sort_names(&mut names);
    names
}

pub fn names_csv(names: &[String]) -> csv::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([KEY_OBJECT_NAME])?;
    for name in names {
        writer.write_record([name])?;
    }
    finish_csv(writer)
}

pub fn export_names<P: AsRef<Path>>(path: P, names: &[String]) -> Result<()> {
    write_csv(path.as_ref(), || names_csv(names))
}

// Class names

/// Strip leading slashes and use `/` separators
pub fn normalize_class_prefix(value: &str) -> String {
    value.trim_start_matches('/').replace('\\', "/")
}

/// Distinct class names of source rows whose `path` starts with one of
/// `prefixes`, sorted case-insensitively. Unreadable fragments are skipped.
pub fn class_names<S: AsRef<str>>(sources: &SourceSet, prefixes: &[S]) -> Vec<String> {
    let prefixes: Vec<String> = prefixes
        .iter()
        .map(|p| normalize_class_prefix(p.as_ref()))
        .filter(|p| !p.is_empty())
        .collect();
    let mut names = Vec::new();
    for path in sources.paths() {
        let fragment = match load_fragment(path) {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!("skipping fragment: {}", e);
                continue;
            }
        };
        for row in &fragment.rows {
            let row_path = normalize_class_prefix(str_field(row, KEY_PATH));
            if !prefixes.iter().any(|p| row_path.starts_with(p.as_str())) {
                continue;
            }
            let name = CLASS_NAME_KEYS
                .iter()
                .map(|key| str_field(row, key).trim())
                .find(|name| !name.is_empty());
            if let Some(name) = name {
                names.push(name.to_string());
            }
        }
    }
    sort_names(&mut names);
    names
}

// Folder counts

/// Object count per directory, each fragment's rows added to its folder
/// and every ancestor up to the database root. Keys are relative paths
/// with `/` separators; the root is `.`.
pub fn folder_counts(sources: &SourceSet) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for path in sources.object_files() {
        let fragment = match load_fragment(path) {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!("skipping fragment: {}", e);
                continue;
            }
        };
        if fragment.row_count() == 0 {
            continue;
        }
        let Some(leaf) = path.parent() else { continue };
        let Ok(relative) = leaf.strip_prefix(&sources.root) else {
            continue;
        };
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        for depth in 0..=parts.len() {
            let key = if depth == 0 {
                ".".to_string()
            } else {
                parts[..depth].join("/")
            };
            *counts.entry(key).or_default() += fragment.row_count();
        }
    }
    counts
}

/// `<dir> <count>` lines
pub fn format_folder_counts(counts: &BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .map(|(dir, count)| format!("{} {}", dir, count))
        .collect::<Vec<_>>()
        .join("\n")
}

// Link candidates

/// Words of a model name: lower-cased, extension and map prefix removed
pub fn split_tokens(value: &str) -> Vec<String> {
    let mut token = value.trim().to_lowercase();
    if let Some(dot) = token.rfind('.') {
        let ext = &token[dot + 1..];
        if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            token.truncate(dot);
        }
    }
    let mut rest = token.as_str();
    if let Some(prefix) = TOKEN_PREFIXES.iter().find(|p| rest.starts_with(*p)) {
        rest = &rest[prefix.len()..];
    }
    rest.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Model name with variant tokens dropped, unless that leaves nothing
pub fn base_variant_key(value: &str) -> String {
    let parts = split_tokens(value);
    let kept: Vec<&str> = parts
        .iter()
        .map(String::as_str)
        .filter(|part| !VARIANT_TOKENS.contains(part))
        .collect();
    if kept.is_empty() {
        parts.join(" ")
    } else {
        kept.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Candidate,
    Ambiguous,
    NoCandidate,
}

/// One row of the link review sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCandidate {
    pub id: String,
    pub object_name: String,
    pub model_type: String,
    pub path: String,
    pub image: String,
    pub category: String,
    pub search_tags: String,
    pub dimensions_source: String,
    pub base_variant_key: String,
    pub path_family: String,
    pub candidate_status: CandidateStatus,
    pub candidate_method: String,
    pub candidate_confidence: String,
    pub candidate_count: usize,
    pub donor_id: String,
    pub donor_object_name: String,
    pub donor_path: String,
    pub donor_image: String,
    /// JSON array text, empty without a donor
    pub donor_dimensions_visual: String,
    pub notes: String,
}

fn has_bbox(row: &Row) -> bool {
    row.get(KEY_BBOX_MIN).and_then(parse_vec3).is_some()
        && row.get(KEY_BBOX_MAX).and_then(parse_vec3).is_some()
}

/// Suggest donors for gameplay rows that were not linked during the
/// build, matching on the variant-free base name
pub fn link_candidates(
    rows: &[Row],
    raw_model_type: &str,
    gameplay_model_type: &str,
) -> Vec<LinkCandidate> {
    let linked_source = DimensionsSource::Linked.as_str();
    let donors: Vec<&Row> = rows
        .iter()
        .filter(|row| str_field(row, KEY_MODEL_TYPE) == raw_model_type && has_bbox(row))
        .collect();

    let mut donors_by_base: HashMap<String, Vec<&Row>> = HashMap::new();
    for donor in donors.iter().copied() {
        let key = base_variant_key(str_field(donor, KEY_OBJECT_NAME));
        if !key.is_empty() {
            donors_by_base.entry(key).or_default().push(donor);
        }
    }
    let donors_by_id: HashMap<&str, &Row> = donors
        .iter()
        .copied()
        .map(|donor| (str_field(donor, KEY_ID), donor))
        .collect();

    let mut linked_by_base: HashMap<String, &str> = HashMap::new();
    let mut unresolved = Vec::new();
    for row in rows {
        if str_field(row, KEY_MODEL_TYPE) != gameplay_model_type {
            continue;
        }
        if str_field(row, KEY_DIMENSIONS_SOURCE) == linked_source {
            let key = base_variant_key(str_field(row, KEY_OBJECT_NAME));
            let donor_id = str_field(row, KEY_LINKED_FROM_ID).trim();
            if !key.is_empty() && !donor_id.is_empty() {
                linked_by_base.insert(key, donor_id);
            }
        } else {
            unresolved.push(row);
        }
    }

    let mut out: Vec<LinkCandidate> = unresolved
        .into_iter()
        .map(|row| {
            let base = base_variant_key(str_field(row, KEY_OBJECT_NAME));
            let family = path_family(str_field(row, KEY_PATH));
            let same_base: &[&Row] =
                donors_by_base.get(&base).map(Vec::as_slice).unwrap_or(&[]);
            let same_family: Vec<&Row> = same_base
                .iter()
                .copied()
                .filter(|donor| path_family(str_field(donor, KEY_PATH)) == family)
                .collect();
            let sibling = linked_by_base
                .get(&base)
                .and_then(|id| donors_by_id.get(id).copied());

            let (status, method, confidence, donor, count) = if let Some(donor) = sibling {
                (CandidateStatus::Candidate, "sibling_linked_base", "high", Some(donor), 1)
            } else if same_family.len() == 1 {
                let donor = Some(same_family[0]);
                (CandidateStatus::Candidate, "base_key_path_family", "high", donor, 1)
            } else if same_base.len() == 1 {
                let donor = Some(same_base[0]);
                (CandidateStatus::Candidate, "base_key_unique", "medium", donor, 1)
            } else if same_family.len() > 1 {
                (
                    CandidateStatus::Ambiguous,
                    "base_key_path_family_ambiguous",
                    "review",
                    None,
                    same_family.len(),
                )
            } else if same_base.len() > 1 {
                let count = same_base.len();
                (CandidateStatus::Ambiguous, "base_key_ambiguous", "review", None, count)
            } else {
                (CandidateStatus::NoCandidate, "", "", None, 0)
            };

            let notes = match status {
                CandidateStatus::Ambiguous => "Multiple donor candidates. Manual review needed.",
                CandidateStatus::NoCandidate => {
                    "No raw p3d donor found by variant-base heuristics."
                }
                CandidateStatus::Candidate => {
                    "Candidate generated by variant-base linking heuristics."
                }
            };
            let donor_field = |key: &str| {
                donor
                    .map(|d| str_field(d, key).to_string())
                    .unwrap_or_default()
            };

            LinkCandidate {
                id: str_field(row, KEY_ID).to_string(),
                object_name: str_field(row, KEY_OBJECT_NAME).to_string(),
                model_type: str_field(row, KEY_MODEL_TYPE).to_string(),
                path: str_field(row, KEY_PATH).to_string(),
                image: str_field(row, KEY_IMAGE).to_string(),
                category: str_field(row, "category").to_string(),
                search_tags: str_field(row, KEY_SEARCH_TAGS).to_string(),
                dimensions_source: str_field(row, KEY_DIMENSIONS_SOURCE).to_string(),
                base_variant_key: base,
                path_family: family,
                candidate_status: status,
                candidate_method: method.to_string(),
                candidate_confidence: confidence.to_string(),
                candidate_count: count,
                donor_id: donor_field(KEY_ID),
                donor_object_name: donor_field(KEY_OBJECT_NAME),
                donor_path: donor_field(KEY_PATH),
                donor_image: donor_field(KEY_IMAGE),
                donor_dimensions_visual: donor
                    .and_then(|d| d.get(KEY_DIMENSIONS))
                    .map(Value::to_string)
                    .unwrap_or_default(),
                notes: notes.to_string(),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        a.object_name
            .to_lowercase()
            .cmp(&b.object_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    out
}

/// The review sheet as CSV. The header row is written even when there
/// are no candidates.
pub fn link_candidates_csv(candidates: &[LinkCandidate]) -> csv::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(LINK_HEADERS)?;
    for candidate in candidates {
        writer.serialize(candidate)?;
    }
    finish_csv(writer)
}

/// The review sheet as a pretty-printed JSON list. Donor dimensions are
/// an array, or `null` without a donor.
pub fn link_candidates_json(candidates: &[LinkCandidate]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let mut value = serde_json::to_value(candidate)?;
        if let Some(row) = value.as_object_mut() {
            let dims = match candidate.donor_dimensions_visual.as_str() {
                "" => Value::Null,
                text => serde_json::from_str(text).unwrap_or(Value::Null),
            };
            row.insert("donorDimensionsVisual".to_string(), dims);
        }
        out.push(value);
    }
    let mut content = serde_json::to_string_pretty(&out)?;
    content.push('\n');
    Ok(content.into_bytes())
}

/// Write the CSV sheet to `csv_path` and its JSON twin to `json_path`
pub fn export_link_candidates<P: AsRef<Path>, Q: AsRef<Path>>(
    csv_path: P,
    json_path: Q,
    candidates: &[LinkCandidate],
) -> Result<()> {
    write_csv(csv_path.as_ref(), || link_candidates_csv(candidates))?;
    write_atomic(json_path.as_ref(), &link_candidates_json(candidates)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan_database;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    fn rows(value: Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unique_object_names() {
        let data = rows(json!([
            { "objectName": "barrel " },
            { "objectName": "Axe" },
            { "name": "Crate" },
            { "objectName": "", "Name": "barrel" },
            { "objectName": "-" }
        ]));
        assert_eq!(unique_object_names(&data), vec!["-", "Axe", "barrel", "Crate"]);

        let csv = String::from_utf8(names_csv(&unique_object_names(&data)).unwrap()).unwrap();
        assert_eq!(csv, "objectName\n-\nAxe\nbarrel\nCrate\n");
    }

    #[test]
    fn test_class_names_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path();
        fs::create_dir_all(db.join("gear")).unwrap();
        fs::create_dir_all(db.join("broken")).unwrap();
        fs::write(
            db.join("gear/objects.json"),
            r#"[
                {"objectName": " Shovel ", "path": "/dz/gear/tools"},
                {"className": "AKM", "path": "dz\\weapons\\firearms"},
                {"objectName": "", "name": "backpack", "path": "dz/gear/bags"},
                {"objectName": "Shovel", "path": "dz/gear/tools"},
                {"objectName": "Barn", "path": "dz/structures/farm"},
                {"path": "dz/gear/misc"}
            ]"#,
        )
        .unwrap();
        fs::write(db.join("broken/objects.json"), "[{").unwrap();

        let sources = scan_database(db).unwrap();
        assert_eq!(
            class_names(&sources, DEFAULT_CLASS_PREFIXES),
            vec!["AKM", "backpack", "Shovel"]
        );
        assert_eq!(class_names(&sources, &["/dz/structures"]), vec!["Barn"]);
        assert!(class_names(&sources, &["", "/"]).is_empty());
    }

    #[test]
    fn test_folder_counts() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path();
        fs::create_dir_all(db.join("items/tools")).unwrap();
        fs::create_dir_all(db.join("items/food")).unwrap();
        fs::create_dir_all(db.join("empty")).unwrap();
        fs::write(db.join("items/tools/objects.json"), r#"[{"a":1},{"a":2}]"#).unwrap();
        fs::write(db.join("items/food/objects.json"), r#"{"a":1}"#).unwrap();
        fs::write(db.join("empty/objects.json"), "[]").unwrap();

        let sources = scan_database(db).unwrap();
        let counts = folder_counts(&sources);
        assert_eq!(
            format_folder_counts(&counts),
            ". 3\nitems 3\nitems/food 1\nitems/tools 2"
        );
    }

    #[test]
    fn test_base_variant_key() {
        assert_eq!(base_variant_key("Land_Barrel_Green.p3d"), "barrel");
        assert_eq!(base_variant_key("TShirt_Black"), "tshirt");
        assert_eq!(base_variant_key("Black_Green"), "black green");
    }

    #[test]
    fn test_link_candidates() {
        let data = rows(json!([
            { "id": "dzobj_d000000001", "objectName": "Barrel", "modelType": "Raw P3D",
              "path": "dz/structures/props/barrel", "bboxMinVisual": [0, 0, 0],
              "bboxMaxVisual": [1, 1, 1], "dimensionsVisual": [1, 1, 1] },
            { "id": "dzobj_d000000002", "objectName": "Crate_Small", "modelType": "Raw P3D",
              "path": "dz/a/b", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [1, 1, 1] },
            { "id": "dzobj_d000000003", "objectName": "Crate_Small", "modelType": "Raw P3D",
              "path": "dz/c/d", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [1, 1, 1] },
            { "id": "dzobj_c000000001", "objectName": "Barrel_Blue", "modelType": "Config",
              "path": "dz/structures/props/x", "dimensionsSource": "tag_estimate" },
            { "id": "dzobj_c000000002", "objectName": "Crate_Small_Red", "modelType": "Config",
              "path": "dz/e/f", "dimensionsSource": "tag_estimate" },
            { "id": "dzobj_c000000003", "objectName": "Tent", "modelType": "Config",
              "dimensionsSource": "tag_estimate" },
            { "id": "dzobj_c000000004", "objectName": "Barrel_Red", "modelType": "Config",
              "dimensionsSource": "bbox_linked_p3d", "bboxLinkedFromId": "dzobj_d000000001" }
        ]));

        let candidates = link_candidates(&data, "Raw P3D", "Config");
        let summary: Vec<(&str, CandidateStatus, &str, usize)> = candidates
            .iter()
            .map(|c| {
                (
                    c.object_name.as_str(),
                    c.candidate_status,
                    c.candidate_method.as_str(),
                    c.candidate_count,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Barrel_Blue", CandidateStatus::Candidate, "sibling_linked_base", 1),
                ("Crate_Small_Red", CandidateStatus::Ambiguous, "base_key_ambiguous", 2),
                ("Tent", CandidateStatus::NoCandidate, "", 0),
            ]
        );
        assert_eq!(candidates[0].donor_id, "dzobj_d000000001");
        assert_eq!(candidates[0].donor_dimensions_visual, "[1,1,1]");

        let csv = String::from_utf8(link_candidates_csv(&candidates).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), LINK_HEADERS.join(","));
        assert_eq!(lines.count(), 3);
        assert!(csv.contains(",no_candidate,"));

        let json_bytes = link_candidates_json(&candidates).unwrap();
        let json: Value = serde_json::from_slice(&json_bytes).unwrap();
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0]["donorDimensionsVisual"], json!([1, 1, 1]));
        assert_eq!(list[0]["candidateStatus"], "candidate");
        assert_eq!(list[2]["donorDimensionsVisual"], Value::Null);
        let keys: Vec<&str> = list[0].as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, LINK_HEADERS);
    }

    #[test]
    fn test_empty_link_report_keeps_header() {
        let csv = String::from_utf8(link_candidates_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv, format!("{}\n", LINK_HEADERS.join(",")));
        assert_eq!(link_candidates_json(&[]).unwrap(), b"[]\n".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("reports").join(LINKS_CSV);
        let json_path = dir.path().join("reports").join(LINKS_JSON);
        export_link_candidates(&csv_path, &json_path, &[]).unwrap();
        assert!(fs::read_to_string(&csv_path).unwrap().starts_with("id,objectName,"));
        assert_eq!(fs::read_to_string(&json_path).unwrap(), "[]\n");
    }
}
