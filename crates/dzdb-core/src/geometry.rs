//! Bounding-box enrichment
//!
//! Gameplay records ("Config") frequently lack a measured visual bounding
//! box, while the raw mesh record ("Raw P3D") of the same asset has one. The
//! linker borrows the donor's box when exactly one donor matches, and falls
//! back to a tag-based size estimate otherwise. Every record leaves this
//! stage with dimensions and a provenance tag.

use crate::error::{Error, Result};
use crate::record::{
    parse_vec3, DimensionsSource, Geometry, LinkMethod, LinkProvenance, ObjectRecord, Vec3,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Prefixes stripped from object and image tokens
pub(crate) const TOKEN_PREFIXES: &[&str] = &["land_", "staticobj_", "wreck_", "misc_", "house_"];
/// Suffixes that mark a gameplay configuration of a mesh
const TOKEN_SUFFIXES: &[&str] = &["_config", "_cfg"];

const HUGE_CUBE: f64 = 12.0;
const LARGE_CUBE: f64 = 5.0;
const MEDIUM_CUBE: f64 = 2.0;
const SMALL_CUBE: f64 = 0.5;

/// Which records donate and which receive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeometryRules {
    pub raw_model_type: String,
    pub gameplay_model_type: String,
}

impl Default for GeometryRules {
    fn default() -> Self {
        Self {
            raw_model_type: "Raw P3D".to_string(),
            gameplay_model_type: "Config".to_string(),
        }
    }
}

/// A bounding box supplied directly by the external donor map
#[derive(Debug, Clone, PartialEq)]
pub struct DonorEntry {
    pub bbox_min: Vec3,
    pub bbox_max: Vec3,
    pub object_name: Option<String>,
}

/// Optional identifier → bounding box input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonorMap {
    pub entries: IndexMap<String, DonorEntry>,
}

impl DonorMap {
    /// Load a donor map; a missing file yields an empty map. Entries
    /// without two 3-component vectors are skipped with a warning.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("no donor map at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let raw: IndexMap<String, Value> =
            serde_json::from_str(&content).map_err(|e| Error::FragmentParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(Self::from_values(raw))
    }

    pub fn from_values(raw: IndexMap<String, Value>) -> Self {
        let mut entries = IndexMap::new();
        for (id, value) in raw {
            let min = value.get("bboxMinVisual").and_then(parse_vec3);
            let max = value.get("bboxMaxVisual").and_then(parse_vec3);
            match (min, max) {
                (Some(bbox_min), Some(bbox_max)) => {
                    let object_name = value
                        .get("objectName")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    entries.insert(
                        id.trim().to_string(),
                        DonorEntry {
                            bbox_min,
                            bbox_max,
                            object_name,
                        },
                    );
                }
                _ => tracing::warn!("donor map entry {} has no usable bounding box", id),
            }
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&DonorEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counters reported by [`link_geometry`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeometryStats {
    pub donors: usize,
    pub measured: usize,
    pub linked: usize,
    pub estimated: usize,
    /// Recipients where some strategy found several donors and nothing linked
    pub ambiguous: usize,
    pub by_method: BTreeMap<&'static str, usize>,
}

/// Lower-case, drop one trailing extension, strip a known prefix and
/// suffix, keep only alphanumerics
pub fn normalize_token(value: &str) -> String {
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
    if let Some(suffix) = TOKEN_SUFFIXES.iter().find(|s| rest.ends_with(*s)) {
        rest = &rest[..rest.len() - suffix.len()];
    }
    rest.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Token of the image file name
pub fn image_token(image: &str) -> String {
    let name = image.trim().rsplit('/').next().unwrap_or("");
    normalize_token(name)
}

/// First three path segments, lower-cased
pub fn path_family(path: &str) -> String {
    path.to_lowercase()
        .split('/')
        .filter(|part| !part.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join("/")
}

/// Per-axis `max - min`, rounded to 6 decimals
pub fn dimensions(min: &Vec3, max: &Vec3) -> Vec3 {
    let round = |v: f64| (v * 1_000_000.0).round() / 1_000_000.0;
    [
        round(max[0] - min[0]),
        round(max[1] - min[1]),
        round(max[2] - min[2]),
    ]
}

/// Coarse cube from search-tag keywords
pub fn estimate_from_tags(tags: &str) -> Vec3 {
    let tags = tags.to_lowercase();
    let side = if tags.contains("huge") {
        HUGE_CUBE
    } else if tags.contains("large") {
        LARGE_CUBE
    } else if tags.contains("small") {
        SMALL_CUBE
    } else {
        MEDIUM_CUBE
    };
    [side, side, side]
}

struct DonorIndex {
    by_image: HashMap<String, Vec<usize>>,
    by_object_token: HashMap<String, Vec<usize>>,
    by_image_token: HashMap<String, Vec<usize>>,
    families: HashMap<usize, String>,
}

enum Lookup {
    Found(usize),
    Ambiguous,
    Nothing,
}

fn unique(candidates: impl Iterator<Item = usize>) -> Lookup {
    let mut found = None;
    for idx in candidates {
        if found.is_some() {
            return Lookup::Ambiguous;
        }
        found = Some(idx);
    }
    found.map_or(Lookup::Nothing, Lookup::Found)
}

impl DonorIndex {
    fn build(records: &[ObjectRecord], rules: &GeometryRules) -> Self {
        let mut index = Self {
            by_image: HashMap::new(),
            by_object_token: HashMap::new(),
            by_image_token: HashMap::new(),
            families: HashMap::new(),
        };
        for (idx, record) in records.iter().enumerate() {
            if !record.has_model_type(&rules.raw_model_type) || record.bbox().is_none() {
                continue;
            }
            let image = record.image_str().trim().to_lowercase();
            if !image.is_empty() {
                index.by_image.entry(image.clone()).or_default().push(idx);
                let token = image_token(&image);
                if !token.is_empty() {
                    index.by_image_token.entry(token).or_default().push(idx);
                }
            }
            let token = normalize_token(record.name());
            if !token.is_empty() {
                index.by_object_token.entry(token).or_default().push(idx);
            }
            index.families.insert(idx, path_family(record.path_str()));
        }
        index
    }

    fn donor_count(&self) -> usize {
        self.families.len()
    }

    fn scoped(
        &self,
        table: &HashMap<String, Vec<usize>>,
        key: &str,
        family: Option<&str>,
    ) -> Lookup {
        if key.is_empty() {
            return Lookup::Nothing;
        }
        let Some(candidates) = table.get(key) else {
            return Lookup::Nothing;
        };
        unique(candidates.iter().copied().filter(|idx| match family {
            Some(family) => self.families.get(idx).map(String::as_str) == Some(family),
            None => true,
        }))
    }

    /// Try the five strategies in priority order
    fn find(&self, recipient: &ObjectRecord) -> (Option<(usize, LinkMethod)>, bool) {
        let image = recipient.image_str().trim().to_lowercase();
        let object_token = normalize_token(recipient.name());
        let img_token = image_token(&image);
        let family = path_family(recipient.path_str());

        let steps: [(LinkMethod, &HashMap<String, Vec<usize>>, &str, Option<&str>); 5] = [
            (LinkMethod::ExactImage, &self.by_image, image.as_str(), None),
            (
                LinkMethod::ObjectTokenPathFamily,
                &self.by_object_token,
                object_token.as_str(),
                Some(family.as_str()),
            ),
            (
                LinkMethod::ImageTokenPathFamily,
                &self.by_image_token,
                img_token.as_str(),
                Some(family.as_str()),
            ),
            (
                LinkMethod::ObjectTokenGlobal,
                &self.by_object_token,
                object_token.as_str(),
                None,
            ),
            (
                LinkMethod::ImageTokenGlobal,
                &self.by_image_token,
                img_token.as_str(),
                None,
            ),
        ];

        let mut saw_ambiguous = false;
        for (method, table, key, scope) in steps {
            match self.scoped(table, key, scope) {
                Lookup::Found(idx) => return (Some((idx, method)), saw_ambiguous),
                Lookup::Ambiguous => {
                    tracing::debug!(
                        "{} ambiguous for {} ({})",
                        method,
                        recipient.name(),
                        key
                    );
                    saw_ambiguous = true;
                }
                Lookup::Nothing => {}
            }
        }
        (None, saw_ambiguous)
    }
}

enum Decision {
    Measured,
    Link {
        min: Vec3,
        max: Vec3,
        provenance: LinkProvenance,
    },
    Estimate,
}

/// Attach dimensions and provenance to every record
pub fn link_geometry(
    records: &mut [ObjectRecord],
    donor_map: &DonorMap,
    rules: &GeometryRules,
) -> GeometryStats {
    let index = DonorIndex::build(records, rules);
    let mut stats = GeometryStats {
        donors: index.donor_count(),
        ..GeometryStats::default()
    };

    let decisions: Vec<Decision> = records
        .iter()
        .map(|record| {
            if record.bbox().is_some() {
                return Decision::Measured;
            }
            if let Some(entry) = record.trimmed_id().and_then(|id| donor_map.get(id)) {
                return Decision::Link {
                    min: entry.bbox_min,
                    max: entry.bbox_max,
                    provenance: LinkProvenance {
                        from_id: record.trimmed_id().unwrap_or_default().to_string(),
                        from_object: entry
                            .object_name
                            .clone()
                            .unwrap_or_else(|| record.name().to_string()),
                        method: LinkMethod::DonorMap,
                    },
                };
            }
            if !record.has_model_type(&rules.gameplay_model_type) {
                return Decision::Estimate;
            }
            let (found, ambiguous) = index.find(record);
            match found {
                Some((donor_idx, method)) => {
                    let donor = &records[donor_idx];
                    let (min, max) = donor.bbox().unwrap_or_default();
                    Decision::Link {
                        min,
                        max,
                        provenance: LinkProvenance {
                            from_id: donor.trimmed_id().unwrap_or_default().to_string(),
                            from_object: donor.name().to_string(),
                            method,
                        },
                    }
                }
                None => {
                    if ambiguous {
                        stats.ambiguous += 1;
                    }
                    Decision::Estimate
                }
            }
        })
        .collect();

    for (record, decision) in records.iter_mut().zip(decisions) {
        let geometry = match decision {
            Decision::Measured => {
                stats.measured += 1;
                let (min, max) = record.bbox().unwrap_or_default();
                Geometry {
                    dimensions: dimensions(&min, &max),
                    source: DimensionsSource::Measured,
                    link: None,
                }
            }
            Decision::Link {
                min,
                max,
                provenance,
            } => {
                stats.linked += 1;
                *stats.by_method.entry(provenance.method.as_str()).or_default() += 1;
                record.set_bbox(min, max);
                Geometry {
                    dimensions: dimensions(&min, &max),
                    source: DimensionsSource::Linked,
                    link: Some(provenance),
                }
            }
            Decision::Estimate => {
                stats.estimated += 1;
                Geometry {
                    dimensions: estimate_from_tags(record.search_tags.as_deref().unwrap_or("")),
                    source: DimensionsSource::Estimated,
                    link: None,
                }
            }
        };
        record.geometry = Some(geometry);
    }

    tracing::info!(
        "geometry: {} donors, {} measured, {} linked, {} estimated ({} ambiguous)",
        stats.donors,
        stats.measured,
        stats.linked,
        stats.estimated,
        stats.ambiguous
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<ObjectRecord> {
        serde_json::from_value(value).unwrap()
    }

    fn link(records: &mut [ObjectRecord]) -> GeometryStats {
        link_geometry(records, &DonorMap::default(), &GeometryRules::default())
    }

    fn method_of(record: &ObjectRecord) -> Option<LinkMethod> {
        record
            .geometry
            .as_ref()
            .and_then(|g| g.link.as_ref())
            .map(|l| l.method)
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Plank_A"), "planka");
        assert_eq!(normalize_token("Plank_A_Config"), "planka");
        assert_eq!(normalize_token("Land_Barn_Wood.p3d"), "barnwood");
        assert_eq!(normalize_token("StaticObj_Misc_Crate"), "misccrate");
        assert_eq!(normalize_token("  "), "");
    }

    #[test]
    fn test_image_token_and_family() {
        assert_eq!(image_token("images/structures/Land_Shed_1.png"), "shed1");
        assert_eq!(path_family("DZ/Structures/Wood/planks"), "dz/structures/wood");
        assert_eq!(path_family("/dz//gear"), "dz/gear");
    }

    #[test]
    fn test_estimate_from_tags() {
        assert_eq!(estimate_from_tags("building, HUGE"), [12.0, 12.0, 12.0]);
        assert_eq!(estimate_from_tags("large, huge"), [12.0, 12.0, 12.0]);
        assert_eq!(estimate_from_tags("Large"), [5.0, 5.0, 5.0]);
        assert_eq!(estimate_from_tags("small item"), [0.5, 0.5, 0.5]);
        assert_eq!(estimate_from_tags("medium"), [2.0, 2.0, 2.0]);
        assert_eq!(estimate_from_tags(""), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_plank_scenario() {
        let mut recs = records(json!([
            { "id": "dzobj_donor00001", "objectName": "Plank_A", "path": "dz/structures/wood",
              "modelType": "Raw P3D", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [2, 0.1, 0.5] },
            { "id": "dzobj_config0001", "objectName": "Plank_A_Config",
              "path": "dz/structures/wood/config", "modelType": "Config" }
        ]));
        let stats = link(&mut recs);

        let geometry = recs[1].geometry.as_ref().unwrap();
        assert_eq!(geometry.dimensions, [2.0, 0.1, 0.5]);
        assert_eq!(geometry.source, DimensionsSource::Linked);
        let provenance = geometry.link.as_ref().unwrap();
        assert_eq!(provenance.method.as_str(), "object_token_path_family");
        assert_eq!(provenance.from_id, "dzobj_donor00001");
        assert_eq!(provenance.from_object, "Plank_A");
        assert_eq!(recs[1].bbox(), Some(([0.0, 0.0, 0.0], [2.0, 0.1, 0.5])));
        assert_eq!(stats.measured, 1);
        assert_eq!(stats.linked, 1);
    }

    #[test]
    fn test_ambiguous_donors_fall_through_to_estimate() {
        let mut recs = records(json!([
            { "objectName": "Tent_A", "path": "dz/gear/camping", "modelType": "Raw P3D",
              "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [1, 1, 1] },
            { "objectName": "tent-a", "path": "dz/gear/camping", "modelType": "Raw P3D",
              "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [3, 3, 3] },
            { "objectName": "TentA", "path": "dz/gear/camping", "modelType": "Config",
              "searchTags": "large" }
        ]));
        let stats = link(&mut recs);

        let recipient = &recs[2];
        assert_eq!(recipient.bbox(), None);
        let geometry = recipient.geometry.as_ref().unwrap();
        assert_eq!(geometry.source, DimensionsSource::Estimated);
        assert_eq!(geometry.dimensions, [5.0, 5.0, 5.0]);
        assert!(geometry.link.is_none());
        assert_eq!(stats.ambiguous, 1);
        let json = recipient.to_json();
        assert!(json.get("bboxMinVisual").is_none());
        assert_eq!(json["dimensionsSource"], "tag_estimate");
        assert_eq!(json["bboxStatus"], "estimated");
    }

    #[test]
    fn test_exact_image_wins() {
        let mut recs = records(json!([
            { "id": "dzobj_aaaaaaaaaa", "objectName": "Barrel_Red", "path": "dz/props/barrels",
              "image": "props/barrel_blue.png", "modelType": "Raw P3D",
              "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [1, 2, 1] },
            { "id": "dzobj_bbbbbbbbbb", "objectName": "Barrel_Blue", "path": "dz/props/barrels",
              "modelType": "Raw P3D", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [9, 9, 9] },
            { "objectName": "Barrel_Blue", "path": "dz/props/barrels",
              "image": "props/barrel_blue.png", "modelType": "Config" }
        ]));
        link(&mut recs);
        assert_eq!(method_of(&recs[2]), Some(LinkMethod::ExactImage));
        assert_eq!(recs[2].geometry.as_ref().unwrap().dimensions, [1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_path_family_disambiguates() {
        let mut recs = records(json!([
            { "id": "dzobj_aaaaaaaaaa", "objectName": "Wall", "path": "dz/structures/walls",
              "modelType": "Raw P3D", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [4, 3, 0.2] },
            { "id": "dzobj_bbbbbbbbbb", "objectName": "Wall", "path": "dz/ruins/walls",
              "modelType": "Raw P3D", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [8, 3, 0.4] },
            { "objectName": "Wall", "path": "dz/ruins/walls/cfg", "modelType": "Config" }
        ]));
        link(&mut recs);
        let provenance = recs[2].geometry.as_ref().unwrap().link.clone().unwrap();
        assert_eq!(provenance.method, LinkMethod::ObjectTokenPathFamily);
        assert_eq!(provenance.from_id, "dzobj_bbbbbbbbbb");
    }

    #[test]
    fn test_image_token_in_family() {
        let mut recs = records(json!([
            { "id": "dzobj_aaaaaaaaaa", "objectName": "mesh_17", "path": "dz/gear/tools",
              "image": "gear/Land_Shovel.png", "modelType": "Raw P3D",
              "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [0.3, 1.2, 0.1] },
            { "objectName": "ShovelItem", "path": "dz/gear/tools", "image": "gear/shovel.jpg",
              "modelType": "Config" }
        ]));
        link(&mut recs);
        assert_eq!(method_of(&recs[1]), Some(LinkMethod::ImageTokenPathFamily));
    }

    #[test]
    fn test_global_fallbacks() {
        let mut recs = records(json!([
            { "id": "dzobj_aaaaaaaaaa", "objectName": "Lamp", "path": "dz/structures/lights",
              "image": "s/streetlight.png", "modelType": "Raw P3D",
              "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [1, 6, 1] },
            { "objectName": "Lamp", "path": "dz/gear/lights", "modelType": "Config" },
            { "objectName": "Pole", "path": "dz/gear/lights", "image": "g/streetlight.jpg",
              "modelType": "Config" }
        ]));
        let stats = link(&mut recs);
        assert_eq!(method_of(&recs[1]), Some(LinkMethod::ObjectTokenGlobal));
        assert_eq!(method_of(&recs[2]), Some(LinkMethod::ImageTokenGlobal));
        assert_eq!(stats.by_method.get("object_token_global"), Some(&1));
    }

    #[test]
    fn test_donor_map_consulted_first() {
        let mut recs = records(json!([
            { "id": "dzobj_aaaaaaaaaa", "objectName": "Plank_A", "path": "dz/structures/wood",
              "modelType": "Raw P3D", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [2, 0.1, 0.5] },
            { "id": "dzobj_bbbbbbbbbb", "objectName": "Plank_A_Config",
              "path": "dz/structures/wood", "modelType": "Config" }
        ]));
        let mut raw = IndexMap::new();
        raw.insert(
            "dzobj_bbbbbbbbbb".to_string(),
            json!({ "bboxMinVisual": [-1, -1, -1], "bboxMaxVisual": [1, 1, 1] }),
        );
        raw.insert("dzobj_broken0000".to_string(), json!({ "bboxMinVisual": [0, 0] }));
        let donor_map = DonorMap::from_values(raw);
        assert_eq!(donor_map.len(), 1);

        link_geometry(&mut recs, &donor_map, &GeometryRules::default());
        let geometry = recs[1].geometry.as_ref().unwrap();
        assert_eq!(geometry.dimensions, [2.0, 2.0, 2.0]);
        assert_eq!(method_of(&recs[1]), Some(LinkMethod::DonorMap));
    }

    #[test]
    fn test_shared_image_falls_through_to_object_token() {
        let mut recs = records(json!([
            { "id": "dzobj_aaaaaaaaaa", "objectName": "Crate_Small", "path": "dz/props/crates",
              "image": "props/crate.png", "modelType": "Raw P3D",
              "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [1, 1, 1] },
            { "id": "dzobj_bbbbbbbbbb", "objectName": "Crate_Large", "path": "dz/props/bins",
              "image": "props/crate.png", "modelType": "Raw P3D",
              "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [3, 3, 3] },
            { "objectName": "Crate_Small", "path": "dz/props/crates/cfg",
              "image": "props/crate.png", "modelType": "Config" }
        ]));
        link(&mut recs);

        let provenance = recs[2].geometry.as_ref().unwrap().link.clone().unwrap();
        assert_eq!(provenance.method, LinkMethod::ObjectTokenPathFamily);
        assert_eq!(provenance.from_id, "dzobj_aaaaaaaaaa");
        assert_eq!(recs[2].geometry.as_ref().unwrap().dimensions, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_measured_box_ignores_donor_map() {
        let mut recs = records(json!([
            { "id": "dzobj_aaaaaaaaaa", "objectName": "Barrel", "path": "dz/props",
              "modelType": "Config", "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [1, 2, 1] }
        ]));
        let mut raw = IndexMap::new();
        raw.insert(
            "dzobj_aaaaaaaaaa".to_string(),
            json!({ "bboxMinVisual": [0, 0, 0], "bboxMaxVisual": [9, 9, 9] }),
        );
        let donor_map = DonorMap::from_values(raw);
        let stats = link_geometry(&mut recs, &donor_map, &GeometryRules::default());

        let geometry = recs[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.source, DimensionsSource::Measured);
        assert_eq!(geometry.dimensions, [1.0, 2.0, 1.0]);
        assert!(geometry.link.is_none());
        assert_eq!(recs[0].bbox(), Some(([0.0, 0.0, 0.0], [1.0, 2.0, 1.0])));
        assert_eq!(stats.measured, 1);
        assert_eq!(stats.linked, 0);
    }

    #[test]
    fn test_every_record_gets_dimensions() {
        let mut recs = records(json!([
            { "objectName": "Rock", "modelType": "Raw P3D", "searchTags": "huge" },
            { "objectName": "Thing" },
            { "objectName": "Box", "bboxMinVisual": [1, 1, 1], "bboxMaxVisual": [1.5, 2, 3] }
        ]));
        link(&mut recs);
        for record in &recs {
            assert!(record.geometry.is_some());
        }
        assert_eq!(recs[0].geometry.as_ref().unwrap().dimensions, [12.0, 12.0, 12.0]);
        assert_eq!(recs[2].geometry.as_ref().unwrap().source, DimensionsSource::Measured);
        assert_eq!(recs[2].geometry.as_ref().unwrap().dimensions, [0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_donor_map_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let map = DonorMap::load_optional(dir.path().join("none.json")).unwrap();
        assert!(map.is_empty());
    }
}
