//! Object record model for catalog entries
//!
//! Source fragments are free-form JSON objects. An [`ObjectRecord`] lifts the
//! handful of attributes the pipeline reasons about into typed fields and
//! keeps everything else in an insertion-ordered extension bag, so a record
//! survives a load/publish round trip without losing hand-authored data.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Three-component vector (x, y, z)
pub type Vec3 = [f64; 3];

pub const KEY_ID: &str = "id";
pub const KEY_OBJECT_ID: &str = "objectId";
pub const KEY_OBJECT_NAME: &str = "objectName";
pub const KEY_PATH: &str = "path";
pub const KEY_IMAGE: &str = "image";
pub const KEY_MODEL_TYPE: &str = "modelType";
pub const KEY_SEARCH_TAGS: &str = "searchTags";
pub const KEY_USABLE_ON_CONSOLE: &str = "usableOnConsole";
pub const KEY_BBOX_MIN: &str = "bboxMinVisual";
pub const KEY_BBOX_MAX: &str = "bboxMaxVisual";
pub const KEY_DIMENSIONS: &str = "dimensionsVisual";
pub const KEY_DIMENSIONS_SOURCE: &str = "dimensionsSource";
pub const KEY_BBOX_STATUS: &str = "bboxStatus";
pub const KEY_LINKED_FROM_ID: &str = "bboxLinkedFromId";
pub const KEY_LINKED_FROM_OBJECT: &str = "bboxLinkedFromObject";
pub const KEY_LINKED_METHOD: &str = "bboxLinkedMethod";

/// Fields only the pipeline writes. They are dropped when a fragment is
/// loaded and recomputed on every build.
pub const DERIVED_KEYS: &[&str] = &[
    KEY_DIMENSIONS,
    KEY_DIMENSIONS_SOURCE,
    KEY_BBOX_STATUS,
    KEY_LINKED_FROM_ID,
    KEY_LINKED_FROM_OBJECT,
    KEY_LINKED_METHOD,
    KEY_OBJECT_ID,
];

const SUMMARY_KEYS: &[&str] = &[KEY_OBJECT_NAME, KEY_PATH, KEY_IMAGE, KEY_MODEL_TYPE, "category"];

/// Where a record's dimensions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionsSource {
    /// The record carries its own bounding box
    Measured,
    /// The bounding box was borrowed from a donor record
    Linked,
    /// Coarse size guessed from search tags
    Estimated,
}

impl DimensionsSource {
    /// Value written to `dimensionsSource`
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionsSource::Measured => "bbox_visual",
            DimensionsSource::Linked => "bbox_linked_p3d",
            DimensionsSource::Estimated => "tag_estimate",
        }
    }

    /// Value written to `bboxStatus`
    pub fn status(&self) -> &'static str {
        match self {
            DimensionsSource::Measured => "measured",
            DimensionsSource::Linked => "linked",
            DimensionsSource::Estimated => "estimated",
        }
    }
}

impl fmt::Display for DimensionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy that produced a bounding-box link, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkMethod {
    DonorMap,
    ExactImage,
    ObjectTokenPathFamily,
    ImageTokenPathFamily,
    ObjectTokenGlobal,
    ImageTokenGlobal,
}

impl LinkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkMethod::DonorMap => "donor_map",
            LinkMethod::ExactImage => "exact_image",
            LinkMethod::ObjectTokenPathFamily => "object_token_path_family",
            LinkMethod::ImageTokenPathFamily => "image_token_path_family",
            LinkMethod::ObjectTokenGlobal => "object_token_global",
            LinkMethod::ImageTokenGlobal => "image_token_global",
        }
    }
}

impl fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Donor reference for a linked bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct LinkProvenance {
    pub from_id: String,
    pub from_object: String,
    pub method: LinkMethod,
}

/// Derived size data attached by the geometry linker
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub dimensions: Vec3,
    pub source: DimensionsSource,
    pub link: Option<LinkProvenance>,
}

/// One catalog object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectRecord {
    pub id: Option<String>,
    pub object_name: Option<String>,
    pub path: Option<String>,
    pub image: Option<String>,
    pub model_type: Option<String>,
    pub search_tags: Option<String>,
    pub usable_on_console: Option<bool>,
    pub bbox_min: Option<Vec3>,
    pub bbox_max: Option<Vec3>,
    /// Every other attribute, in source order
    pub extra: Map<String, Value>,
    pub geometry: Option<Geometry>,
    /// Identifier frozen by the finalizer
    pub object_id: Option<String>,
}

impl ObjectRecord {
    /// Build a record from a raw JSON object, discarding derived fields
    pub fn from_json(map: Map<String, Value>) -> Self {
        let mut record = Self::default();
        for (key, value) in map {
            if DERIVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            record.absorb(key, value);
        }
        record
    }

    /// Serialize to a JSON object with a fixed key order
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let strings = [
            (KEY_ID, &self.id),
            (KEY_OBJECT_NAME, &self.object_name),
            (KEY_PATH, &self.path),
            (KEY_IMAGE, &self.image),
            (KEY_MODEL_TYPE, &self.model_type),
            (KEY_SEARCH_TAGS, &self.search_tags),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(flag) = self.usable_on_console {
            map.insert(KEY_USABLE_ON_CONSOLE.to_string(), Value::Bool(flag));
        }
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        if let Some(min) = &self.bbox_min {
            map.insert(KEY_BBOX_MIN.to_string(), vec3_to_value(min));
        }
        if let Some(max) = &self.bbox_max {
            map.insert(KEY_BBOX_MAX.to_string(), vec3_to_value(max));
        }
        if let Some(geometry) = &self.geometry {
            map.insert(KEY_DIMENSIONS.to_string(), vec3_to_value(&geometry.dimensions));
            map.insert(
                KEY_DIMENSIONS_SOURCE.to_string(),
                Value::String(geometry.source.as_str().to_string()),
            );
            map.insert(
                KEY_BBOX_STATUS.to_string(),
                Value::String(geometry.source.status().to_string()),
            );
            if let Some(link) = &geometry.link {
                map.insert(KEY_LINKED_FROM_ID.to_string(), Value::String(link.from_id.clone()));
                map.insert(
                    KEY_LINKED_FROM_OBJECT.to_string(),
                    Value::String(link.from_object.clone()),
                );
                map.insert(
                    KEY_LINKED_METHOD.to_string(),
                    Value::String(link.method.as_str().to_string()),
                );
            }
        }
        if let Some(object_id) = &self.object_id {
            map.insert(KEY_OBJECT_ID.to_string(), Value::String(object_id.clone()));
        }
        map
    }

    /// Read a single attribute as JSON
    pub fn get_field(&self, key: &str) -> Option<Value> {
        let typed = match key {
            KEY_ID => self.id.clone().map(Value::String),
            KEY_OBJECT_NAME => self.object_name.clone().map(Value::String),
            KEY_PATH => self.path.clone().map(Value::String),
            KEY_IMAGE => self.image.clone().map(Value::String),
            KEY_MODEL_TYPE => self.model_type.clone().map(Value::String),
            KEY_SEARCH_TAGS => self.search_tags.clone().map(Value::String),
            KEY_USABLE_ON_CONSOLE => self.usable_on_console.map(Value::Bool),
            KEY_BBOX_MIN => self.bbox_min.as_ref().map(vec3_to_value),
            KEY_BBOX_MAX => self.bbox_max.as_ref().map(vec3_to_value),
            KEY_OBJECT_ID => self.object_id.clone().map(Value::String),
            _ => None,
        };
        typed.or_else(|| self.extra.get(key).cloned())
    }

    /// True when the attribute is absent or holds a blank value
    pub fn field_is_blank(&self, key: &str) -> bool {
        self.get_field(key).map_or(true, |value| is_blank(&value))
    }

    /// Set an attribute, routing it to its typed slot when the JSON type
    /// fits. `null` removes the attribute. Derived keys are refused and
    /// reported with `false`.
    pub fn set_field(&mut self, key: &str, value: Value) -> bool {
        if DERIVED_KEYS.contains(&key) {
            return false;
        }
        self.remove_field(key);
        if !value.is_null() {
            self.absorb(key.to_string(), value);
        }
        true
    }

    /// Remove an attribute from both the typed slots and the extension bag
    pub fn remove_field(&mut self, key: &str) {
        match key {
            KEY_ID => self.id = None,
            KEY_OBJECT_NAME => self.object_name = None,
            KEY_PATH => self.path = None,
            KEY_IMAGE => self.image = None,
            KEY_MODEL_TYPE => self.model_type = None,
            KEY_SEARCH_TAGS => self.search_tags = None,
            KEY_USABLE_ON_CONSOLE => self.usable_on_console = None,
            KEY_BBOX_MIN => self.bbox_min = None,
            KEY_BBOX_MAX => self.bbox_max = None,
            _ => {}
        }
        self.extra.shift_remove(key);
    }

    /// Route a value to its typed slot, or park it in `extra` when the JSON
    /// type does not fit. A key lives in exactly one of the two places.
    fn absorb(&mut self, key: String, value: Value) {
        let parked = match key.as_str() {
            KEY_ID | KEY_OBJECT_NAME | KEY_PATH | KEY_IMAGE | KEY_MODEL_TYPE | KEY_SEARCH_TAGS => {
                let slot = match key.as_str() {
                    KEY_ID => &mut self.id,
                    KEY_OBJECT_NAME => &mut self.object_name,
                    KEY_PATH => &mut self.path,
                    KEY_IMAGE => &mut self.image,
                    KEY_MODEL_TYPE => &mut self.model_type,
                    _ => &mut self.search_tags,
                };
                match value {
                    Value::Null => return,
                    Value::String(s) => {
                        *slot = Some(s);
                        None
                    }
                    other => {
                        *slot = None;
                        Some(other)
                    }
                }
            }
            KEY_USABLE_ON_CONSOLE => match value {
                Value::Null => return,
                Value::Bool(flag) => {
                    self.usable_on_console = Some(flag);
                    None
                }
                other => {
                    self.usable_on_console = None;
                    Some(other)
                }
            },
            KEY_BBOX_MIN | KEY_BBOX_MAX => {
                let parsed = parse_vec3(&value);
                if key == KEY_BBOX_MIN {
                    self.bbox_min = parsed;
                } else {
                    self.bbox_max = parsed;
                }
                match parsed {
                    Some(_) => None,
                    None => Some(value),
                }
            }
            _ => Some(value),
        };
        match parked {
            Some(value) => {
                self.extra.insert(key, value);
            }
            None => {
                self.extra.shift_remove(&key);
            }
        }
    }

    /// Set a measured or borrowed bounding box
    pub fn set_bbox(&mut self, min: Vec3, max: Vec3) {
        self.extra.shift_remove(KEY_BBOX_MIN);
        self.extra.shift_remove(KEY_BBOX_MAX);
        self.bbox_min = Some(min);
        self.bbox_max = Some(max);
    }

    /// Both corners of the visual bounding box, when present
    pub fn bbox(&self) -> Option<(Vec3, Vec3)> {
        Some((self.bbox_min?, self.bbox_max?))
    }

    /// Count of attributes that are neither null nor blank strings
    pub fn richness(&self) -> usize {
        self.to_json().values().filter(|v| !is_blank(v)).count()
    }

    /// Trimmed identifier, if non-blank
    pub fn trimmed_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn name(&self) -> &str {
        self.object_name.as_deref().unwrap_or("")
    }

    pub fn path_str(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }

    pub fn image_str(&self) -> &str {
        self.image.as_deref().unwrap_or("")
    }

    pub fn has_model_type(&self, model_type: &str) -> bool {
        self.model_type.as_deref() == Some(model_type)
    }

    /// Small snapshot of the descriptive fields, kept in the tombstone ledger
    pub fn summary(&self) -> Map<String, Value> {
        let mut summary = Map::new();
        for key in SUMMARY_KEYS {
            if let Some(value) = self.get_field(key) {
                if !is_blank(&value) {
                    summary.insert((*key).to_string(), value);
                }
            }
        }
        summary
    }
}

impl Serialize for ObjectRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::deserialize(deserializer)?;
        Ok(Self::from_json(map))
    }
}

/// A value is blank when it is null or a string that trims to "" or "-"
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => is_blank_str(s),
        _ => false,
    }
}

pub fn is_blank_str(s: &str) -> bool {
    matches!(s.trim(), "" | "-")
}

/// Parse a JSON array of exactly three numbers
pub fn parse_vec3(value: &Value) -> Option<Vec3> {
    let items = value.as_array()?;
    if items.len() != 3 {
        return None;
    }
    Some([items[0].as_f64()?, items[1].as_f64()?, items[2].as_f64()?])
}

pub fn vec3_to_value(v: &Vec3) -> Value {
    Value::Array(
        v.iter()
            .map(|x| Number::from_f64(*x).map_or(Value::Null, Value::Number))
            .collect(),
    )
}

/// Final path component without its last extension
pub fn path_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ObjectRecord {
        match value {
            Value::Object(map) => ObjectRecord::from_json(map),
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_well_known_fields_are_typed() {
        let rec = record(json!({
            "id": "dzobj_abcdefghij",
            "objectName": "Hammer",
            "usableOnConsole": true,
            "bboxMinVisual": [0, 0, 0],
            "bboxMaxVisual": [1.5, 2, 0.25],
            "weight": 1.2
        }));
        assert_eq!(rec.id.as_deref(), Some("dzobj_abcdefghij"));
        assert_eq!(rec.usable_on_console, Some(true));
        assert_eq!(rec.bbox(), Some(([0.0, 0.0, 0.0], [1.5, 2.0, 0.25])));
        assert_eq!(rec.extra.get("weight"), Some(&json!(1.2)));
    }

    #[test]
    fn test_mistyped_well_known_field_stays_in_extra() {
        let rec = record(json!({ "searchTags": ["a", "b"], "bboxMinVisual": [1, 2] }));
        assert_eq!(rec.search_tags, None);
        assert_eq!(rec.bbox_min, None);
        assert_eq!(rec.extra.get("searchTags"), Some(&json!(["a", "b"])));
        assert_eq!(rec.to_json().get("bboxMinVisual"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_typed_value_clears_parked_value() {
        let mut rec = record(json!({ "searchTags": ["a"], "usableOnConsole": "yes" }));
        rec.absorb("searchTags".to_string(), json!("a, b"));
        rec.absorb("usableOnConsole".to_string(), json!(false));
        assert!(rec.extra.is_empty());

        let out = rec.to_json();
        assert_eq!(out["searchTags"], json!("a, b"));
        assert_eq!(out["usableOnConsole"], json!(false));

        rec.absorb("searchTags".to_string(), json!(["c"]));
        assert_eq!(rec.search_tags, None);
        assert_eq!(rec.to_json()["searchTags"], json!(["c"]));
    }

    #[test]
    fn test_derived_fields_dropped_on_load() {
        let rec = record(json!({
            "objectName": "Crate",
            "dimensionsVisual": [1, 1, 1],
            "bboxStatus": "estimated",
            "objectId": "dzobj_abcdefghij"
        }));
        assert!(rec.geometry.is_none());
        assert!(rec.object_id.is_none());
        assert!(rec.extra.is_empty());
    }

    #[test]
    fn test_to_json_key_order() {
        let mut rec = record(json!({ "weight": 3, "objectName": "Barrel", "id": "x" }));
        rec.object_id = Some("x".to_string());
        let keys: Vec<String> = rec.to_json().keys().cloned().collect();
        assert_eq!(keys, vec!["id", "objectName", "weight", "objectId"]);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!("  - ")));
        assert!(!is_blank(&json!("x")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
    }

    #[test]
    fn test_richness_ignores_blanks() {
        let rec = record(json!({
            "objectName": "Hammer",
            "searchTags": "",
            "category": "-",
            "weight": 1.2,
            "note": null
        }));
        assert_eq!(rec.richness(), 2);
    }

    #[test]
    fn test_set_field_routes_and_removes() {
        let mut rec = record(json!({ "modelType": "Config", "category": "tools" }));
        assert!(rec.set_field("modelType", json!("Raw P3D")));
        assert_eq!(rec.model_type.as_deref(), Some("Raw P3D"));
        assert!(rec.set_field("category", Value::Null));
        assert!(rec.extra.get("category").is_none());
        assert!(!rec.set_field("dimensionsVisual", json!([1, 1, 1])));
    }

    #[test]
    fn test_summary() {
        let rec = record(json!({
            "id": "dzobj_abcdefghij",
            "objectName": "Tent",
            "path": "dz/gear/camping",
            "image": "",
            "category": "shelter",
            "weight": 10
        }));
        let summary = rec.summary();
        assert_eq!(
            summary.keys().collect::<Vec<_>>(),
            vec!["objectName", "path", "category"]
        );
    }

    #[test]
    fn test_path_stem() {
        assert_eq!(path_stem("images/tools/hammer.png"), "hammer");
        assert_eq!(path_stem("a.b.png"), "a.b");
        assert_eq!(path_stem(".hidden"), ".hidden");
        assert_eq!(path_stem("noext"), "noext");
    }
}
