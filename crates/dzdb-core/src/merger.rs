//! Case-insensitive duplicate collapsing
//!
//! Fragments are hand-edited, so the same object can show up more than once
//! with different casing or formatting. Records sharing a lower-cased
//! (`path`, `objectName`) key are folded into one canonical record.

use crate::record::{
    is_blank, is_blank_str, path_stem, ObjectRecord, KEY_ID, KEY_IMAGE, KEY_OBJECT_ID,
    KEY_OBJECT_NAME, KEY_PATH, KEY_SEARCH_TAGS, KEY_USABLE_ON_CONSOLE,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;

/// Fields a non-canonical member never overwrites
const PROTECTED_KEYS: &[&str] = &[KEY_OBJECT_NAME, KEY_PATH, KEY_IMAGE, KEY_ID, KEY_OBJECT_ID];

/// Counters reported by [`collapse_duplicates`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollapseStats {
    pub groups_collapsed: usize,
    pub rows_removed: usize,
}

/// Grouping key: lower-cased, trimmed path and object name
pub fn dedupe_key(record: &ObjectRecord) -> (String, String) {
    (
        record.path_str().trim().to_lowercase(),
        record.name().trim().to_lowercase(),
    )
}

fn alnum(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// How well the image file name matches the object name: 3 if the object
/// token is inside the image token, 2 for the reverse, else 0
pub fn image_match_score(record: &ObjectRecord) -> u8 {
    let object_name = record.name().trim().to_lowercase();
    let image = record.image_str().trim().to_lowercase();
    if object_name.is_empty() || image.is_empty() {
        return 0;
    }
    let object_token = alnum(&object_name);
    let image_token = alnum(path_stem(&image));
    if object_token.is_empty() || image_token.is_empty() {
        return 0;
    }
    if image_token.contains(&object_token) {
        3
    } else if object_token.contains(&image_token) {
        2
    } else {
        0
    }
}

fn uppercase_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_uppercase()).count()
}

type CanonicalKey = (u8, usize, Reverse<usize>, String);

fn canonical_key(record: &ObjectRecord) -> CanonicalKey {
    (
        image_match_score(record),
        record.richness(),
        Reverse(uppercase_count(record.name())),
        record.name().to_lowercase(),
    )
}

/// Index of the canonical member: the maximum canonical key, first one wins
/// on a full tie
pub fn choose_canonical(records: &[ObjectRecord]) -> usize {
    let mut best = 0;
    let mut best_key = match records.first() {
        Some(first) => canonical_key(first),
        None => return 0,
    };
    for (idx, record) in records.iter().enumerate().skip(1) {
        let key = canonical_key(record);
        if key > best_key {
            best = idx;
            best_key = key;
        }
    }
    best
}

fn split_tags(tags: &str) -> impl Iterator<Item = &str> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Union of two comma-separated tag lists, de-duplicated case-insensitively
/// with first-seen casing and order
pub fn merge_search_tags(primary: &str, secondary: &str) -> String {
    if primary.is_empty() {
        return secondary.to_string();
    }
    if secondary.is_empty() {
        return primary.to_string();
    }
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for tag in split_tags(primary).chain(split_tags(secondary)) {
        if seen.insert(tag.to_lowercase()) {
            ordered.push(tag);
        }
    }
    ordered.join(", ")
}

/// Fold `secondary` into `merged`
pub fn merge_records(merged: &mut ObjectRecord, secondary: &ObjectRecord) {
    for (key, value) in secondary.to_json() {
        if PROTECTED_KEYS.contains(&key.as_str()) {
            continue;
        }
        match key.as_str() {
            KEY_SEARCH_TAGS if value.is_string() => {
                let first = merged.search_tags.as_deref().unwrap_or("");
                let second = value.as_str().unwrap_or("");
                merged.search_tags = Some(merge_search_tags(first, second));
                merged.extra.shift_remove(KEY_SEARCH_TAGS);
            }
            KEY_USABLE_ON_CONSOLE if value.is_boolean() => {
                let flag = value.as_bool().unwrap_or(false);
                merged.usable_on_console = Some(merged.usable_on_console.unwrap_or(false) || flag);
                merged.extra.shift_remove(KEY_USABLE_ON_CONSOLE);
            }
            _ => {
                if merged.field_is_blank(&key) && !is_blank(&value) {
                    merged.set_field(&key, value);
                }
            }
        }
    }
}

/// Collapse records that share a case-insensitive (`path`, `objectName`)
/// key. Group order follows the first appearance of each key.
pub fn collapse_duplicates(records: Vec<ObjectRecord>) -> (Vec<ObjectRecord>, CollapseStats) {
    let mut grouped: IndexMap<(String, String), Vec<ObjectRecord>> = IndexMap::new();
    for record in records {
        grouped.entry(dedupe_key(&record)).or_default().push(record);
    }

    let mut stats = CollapseStats::default();
    let mut collapsed = Vec::with_capacity(grouped.len());

    for (key, mut members) in grouped {
        if members.len() == 1 {
            collapsed.extend(members.pop());
            continue;
        }

        stats.groups_collapsed += 1;
        stats.rows_removed += members.len() - 1;

        let canonical_idx = choose_canonical(&members);
        let mut merged = members[canonical_idx].clone();
        for (idx, member) in members.iter().enumerate() {
            if idx == canonical_idx {
                continue;
            }
            merge_records(&mut merged, member);
            if merged.id.as_deref().map_or(true, is_blank_str) {
                if let Some(id) = member.trimmed_id() {
                    merged.id = Some(id.to_string());
                }
            }
        }
        tracing::debug!(
            "collapsed {} records for {}/{} into {}",
            members.len(),
            key.0,
            key.1,
            merged.name()
        );
        collapsed.push(merged);
    }

    (collapsed, stats)
}
