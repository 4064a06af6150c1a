//! Identifier lifecycle tracking
//!
//! When an identifier that was published by the previous build disappears,
//! it is tombstoned: recorded permanently with a snapshot of what it last
//! described. Tombstoned identifiers are never minted again.

use crate::error::{Error, Result};
use crate::fragment::write_atomic;
use crate::record::ObjectRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A retired identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub id: String,
    /// Build time, UTC, second precision
    pub removed_at: String,
    /// Descriptive fields from the last build that contained the id
    pub last_known: Map<String, Value>,
}

/// Append-only ledger of retired identifiers, sorted by id on save
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TombstoneLedger {
    pub entries: Vec<Tombstone>,
}

/// Format a build timestamp the way the ledger stores it
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl TombstoneLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger, or start empty if the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| Error::FragmentParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save the ledger, sorted by identifier
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut sorted = self.clone();
        sorted.sort();
        let mut content = serde_json::to_string_pretty(&sorted)?;
        content.push('\n');
        write_atomic(path.as_ref(), content.as_bytes())
    }

    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.id.cmp(&b.id));
    }

    /// All tombstoned identifiers
    pub fn ids(&self) -> HashSet<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tombstone every identifier in `previous` that is absent from
    /// `current` and not already in the ledger. Returns how many entries
    /// were added.
    pub fn record_removals(
        &mut self,
        previous: &[ObjectRecord],
        current: &[ObjectRecord],
        now: DateTime<Utc>,
    ) -> usize {
        let live: HashSet<&str> = current.iter().filter_map(|r| r.trimmed_id()).collect();
        let mut known = self.ids();
        let removed_at = format_timestamp(now);
        let mut added = 0;

        for record in previous {
            let Some(id) = record.trimmed_id() else {
                continue;
            };
            if live.contains(id) || known.contains(id) {
                continue;
            }
            tracing::info!("tombstoning {} ({})", id, record.name());
            known.insert(id.to_string());
            self.entries.push(Tombstone {
                id: id.to_string(),
                removed_at: removed_at.clone(),
                last_known: record.summary(),
            });
            added += 1;
        }

        self.sort();
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn records(value: Value) -> Vec<ObjectRecord> {
        serde_json::from_value(value).unwrap()
    }

    fn build_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(build_time()), "2026-03-01T12:30:45Z");
    }

    #[test]
    fn test_record_removal() {
        let previous = records(json!([
            { "id": "dzobj_ab12cd34ef", "objectName": "Old Shed", "path": "dz/structures" },
            { "id": "dzobj_bbbbbbbbbb", "objectName": "Kept" }
        ]));
        let current = records(json!([{ "id": "dzobj_bbbbbbbbbb", "objectName": "Kept" }]));

        let mut ledger = TombstoneLedger::new();
        assert_eq!(ledger.record_removals(&previous, &current, build_time()), 1);
        assert_eq!(ledger.len(), 1);
        let entry = &ledger.entries[0];
        assert_eq!(entry.id, "dzobj_ab12cd34ef");
        assert_eq!(entry.removed_at, "2026-03-01T12:30:45Z");
        assert_eq!(entry.last_known["objectName"], "Old Shed");
    }

    #[test]
    fn test_existing_tombstone_not_updated() {
        let previous = records(json!([{ "id": "dzobj_ab12cd34ef", "objectName": "Renamed" }]));
        let mut ledger = TombstoneLedger {
            entries: vec![Tombstone {
                id: "dzobj_ab12cd34ef".to_string(),
                removed_at: "2025-01-01T00:00:00Z".to_string(),
                last_known: Map::new(),
            }],
        };
        assert_eq!(ledger.record_removals(&previous, &[], build_time()), 0);
        assert_eq!(ledger.entries[0].removed_at, "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_ledger_sorted_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tombstones.json");
        let previous = records(json!([
            { "id": "dzobj_zzzzzzzzzz" },
            { "id": "dzobj_aaaaaaaaaa" }
        ]));
        let mut ledger = TombstoneLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
        ledger.record_removals(&previous, &[], build_time());
        ledger.save(&path).unwrap();

        let reloaded = TombstoneLedger::load(&path).unwrap();
        let ids: Vec<&str> = reloaded.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["dzobj_aaaaaaaaaa", "dzobj_zzzzzzzzzz"]);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"removedAt\": \"2026-03-01T12:30:45Z\""));
        assert!(text.contains("\"lastKnown\""));
    }
}
