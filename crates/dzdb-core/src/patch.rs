//! Manual corrections applied on top of the collapsed dataset
//!
//! The sidecar override file maps an object identifier to a partial record.
//! Each key in the patch replaces the field on the matching record; a
//! `null` value removes it.

use crate::error::{Error, Result};
use crate::fragment::write_atomic;
use crate::record::{ObjectRecord, KEY_ID, KEY_OBJECT_ID};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Identifier → field patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideFile {
    pub patches: IndexMap<String, Map<String, Value>>,
}

impl OverrideFile {
    /// Create an empty override set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or extend the patch for an identifier
    pub fn add_patch(&mut self, id: impl Into<String>, field: impl Into<String>, value: Value) {
        self.patches
            .entry(id.into())
            .or_default()
            .insert(field.into(), value);
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Load overrides from JSON
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

    /// Load overrides, writing an empty file first if none exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("creating empty override file {}", path.display());
            let empty = Self::new();
            empty.save(path)?;
            return Ok(empty);
        }
        Self::load(path)
    }

    /// Save overrides to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        write_atomic(path.as_ref(), content.as_bytes())
    }
}

/// Outcome of applying an override file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverrideResult {
    /// Records that received at least one field
    pub records_patched: usize,
    /// Total fields set or removed
    pub fields_applied: usize,
    /// Identifiers with no matching record
    pub unknown_ids: Vec<String>,
    /// (identifier, field) pairs that may not be patched
    pub rejected_fields: Vec<(String, String)>,
}

/// Apply overrides to the dataset in place
pub fn apply_overrides(records: &mut [ObjectRecord], overrides: &OverrideFile) -> OverrideResult {
    let mut result = OverrideResult::default();

    let index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| record.trimmed_id().map(|id| (id.to_string(), idx)))
        .collect();

    for (id, patch) in &overrides.patches {
        let idx = match index.get(id.trim()) {
            Some(&idx) => idx,
            None => {
                result.unknown_ids.push(id.clone());
                continue;
            }
        };

        let record = &mut records[idx];
        let mut touched = false;
        for (field, value) in patch {
            if field == KEY_ID || field == KEY_OBJECT_ID || !record.set_field(field, value.clone())
            {
                result.rejected_fields.push((id.clone(), field.clone()));
                continue;
            }
            result.fields_applied += 1;
            touched = true;
        }
        if touched {
            result.records_patched += 1;
        }
    }

    if !result.unknown_ids.is_empty() {
        tracing::warn!(
            "{} override ids do not match any record",
            result.unknown_ids.len()
        );
    }
    for (id, field) in &result.rejected_fields {
        tracing::warn!("override for {} may not set '{}'", id, field);
    }

    result
}
