//! Stable object identifiers
//!
//! Identifiers look like `dzobj_` followed by ten lowercase alphanumerics.
//! The synchronizer repairs them in the source fragments; the finalizer only
//! validates the merged view and refuses to publish a broken set.

use crate::error::{Error, Result};
use crate::fragment::{load_fragment, Fragment};
use crate::record::{ObjectRecord, KEY_ID, KEY_OBJECT_NAME};
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const ID_PREFIX: &str = "dzobj_";
pub const ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const ID_LEN: usize = 10;

/// Check an identifier against `^dzobj_[a-z0-9]{10}$`
pub fn is_valid_id(id: &str) -> bool {
    match id.strip_prefix(ID_PREFIX) {
        Some(suffix) => {
            suffix.len() == ID_LEN
                && suffix
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        }
        None => false,
    }
}

/// Classification of a candidate identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdStatus {
    /// Absent, not a string, or blank
    Missing,
    /// Non-blank but not matching the pattern
    Invalid(String),
    /// Well-formed but already claimed this run
    Duplicate(String),
    /// Well-formed and unclaimed
    Valid(String),
}

/// Classify a raw `id` value against the identifiers claimed so far
pub fn classify(candidate: Option<&Value>, claimed: &HashSet<String>) -> IdStatus {
    let trimmed = match candidate {
        Some(Value::String(s)) => s.trim(),
        _ => return IdStatus::Missing,
    };
    if trimmed.is_empty() {
        IdStatus::Missing
    } else if !is_valid_id(trimmed) {
        IdStatus::Invalid(trimmed.to_string())
    } else if claimed.contains(trimmed) {
        IdStatus::Duplicate(trimmed.to_string())
    } else {
        IdStatus::Valid(trimmed.to_string())
    }
}

/// Draw identifiers from `rng` until one is not in `claimed`
pub fn mint_identifier<R: Rng + ?Sized>(claimed: &HashSet<String>, rng: &mut R) -> String {
    loop {
        let mut candidate = String::with_capacity(ID_PREFIX.len() + ID_LEN);
        candidate.push_str(ID_PREFIX);
        for _ in 0..ID_LEN {
            let idx = rng.gen_range(0..ID_CHARS.len());
            candidate.push(ID_CHARS[idx] as char);
        }
        if !claimed.contains(&candidate) {
            return candidate;
        }
    }
}

/// Counters reported by the synchronizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_touched: usize,
    pub ids_added_missing: usize,
    pub ids_repaired_invalid: usize,
    pub ids_repaired_duplicate: usize,
}

impl SyncStats {
    pub fn total_repaired(&self) -> usize {
        self.ids_added_missing + self.ids_repaired_invalid + self.ids_repaired_duplicate
    }
}

/// Assigns and repairs identifiers across one run
///
/// `claimed` holds every identifier handed out or kept so far. `retired`
/// holds tombstoned identifiers, which are never minted again. `reserved`
/// holds identifiers known to exist elsewhere (later fragments, the last
/// published dataset); they are never minted but stay valid where found.
#[derive(Debug)]
pub struct IdentifierSynchronizer<R> {
    claimed: HashSet<String>,
    retired: HashSet<String>,
    reserved: HashSet<String>,
    rng: R,
    stats: SyncStats,
}

impl<R: Rng> IdentifierSynchronizer<R> {
    pub fn new(rng: R) -> Self {
        Self::with_claimed(HashSet::new(), rng)
    }

    /// Start from an already-claimed set
    pub fn with_claimed(claimed: HashSet<String>, rng: R) -> Self {
        Self {
            claimed,
            retired: HashSet::new(),
            reserved: HashSet::new(),
            rng,
            stats: SyncStats::default(),
        }
    }

    /// Identifiers that must never be minted
    pub fn with_retired<I: IntoIterator<Item = String>>(mut self, retired: I) -> Self {
        self.retired.extend(retired);
        self
    }

    /// Identifiers that exist outside the rows synced so far
    pub fn with_reserved<I: IntoIterator<Item = String>>(mut self, reserved: I) -> Self {
        self.reserved.extend(reserved);
        self
    }

    pub fn claimed(&self) -> &HashSet<String> {
        &self.claimed
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn into_stats(self) -> SyncStats {
        self.stats
    }

    fn mint(&mut self) -> String {
        loop {
            let candidate = mint_identifier(&self.claimed, &mut self.rng);
            if !self.retired.contains(&candidate) && !self.reserved.contains(&candidate) {
                self.claimed.insert(candidate.clone());
                return candidate;
            }
        }
    }

    /// Ensure every row carries a well-formed unclaimed identifier.
    /// Returns true if any row changed.
    pub fn sync_rows(&mut self, rows: &mut [Map<String, Value>]) -> bool {
        let mut changed = false;
        for row in rows.iter_mut() {
            let raw = row.get(KEY_ID);
            let status = classify(raw, &self.claimed);
            let kept = match status {
                IdStatus::Valid(id) => {
                    if self.retired.contains(&id) {
                        tracing::warn!("restored record reuses tombstoned id {}", id);
                    }
                    self.claimed.insert(id.clone());
                    id
                }
                IdStatus::Missing => {
                    self.stats.ids_added_missing += 1;
                    self.mint()
                }
                IdStatus::Invalid(bad) => {
                    tracing::debug!("replacing invalid id '{}'", bad);
                    self.stats.ids_repaired_invalid += 1;
                    self.mint()
                }
                IdStatus::Duplicate(dup) => {
                    let object_name = row.get(KEY_OBJECT_NAME).and_then(|v| v.as_str());
                    tracing::debug!(
                        "replacing duplicate id '{}' on {}",
                        dup,
                        object_name.unwrap_or("")
                    );
                    self.stats.ids_repaired_duplicate += 1;
                    self.mint()
                }
            };
            if raw.and_then(Value::as_str) != Some(kept.as_str()) {
                row.insert(KEY_ID.to_string(), Value::String(kept));
                changed = true;
            }
        }
        changed
    }

    /// Sync one fragment in memory. Returns true if it needs rewriting.
    pub fn sync_fragment(&mut self, fragment: &mut Fragment) -> bool {
        self.stats.files_scanned += 1;
        self.sync_rows(&mut fragment.rows)
    }

    /// Sync and persist every fragment in `paths`. Fragments that fail to
    /// load are skipped with a warning and never rewritten.
    pub fn sync_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        for path in paths {
            let path = path.as_ref();
            let mut fragment = match load_fragment(path) {
                Ok(fragment) => fragment,
                Err(e) if e.is_per_file() => {
                    tracing::warn!("skipping fragment: {}", e);
                    self.stats.files_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if self.sync_fragment(&mut fragment) {
                fragment.save()?;
                self.stats.files_touched += 1;
                tracing::debug!("rewrote {}", path.display());
            }
        }
        Ok(())
    }
}

/// Every well-formed identifier in `paths`, trimmed. Fragments that fail to
/// load are skipped.
pub fn collect_source_ids<P: AsRef<Path>>(paths: &[P]) -> Result<HashSet<String>> {
    let mut ids = HashSet::new();
    for path in paths {
        let fragment = match load_fragment(path.as_ref()) {
            Ok(fragment) => fragment,
            Err(e) if e.is_per_file() => continue,
            Err(e) => return Err(e),
        };
        for row in &fragment.rows {
            if let Some(Value::String(id)) = row.get(KEY_ID) {
                let id = id.trim();
                if is_valid_id(id) {
                    ids.insert(id.to_string());
                }
            }
        }
    }
    Ok(ids)
}

/// One problem found by [`check_source_ids`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IdProblem {
    Missing {
        path: PathBuf,
        row: usize,
        object_name: String,
    },
    Invalid {
        path: PathBuf,
        row: usize,
        id: String,
    },
    Duplicate {
        id: String,
        first: (PathBuf, usize),
        second: (PathBuf, usize),
    },
}

impl std::fmt::Display for IdProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdProblem::Missing {
                path,
                row,
                object_name,
            } => write!(f, "MISSING id: {}:{} objectName={}", path.display(), row, object_name),
            IdProblem::Invalid { path, row, id } => {
                write!(f, "INVALID id: {}:{} id={}", path.display(), row, id)
            }
            IdProblem::Duplicate { id, first, second } => write!(
                f,
                "DUPLICATE id: {} at {}:{} and {}:{}",
                id,
                first.0.display(),
                first.1,
                second.0.display(),
                second.1
            ),
        }
    }
}

/// Read-only collision guard over the source fragments
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdCheckReport {
    pub ids_checked: usize,
    pub problems: Vec<IdProblem>,
}

impl IdCheckReport {
    pub fn passed(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Scan fragments without modifying them. Rows are reported 1-based.
/// Malformed JSON fails the check outright.
pub fn check_source_ids<P: AsRef<Path>>(paths: &[P]) -> Result<IdCheckReport> {
    let mut report = IdCheckReport::default();
    let mut seen: HashMap<String, (PathBuf, usize)> = HashMap::new();

    for path in paths {
        let fragment = load_fragment(path.as_ref())?;
        for (idx, row) in fragment.rows.iter().enumerate() {
            let location = (fragment.path.clone(), idx + 1);
            let id = match row.get(KEY_ID) {
                Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                _ => {
                    report.problems.push(IdProblem::Missing {
                        path: location.0,
                        row: location.1,
                        object_name: row
                            .get(KEY_OBJECT_NAME)
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                    });
                    continue;
                }
            };
            if !is_valid_id(&id) {
                report.problems.push(IdProblem::Invalid {
                    path: location.0,
                    row: location.1,
                    id,
                });
                continue;
            }
            if let Some(first) = seen.get(&id) {
                report.problems.push(IdProblem::Duplicate {
                    id,
                    first: first.clone(),
                    second: location,
                });
            } else {
                seen.insert(id, location);
            }
        }
    }

    report.ids_checked = seen.len();
    Ok(report)
}

/// Validate the merged set and freeze each identifier into `objectId`.
///
/// Any missing, malformed or duplicate identifier aborts the build; no
/// repair happens here.
pub fn finalize_identities(records: &mut [ObjectRecord]) -> Result<usize> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    for (row, record) in records.iter_mut().enumerate() {
        let object_name = record.name().to_string();
        let path = record.path_str().to_string();
        let id = match record.trimmed_id() {
            Some(id) => id.to_string(),
            None => {
                return Err(Error::MissingId {
                    row,
                    object_name,
                    path,
                })
            }
        };
        if !is_valid_id(&id) {
            return Err(Error::InvalidId {
                id,
                row,
                object_name,
                path,
            });
        }
        if !seen.insert(id.clone()) {
            return Err(Error::DuplicateId {
                id,
                row,
                object_name,
                path,
            });
        }
        record.id = Some(id.clone());
        record.object_id = Some(id);
    }
    Ok(seen.len())
}
