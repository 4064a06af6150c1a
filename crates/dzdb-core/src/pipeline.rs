//! Build orchestration
//!
//! A [`Pipeline`] runs every stage in a fixed order against one project
//! root. Source fragments are the only inputs written before the final
//! publish step: identifiers are synced first, then everything else is
//! computed in memory and published only after finalization succeeds.

use crate::config::{BuildConfig, ProjectLayout};
use crate::error::Result;
use crate::fragment::load_fragment;
use crate::geometry::{link_geometry, DonorMap, GeometryStats};
use crate::history::{format_timestamp, TombstoneLedger};
use crate::identity::{
    check_source_ids, collect_source_ids, finalize_identities, IdCheckReport,
    IdentifierSynchronizer, SyncStats,
};
use crate::merger::{collapse_duplicates, CollapseStats};
use crate::patch::{apply_overrides, OverrideFile, OverrideResult};
use crate::publish::{
    build_artifacts, load_published, verify_outputs, write_artifacts, MetaDescriptor,
    PublishReport,
};
use crate::record::ObjectRecord;
use crate::scanner::{scan_database, SourceSet};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::path::Path;

/// Counters from loading the synced fragments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub fragments_loaded: usize,
    pub fragments_skipped: usize,
    pub rows_loaded: usize,
}

/// Everything one build did
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub sources: usize,
    pub sync: SyncStats,
    pub load: LoadStats,
    pub collapse: CollapseStats,
    pub overrides: OverrideResult,
    pub geometry: GeometryStats,
    pub tombstones_added: usize,
    pub tombstones_total: usize,
    pub publish: PublishReport,
    pub meta: MetaDescriptor,
}

impl BuildReport {
    /// Write one `info` line per stage
    pub fn log(&self) {
        tracing::info!(
            "sources: {} fragments ({} loaded, {} skipped, {} rows)",
            self.sources,
            self.load.fragments_loaded,
            self.load.fragments_skipped,
            self.load.rows_loaded
        );
        tracing::info!(
            "ids: {} added, {} invalid repaired, {} duplicates repaired, {} files rewritten",
            self.sync.ids_added_missing,
            self.sync.ids_repaired_invalid,
            self.sync.ids_repaired_duplicate,
            self.sync.files_touched
        );
        tracing::info!(
            "collapsed {} duplicate groups ({} rows removed)",
            self.collapse.groups_collapsed,
            self.collapse.rows_removed
        );
        tracing::info!(
            "overrides: {} records patched, {} unknown ids",
            self.overrides.records_patched,
            self.overrides.unknown_ids.len()
        );
        tracing::info!(
            "geometry: {} measured, {} linked, {} estimated, {} ambiguous ({} donors)",
            self.geometry.measured,
            self.geometry.linked,
            self.geometry.estimated,
            self.geometry.ambiguous,
            self.geometry.donors
        );
        tracing::info!(
            "tombstones: {} new, {} total",
            self.tombstones_added,
            self.tombstones_total
        );
        tracing::info!(
            "published {} objects, {} names, {} config names",
            self.meta.object_count,
            self.meta.name_count,
            self.meta.config_name_count
        );
    }
}

/// One project root plus its resolved configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: BuildConfig,
    layout: ProjectLayout,
}

impl Pipeline {
    pub fn new<P: AsRef<Path>>(root: P, config: BuildConfig) -> Self {
        let layout = ProjectLayout::resolve(root, &config);
        Self { config, layout }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Discover source fragments under the database directory
    pub fn scan(&self) -> Result<SourceSet> {
        scan_database(&self.layout.database_dir)
    }

    /// Repair identifiers in the source fragments. New identifiers never
    /// repeat a tombstoned, published or existing source identifier.
    pub fn sync_ids<R: Rng>(&self, rng: &mut R) -> Result<SyncStats> {
        let sources = self.scan()?;
        let ledger = TombstoneLedger::load(&self.layout.tombstones_json)?;
        self.sync_sources(&sources, &ledger, rng)
    }

    fn sync_sources<R: Rng>(
        &self,
        sources: &SourceSet,
        ledger: &TombstoneLedger,
        rng: &mut R,
    ) -> Result<SyncStats> {
        let paths = sources.paths();
        let mut reserved = collect_source_ids(&paths)?;
        let published = self.published()?;
        reserved.extend(published.iter().filter_map(|r| r.trimmed_id().map(str::to_string)));

        let mut sync = IdentifierSynchronizer::new(rng)
            .with_retired(ledger.ids())
            .with_reserved(reserved);
        sync.sync_files(&paths)?;
        Ok(sync.into_stats())
    }

    /// Read-only identifier check over the source fragments
    pub fn check_ids(&self) -> Result<IdCheckReport> {
        let sources = self.scan()?;
        check_source_ids(&sources.paths())
    }

    /// Load every fragment as normalized records, skipping unreadable ones
    pub fn load_records(&self, sources: &SourceSet) -> Result<(Vec<ObjectRecord>, LoadStats)> {
        let mut stats = LoadStats::default();
        let mut records = Vec::new();
        for path in sources.paths() {
            match load_fragment(path) {
                Ok(fragment) => {
                    stats.fragments_loaded += 1;
                    stats.rows_loaded += fragment.row_count();
                    records.extend(fragment.records());
                }
                Err(e) if e.is_per_file() => {
                    tracing::warn!("skipping fragment: {}", e);
                    stats.fragments_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok((records, stats))
    }

    /// The canonical dataset from the last successful build
    pub fn published(&self) -> Result<Vec<ObjectRecord>> {
        load_published(&self.layout.canonical_json)
    }

    /// Run a full build
    pub fn run<R: Rng>(&self, rng: &mut R, now: DateTime<Utc>) -> Result<BuildReport> {
        let sources = self.scan()?;
        tracing::info!(
            "scanning {} ({} fragments)",
            self.layout.database_dir.display(),
            sources.len()
        );

        let mut ledger = TombstoneLedger::load(&self.layout.tombstones_json)?;
        let sync = self.sync_sources(&sources, &ledger, rng)?;

        let (records, load) = self.load_records(&sources)?;
        let (mut records, collapse) = collapse_duplicates(records);

        let overrides = OverrideFile::load_or_create(&self.layout.overrides_file)?;
        let overrides = apply_overrides(&mut records, &overrides);

        let donor_map = DonorMap::load_optional(&self.layout.donor_map_file)?;
        let geometry = link_geometry(&mut records, &donor_map, &self.config.geometry);

        finalize_identities(&mut records)?;

        let previous = self.published()?;
        let tombstones_added = ledger.record_removals(&previous, &records, now);

        let artifacts = build_artifacts(
            records,
            &self.config.image_base_url,
            &self.config.geometry.gameplay_model_type,
            &self.config.api_version,
            &format_timestamp(now),
        );
        let publish = write_artifacts(&self.layout, &artifacts, &ledger)?;
        let meta = verify_outputs(&self.layout)?;

        Ok(BuildReport {
            sources: sources.len(),
            sync,
            load,
            collapse,
            overrides,
            geometry,
            tombstones_added,
            tombstones_total: ledger.len(),
            publish,
            meta,
        })
    }
}
