//! dzdb-core: Core library for building the DayZ object catalog
//!
//! This library provides functionality to:
//! - Scan the database tree for source fragments (presets and `objects.json`)
//! - Assign and repair stable object identifiers in place
//! - Collapse duplicate records into one canonical record per object
//! - Apply manual overrides and attach bounding-box geometry
//! - Track retired identifiers and publish the static dataset

pub mod config;
pub mod error;
pub mod fragment;
pub mod geometry;
pub mod history;
pub mod identity;
pub mod merger;
pub mod patch;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod report;
pub mod scanner;

pub use config::{BuildConfig, ProjectLayout, CONFIG_FILE};
pub use error::{Error, Result};
pub use fragment::{load_fragment, parse_fragment_str, Fragment};
pub use geometry::{link_geometry, DonorMap, GeometryRules, GeometryStats};
pub use history::{Tombstone, TombstoneLedger};
pub use identity::{
    check_source_ids, collect_source_ids, finalize_identities, is_valid_id, mint_identifier,
    IdCheckReport, IdProblem, IdentifierSynchronizer, SyncStats,
};
pub use merger::{collapse_duplicates, CollapseStats};
pub use patch::{apply_overrides, OverrideFile, OverrideResult};
pub use pipeline::{BuildReport, LoadStats, Pipeline};
pub use publish::{verify_outputs, Artifacts, MetaDescriptor, NameEntry, PublishReport};
pub use record::{DimensionsSource, Geometry, LinkMethod, LinkProvenance, ObjectRecord, Vec3};
pub use scanner::{scan_database, SourceFile, SourceKind, SourceSet};
