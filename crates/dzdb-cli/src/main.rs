//! DayZ Object Database CLI
//!
//! Command-line tool for syncing identifiers, building, and reporting on the
//! DayZ object catalog.

use chrono::Utc;
use clap::{Parser, Subcommand};
use dzdb_core::report::{
    class_names, export_link_candidates, export_names, folder_counts, format_folder_counts,
    link_candidates, load_dataset, unique_object_names, COUNTS_FILE, DEFAULT_CLASS_PREFIXES,
    LINKS_CSV, LINKS_JSON, NAMES_CSV,
};
use dzdb_core::{BuildConfig, IdProblem, Pipeline, CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dzdb")]
#[command(about = "DayZ object catalog builder", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to <root>/dzdb.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync identifiers, collapse duplicates, link geometry and publish
    Build {
        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Assign missing ids and repair invalid or duplicate ones in the sources
    SyncIds,

    /// Report id problems in the sources without changing them
    CheckIds,

    /// Write a maintenance report
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },

    /// Write a config file with default settings
    CreateConfig {
        /// Output path (defaults to <root>/dzdb.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ReportKind {
    /// Unique object names in the published dataset (CSV)
    Names {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Object counts per database folder
    Counts {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Donor suggestions for unlinked gameplay objects (CSV plus a JSON twin)
    Links {
        /// CSV output path; the JSON file is written next to it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Class names of source objects under the given path prefixes
    Classes {
        /// Path prefix to include (repeatable, defaults to dz/characters, dz/gear, dz/weapons)
        #[arg(short, long = "prefix")]
        prefixes: Vec<String>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        tracing::debug!("command failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> dzdb_core::Result<()> {
    let cli = Cli::parse();

    if let Commands::CreateConfig { output, force } = &cli.command {
        let output = output.clone().unwrap_or_else(|| cli.root.join(CONFIG_FILE));
        return cmd_create_config(&output, *force);
    }

    let config = load_config(&cli.root, cli.config.as_deref())?;
    let pipeline = Pipeline::new(&cli.root, config);

    match cli.command {
        Commands::Build { json } => cmd_build(&pipeline, json),
        Commands::SyncIds => cmd_sync_ids(&pipeline),
        Commands::CheckIds => cmd_check_ids(&pipeline),
        Commands::Report { kind } => match kind {
            ReportKind::Names { output } => cmd_report_names(&pipeline, output),
            ReportKind::Counts { output } => cmd_report_counts(&pipeline, output),
            ReportKind::Links { output } => cmd_report_links(&pipeline, output),
            ReportKind::Classes { prefixes } => cmd_report_classes(&pipeline, &prefixes),
        },
        Commands::CreateConfig { .. } => Ok(()),
    }
}

fn load_config(root: &Path, explicit: Option<&Path>) -> dzdb_core::Result<BuildConfig> {
    match explicit {
        Some(path) => BuildConfig::load(path),
        None => BuildConfig::discover(root),
    }
}

fn cmd_build(pipeline: &Pipeline, json: bool) -> dzdb_core::Result<()> {
    let mut rng = rand::thread_rng();
    let report = pipeline.run(&mut rng, Utc::now())?;
    report.log();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(backup) = &report.publish.backup {
        println!("Backed up previous dataset to {}", backup.display());
    }
    println!("Wrote {} files:", report.publish.files_written.len());
    for path in &report.publish.files_written {
        println!("  - {}", path.display());
    }

    Ok(())
}

fn cmd_sync_ids(pipeline: &Pipeline) -> dzdb_core::Result<()> {
    let mut rng = rand::thread_rng();
    let stats = pipeline.sync_ids(&mut rng)?;

    println!("Scanned {} fragments ({} skipped)", stats.files_scanned, stats.files_skipped);
    println!("  {} ids added", stats.ids_added_missing);
    println!("  {} invalid ids replaced", stats.ids_repaired_invalid);
    println!("  {} duplicate ids replaced", stats.ids_repaired_duplicate);
    println!("  {} files rewritten", stats.files_touched);

    Ok(())
}

fn cmd_check_ids(pipeline: &Pipeline) -> dzdb_core::Result<()> {
    let report = pipeline.check_ids()?;

    if report.passed() {
        println!("OK: {} unique ids, no problems found", report.ids_checked);
        return Ok(());
    }

    let count = |pred: fn(&IdProblem) -> bool| report.problems.iter().filter(|p| pred(p)).count();
    println!(
        "Found {} problems ({} missing, {} invalid, {} duplicate):",
        report.problems.len(),
        count(|p| matches!(p, IdProblem::Missing { .. })),
        count(|p| matches!(p, IdProblem::Invalid { .. })),
        count(|p| matches!(p, IdProblem::Duplicate { .. })),
    );
    for problem in &report.problems {
        println!("  {}", problem);
    }
    println!();
    println!("Run `dzdb sync-ids` to repair them.");
    std::process::exit(1);
}

fn cmd_report_names(pipeline: &Pipeline, output: Option<PathBuf>) -> dzdb_core::Result<()> {
    let rows = load_dataset(&pipeline.layout().canonical_json)?;
    let names = unique_object_names(&rows);
    let output = output.unwrap_or_else(|| pipeline.layout().reports_dir.join(NAMES_CSV));

    export_names(&output, &names)?;
    println!("Wrote {} unique names to {}", names.len(), output.display());

    Ok(())
}

fn cmd_report_counts(pipeline: &Pipeline, output: Option<PathBuf>) -> dzdb_core::Result<()> {
    let sources = pipeline.scan()?;
    let counts = folder_counts(&sources);
    let output = output.unwrap_or_else(|| pipeline.layout().data_dir.join(COUNTS_FILE));

    std::fs::create_dir_all(output.parent().unwrap_or_else(|| Path::new(".")))?;
    std::fs::write(&output, format_folder_counts(&counts))?;
    println!("Wrote folder counts to {}", output.display());

    Ok(())
}

fn cmd_report_links(pipeline: &Pipeline, output: Option<PathBuf>) -> dzdb_core::Result<()> {
    let rows = load_dataset(&pipeline.layout().canonical_json)?;
    let rules = &pipeline.config().geometry;
    let candidates = link_candidates(&rows, &rules.raw_model_type, &rules.gameplay_model_type);
    let output = output.unwrap_or_else(|| pipeline.layout().reports_dir.join(LINKS_CSV));
    let json_output = output.with_file_name(LINKS_JSON);

    export_link_candidates(&output, &json_output, &candidates)?;

    let mut by_status = std::collections::BTreeMap::new();
    for candidate in &candidates {
        *by_status
            .entry(format!("{:?}", candidate.candidate_status))
            .or_insert(0usize) += 1;
    }
    println!("Wrote {} rows to {}", candidates.len(), output.display());
    println!("Wrote {}", json_output.display());
    for (status, count) in &by_status {
        println!("  {}: {}", status, count);
    }

    Ok(())
}

fn cmd_report_classes(pipeline: &Pipeline, prefixes: &[String]) -> dzdb_core::Result<()> {
    let sources = pipeline.scan()?;
    let names = if prefixes.is_empty() {
        class_names(&sources, DEFAULT_CLASS_PREFIXES)
    } else {
        class_names(&sources, prefixes)
    };
    tracing::info!("{} class names", names.len());

    for name in &names {
        println!("{}", name);
    }

    Ok(())
}

fn cmd_create_config(output: &Path, force: bool) -> dzdb_core::Result<()> {
    if output.exists() && !force {
        tracing::warn!("{} already exists (use --force to overwrite)", output.display());
        return Ok(());
    }

    BuildConfig::default().save(output)?;
    println!("Created config file: {}", output.display());
    println!();
    println!("Edit the file to adjust paths, then run:");
    println!("  dzdb --root <path> build");

    Ok(())
}
