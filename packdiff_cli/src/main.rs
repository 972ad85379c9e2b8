mod ci;
mod render;

use anyhow::{bail, Context, Result};
use ci::CiOutput;
use clap::{Parser, Subcommand};
use packdiff_common::{ensure_config, load_config, load_config_from, save_config, AppConfig};
use packdiff_core::{
    apply_plan, read_local_version, ComparisonReport, EffectiveChanges, ExclusionFilter,
    ReleaseTable, ReportSummary, SyncPlan, SyncPlanner, TreeComparator, TreeSource, UpdateStatus,
};
use render::RenderOptions;
use serde::Serialize;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "packdiff")]
#[command(author = "packdiff Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compare pack versions and plan rule-filtered updates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two trees (directories or archives)
    Compare {
        /// Old tree
        old: PathBuf,

        /// New tree
        new: PathBuf,

        /// Exclusion patterns, applied after the configured ones (can be specified multiple times)
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<String>,

        /// Context lines around each change in text diffs
        #[arg(long)]
        context: Option<usize>,

        /// Configuration file (TOML, or JSON with a .json extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Print unified diffs of modified text files
        #[arg(long)]
        diff: bool,

        /// Show only differences (hide identical files)
        #[arg(short = 'd', long)]
        diff_only: bool,

        /// Disable ANSI colors in output
        #[arg(long)]
        no_color: bool,
    },

    /// Plan (and optionally apply) an update of a source tree from a new version
    Plan {
        /// Tree to be updated
        source: PathBuf,

        /// New version (directory or archive)
        new: PathBuf,

        /// Subdirectory of the new version holding the tree (e.g. overrides)
        #[arg(long)]
        new_subdir: Option<String>,

        /// Exclusion patterns, applied after the configured ones (can be specified multiple times)
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<String>,

        /// Configuration file (TOML, or JSON with a .json extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Apply the plan to the source tree
        #[arg(long)]
        apply: bool,

        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decide from a release table whether a newer version exists
    CheckUpdate {
        /// Name of the locally installed version
        #[arg(long, required_unless_present = "info_file", conflicts_with = "info_file")]
        local: Option<String>,

        /// Pack info file (JSON) holding the installed version at `modpack.version`
        #[arg(long)]
        info_file: Option<PathBuf>,

        /// File holding the release table (reads stdin when omitted)
        table: Option<PathBuf>,
    },

    /// Write a configuration file with the default settings
    InitConfig {
        /// Target file (defaults to the platform config location)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Use the portable location next to the executable
        #[arg(long)]
        portable: bool,
    },
}

fn main() {
    // Initialize tracing to stderr (so JSON output can go cleanly to stdout)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare {
            old,
            new,
            exclude,
            context,
            config,
            json,
            diff,
            diff_only,
            no_color,
        } => run_compare(
            old,
            new,
            exclude,
            context,
            config,
            json,
            RenderOptions {
                color: !no_color && std::io::stdout().is_terminal(),
                show_diff: diff,
                diff_only,
            },
        )
        .context("Compare failed"),
        Commands::Plan {
            source,
            new,
            new_subdir,
            exclude,
            config,
            apply,
            json,
        } => run_plan(source, new, new_subdir, exclude, config, apply, json).context("Plan failed"),
        Commands::CheckUpdate {
            local,
            info_file,
            table,
        } => run_check_update(local, info_file, table).context("Update check failed"),
        Commands::InitConfig { output, portable } => {
            run_init_config(output, portable).context("Writing config failed")
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Explicit config file, or the default location (missing file means defaults)
fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let loaded = match path {
        Some(path) => load_config_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => load_config(false)?,
    };

    if loaded.exists {
        info!("Using config {}", loaded.path.display());
    }
    Ok(loaded.config)
}

/// Command-line patterns come last so they take precedence
fn merged_config(config_path: Option<&Path>, exclude: Vec<String>) -> Result<AppConfig> {
    let mut config = load_app_config(config_path)?;
    config.exclusion_patterns.extend(exclude);
    Ok(config)
}

#[derive(Serialize)]
struct CompareJson<'a> {
    old: String,
    new: String,
    summary: ReportSummary,
    effective_changes: &'a EffectiveChanges,
    report: &'a ComparisonReport,
}

fn run_compare(
    old: PathBuf,
    new: PathBuf,
    exclude: Vec<String>,
    context: Option<usize>,
    config_path: Option<PathBuf>,
    json: bool,
    options: RenderOptions,
) -> Result<()> {
    let mut config = merged_config(config_path.as_deref(), exclude)?;
    if let Some(context) = context {
        config.context_lines = context;
    }

    // Malformed patterns must fail before any tree is read
    let filter = ExclusionFilter::new(&config.exclusion_patterns)?;
    for rule in filter.rules() {
        let action = if rule.is_negated() { "keep" } else { "exclude" };
        debug!("Exclusion rule {:?} ({})", rule.source(), action);
    }

    info!("Comparing:");
    info!("  Old: {}", old.display());
    info!("  New: {}", new.display());

    let old_source = TreeSource::open(&old).with_context(|| format!("Cannot open {}", old.display()))?;
    let new_source = TreeSource::open(&new).with_context(|| format!("Cannot open {}", new.display()))?;

    let comparator = TreeComparator::new(&config)?;
    let report = comparator.compare(old_source.root(), new_source.root())?;
    let effective = report.effective_changes(&filter);
    if !report.has_changes() {
        info!("Trees are identical");
    }

    if json {
        let output = CompareJson {
            old: old.to_string_lossy().to_string(),
            new: new.to_string_lossy().to_string(),
            summary: report.summary(),
            effective_changes: &effective,
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print!(
        "{}",
        render::render_report(&report, &effective, filter.rules().len(), options)
    );
    Ok(())
}

#[derive(Serialize)]
struct PlanJson<'a> {
    changes_detected: bool,
    applied: bool,
    plan: &'a SyncPlan,
}

fn run_plan(
    source: PathBuf,
    new: PathBuf,
    new_subdir: Option<String>,
    exclude: Vec<String>,
    config_path: Option<PathBuf>,
    apply: bool,
    json: bool,
) -> Result<()> {
    let config = merged_config(config_path.as_deref(), exclude)?;
    let planner = SyncPlanner::new(&config)?;

    let new_source = TreeSource::open(&new).with_context(|| format!("Cannot open {}", new.display()))?;
    let new_source = match new_subdir {
        Some(subdir) => {
            let narrowed = new_source.into_subdir(&subdir);
            if !narrowed.root().is_dir() {
                bail!("'{}' directory not found in {}", subdir, new.display());
            }
            narrowed
        }
        None => new_source,
    };

    let plan = planner.plan(&source, new_source.root())?;
    let ci = CiOutput::from_env().with_stdout_fallback(!json);

    if plan.is_empty() {
        info!("Version updated, but no effective changes detected");
    } else if apply {
        apply_plan(&plan, &source, new_source.root())?;
    }

    if json {
        let output = PlanJson {
            changes_detected: !plan.is_empty(),
            applied: apply && !plan.is_empty(),
            plan: &plan,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render::render_plan(&plan));
    }

    ci.set("changes_detected", if plan.is_empty() { "false" } else { "true" })?;
    Ok(())
}

fn run_check_update(
    local: Option<String>,
    info_file: Option<PathBuf>,
    table_path: Option<PathBuf>,
) -> Result<()> {
    let local = match (local, info_file) {
        (Some(local), _) => local,
        (None, Some(path)) => read_local_version(&path)
            .with_context(|| format!("Failed to read local version from {}", path.display()))?,
        (None, None) => bail!("Either --local or --info-file is required"),
    };

    let text = match &table_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read release table {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read release table from stdin")?;
            text
        }
    };

    let table = ReleaseTable::parse(&text)?;
    let ci = CiOutput::from_env();
    info!("Local version: {}", local);

    match table.check(&local) {
        UpdateStatus::UpToDate { version } => {
            println!("Already up to date: {} (ID: {})", version.name, version.id);
            ci.set("update_available", "false")?;
        }
        UpdateStatus::Available { latest, local_id } => {
            println!("New version found: {} (ID: {})", latest.name, latest.id);
            match &local_id {
                Some(id) => println!("Old version: {} (ID: {})", local, id),
                None => {
                    warn!(
                        "Could not find version ID for local version '{}'; no diff report can be generated",
                        local
                    );
                    println!("Old version: {} (ID unknown)", local);
                }
            }
            ci.set("update_available", "true")?;
            ci.set("new_version", &latest.name)?;
            ci.set("new_version_id", &latest.id)?;
            ci.set("local_version_id", local_id.as_deref().unwrap_or(""))?;
        }
    }

    Ok(())
}

fn run_init_config(output: Option<PathBuf>, portable: bool) -> Result<()> {
    let path = match output {
        Some(path) => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            save_config(&path, &AppConfig::default())?;
            path
        }
        None => {
            let loaded = ensure_config(portable)?;
            if loaded.exists {
                info!("Config already present, leaving it unchanged");
            }
            loaded.path
        }
    };

    println!("{}", path.display());
    Ok(())
}
