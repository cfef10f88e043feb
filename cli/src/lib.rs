//! The `pythinfer` command-line shell: a thin `clap` shell over
//! the `pythinfer` library crate. Owns only argument parsing, logging
//! initialization, and project discovery/creation. The actual inference
//! pipeline lives entirely in the `pythinfer` library crate.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use oxigraph::sparql::QueryResults;

use pythinfer::config::{discover_project_file_from_cwd, ProjectConfig, PROJECT_FILE_NAME};
use pythinfer::driver::DriverState;
use pythinfer::pipeline::{init_logging, Pipeline};
use pythinfer::view::GraphCapability;

/// Extensions the `create` verb considers RDF source files, the same table
/// `util::format_for_extension` recognizes.
const RDF_EXTENSIONS: &[&str] = &["ttl", "n3", "xml", "nt"];

#[derive(Debug, Parser)]
#[command(name = "pythinfer")]
#[command(about = "Provenance-preserving OWL-RL inference pipeline for RDF file collections")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Verbose mode - sets the RUST_LOG level to info, defaults to warning level
    #[clap(long, short, action, default_value = "false", global = true)]
    pub verbose: bool,
    /// Debug mode - sets the RUST_LOG level to debug, defaults to warning level
    #[clap(long, action, default_value = "false", global = true)]
    pub debug: bool,
    /// Path to the project config file; discovered by walking up from the
    /// current directory when omitted.
    #[clap(long, short = 'C', global = true)]
    pub config: Option<PathBuf>,
    /// Skip the automatic `create` that otherwise runs when no config file
    /// is found.
    #[clap(long, global = true)]
    pub no_create: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover RDF files under the current directory and emit a project
    /// config file.
    Create,
    /// Run the Merger only and export the `merged` artifact.
    Merge,
    /// Run the full inference pipeline and export all artifacts.
    Infer,
    /// Run inference, then execute a SPARQL SELECT/CONSTRUCT/ASK query
    /// against `combined_wanted`.
    Query {
        /// The SPARQL query text.
        q: String,
    },
}

/// Process exit codes returned by `run`.
pub const EXIT_OK: i32 = 0;
pub const EXIT_NOTHING_FOUND: i32 = 2;
pub const EXIT_BOUND_EXCEEDED: i32 = 3;

/// Parses `std::env::args`, dispatches, and returns the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logger(&cli);
    execute(cli)
}

fn init_logger(cli: &Cli) {
    init_logging();
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", level);
    }
    let _ = env_logger::try_init();
}

pub fn execute(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Create => create(&cli),
        Commands::Merge => with_project(&cli, |pipeline| {
            let inserted = pipeline.merge()?;
            info!("merged {inserted} new quads");
            let output_folder = pipeline.config.resolved_output_folder(&pipeline.config_path);
            let artifact = pythinfer::exporter::ExportArtifact::new(
                pythinfer::exporter::Artifact::Merged,
                pythinfer::exporter::graphs_by_category(
                    &pipeline.store,
                    &[
                        pythinfer::options::Category::Local,
                        pythinfer::options::Category::Reference,
                    ],
                )?,
            );
            let extra_formats = Vec::new();
            pythinfer::exporter::Exporter::export(&output_folder, &[artifact], &extra_formats)?;
            Ok(EXIT_OK)
        }),
        Commands::Infer => with_project(&cli, |pipeline| {
            let outcome = pipeline.infer()?;
            pipeline.export_all()?;
            match outcome.driver_report.state {
                DriverState::Done => {
                    info!(
                        "converged after {} round(s); merged {} quads",
                        outcome.driver_report.rounds.len(),
                        outcome.merged_quads
                    );
                    Ok(EXIT_OK)
                }
                DriverState::BoundExceeded => {
                    warn!(
                        "fixed point not reached within the configured bound after {} round(s)",
                        outcome.driver_report.rounds.len()
                    );
                    Ok(EXIT_BOUND_EXCEEDED)
                }
                other => Err(anyhow!("driver exited in unexpected state {other:?}")),
            }
        }),
        Commands::Query { q } => with_project(&cli, |pipeline| {
            pipeline.infer()?;
            let (view, _graph) = pipeline.query_view()?;
            let quads = view.quads((None, None, None))?;
            let store = oxigraph::store::Store::new()?;
            for quad in quads {
                store.insert(&oxigraph::model::Quad::new(
                    quad.subject,
                    quad.predicate,
                    quad.object,
                    oxigraph::model::GraphName::DefaultGraph,
                ))?;
            }
            match store.query(q.as_str())? {
                QueryResults::Solutions(solutions) => {
                    for solution in solutions {
                        let solution = solution?;
                        let row: Vec<String> = solution
                            .iter()
                            .map(|(var, term)| format!("{var}={term}"))
                            .collect();
                        println!("{}", row.join(" "));
                    }
                }
                QueryResults::Graph(triples) => {
                    for triple in triples {
                        println!("{}", triple?);
                    }
                }
                QueryResults::Boolean(b) => println!("{b}"),
            }
            Ok(EXIT_OK)
        }),
    }
}

/// Resolves the project config (discovering or auto-creating it per
/// `--no-create`), builds a `Pipeline`, and runs `body` against it.
fn with_project(cli: &Cli, body: impl FnOnce(&mut Pipeline) -> Result<i32>) -> Result<i32> {
    let config_path = match resolve_config_path(cli)? {
        Some(path) => path,
        None => return Ok(EXIT_NOTHING_FOUND),
    };
    let config = ProjectConfig::from_file(&config_path)?;
    let mut pipeline = Pipeline::new(config, config_path)?;
    body(&mut pipeline)
}

fn resolve_config_path(cli: &Cli) -> Result<Option<PathBuf>> {
    if let Some(explicit) = &cli.config {
        return Ok(Some(explicit.clone()));
    }
    if let Some(found) = discover_project_file_from_cwd()? {
        return Ok(Some(found));
    }
    if cli.no_create {
        return Err(anyhow!(
            "no `{PROJECT_FILE_NAME}` found and --no-create was set"
        ));
    }
    let cwd = std::env::current_dir()?;
    let exit_code = create_project_file(&cwd)?;
    if exit_code != EXIT_OK {
        return Ok(None);
    }
    Ok(Some(cwd.join(PROJECT_FILE_NAME)))
}

fn create(cli: &Cli) -> Result<i32> {
    let cwd = match &cli.config {
        Some(path) => path
            .parent()
            .ok_or_else(|| anyhow!("--config path has no parent directory"))?
            .to_path_buf(),
        None => std::env::current_dir()?,
    };
    create_project_file(&cwd)
}

/// Walks `root` for RDF files and writes a `pythinfer.yaml` categorizing
/// all discovered files as `local` (the `create` verb has no way to infer
/// which files are reference vocabularies; the project author edits the
/// generated config to move entries into `data.reference`).
fn create_project_file(root: &Path) -> Result<i32> {
    let mut discovered: Vec<String> = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if RDF_EXTENSIONS.contains(&ext) {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            discovered.push(relative);
        }
    }

    if discovered.is_empty() {
        warn!("no RDF files found under {}", root.display());
        return Ok(EXIT_NOTHING_FOUND);
    }
    discovered.sort();

    let mut config = ProjectConfig::default();
    config.data.local = discovered;

    let config_path = root.join(PROJECT_FILE_NAME);
    config
        .save_to_file(&config_path)
        .with_context(|| format!("writing project config to {}", config_path.display()))?;
    info!(
        "created {} with {} discovered file(s)",
        config_path.display(),
        config.data.local.len()
    );
    Ok(EXIT_OK)
}
