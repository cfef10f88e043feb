//! Top-level orchestrator: wires the Merger, Fixed-Point Driver, Filter
//! Chain and Exporter together behind a single entry point.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use oxigraph::model::{GraphName, Triple};

use crate::config::ProjectConfig;
use crate::driver::{
    inferences_external_owl, inferences_full_owl, inferences_heuristic, CancelToken, DriverReport,
    FixedPointDriver,
};
use crate::errors::PythinferError;
use crate::exporter::{graphs_by_category, Artifact, ExportArtifact, Exporter};
use crate::filters::FilterChain;
use crate::heuristics::Heuristic;
use crate::merger::Merger;
use crate::options::{Access, Category};
use crate::reasoner::{BackendReasoner, RlInProcess};
use crate::store::QuadStore;
use crate::view::{union_triples, RestrictedView};

/// Enables `log::info!`/`warn!`/`debug!` output, honoring `PYTHINFER_LOG`
/// (taking precedence) then `RUST_LOG`. Must be called before
/// `env_logger::init()`/`try_init()` for the level to apply.
pub fn init_logging() {
    if let Ok(level) = std::env::var("PYTHINFER_LOG") {
        std::env::set_var("RUST_LOG", level);
    }
}

/// One completed `infer` run's outputs, used by the CLI to report exit codes
/// and by `query` to locate `combined_wanted`.
pub struct PipelineOutcome {
    pub driver_report: DriverReport,
    pub merged_quads: usize,
}

/// Ties a `QuadStore` to the project config that produced it and exposes
/// the four pipeline verbs (`create` lives in the CLI/config layer since it
/// only discovers files and writes a config).
pub struct Pipeline {
    pub store: QuadStore,
    pub config: ProjectConfig,
    pub config_path: PathBuf,
    heuristics: Vec<Heuristic>,
}

impl Pipeline {
    pub fn new(config: ProjectConfig, config_path: PathBuf) -> Result<Self> {
        Ok(Self {
            store: QuadStore::new()?,
            config,
            config_path,
            heuristics: Vec::new(),
        })
    }

    /// Registers a procedural heuristic under the given id/priority
    /// (`heuristics.python` entries resolve to these; the config layer only
    /// names an identifier, the host binary supplies the function. These
    /// rules are project-supplied, not built-in).
    pub fn register_procedural(&mut self, heuristic: Heuristic) {
        self.heuristics.push(heuristic);
    }

    /// Loads `heuristics.sparql` (each `.rq` file, in configured order) and
    /// `heuristics.python` (each identifier resolved against the procedural
    /// rule registry) into `self.heuristics`, sparql entries first so a
    /// project's declared order matches the YAML section order.
    fn load_sparql_heuristics(&mut self) -> Result<()> {
        let base = self.config.resolved_base_folder(&self.config_path);
        for (priority, rq_path) in self.config.heuristics.sparql.iter().enumerate() {
            let path = base.join(rq_path);
            let query = std::fs::read_to_string(&path)
                .with_context(|| format!("reading SPARQL heuristic at {}", path.display()))?;
            self.heuristics.push(Heuristic::sparql_construct(
                rq_path.clone(),
                priority as i32,
                query,
            ));
        }
        let sparql_count = self.config.heuristics.sparql.len() as i32;
        for (offset, id) in self.config.heuristics.python.iter().enumerate() {
            let rule = crate::heuristics::lookup_procedural(id).ok_or_else(|| {
                PythinferError::Config(format!("unknown procedural heuristic `{id}`"))
            })?;
            self.heuristics.push(Heuristic::procedural(
                id.clone(),
                sparql_count + offset as i32,
                rule,
            ));
        }
        Ok(())
    }

    /// Runs the Merger over the config's categorized file list (backs the
    /// `merge` CLI verb).
    pub fn merge(&mut self) -> Result<usize> {
        let files = self.config.resolve_files(&self.config_path)?;
        Merger::merge(&mut self.store, &files)
    }

    /// Runs the full pipeline: merge, then the Fixed-Point Driver to
    /// closure, using `reasoner` as the backend (defaults to
    /// `rl-inprocess` via `infer`). `cancel` allows cooperative cancellation
    /// between rounds.
    pub fn infer_with(
        &mut self,
        reasoner: &dyn BackendReasoner,
        cancel: CancelToken,
    ) -> Result<PipelineOutcome> {
        let merged_quads = self.merge()?;
        self.load_sparql_heuristics()?;

        let driver = FixedPointDriver::new(reasoner, &self.heuristics)
            .with_bound(self.config.iteration.bound)
            .with_cancel(cancel);
        let driver_report = driver.run(&mut self.store)?;

        Ok(PipelineOutcome {
            driver_report,
            merged_quads,
        })
    }

    pub fn infer(&mut self) -> Result<PipelineOutcome> {
        self.infer_with(&RlInProcess, CancelToken::new())
    }

    /// Builds the `combined_full`/`combined_internal` view: everything
    /// local/derived minus `inferences_external_owl`, i.e. everything
    /// except the reference-only closure.
    fn combined_internal_graphs(&self) -> HashSet<GraphName> {
        let mut graphs: HashSet<GraphName> =
            self.store.graph_names_by_category(Category::Local).into_iter().collect();
        graphs.extend(self.store.graph_names_by_category(Category::Derived));
        graphs.remove(&inferences_external_owl());
        graphs
    }

    fn combined_internal_triples(&mut self) -> Result<Vec<Triple>> {
        let graphs: Vec<GraphName> = self.combined_internal_graphs().into_iter().collect();
        union_triples(&self.store, &graphs)
    }

    /// Applies the Filter Chain to `combined_internal`, producing
    /// `combined_wanted`.
    pub fn combined_wanted_triples(&mut self) -> Result<Vec<Triple>> {
        let triples = self.combined_internal_triples()?;
        let (kept, _report) = FilterChain::default().run(triples);
        Ok(kept)
    }

    /// Exports all four artifacts into the configured output folder (plus
    /// the mandatory quad format, always included).
    pub fn export_all(&mut self) -> Result<Vec<PathBuf>> {
        let output_folder = self.config.resolved_output_folder(&self.config_path);

        let merged = ExportArtifact::new(
            Artifact::Merged,
            graphs_by_category(&self.store, &[Category::Local, Category::Reference])?,
        );

        let internal_graphs: Vec<GraphName> = self.combined_internal_graphs().into_iter().collect();
        let combined_full_triples = union_triples(&self.store, &internal_graphs)?;
        let combined_full = ExportArtifact::new(
            Artifact::CombinedFull,
            vec![(crate::driver::derived_graph("combined_full"), combined_full_triples.clone())],
        );
        let combined_internal = ExportArtifact::new(
            Artifact::CombinedInternal,
            vec![(
                crate::driver::derived_graph("combined_internal"),
                combined_full_triples,
            )],
        );

        let wanted_triples = self.combined_wanted_triples()?;
        let combined_wanted = ExportArtifact::new(
            Artifact::CombinedWanted,
            vec![(crate::driver::derived_graph("combined_wanted"), wanted_triples)],
        );

        let extra_formats = resolve_formats(&self.config.output.extra_formats)?;
        Exporter::export(
            &output_folder,
            &[merged, combined_full, combined_internal, combined_wanted],
            &extra_formats,
        )
    }

    /// Builds a read-only `RestrictedView` over `combined_wanted`'s
    /// constituent graphs plus a fresh synthetic graph holding the filtered
    /// triples, for the `query` CLI verb to run a SPARQL SELECT/CONSTRUCT/
    /// ASK against.
    pub fn query_view(&mut self) -> Result<(RestrictedView<'_>, GraphName)> {
        let wanted_triples = self.combined_wanted_triples()?;
        let graph = crate::driver::derived_graph("combined_wanted");
        self.store.create_graph(&graph, Category::Derived);
        for triple in wanted_triples {
            self.store.add(
                oxigraph::model::Quad::new(
                    triple.subject,
                    triple.predicate,
                    triple.object,
                    graph.clone(),
                )
                .as_ref(),
            )?;
        }
        let whitelist: HashSet<GraphName> = std::iter::once(graph.clone()).collect();
        Ok((
            RestrictedView::new(&mut self.store, whitelist, Access::ReadOnly),
            graph,
        ))
    }
}

fn resolve_formats(names: &[String]) -> Result<Vec<oxigraph::io::RdfFormat>> {
    names
        .iter()
        .map(|name| {
            format_from_name(name).ok_or_else(|| {
                PythinferError::Config(format!("unknown export format `{name}`")).into()
            })
        })
        .collect()
}

fn format_from_name(name: &str) -> Option<oxigraph::io::RdfFormat> {
    use oxigraph::io::RdfFormat;
    match name.to_ascii_lowercase().as_str() {
        "turtle" | "ttl" => Some(RdfFormat::Turtle),
        "ntriples" | "nt" => Some(RdfFormat::NTriples),
        "nquads" | "nq" => Some(RdfFormat::NQuads),
        "rdfxml" | "xml" | "rdf" => Some(RdfFormat::RdfXml),
        "trig" => Some(RdfFormat::TriG),
        _ => None,
    }
}

/// Resolves (or discovers) a project config and returns a ready-to-use
/// `Pipeline`.
pub fn load_pipeline(explicit_config: Option<&Path>) -> Result<Pipeline> {
    let config_path = match explicit_config {
        Some(path) => path.to_path_buf(),
        None => crate::config::discover_project_file_from_cwd()?.ok_or_else(|| {
            PythinferError::Config(format!(
                "no `{}` found in this directory or its ancestors",
                crate::config::PROJECT_FILE_NAME
            ))
        })?,
    };
    info!("loading project config from {}", config_path.display());
    let config = ProjectConfig::from_file(&config_path)?;
    Pipeline::new(config, config_path)
}
