//! Exporter: materializes the four logical artifacts, `merged`,
//! `combined_full`, `combined_internal`, `combined_wanted`, to files, one
//! per (artifact × format). The quad-capable format (TriG) is always
//! written; flat-triple formats drop the graph-name.
//!
//! Serialization reuses the `RdfSerializer`-over-writer pattern from
//! `util::write_dataset_to_file`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;
use oxigraph::io::RdfFormat;
use oxigraph::model::{Dataset, GraphName, Quad, Triple};

use crate::store::QuadStore;
use crate::util::{write_dataset_quads_to_file, write_graph_to_file};

/// The quad-capable artifact format written for every export, regardless of
/// the project's configured `extra_formats`.
pub const MANDATORY_FORMAT: RdfFormat = RdfFormat::TriG;

/// The four logical artifacts a pipeline run produces.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Artifact {
    Merged,
    CombinedFull,
    CombinedInternal,
    CombinedWanted,
}

impl Artifact {
    pub fn file_stem(self) -> &'static str {
        match self {
            Artifact::Merged => "merged",
            Artifact::CombinedFull => "combined_full",
            Artifact::CombinedInternal => "combined_internal",
            Artifact::CombinedWanted => "combined_wanted",
        }
    }
}

/// One artifact ready to be written: its quads (graph-name preserved) as
/// assembled by the pipeline orchestrator from the relevant views.
pub struct ExportArtifact {
    pub artifact: Artifact,
    pub quads: Vec<Quad>,
}

impl ExportArtifact {
    pub fn new(artifact: Artifact, triples_by_graph: Vec<(GraphName, Vec<Triple>)>) -> Self {
        let quads = triples_by_graph
            .into_iter()
            .flat_map(|(graph, triples)| {
                triples
                    .into_iter()
                    .map(move |t| Quad::new(t.subject, t.predicate, t.object, graph.clone()))
            })
            .collect();
        Self { artifact, quads }
    }

    fn as_dataset(&self) -> Dataset {
        self.quads.iter().cloned().collect()
    }

    fn flattened_graph(&self) -> oxigraph::model::graph::Graph {
        self.quads
            .iter()
            .map(|q| Triple::new(q.subject.clone(), q.predicate.clone(), q.object.clone()))
            .collect()
    }
}

pub struct Exporter;

impl Exporter {
    /// Writes one file per (artifact × requested format) into `folder`,
    /// named `<folder>/<artifact-stem>.<extension>`. `extra_formats` is in
    /// addition to the always-present `MANDATORY_FORMAT`.
    pub fn export(
        folder: &Path,
        artifacts: &[ExportArtifact],
        extra_formats: &[RdfFormat],
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(folder)?;
        let mut formats: Vec<RdfFormat> = vec![MANDATORY_FORMAT];
        let mut seen: HashSet<&'static str> = HashSet::new();
        seen.insert(MANDATORY_FORMAT.file_extension());
        for format in extra_formats {
            if seen.insert(format.file_extension()) {
                formats.push(*format);
            }
        }

        let mut written = Vec::new();
        for artifact in artifacts {
            for format in &formats {
                let path = folder.join(format!(
                    "{}.{}",
                    artifact.artifact.file_stem(),
                    format.file_extension()
                ));
                if *format == RdfFormat::TriG || *format == RdfFormat::NQuads {
                    write_dataset_quads_to_file(&artifact.as_dataset(), &path, *format)?;
                } else {
                    write_graph_to_file(&artifact.flattened_graph(), &path, *format)?;
                }
                written.push(path);
            }
        }
        info!(
            "exported {} artifact(s) in {} format(s) to {}",
            artifacts.len(),
            formats.len(),
            folder.display()
        );
        Ok(written)
    }
}

/// Extracts every graph in `store` whose category is one of `categories`,
/// flattened into `(graph-name, triples)` pairs. Used to assemble the
/// `merged` artifact directly from the store without going through a view.
pub fn graphs_by_category(
    store: &QuadStore,
    categories: &[crate::options::Category],
) -> Result<Vec<(GraphName, Vec<Triple>)>> {
    let mut out = Vec::new();
    for category in categories {
        for graph in store.graph_names_by_category(*category) {
            let triples: Vec<Triple> = store
                .quads_for_pattern(None, None, None, Some(graph.as_ref()))
                .map(|q| q.map(|q| Triple::new(q.subject, q.predicate, q.object)))
                .collect::<Result<_, _>>()?;
            out.push((graph, triples));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Category;
    use oxigraph::model::{Literal, NamedNode};

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    #[test]
    fn exports_mandatory_trig_plus_extra_formats() {
        let dir = tempfile::tempdir().unwrap();
        let g = GraphName::NamedNode(nn("http://example.org/g"));
        let triple = Triple::new(
            nn("http://example.org/s"),
            nn("http://example.org/p"),
            Literal::from("v"),
        );
        let artifact = ExportArtifact::new(Artifact::Merged, vec![(g, vec![triple])]);
        let written = Exporter::export(dir.path(), &[artifact], &[RdfFormat::Turtle]).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("merged.trig").exists());
        assert!(dir.path().join("merged.ttl").exists());
    }

    #[test]
    fn graphs_by_category_only_includes_requested_categories() {
        let mut store = QuadStore::new().unwrap();
        let local = GraphName::NamedNode(nn("http://example.org/local"));
        let reference = GraphName::NamedNode(nn("http://example.org/reference"));
        store.create_graph(&local, Category::Local);
        store.create_graph(&reference, Category::Reference);
        store
            .add(
                Quad::new(
                    nn("http://example.org/a"),
                    nn("http://example.org/p"),
                    nn("http://example.org/b"),
                    local.clone(),
                )
                .as_ref(),
            )
            .unwrap();
        store
            .add(
                Quad::new(
                    nn("http://example.org/c"),
                    nn("http://example.org/p"),
                    nn("http://example.org/d"),
                    reference,
                )
                .as_ref(),
            )
            .unwrap();

        let only_local = graphs_by_category(&store, &[Category::Local]).unwrap();
        assert_eq!(only_local.len(), 1);
        assert_eq!(only_local[0].0, local);
    }
}
