//! Merger: parses categorized input files into per-file named
//! graphs, preserving provenance via a `file://` graph-name, and records
//! the category index for later view construction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use oxigraph::model::{GraphName, NamedNode, Quad};

use crate::errors::PythinferError;
use crate::options::Category;
use crate::store::QuadStore;
use crate::util::{format_for_extension, read_file};

/// One input file slated for merging, tagged with its provenance category.
#[derive(Debug, Clone)]
pub struct CategorizedFile {
    pub path: PathBuf,
    pub category: Category,
}

/// Turns a file's absolute path into the `file://` graph-name IRI used to
/// preserve per-file provenance: one graph per source file.
pub fn graph_name_for_path(path: &Path) -> Result<GraphName> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("resolving {}", path.display()))?;
    let iri = format!("file://{}", absolute.display());
    Ok(GraphName::NamedNode(NamedNode::new(iri)?))
}

pub struct Merger;

impl Merger {
    /// Parses each file into its own named graph and inserts it into the
    /// store under the given category. Ordering of files does not affect
    /// correctness (triples are sets); parse errors are per-file fatal and
    /// any failure discards the whole batch.
    pub fn merge(store: &mut QuadStore, files: &[CategorizedFile]) -> Result<usize> {
        let mut staged: Vec<Quad> = Vec::new();
        let mut graphs: Vec<(GraphName, Category)> = Vec::with_capacity(files.len());

        for file in files {
            let graph_name = graph_name_for_path(&file.path)?;
            let format = format_for_extension(&file.path);
            let graph = read_file(&file.path).map_err(|e| PythinferError::Parse {
                path: file.path.display().to_string(),
                format: format
                    .map(|f| format!("{f:?}"))
                    .unwrap_or_else(|| "unknown".to_string()),
                detail: e.to_string(),
            })?;
            for triple in graph.iter() {
                staged.push(Quad::new(
                    triple.subject,
                    triple.predicate,
                    triple.object,
                    graph_name.clone(),
                ));
            }
            graphs.push((graph_name, file.category));
        }

        // Every file parsed cleanly: commit the whole batch.
        for (graph_name, category) in &graphs {
            store.create_graph(graph_name, *category);
        }
        let inserted = store.bulk_add(staged)?;
        info!(
            "merged {} files into {} quads ({} new)",
            files.len(),
            graphs.len(),
            inserted
        );
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn merges_each_file_into_its_own_graph() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_fixture(
            &dir,
            "a.ttl",
            "@prefix ex: <http://example.org/> . ex:a ex:p ex:b .",
        );
        let b = write_fixture(
            &dir,
            "b.ttl",
            "@prefix ex: <http://example.org/> . ex:c ex:p ex:d .",
        );

        let mut store = QuadStore::new().unwrap();
        let files = vec![
            CategorizedFile {
                path: a.clone(),
                category: Category::Local,
            },
            CategorizedFile {
                path: b.clone(),
                category: Category::Reference,
            },
        ];
        let inserted = Merger::merge(&mut store, &files).unwrap();
        assert_eq!(inserted, 2);

        let ga = graph_name_for_path(&a).unwrap();
        let gb = graph_name_for_path(&b).unwrap();
        assert_eq!(store.category_of(&ga), Some(Category::Local));
        assert_eq!(store.category_of(&gb), Some(Category::Reference));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn bad_file_fails_the_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_fixture(
            &dir,
            "good.ttl",
            "@prefix ex: <http://example.org/> . ex:a ex:p ex:b .",
        );
        let bad = write_fixture(&dir, "bad.ttl", "this is not valid turtle @@@");

        let mut store = QuadStore::new().unwrap();
        let files = vec![
            CategorizedFile {
                path: good,
                category: Category::Local,
            },
            CategorizedFile {
                path: bad,
                category: Category::Local,
            },
        ];
        assert!(Merger::merge(&mut store, &files).is_err());
        assert_eq!(store.len().unwrap(), 0);
    }
}
