//! The in-memory quad store: holds all quads for one pipeline run and a
//! name→category index for the named graphs it has seen.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use log::warn;
use oxigraph::model::{GraphName, GraphNameRef, QuadRef, SubjectRef, TermRef, Triple};
use oxigraph::store::{QuadIter, Store};

use crate::options::Category;

/// An in-memory collection of RDF quads plus provenance-category metadata
/// for each named graph. One `QuadStore` spans the lifetime of one pipeline
/// run; there is no global mutable state shared across runs.
pub struct QuadStore {
    store: Store,
    categories: HashMap<GraphName, Category>,
}

impl QuadStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            store: Store::new()?,
            categories: HashMap::new(),
        })
    }

    /// Direct access to the underlying oxigraph store, for callers (views,
    /// the reasoner adapter, the exporter) that need the full query surface.
    pub fn inner(&self) -> &Store {
        &self.store
    }

    fn ensure_graph(&mut self, name: &GraphName) {
        self.categories
            .entry(name.clone())
            .or_insert(Category::Derived);
    }

    /// Inserts a quad, auto-creating its graph as `Derived` if unseen.
    /// Idempotent on duplicates.
    pub fn add(&mut self, quad: QuadRef<'_>) -> Result<bool> {
        self.ensure_graph(&quad.graph_name.into_owned());
        Ok(self.store.insert(quad)?)
    }

    /// No-op if the quad is absent.
    pub fn remove(&mut self, quad: QuadRef<'_>) -> Result<bool> {
        Ok(self.store.remove(quad)?)
    }

    /// Single-batch insertion; returns the count of quads actually inserted
    /// (duplicates do not count).
    pub fn bulk_add<I>(&mut self, quads: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<oxigraph::model::Quad>,
    {
        let mut inserted = 0;
        for quad in quads {
            let quad = quad.into();
            self.ensure_graph(&quad.graph_name);
            if self.store.insert(&quad)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Creates the named graph (as `Derived`, unless a category is given)
    /// if it does not already exist. Returns `true` if it was created.
    pub fn create_graph(&mut self, name: &GraphName, category: Category) -> bool {
        if self.categories.contains_key(name) {
            false
        } else {
            self.categories.insert(name.clone(), category);
            true
        }
    }

    /// Sets a graph's category. Write-once: a second call with a different
    /// category is logged and ignored rather than treated as fatal.
    pub fn set_category(&mut self, name: &GraphName, category: Category) {
        match self.categories.get(name) {
            None => {
                self.categories.insert(name.clone(), category);
            }
            Some(existing) if *existing != category => {
                warn!(
                    "category of graph {:?} is write-once; ignoring attempt to change {:?} -> {:?}",
                    name, existing, category
                );
            }
            _ => {}
        }
    }

    pub fn category_of(&self, name: &GraphName) -> Option<Category> {
        self.categories.get(name).copied()
    }

    pub fn graph_names_by_category(&self, category: Category) -> Vec<GraphName> {
        self.categories
            .iter()
            .filter(|(_, c)| **c == category)
            .map(|(g, _)| g.clone())
            .collect()
    }

    pub fn graph_names(&self) -> Vec<GraphName> {
        self.categories.keys().cloned().collect()
    }

    pub fn contains_graph(&self, name: &GraphName) -> bool {
        self.categories.contains_key(name)
    }

    /// Removes a graph's triples from the store. The caller decides whether
    /// to also drop the category entry (a Restricted View keeps the name
    /// whitelisted so the graph may be re-created).
    pub fn clear_graph(&mut self, name: GraphNameRef<'_>) -> Result<()> {
        self.store.clear_graph(name)?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.store.is_empty()?)
    }

    pub fn quads_for_pattern(
        &self,
        subject: Option<SubjectRef<'_>>,
        predicate: Option<oxigraph::model::NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
        graph_name: Option<GraphNameRef<'_>>,
    ) -> QuadIter {
        self.store
            .quads_for_pattern(subject, predicate, object, graph_name)
    }

    pub fn contains(&self, quad: QuadRef<'_>) -> Result<bool> {
        Ok(self.store.contains(quad)?)
    }

    /// All triples (ignoring graph) whose triple appears in graph `a` but
    /// not in graph `b`.
    pub fn difference(&self, a: &GraphName, b: &GraphName) -> Result<Vec<Triple>> {
        let in_b: HashSet<Triple> = self
            .store
            .quads_for_pattern(None, None, None, Some(b.as_ref()))
            .map(|q| q.map(|q| Triple::new(q.subject, q.predicate, q.object)))
            .collect::<std::result::Result<_, _>>()?;
        let mut out = Vec::new();
        for quad in self
            .store
            .quads_for_pattern(None, None, None, Some(a.as_ref()))
        {
            let quad = quad?;
            let triple = Triple::new(quad.subject, quad.predicate, quad.object);
            if !in_b.contains(&triple) {
                out.push(triple);
            }
        }
        Ok(out)
    }
}
