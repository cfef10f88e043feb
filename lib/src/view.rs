//! Restricted View: a read/write handle onto a subset of a
//! `QuadStore`'s named graphs. Every access outside the whitelist fails
//! loudly rather than silently widening scope.
//!
//! Exposes a capability trait built on a handful of primitives, enforcing a
//! fixed whitelist on every one of them.

use std::collections::{HashSet, VecDeque};

use oxigraph::model::{GraphName, NamedNodeRef, Quad, QuadRef, SubjectRef, TermRef, Triple};

use crate::errors::PythinferError;
use crate::options::Access;
use crate::store::QuadStore;

/// The capability set every pipeline collaborator is given instead of a
/// raw store reference. No other polymorphism over graph-like things
/// exists.
pub trait GraphCapability {
    fn triples(&self, pattern: (Option<SubjectRef<'_>>, Option<NamedNodeRef<'_>>, Option<TermRef<'_>>)) -> anyhow::Result<Vec<Triple>>;
    fn quads(&self, pattern: (Option<SubjectRef<'_>>, Option<NamedNodeRef<'_>>, Option<TermRef<'_>>)) -> anyhow::Result<Vec<Quad>>;
    fn add(&mut self, quad: QuadRef<'_>) -> anyhow::Result<bool>;
    fn remove(&mut self, quad: QuadRef<'_>) -> anyhow::Result<bool>;
    fn contains(&self, quad: QuadRef<'_>) -> anyhow::Result<bool>;
    fn graph_names(&self) -> Vec<GraphName>;
}

/// A capability-restricted handle onto a `QuadStore`.
///
/// The whitelist is fixed at construction and the view never widens it.
/// All quad-level access is checked against the whitelist; bare iteration
/// with no explicit graph context returns the deduplicated union over
/// whitelisted graphs, never the store's default-graph-union semantics.
pub struct RestrictedView<'s> {
    store: &'s mut QuadStore,
    whitelist: HashSet<GraphName>,
    access: Access,
}

impl<'s> RestrictedView<'s> {
    pub fn new(store: &'s mut QuadStore, whitelist: HashSet<GraphName>, access: Access) -> Self {
        Self {
            store,
            whitelist,
            access,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.access.is_read_only()
    }

    pub fn whitelist(&self) -> &HashSet<GraphName> {
        &self.whitelist
    }

    fn check_readable(&self, graph: &GraphName) -> anyhow::Result<()> {
        if self.whitelist.contains(graph) {
            Ok(())
        } else {
            Err(PythinferError::PermissionFailure {
                graph: format!("{graph:?}"),
            }
            .into())
        }
    }

    fn check_writable(&self, graph: &GraphName) -> anyhow::Result<()> {
        self.check_readable(graph)?;
        if self.access.is_read_only() {
            return Err(PythinferError::ReadOnlyFailure {
                graph: format!("{graph:?}"),
            }
            .into());
        }
        Ok(())
    }

    /// Reads and writes restricted to a single whitelisted graph.
    pub fn add_to(&mut self, graph: &GraphName, triple: &Triple) -> anyhow::Result<bool> {
        self.check_writable(graph)?;
        let quad = Quad::new(
            triple.subject.clone(),
            triple.predicate.clone(),
            triple.object.clone(),
            graph.clone(),
        );
        self.store.add(quad.as_ref())
    }

    pub fn remove_from(&mut self, graph: &GraphName, triple: &Triple) -> anyhow::Result<bool> {
        self.check_writable(graph)?;
        let quad = Quad::new(
            triple.subject.clone(),
            triple.predicate.clone(),
            triple.object.clone(),
            graph.clone(),
        );
        self.store.remove(quad.as_ref())
    }

    pub fn triples_in(&self, graph: &GraphName) -> anyhow::Result<Vec<Triple>> {
        self.check_readable(graph)?;
        self.store
            .quads_for_pattern(None, None, None, Some(graph.as_ref()))
            .map(|q| q.map(|q| Triple::new(q.subject, q.predicate, q.object)))
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    /// Removes a whitelisted graph's triples from the underlying store.
    /// The name stays in the whitelist so the graph may be re-created.
    pub fn clear(&mut self, graph: &GraphName) -> anyhow::Result<()> {
        self.check_writable(graph)?;
        self.store.clear_graph(graph.as_ref())
    }
}

impl<'s> GraphCapability for RestrictedView<'s> {
    fn triples(
        &self,
        pattern: (
            Option<SubjectRef<'_>>,
            Option<NamedNodeRef<'_>>,
            Option<TermRef<'_>>,
        ),
    ) -> anyhow::Result<Vec<Triple>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for graph in &self.whitelist {
            for quad in self.store.quads_for_pattern(
                pattern.0,
                pattern.1,
                pattern.2,
                Some(graph.as_ref()),
            ) {
                let quad = quad?;
                let triple = Triple::new(quad.subject, quad.predicate, quad.object);
                if seen.insert(triple.clone()) {
                    out.push(triple);
                }
            }
        }
        Ok(out)
    }

    fn quads(
        &self,
        pattern: (
            Option<SubjectRef<'_>>,
            Option<NamedNodeRef<'_>>,
            Option<TermRef<'_>>,
        ),
    ) -> anyhow::Result<Vec<Quad>> {
        let mut out = Vec::new();
        for graph in &self.whitelist {
            for quad in self.store.quads_for_pattern(
                pattern.0,
                pattern.1,
                pattern.2,
                Some(graph.as_ref()),
            ) {
                out.push(quad?);
            }
        }
        Ok(out)
    }

    fn add(&mut self, quad: QuadRef<'_>) -> anyhow::Result<bool> {
        let graph = quad.graph_name.into_owned();
        self.check_writable(&graph)?;
        self.store.add(quad)
    }

    fn remove(&mut self, quad: QuadRef<'_>) -> anyhow::Result<bool> {
        let graph = quad.graph_name.into_owned();
        self.check_writable(&graph)?;
        self.store.remove(quad)
    }

    fn contains(&self, quad: QuadRef<'_>) -> anyhow::Result<bool> {
        let graph = quad.graph_name.into_owned();
        self.check_readable(&graph)?;
        self.store.contains(quad)
    }

    fn graph_names(&self) -> Vec<GraphName> {
        self.whitelist.iter().cloned().collect()
    }
}

/// Deduplicated union of triples over an arbitrary set of graph names in a
/// store, used by `GraphName`-scanning blank-node closure logic where a
/// full view is unnecessary overhead. `order` controls nothing semantic;
/// it exists to keep iteration deterministic for tests.
pub fn union_triples(store: &QuadStore, graphs: &[GraphName]) -> anyhow::Result<Vec<Triple>> {
    let mut seen = HashSet::new();
    let mut out = VecDeque::new();
    for graph in graphs {
        for quad in store.quads_for_pattern(None, None, None, Some(graph.as_ref())) {
            let quad = quad?;
            let triple = Triple::new(quad.subject, quad.predicate, quad.object);
            if seen.insert(triple.clone()) {
                out.push_back(triple);
            }
        }
    }
    Ok(out.into_iter().collect())
}
