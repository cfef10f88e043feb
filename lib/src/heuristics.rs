//! Heuristic Runners: SPARQL CONSTRUCT and procedural rules
//! applied in configured order, each accumulating its delta into the view
//! before the next heuristic runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use oxigraph::model::{GraphName, NamedNodeRef, Quad, Subject, Term, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::options::{Access, Category};
use crate::store::QuadStore;
use crate::view::{GraphCapability, RestrictedView};

/// A procedural heuristic receives the same read/write capability a SPARQL
/// CONSTRUCT heuristic implicitly gets, and returns the triples it wants
/// deposited into the heuristic-output graph. It must not reach for
/// anything outside the capability it is given.
pub type ProceduralRule =
    Arc<dyn Fn(&dyn GraphCapability) -> Result<Vec<Triple>> + Send + Sync>;

pub enum HeuristicPayload {
    SparqlConstruct(String),
    Procedural(ProceduralRule),
}

/// A registered heuristic: an id (for diagnostics), a kind, and the
/// priority that determines its position in the configured order.
pub struct Heuristic {
    pub id: String,
    pub priority: i32,
    pub payload: HeuristicPayload,
}

impl Heuristic {
    pub fn sparql_construct(id: impl Into<String>, priority: i32, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority,
            payload: HeuristicPayload::SparqlConstruct(query.into()),
        }
    }

    pub fn procedural(id: impl Into<String>, priority: i32, rule: ProceduralRule) -> Self {
        Self {
            id: id.into(),
            priority,
            payload: HeuristicPayload::Procedural(rule),
        }
    }
}

/// `dct:isVersionOf`: http://purl.org/dc/terms/isVersionOf
const DCT_IS_VERSION_OF: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/isVersionOf");

/// A project-supplied procedural rule: two resources that both declare
/// `dct:isVersionOf` pointing at the same target are taken to denote the
/// same thing. Registered under id `"dct-is-version-of-same-as"`. This rule
/// is opt-in: it never runs unless a project names it in
/// `heuristics.python`.
fn dct_is_version_of_same_as(view: &dyn GraphCapability) -> Result<Vec<Triple>> {
    let triples = view.triples((None, Some(DCT_IS_VERSION_OF), None))?;
    let mut by_target: HashMap<Term, Vec<Subject>> = HashMap::new();
    for t in &triples {
        by_target.entry(t.object.clone()).or_default().push(t.subject.clone());
    }
    let mut out = Vec::new();
    for versions in by_target.values() {
        for a in versions {
            for b in versions {
                if a != b {
                    out.push(Triple::new(
                        a.clone(),
                        crate::consts::OWL_SAME_AS,
                        Term::from(b.clone()),
                    ));
                }
            }
        }
    }
    Ok(out)
}

/// Resolves a `heuristics.python` config identifier to the procedural rule
/// it names. There is no plugin-loading or dynamic-library machinery here;
/// only the small set of rules this crate ships are resolvable by name. A
/// project embedding `pythinfer` as a library registers any further rules
/// directly via `Pipeline::register_procedural` instead.
pub fn lookup_procedural(id: &str) -> Option<ProceduralRule> {
    match id {
        "dct-is-version-of-same-as" => Some(Arc::new(dct_is_version_of_same_as)),
        _ => None,
    }
}

/// Materializes a view's visible quads into a throwaway in-memory store so
/// a SPARQL CONSTRUCT query can be evaluated against it, then discards the
/// staging store. Only the CONSTRUCT result triples are kept, preserving
/// the view's capability boundary.
fn eval_sparql_construct(view: &RestrictedView<'_>, query: &str) -> Result<Vec<Triple>> {
    let staging = Store::new()?;
    for quad in view.quads((None, None, None))? {
        staging.insert(&Quad::new(
            quad.subject,
            quad.predicate,
            quad.object,
            GraphName::DefaultGraph,
        ))?;
    }
    match staging.query(query)? {
        QueryResults::Graph(iter) => {
            let mut out = Vec::new();
            for triple in iter {
                out.push(triple?);
            }
            Ok(out)
        }
        _ => bail!("heuristic query `{query}` must be a CONSTRUCT or DESCRIBE query"),
    }
}

/// Runs every heuristic, in configured order, against a view over
/// `read_graphs` plus the accumulating `target` graph. Returns the total
/// number of new triples deposited into `target`.
pub fn run_heuristics(
    store: &mut QuadStore,
    heuristics: &[Heuristic],
    read_graphs: &[GraphName],
    target: &GraphName,
) -> Result<usize> {
    store.create_graph(target, Category::Derived);
    let mut ordered: Vec<&Heuristic> = heuristics.iter().collect();
    ordered.sort_by_key(|h| h.priority);

    let mut whitelist: HashSet<GraphName> = read_graphs.iter().cloned().collect();
    whitelist.insert(target.clone());

    let mut total = 0;
    for heuristic in ordered {
        let mut view = RestrictedView::new(&mut *store, whitelist.clone(), Access::ReadWrite);
        let triples = match &heuristic.payload {
            HeuristicPayload::SparqlConstruct(query) => eval_sparql_construct(&view, query)?,
            HeuristicPayload::Procedural(rule) => rule(&view)?,
        };
        // A heuristic's output always lands in its designated target graph,
        // regardless of what graph name (if any) it thought it was writing
        // to. This is what "must not write to unspecified graphs" means
        // mechanically.
        for triple in triples {
            if view.add_to(target, &triple)? {
                total += 1;
            }
        }
    }
    Ok(total)
}
