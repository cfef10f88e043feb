//! Filter Chain: removes invalid and unwanted triples from the
//! exportable view in two ordered sub-phases: streaming per-triple filters,
//! then a whole-graph undeclared-blank-node pass run to a fixed point.
//!
//! The per-triple phase is an ordered `Vec<Box<dyn TripleFilter>>` checklist,
//! each entry judging one triple in isolation.

use std::collections::HashSet;

use log::info;
use oxigraph::model::{BlankNode, Subject, Term, Triple};

use crate::consts::*;

/// A single per-triple rule in the filter chain. Each filter judges one
/// triple in isolation; `name()` feeds the `FilterReport` counts.
pub trait TripleFilter: Send + Sync {
    fn name(&self) -> &str;
    /// Returns `true` if the triple should be kept.
    fn keep(&self, triple: &Triple) -> bool;
}

struct LiteralAsSubject;
impl TripleFilter for LiteralAsSubject {
    fn name(&self) -> &str {
        "literal-as-subject"
    }
    fn keep(&self, triple: &Triple) -> bool {
        !matches!(triple.subject, Subject::Literal(_))
    }
}

struct EmptyStringLiteralObject;
impl TripleFilter for EmptyStringLiteralObject {
    fn name(&self) -> &str {
        "empty-string-literal-object"
    }
    fn keep(&self, triple: &Triple) -> bool {
        !matches!(&triple.object, Term::Literal(l) if l.value().is_empty())
    }
}

struct ReflexiveSameAs;
impl TripleFilter for ReflexiveSameAs {
    fn name(&self) -> &str {
        "reflexive-same-as"
    }
    fn keep(&self, triple: &Triple) -> bool {
        !(triple.predicate == OWL_SAME_AS && Term::from(triple.subject.clone()) == triple.object)
    }
}

struct TrivialOwlThing;
impl TripleFilter for TrivialOwlThing {
    fn name(&self) -> &str {
        "trivial-owl-thing"
    }
    fn keep(&self, triple: &Triple) -> bool {
        !(triple.predicate == RDF_TYPE && triple.object == Term::from(OWL_THING))
    }
}

struct BanalNothingSubClassOf;
impl TripleFilter for BanalNothingSubClassOf {
    fn name(&self) -> &str {
        "banal-nothing-subclass-of"
    }
    fn keep(&self, triple: &Triple) -> bool {
        // Drop (owl:Nothing, rdfs:subClassOf, X) where X != owl:Nothing.
        // The contradiction-bearing direction (X, rdfs:subClassOf,
        // owl:Nothing) must never be touched by this rule.
        let subject_is_nothing = matches!(&triple.subject, Subject::NamedNode(n) if n.as_ref() == OWL_NOTHING);
        if triple.predicate == RDFS_SUB_CLASS_OF && subject_is_nothing {
            return triple.object == Term::from(OWL_NOTHING);
        }
        true
    }
}

/// The five mandatory per-triple rules, applied in this order (a sixth,
/// reference-derived filter is handled structurally by excluding
/// `inferences_external_owl` from the view rather than as a per-triple
/// predicate).
pub fn default_triple_filters() -> Vec<Box<dyn TripleFilter>> {
    vec![
        Box::new(LiteralAsSubject),
        Box::new(EmptyStringLiteralObject),
        Box::new(ReflexiveSameAs),
        Box::new(TrivialOwlThing),
        Box::new(BanalNothingSubClassOf),
    ]
}

/// Per-rule and total counts of triples removed during one `FilterChain::run`
/// call, logged at `info!` after each run.
#[derive(Debug, Default, Clone)]
pub struct FilterReport {
    pub removed_per_rule: Vec<(String, usize)>,
    pub removed_undeclared_blank_nodes: usize,
    pub input_count: usize,
    pub output_count: usize,
}

pub struct FilterChain {
    triple_filters: Vec<Box<dyn TripleFilter>>,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new(default_triple_filters())
    }
}

impl FilterChain {
    pub fn new(triple_filters: Vec<Box<dyn TripleFilter>>) -> Self {
        Self { triple_filters }
    }

    /// Runs the full chain: the streaming per-triple pass, then the
    /// undeclared-blank-node whole-graph pass to fixed point.
    /// Deterministic: given the same input set, returns a bit-identical
    /// output set, so running the chain again on its own output is a no-op.
    pub fn run(&self, triples: Vec<Triple>) -> (Vec<Triple>, FilterReport) {
        let input_count = triples.len();
        let mut report = FilterReport {
            input_count,
            ..Default::default()
        };

        let mut kept = triples;
        for filter in &self.triple_filters {
            let before = kept.len();
            kept.retain(|t| filter.keep(t));
            let removed = before - kept.len();
            if removed > 0 {
                report.removed_per_rule.push((filter.name().to_string(), removed));
            }
        }

        let (after_blank, removed_blank) = prune_undeclared_blank_nodes(kept);
        report.removed_undeclared_blank_nodes = removed_blank;
        report.output_count = after_blank.len();

        info!(
            "filter chain: {} -> {} triples ({} undeclared-blank-node, {:?} per-rule)",
            input_count, report.output_count, removed_blank, report.removed_per_rule
        );
        (after_blank, report)
    }
}

/// A blank node is *declared* iff it appears as the subject of at least one
/// triple in the current result. A subject-position blank node is trivially declared by its own triple, so
/// only object-position blank nodes can fail the check. Dropping a triple
/// can undeclare a blank node that another dropped triple was the only
/// subject-occurrence for, so the pass repeats until no further triple is
/// removed.
fn prune_undeclared_blank_nodes(mut triples: Vec<Triple>) -> (Vec<Triple>, usize) {
    let mut total_removed = 0;
    loop {
        let declared: HashSet<BlankNode> = triples
            .iter()
            .filter_map(|t| match &t.subject {
                Subject::BlankNode(b) => Some(b.clone()),
                _ => None,
            })
            .collect();

        let before = triples.len();
        triples.retain(|t| term_is_declared_or_not_blank(&t.object, &declared));
        let removed = before - triples.len();
        total_removed += removed;
        if removed == 0 {
            break;
        }
    }
    (triples, total_removed)
}

fn term_is_declared_or_not_blank(term: &Term, declared: &HashSet<BlankNode>) -> bool {
    match term {
        Term::BlankNode(b) => declared.contains(b),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{Literal, NamedNode};

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    #[test]
    fn drops_reflexive_same_as_and_trivial_thing_typing() {
        let x = nn("http://example.org/x");
        let triples = vec![
            Triple::new(x.clone(), OWL_SAME_AS, Term::from(x.clone())),
            Triple::new(x.clone(), RDF_TYPE, OWL_THING),
            Triple::new(x.clone(), nn("http://example.org/p"), Literal::from(1)),
        ];
        let (kept, report) = FilterChain::default().run(triples);
        assert_eq!(kept.len(), 1);
        assert!(report
            .removed_per_rule
            .iter()
            .any(|(name, _)| name == "reflexive-same-as"));
        assert!(report
            .removed_per_rule
            .iter()
            .any(|(name, _)| name == "trivial-owl-thing"));
    }

    #[test]
    fn keeps_contradiction_direction_but_drops_banal_direction() {
        let x = nn("http://example.org/X");
        let contradiction = Triple::new(x.clone(), RDFS_SUB_CLASS_OF, OWL_NOTHING);
        let banal = Triple::new(
            OWL_NOTHING.into_owned(),
            RDFS_SUB_CLASS_OF,
            Term::from(x.clone()),
        );
        let (kept, _) = FilterChain::default().run(vec![contradiction.clone(), banal]);
        assert_eq!(kept, vec![contradiction]);
    }

    #[test]
    fn drops_triples_with_undeclared_blank_nodes() {
        let x = nn("http://example.org/x");
        let p = nn("http://example.org/p");
        let b = BlankNode::default();
        let triple = Triple::new(x, p, Term::BlankNode(b));
        let (kept, report) = FilterChain::default().run(vec![triple]);
        assert!(kept.is_empty());
        assert_eq!(report.removed_undeclared_blank_nodes, 1);
    }

    #[test]
    fn keeps_blank_node_triples_when_declared_as_subject() {
        let p = nn("http://example.org/p");
        let b = BlankNode::default();
        let declares = Triple::new(b.clone(), p.clone(), Literal::from(1));
        let uses = Triple::new(
            nn("http://example.org/x"),
            p,
            Term::BlankNode(b),
        );
        let (kept, _) = FilterChain::default().run(vec![declares, uses]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn cascading_undeclaration_removes_chained_blank_nodes() {
        // _:a only appears as subject of a triple whose object is _:b, and
        // _:b is never a subject itself: both triples must go, in two
        // rounds of the fixed-point pass.
        let p = nn("http://example.org/p");
        let a = BlankNode::default();
        let b = BlankNode::default();
        let first = Triple::new(
            nn("http://example.org/x"),
            p.clone(),
            Term::BlankNode(a.clone()),
        );
        let second = Triple::new(a, p, Term::BlankNode(b));
        let (kept, report) = FilterChain::default().run(vec![first, second]);
        assert!(kept.is_empty());
        assert_eq!(report.removed_undeclared_blank_nodes, 2);
    }
}
