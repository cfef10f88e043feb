//! Backend Reasoner adapter: wraps an OWL-RL implementation,
//! computing the RL-entailed triples of an input set and depositing only
//! the triples not already present into a target graph.
//!
//! Rule names follow the W3C OWL 2 RL/RDF rule catalogue, the same
//! identifiers `oxowl`'s `reasoner::rules::RlRule` enumerates; this adapter
//! re-expresses a practical subset of them as pattern rules over raw
//! `(subject, predicate, object)` triples rather than a classified entity
//! model, since the Restricted View this adapter reads contracts only on
//! "triples in, triples out."

use std::collections::HashSet;
use std::process::Command;

use anyhow::Result;
use log::debug;
use oxigraph::model::{GraphName, Quad, Subject, Term, Triple};

use crate::consts::*;
use crate::errors::PythinferError;
use crate::options::Category;
use crate::store::QuadStore;
use crate::view::union_triples;

/// Computes the RL closure of a set of triples, returning only the
/// entailed triples (callers are responsible for diffing against what is
/// already present: this returns a delta, not the full closure).
pub trait BackendReasoner: Send + Sync {
    fn name(&self) -> &str;
    fn entail(&self, triples: &[Triple]) -> Result<Vec<Triple>>;
}

/// The mandatory, first-class backend: an in-process
/// forward-chaining OWL-RL engine supporting subclass/subproperty
/// transitivity, domain/range typing, equivalentClass/Property,
/// symmetric/transitive/inverse object properties, sameAs
/// reflexivity/symmetry/transitivity/replacement, and owl:Thing typing
/// for every resource.
#[derive(Debug, Default, Clone, Copy)]
pub struct RlInProcess;

impl BackendReasoner for RlInProcess {
    fn name(&self) -> &str {
        "rl-inprocess"
    }

    fn entail(&self, triples: &[Triple]) -> Result<Vec<Triple>> {
        let mut known: HashSet<Triple> = triples.iter().cloned().collect();
        loop {
            let before = known.len();
            let fresh = apply_rules(&known);
            known.extend(fresh);
            if known.len() == before {
                break;
            }
        }
        let input: HashSet<&Triple> = triples.iter().collect();
        Ok(known.into_iter().filter(|t| !input.contains(t)).collect())
    }
}

fn apply_rules(known: &HashSet<Triple>) -> Vec<Triple> {
    let mut out = Vec::new();

    let by_predicate = |pred: oxigraph::model::NamedNodeRef<'_>| -> Vec<&Triple> {
        known.iter().filter(|t| t.predicate == pred).collect()
    };

    // cax-sco: subClassOf transitivity over rdf:type assertions.
    let sub_class_of = by_predicate(RDFS_SUB_CLASS_OF);
    let rdf_types = by_predicate(RDF_TYPE);
    for sco in &sub_class_of {
        let c1 = Term::from(sco.subject.clone());
        let c2 = &sco.object;
        for t in &rdf_types {
            if t.object == c1 {
                out.push(Triple::new(t.subject.clone(), RDF_TYPE, c2.clone()));
            }
        }
    }

    // cax-eqc1/2: equivalentClass entails bidirectional subClassOf.
    for eqc in by_predicate(OWL_EQUIVALENT_CLASS) {
        if let (Subject::NamedNode(c1), Term::NamedNode(c2)) = (&eqc.subject, &eqc.object) {
            out.push(Triple::new(c1.clone(), RDFS_SUB_CLASS_OF, c2.clone()));
            out.push(Triple::new(c2.clone(), RDFS_SUB_CLASS_OF, c1.clone()));
        }
    }

    // prp-spo1: subPropertyOf transitivity over instance data.
    for spo in by_predicate(RDFS_SUB_PROPERTY_OF) {
        if let (Subject::NamedNode(p1), Term::NamedNode(p2)) = (&spo.subject, &spo.object) {
            for t in known.iter().filter(|t| &t.predicate == p1) {
                out.push(Triple::new(t.subject.clone(), p2.clone(), t.object.clone()));
            }
        }
    }

    // prp-eqp1/2: equivalentProperty entails bidirectional subPropertyOf.
    for eqp in by_predicate(OWL_EQUIVALENT_PROPERTY) {
        if let (Subject::NamedNode(p1), Term::NamedNode(p2)) = (&eqp.subject, &eqp.object) {
            out.push(Triple::new(p1.clone(), RDFS_SUB_PROPERTY_OF, p2.clone()));
            out.push(Triple::new(p2.clone(), RDFS_SUB_PROPERTY_OF, p1.clone()));
        }
    }

    // prp-dom: property domain entails a type for the subject.
    for dom in by_predicate(RDFS_DOMAIN) {
        if let Subject::NamedNode(p) = &dom.subject {
            for t in known.iter().filter(|t| &t.predicate == p) {
                out.push(Triple::new(t.subject.clone(), RDF_TYPE, dom.object.clone()));
            }
        }
    }

    // prp-rng: property range entails a type for the object, when the
    // object is itself a valid rdf:type subject (not a literal).
    for rng in by_predicate(RDFS_RANGE) {
        if let Subject::NamedNode(p) = &rng.subject {
            for t in known.iter().filter(|t| &t.predicate == p) {
                if let Ok(subject) = term_as_subject(&t.object) {
                    out.push(Triple::new(subject, RDF_TYPE, rng.object.clone()));
                }
            }
        }
    }

    // prp-symp: symmetric properties entail the swapped triple.
    let symmetric_marker = Term::from(OWL_SYMMETRIC_PROPERTY);
    for decl in rdf_types.iter().filter(|t| t.object == symmetric_marker) {
        if let Subject::NamedNode(p) = &decl.subject {
            for t in known.iter().filter(|t| &t.predicate == p) {
                if let Ok(subject) = term_as_subject(&t.object) {
                    out.push(Triple::new(subject, p.clone(), Term::from(t.subject.clone())));
                }
            }
        }
    }

    // prp-trp: transitive properties entail the composed triple.
    let transitive_marker = Term::from(OWL_TRANSITIVE_PROPERTY);
    for decl in rdf_types.iter().filter(|t| t.object == transitive_marker) {
        if let Subject::NamedNode(p) = &decl.subject {
            let edges: Vec<&Triple> = known.iter().filter(|t| &t.predicate == p).collect();
            for xy in &edges {
                for yz in &edges {
                    if xy.object == Term::from(yz_subject(yz)) {
                        out.push(Triple::new(xy.subject.clone(), p.clone(), yz.object.clone()));
                    }
                }
            }
        }
    }

    // prp-inv1/2: inverseOf entails the swapped-predicate triple both ways.
    for inv in by_predicate(OWL_INVERSE_OF) {
        if let (Subject::NamedNode(p1), Term::NamedNode(p2)) = (&inv.subject, &inv.object) {
            for t in known.iter().filter(|t| &t.predicate == p1) {
                if let Ok(subject) = term_as_subject(&t.object) {
                    out.push(Triple::new(subject, p2.clone(), Term::from(t.subject.clone())));
                }
            }
        }
    }

    // eq-sym: sameAs is symmetric.
    for sa in by_predicate(OWL_SAME_AS) {
        if let Ok(subject) = term_as_subject(&sa.object) {
            out.push(Triple::new(
                subject,
                OWL_SAME_AS,
                Term::from(sa.subject.clone()),
            ));
        }
    }

    // eq-trans: sameAs is transitive.
    let same_as: Vec<&Triple> = by_predicate(OWL_SAME_AS);
    for xy in &same_as {
        for yz in &same_as {
            if xy.object == Term::from(yz.subject.clone()) {
                out.push(Triple::new(xy.subject.clone(), OWL_SAME_AS, yz.object.clone()));
            }
        }
    }

    // eq-rep: sameAs replacement in subject and object position.
    for sa in &same_as {
        if let Ok(y_subject) = term_as_subject(&sa.object) {
            for t in known
                .iter()
                .filter(|t| t.subject == sa.subject && t.predicate != OWL_SAME_AS)
            {
                out.push(Triple::new(y_subject.clone(), t.predicate.clone(), t.object.clone()));
            }
        }
        for t in known
            .iter()
            .filter(|t| t.object == Term::from(sa.subject.clone()))
        {
            out.push(Triple::new(t.subject.clone(), t.predicate.clone(), sa.object.clone()));
        }
    }

    // cls-thing: every resource asserted as a subject or as a non-literal
    // object is thereby a member of owl:Thing.
    let mut resources: HashSet<Subject> = HashSet::new();
    for t in known.iter() {
        resources.insert(t.subject.clone());
        if let Ok(s) = term_as_subject(&t.object) {
            resources.insert(s);
        }
    }
    for resource in resources {
        out.push(Triple::new(resource, RDF_TYPE, OWL_THING));
    }

    out
}

fn yz_subject(t: &Triple) -> Subject {
    t.subject.clone()
}

/// Attempts to reinterpret a `Term` as a `Subject` (an IRI or blank node);
/// literals cannot be subjects so this fails for them, which is how
/// prp-symp/prp-trp/prp-inv/eq-sym avoid ever constructing the
/// literal-as-subject triple the Filter Chain would otherwise have to
/// catch.
fn term_as_subject(term: &Term) -> Result<Subject, ()> {
    match term {
        Term::NamedNode(n) => Ok(Subject::NamedNode(n.clone())),
        Term::BlankNode(b) => Ok(Subject::BlankNode(b.clone())),
        Term::Literal(_) => Err(()),
        #[allow(unreachable_patterns)]
        _ => Err(()),
    }
}

/// Shells out to an external command-line RL reasoner (e.g. a `riot
/// --validate`-style tool) configured by the project. Retried once on
/// failure; in-process backends are not retried.
pub struct ExternalCli {
    pub command: String,
    pub args: Vec<String>,
}

impl BackendReasoner for ExternalCli {
    fn name(&self) -> &str {
        "external-cli"
    }

    fn entail(&self, triples: &[Triple]) -> Result<Vec<Triple>> {
        let input = triples
            .iter()
            .map(|t| format!("{} .\n", t))
            .collect::<String>();
        let mut last_err = None;
        for attempt in 0..2 {
            match run_external(&self.command, &self.args, &input) {
                Ok(out) => return Ok(parse_ntriples_lenient(&out)),
                Err(e) => {
                    debug!("external-cli attempt {attempt} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(PythinferError::Backend {
            backend: self.command.clone(),
            detail: last_err.map(|e| e.to_string()).unwrap_or_default(),
        }
        .into())
    }
}

fn run_external(command: &str, args: &[String], input: &str) -> Result<String> {
    use std::io::Write;
    let mut child = Command::new(command)
        .args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .spawn()?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        anyhow::bail!("command exited with {}", output.status);
    }
    Ok(String::from_utf8(output.stdout)?)
}

/// Parses NTriples-like output, silently skipping lines that do not parse
/// as a valid triple rather than failing the whole backend call: the adapter
/// filters invalid output, it does not propagate it.
fn parse_ntriples_lenient(text: &str) -> Vec<Triple> {
    let cursor = std::io::Cursor::new(text.as_bytes());
    oxigraph::io::RdfParser::from_format(oxigraph::io::RdfFormat::NTriples)
        .for_reader(cursor)
        .filter_map(|r| r.ok())
        .map(|q| Triple::new(q.subject, q.predicate, q.object))
        .collect()
}

/// Runs a backend reasoner over the union of `source_graphs`, depositing
/// only the novel entailments into `target` (auto-created as `Derived`).
/// Never mutates any graph other than `target`.
pub fn run_reasoner(
    store: &mut QuadStore,
    reasoner: &dyn BackendReasoner,
    source_graphs: &[GraphName],
    target: &GraphName,
) -> Result<usize> {
    let mut scope = source_graphs.to_vec();
    if !scope.contains(target) {
        scope.push(target.clone());
    }
    let existing = union_triples(store, &scope)?;
    let entailed = reasoner
        .entail(&existing)
        .map_err(|e| PythinferError::Backend {
            backend: reasoner.name().to_string(),
            detail: e.to_string(),
        })?;

    let existing_set: HashSet<Triple> = existing.into_iter().collect();
    let delta: Vec<Quad> = entailed
        .into_iter()
        .filter(|t| !existing_set.contains(t))
        .map(|t| Quad::new(t.subject, t.predicate, t.object, target.clone()))
        .collect();

    store.create_graph(target, Category::Derived);
    let inserted = store.bulk_add(delta)?;
    debug!(
        "reasoner `{}` over {} source graph(s) added {} triples to {:?}",
        reasoner.name(),
        source_graphs.len(),
        inserted,
        target
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{Literal, NamedNode};

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    #[test]
    fn symmetric_property_entails_the_reverse_triple() {
        let knows = nn("http://example.org/knows");
        let alice = nn("http://example.org/Alice");
        let bob = nn("http://example.org/Bob");
        let triples = vec![
            Triple::new(knows.clone(), RDF_TYPE, OWL_SYMMETRIC_PROPERTY),
            Triple::new(bob.clone(), knows.clone(), Term::from(alice.clone())),
        ];
        let delta = RlInProcess.entail(&triples).unwrap();
        assert!(delta.contains(&Triple::new(alice, knows, Term::from(bob))));
    }

    #[test]
    fn same_as_is_symmetric_and_transitive() {
        let a = nn("http://example.org/a");
        let b = nn("http://example.org/b");
        let c = nn("http://example.org/c");
        let triples = vec![
            Triple::new(a.clone(), OWL_SAME_AS, Term::from(b.clone())),
            Triple::new(b.clone(), OWL_SAME_AS, Term::from(c.clone())),
        ];
        let delta = RlInProcess.entail(&triples).unwrap();
        assert!(delta.contains(&Triple::new(b.clone(), OWL_SAME_AS, Term::from(a.clone()))));
        assert!(delta.contains(&Triple::new(a, OWL_SAME_AS, Term::from(c))));
    }

    #[test]
    fn range_typing_skips_literal_objects() {
        let age = nn("http://example.org/age");
        let person = nn("http://example.org/Person");
        let alice = nn("http://example.org/Alice");
        let triples = vec![
            Triple::new(age.clone(), RDFS_RANGE, Term::NamedNode(person)),
            Triple::new(alice, age, Term::Literal(Literal::from(30))),
        ];
        // A literal object can never become a well-formed rdf:type subject;
        // entailment must skip it rather than panic or fabricate one.
        let delta = RlInProcess.entail(&triples).unwrap();
        assert!(delta.iter().all(|t| t.predicate != RDF_TYPE));
    }
}
