use crate::named_nodes::SHACL;
use crate::rdf::{build_rdf_list, read_rdf_list, subject_ref};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{
    BlankNode, BlankNodeRef, Graph, NamedNode, NamedNodeRef, NamedOrBlankNode, Term, TermRef, Triple,
};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// The identity of one cube on one endpoint. Every query of a session uses the same reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CubeReference {
    pub endpoint: Url,
    pub cube: NamedNode,
}

impl CubeReference {
    pub fn new(endpoint: Url, cube: NamedNode) -> Self {
        CubeReference { endpoint, cube }
    }

    /// Parses an endpoint URL and a cube IRI.
    pub fn parse(endpoint: &str, cube: &str) -> Result<Self, String> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| format!("invalid endpoint URL '{}': {}", endpoint, e))?;
        let cube = NamedNode::new(cube).map_err(|e| format!("invalid cube IRI '{}': {}", cube, e))?;
        Ok(CubeReference { endpoint, cube })
    }
}

impl fmt::Display for CubeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.cube, self.endpoint)
    }
}

/// Represents the severity level of a validation result, corresponding to `sh:resultSeverity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Corresponds to `sh:Info`.
    Info,
    /// Corresponds to `sh:Warning`.
    Warning,
    /// Corresponds to `sh:Violation`.
    Violation,
    /// Any other severity IRI a shape declared.
    Other(NamedNode),
}

impl Severity {
    pub fn from_iri(iri: NamedNodeRef<'_>) -> Self {
        let sh = SHACL::new();
        if iri == sh.info {
            Severity::Info
        } else if iri == sh.warning {
            Severity::Warning
        } else if iri == sh.violation {
            Severity::Violation
        } else {
            Severity::Other(iri.into_owned())
        }
    }

    pub fn iri(&self) -> NamedNode {
        let sh = SHACL::new();
        match self {
            Severity::Info => sh.info.into_owned(),
            Severity::Warning => sh.warning.into_owned(),
            Severity::Violation => sh.violation.into_owned(),
            Severity::Other(iri) => iri.clone(),
        }
    }
}

/// Why a paginated run stopped fetching pages.
///
/// Only `Interrupted` means something went wrong; the other variants differ for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// An empty page was returned: every observation was inspected.
    Exhausted,
    /// `max_pages` pages were validated.
    PageCeiling,
    /// At least `max_violations` results were collected.
    ViolationCeiling,
    /// A page could not be fetched; the report holds what earlier pages found.
    Interrupted { page_index: u64, reason: String },
}

impl Termination {
    /// True when a configured ceiling, not the data, ended the run.
    pub fn is_policy(&self) -> bool {
        matches!(self, Termination::PageCeiling | Termination::ViolationCeiling)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exhausted => write!(f, "all observations inspected"),
            Termination::PageCeiling => write!(f, "page ceiling reached"),
            Termination::ViolationCeiling => write!(f, "violation ceiling reached"),
            Termination::Interrupted { page_index, reason } => {
                write!(f, "interrupted at page {}: {}", page_index, reason)
            }
        }
    }
}

/// Represents a SHACL Property Path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    /// A simple path, which is a single IRI.
    Simple(Term),
    /// An inverse path (`sh:inversePath`).
    Inverse(Box<Path>),
    /// A sequence of paths (an RDF list).
    Sequence(Vec<Path>),
    /// A set of alternative paths (`sh:alternativePath`).
    Alternative(Vec<Path>),
    /// A path that can be traversed zero or more times (`sh:zeroOrMorePath`).
    ZeroOrMore(Box<Path>),
    /// A path that can be traversed one or more times (`sh:oneOrMorePath`).
    OneOrMore(Box<Path>),
    /// A path that can be traversed zero or one time (`sh:zeroOrOnePath`).
    ZeroOrOne(Box<Path>),
}

impl Path {
    /// Reads the path rooted at `node` from `graph`.
    ///
    /// A blank node that reappears below itself is an error rather than an endless path.
    pub fn parse(graph: &Graph, node: TermRef<'_>) -> Result<Path, String> {
        Self::parse_within(graph, node, &mut HashSet::new())
    }

    fn parse_within(
        graph: &Graph,
        node: TermRef<'_>,
        branch: &mut HashSet<Term>,
    ) -> Result<Path, String> {
        let subject = match node {
            TermRef::NamedNode(_) => return Ok(Path::Simple(node.into_owned())),
            TermRef::BlankNode(bn) => bn,
            _ => return Err(format!("property path must be an IRI or blank node: {}", node)),
        };
        if !branch.insert(node.into_owned()) {
            return Err(format!("cyclic property path at {}", node));
        }
        let path = Self::parse_blank(graph, subject, branch);
        branch.remove(&node.into_owned());
        path
    }

    fn parse_blank(
        graph: &Graph,
        subject: BlankNodeRef<'_>,
        branch: &mut HashSet<Term>,
    ) -> Result<Path, String> {
        let sh = SHACL::new();
        let node = TermRef::from(subject);

        if graph
            .object_for_subject_predicate(subject, rdf::FIRST)
            .is_some()
        {
            let items = read_rdf_list(graph, node)
                .iter()
                .map(|item| Self::parse_within(graph, item.as_ref(), branch))
                .collect::<Result<Vec<_>, _>>()?;
            let mut items = items.into_iter();
            return match (items.next(), items.len()) {
                (None, _) => Err("sequence path must not be empty".to_string()),
                (Some(only), 0) => Ok(only),
                (Some(first), _) => Ok(Path::Sequence(
                    std::iter::once(first).chain(items).collect(),
                )),
            };
        }

        let unary: [(NamedNodeRef<'_>, fn(Box<Path>) -> Path); 4] = [
            (sh.inverse_path, Path::Inverse),
            (sh.zero_or_more_path, Path::ZeroOrMore),
            (sh.one_or_more_path, Path::OneOrMore),
            (sh.zero_or_one_path, Path::ZeroOrOne),
        ];
        for (predicate, wrap) in unary {
            if let Some(inner) = graph.object_for_subject_predicate(subject, predicate) {
                return Ok(wrap(Box::new(Self::parse_within(graph, inner, branch)?)));
            }
        }
        if let Some(list) = graph.object_for_subject_predicate(subject, sh.alternative_path) {
            let items = read_rdf_list(graph, list)
                .iter()
                .map(|item| Self::parse_within(graph, item.as_ref(), branch))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Path::Alternative(items));
        }
        Err(format!("unrecognized property path: {}", node))
    }

    /// Returns the value nodes reached from `focus` along this path, without duplicates.
    pub fn evaluate(&self, graph: &Graph, focus: &Term) -> Vec<Term> {
        self.walk(graph, vec![focus.clone()], true)
    }

    fn walk(&self, graph: &Graph, start: Vec<Term>, forward: bool) -> Vec<Term> {
        match self {
            Path::Simple(term) => {
                let Term::NamedNode(predicate) = term else {
                    return Vec::new();
                };
                let mut reached = Vec::new();
                for node in &start {
                    if forward {
                        if let Some(subject) = subject_ref(node.as_ref()) {
                            reached.extend(
                                graph
                                    .objects_for_subject_predicate(subject, predicate.as_ref())
                                    .map(TermRef::into_owned),
                            );
                        }
                    } else {
                        reached.extend(
                            graph
                                .subjects_for_predicate_object(predicate.as_ref(), node.as_ref())
                                .map(|s| Term::from(s.into_owned())),
                        );
                    }
                }
                dedup(reached)
            }
            Path::Inverse(inner) => inner.walk(graph, start, !forward),
            Path::Sequence(paths) => {
                let mut nodes = start;
                if forward {
                    for path in paths {
                        nodes = path.walk(graph, nodes, forward);
                    }
                } else {
                    for path in paths.iter().rev() {
                        nodes = path.walk(graph, nodes, forward);
                    }
                }
                nodes
            }
            Path::Alternative(paths) => dedup(
                paths
                    .iter()
                    .flat_map(|p| p.walk(graph, start.clone(), forward))
                    .collect(),
            ),
            Path::ZeroOrOne(inner) => {
                let mut reached = start.clone();
                reached.extend(inner.walk(graph, start, forward));
                dedup(reached)
            }
            Path::ZeroOrMore(inner) => closure(inner, graph, start, forward),
            Path::OneOrMore(inner) => {
                let first = inner.walk(graph, start, forward);
                closure(inner, graph, first, forward)
            }
        }
    }

    /// Writes the path into `graph` and returns the node that stands for it.
    pub fn to_rdf(&self, graph: &mut Graph) -> Term {
        let sh = SHACL::new();
        let unary = |predicate: NamedNodeRef<'_>, inner: &Path, graph: &mut Graph| {
            let bn = NamedOrBlankNode::from(BlankNode::default());
            let inner_term = inner.to_rdf(graph);
            graph.insert(&Triple::new(bn.clone(), predicate, inner_term));
            Term::from(bn)
        };
        match self {
            Path::Simple(term) => term.clone(),
            Path::Inverse(inner) => unary(sh.inverse_path, inner, graph),
            Path::ZeroOrMore(inner) => unary(sh.zero_or_more_path, inner, graph),
            Path::OneOrMore(inner) => unary(sh.one_or_more_path, inner, graph),
            Path::ZeroOrOne(inner) => unary(sh.zero_or_one_path, inner, graph),
            Path::Sequence(paths) => {
                let items: Vec<Term> = paths.iter().map(|p| p.to_rdf(graph)).collect();
                build_rdf_list(items, graph)
            }
            Path::Alternative(paths) => {
                let bn = NamedOrBlankNode::from(BlankNode::default());
                let items: Vec<Term> = paths.iter().map(|p| p.to_rdf(graph)).collect();
                let list_head = build_rdf_list(items, graph);
                graph.insert(&Triple::new(bn.clone(), sh.alternative_path, list_head));
                Term::from(bn)
            }
        }
    }

    /// The predicate of a simple path.
    pub fn as_predicate(&self) -> Option<&NamedNode> {
        match self {
            Path::Simple(Term::NamedNode(nn)) => Some(nn),
            _ => None,
        }
    }

    /// Converts the SHACL path to its SPARQL 1.1 property path string representation.
    pub fn to_sparql_path(&self) -> Result<String, String> {
        match self {
            Path::Simple(term) => match term {
                Term::NamedNode(nn) => Ok(format!("<{}>", nn.as_str())),
                _ => Err(format!("Simple path must be an IRI {:?}", self)),
            },
            Path::Inverse(inner_path) => Ok(format!("^{}", inner_path.to_sparql_path()?)),
            Path::Sequence(paths) => {
                let parts = paths
                    .iter()
                    .map(Path::to_sparql_path)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", parts.join(" / ")))
            }
            Path::Alternative(paths) => {
                let parts = paths
                    .iter()
                    .map(Path::to_sparql_path)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", parts.join(" | ")))
            }
            Path::ZeroOrMore(inner_path) => Ok(format!("{}*", inner_path.to_sparql_path()?)),
            Path::OneOrMore(inner_path) => Ok(format!("{}+", inner_path.to_sparql_path()?)),
            Path::ZeroOrOne(inner_path) => Ok(format!("{}?", inner_path.to_sparql_path()?)),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_sparql_path() {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

fn dedup(terms: Vec<Term>) -> Vec<Term> {
    let mut seen = HashSet::new();
    terms.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

fn closure(inner: &Path, graph: &Graph, seeds: Vec<Term>, forward: bool) -> Vec<Term> {
    let mut seen: HashSet<Term> = HashSet::new();
    let mut reached = Vec::new();
    let mut frontier = Vec::new();
    for seed in seeds {
        if seen.insert(seed.clone()) {
            reached.push(seed.clone());
            frontier.push(seed);
        }
    }
    while !frontier.is_empty() {
        frontier = inner
            .walk(graph, frontier, forward)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        reached.extend(frontier.iter().cloned());
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::parse_turtle;

    fn ex(local: &str) -> Term {
        NamedNode::new_unchecked(format!("http://example.com/{}", local)).into()
    }

    const DATA: &str = r#"
@prefix ex: <http://example.com/> .
ex:a ex:next ex:b .
ex:b ex:next ex:c .
ex:c ex:next ex:a .
ex:a ex:label "A" .
"#;

    #[test]
    fn inverse_and_sequence_paths() {
        let graph = parse_turtle(DATA, None).unwrap();
        let next = || Path::Simple(ex("next"));
        let inverse = Path::Inverse(Box::new(next()));
        assert_eq!(inverse.evaluate(&graph, &ex("b")), vec![ex("a")]);

        let two_hops = Path::Sequence(vec![next(), next()]);
        assert_eq!(two_hops.evaluate(&graph, &ex("a")), vec![ex("c")]);

        let back_two = Path::Inverse(Box::new(two_hops));
        assert_eq!(back_two.evaluate(&graph, &ex("c")), vec![ex("a")]);
    }

    #[test]
    fn closures_terminate_on_cycles() {
        let graph = parse_turtle(DATA, None).unwrap();
        let star = Path::ZeroOrMore(Box::new(Path::Simple(ex("next"))));
        let reached = star.evaluate(&graph, &ex("a"));
        assert_eq!(reached.len(), 3);
        assert_eq!(reached[0], ex("a"));

        let plus = Path::OneOrMore(Box::new(Path::Simple(ex("label"))));
        assert_eq!(plus.evaluate(&graph, &ex("a")).len(), 1);
    }

    #[test]
    fn path_survives_rdf_roundtrip() {
        let path = Path::Alternative(vec![
            Path::Simple(ex("next")),
            Path::Inverse(Box::new(Path::Simple(ex("label")))),
        ]);
        let mut graph = Graph::new();
        let node = path.to_rdf(&mut graph);
        assert_eq!(Path::parse(&graph, node.as_ref()).unwrap(), path);
        assert_eq!(
            path.to_string(),
            "(<http://example.com/next> | ^<http://example.com/label>)"
        );
    }

    #[test]
    fn cyclic_blank_paths_are_rejected() {
        let graph = parse_turtle(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
            <http://example.com/S> sh:path _:p .
            _:p sh:inversePath _:p .
            <http://example.com/T> sh:path _:q .
            _:q sh:alternativePath ( <http://example.com/a> _:q ) ."#,
            None,
        )
        .unwrap();
        let sh = SHACL::new();
        for shape in ["S", "T"] {
            let subject = NamedNode::new_unchecked(format!("http://example.com/{}", shape));
            let path = graph
                .object_for_subject_predicate(subject.as_ref(), sh.path)
                .unwrap();
            let err = Path::parse(&graph, path).unwrap_err();
            assert!(err.contains("cyclic property path"), "{}", err);
        }
    }

    #[test]
    fn a_shared_blank_node_is_not_a_cycle() {
        let graph = parse_turtle(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
            <http://example.com/S> sh:path ( _:p _:p ) .
            _:p sh:inversePath <http://example.com/next> ."#,
            None,
        )
        .unwrap();
        let subject = NamedNode::new_unchecked("http://example.com/S");
        let path = graph
            .object_for_subject_predicate(subject.as_ref(), SHACL::new().path)
            .unwrap();
        let inverse = || Path::Inverse(Box::new(Path::Simple(ex("next"))));
        assert_eq!(
            Path::parse(&graph, path).unwrap(),
            Path::Sequence(vec![inverse(), inverse()])
        );
    }
}
