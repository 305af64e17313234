//! Read access to single nodes of a graph, and the value types built on top of it.
use crate::named_nodes::{CUBE, SCHEMA, SHACL};
use crate::rdf::subject_ref;
use crate::types::Path;
use log::debug;
use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{Graph, NamedNode, NamedNodeRef, NamedOrBlankNodeRef, Term, TermRef};
use std::collections::HashSet;

/// Predicate and typed-value lookups on one node of a graph.
pub trait GraphNode {
    fn graph(&self) -> &Graph;

    fn subject(&self) -> NamedOrBlankNodeRef<'_>;

    fn term(&self) -> Term {
        Term::from(self.subject().into_owned())
    }

    /// The first object of `predicate`, if any.
    fn object(&self, predicate: NamedNodeRef<'_>) -> Option<TermRef<'_>> {
        self.graph()
            .object_for_subject_predicate(self.subject(), predicate)
    }

    /// All objects of `predicate`.
    fn objects(&self, predicate: NamedNodeRef<'_>) -> Vec<TermRef<'_>> {
        self.graph()
            .objects_for_subject_predicate(self.subject(), predicate)
            .collect()
    }

    /// The IRIs among the objects of `predicate`.
    fn named_objects(&self, predicate: NamedNodeRef<'_>) -> Vec<NamedNode> {
        self.objects(predicate)
            .into_iter()
            .filter_map(|t| match t {
                TermRef::NamedNode(nn) => Some(nn.into_owned()),
                _ => None,
            })
            .collect()
    }

    /// The lexical value of the first literal object of `predicate`.
    fn literal(&self, predicate: NamedNodeRef<'_>) -> Option<String> {
        self.objects(predicate).into_iter().find_map(|t| match t {
            TermRef::Literal(lit) => Some(lit.value().to_string()),
            _ => None,
        })
    }

    /// A literal in the first of `languages` that has one, falling back to an untagged literal.
    fn localized(&self, predicate: NamedNodeRef<'_>, languages: &[&str]) -> Option<String> {
        let literals: Vec<_> = self
            .objects(predicate)
            .into_iter()
            .filter_map(|t| match t {
                TermRef::Literal(lit) => Some(lit),
                _ => None,
            })
            .collect();
        for lang in languages {
            if let Some(lit) = literals
                .iter()
                .find(|lit| lit.language().is_some_and(|l| l.eq_ignore_ascii_case(lang)))
            {
                return Some(lit.value().to_string());
            }
        }
        literals
            .iter()
            .find(|lit| lit.language().is_none())
            .or(literals.first())
            .map(|lit| lit.value().to_string())
    }

    /// True if the node is an instance of `class`, following `rdfs:subClassOf` in the same graph.
    fn has_type(&self, class: NamedNodeRef<'_>) -> bool {
        let mut seen = HashSet::new();
        let mut pending: Vec<Term> = self
            .objects(rdf::TYPE)
            .into_iter()
            .map(TermRef::into_owned)
            .collect();
        while let Some(ty) = pending.pop() {
            if ty.as_ref() == TermRef::from(class) {
                return true;
            }
            if !seen.insert(ty.clone()) {
                continue;
            }
            if let Some(subject) = subject_ref(ty.as_ref()) {
                pending.extend(
                    self.graph()
                        .objects_for_subject_predicate(subject, rdfs::SUB_CLASS_OF)
                        .map(TermRef::into_owned),
                );
            }
        }
        false
    }
}

/// A node of a borrowed graph.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'g> {
    graph: &'g Graph,
    subject: NamedOrBlankNodeRef<'g>,
}

impl<'g> NodeRef<'g> {
    pub fn new(graph: &'g Graph, subject: impl Into<NamedOrBlankNodeRef<'g>>) -> Self {
        NodeRef {
            graph,
            subject: subject.into(),
        }
    }

    /// Wraps `term` if it can be a subject.
    pub fn from_term(graph: &'g Graph, term: TermRef<'g>) -> Option<Self> {
        subject_ref(term).map(|subject| NodeRef { graph, subject })
    }
}

impl GraphNode for NodeRef<'_> {
    fn graph(&self) -> &Graph {
        self.graph
    }

    fn subject(&self) -> NamedOrBlankNodeRef<'_> {
        self.subject
    }
}

const LANGUAGES: [&str; 4] = ["en", "de", "fr", "it"];

/// Descriptive metadata of a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeMetadata {
    pub iri: NamedNode,
    pub name: Option<String>,
    pub description: Option<String>,
    /// `schema:workExample` values; used to pick a validation profile.
    pub work_examples: Vec<NamedNode>,
    pub observation_constraint: Option<Term>,
    pub dimensions: Vec<Dimension>,
}

impl CubeMetadata {
    pub fn from_node(node: &impl GraphNode, iri: NamedNode) -> Self {
        let schema = SCHEMA::new();
        let cube = CUBE::new();
        let sh = SHACL::new();
        let observation_constraint = node
            .object(cube.observation_constraint)
            .map(TermRef::into_owned);
        let dimensions = observation_constraint
            .as_ref()
            .and_then(|c| NodeRef::from_term(node.graph(), c.as_ref()))
            .map(|constraint| {
                constraint
                    .objects(sh.property)
                    .into_iter()
                    .filter_map(|p| NodeRef::from_term(node.graph(), p))
                    .map(|p| Dimension::from_node(&p))
                    .collect()
            })
            .unwrap_or_default();
        CubeMetadata {
            iri,
            name: node.localized(schema.name, &LANGUAGES),
            description: node.localized(schema.description, &LANGUAGES),
            work_examples: node.named_objects(schema.work_example),
            observation_constraint,
            dimensions,
        }
    }

    /// Reads the metadata of `iri` from `graph`.
    pub fn from_graph(graph: &Graph, iri: &NamedNode) -> Self {
        CubeMetadata::from_node(&NodeRef::new(graph, iri.as_ref()), iri.clone())
    }
}

/// A property shape attached to a cube's observation constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub shape: Term,
    pub path: Option<Path>,
    pub name: Option<String>,
}

impl Dimension {
    pub fn from_node(node: &impl GraphNode) -> Self {
        let sh = SHACL::new();
        let schema = SCHEMA::new();
        let path = node
            .object(sh.path)
            .and_then(|p| Path::parse(node.graph(), p).ok());
        let name = node
            .localized(schema.name, &LANGUAGES)
            .or_else(|| node.localized(sh.name, &LANGUAGES));
        Dimension {
            shape: node.term(),
            path,
            name,
        }
    }

    /// A short label: the name, else the path, else the shape node.
    pub fn label(&self) -> String {
        match (&self.name, &self.path) {
            (Some(name), _) => name.clone(),
            (None, Some(path)) => path.to_string(),
            (None, None) => self.shape.to_string(),
        }
    }
}

/// A node of the tree produced by [`describe_tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub term: Term,
    pub children: Vec<(NamedNode, TreeNode)>,
    /// The node was already expanded higher up the same branch and is not expanded again.
    pub cycle: bool,
}

/// Flattens the blank-node subgraph below `root` into a tree.
///
/// Blank nodes are expanded through their outgoing arcs; IRIs and literals are leaves. A blank
/// node that reappears on its own branch becomes a leaf marked `cycle` instead of recursing.
pub fn describe_tree(graph: &Graph, root: TermRef<'_>) -> TreeNode {
    let mut path = HashSet::new();
    expand(graph, root, &mut path, true)
}

fn expand(graph: &Graph, term: TermRef<'_>, path: &mut HashSet<Term>, root: bool) -> TreeNode {
    let owned = term.into_owned();
    let expandable = root || matches!(term, TermRef::BlankNode(_));
    if !expandable {
        return TreeNode {
            term: owned,
            children: Vec::new(),
            cycle: false,
        };
    }
    if !path.insert(owned.clone()) {
        debug!("Cycle at {} while describing a node; truncating", owned);
        return TreeNode {
            term: owned,
            children: Vec::new(),
            cycle: true,
        };
    }
    let mut children = Vec::new();
    if let Some(subject) = subject_ref(term) {
        let mut arcs: Vec<_> = graph.triples_for_subject(subject).collect();
        arcs.sort_by_cached_key(|t| (t.predicate.to_string(), t.object.to_string()));
        for arc in arcs {
            children.push((
                arc.predicate.into_owned(),
                expand(graph, arc.object, path, false),
            ));
        }
    }
    path.remove(&owned);
    TreeNode {
        term: owned,
        children,
        cycle: false,
    }
}

impl TreeNode {
    /// Indented text rendering, one arc per line.
    pub fn render(&self, indent: usize) -> String {
        let mut out = String::new();
        for (predicate, child) in &self.children {
            out.push_str(&"  ".repeat(indent));
            out.push_str(&format!("{} ", predicate));
            if child.children.is_empty() {
                out.push_str(&child.term.to_string());
                if child.cycle {
                    out.push_str(" (cycle)");
                }
                out.push('\n');
            } else {
                out.push_str("[\n");
                out.push_str(&child.render(indent + 1));
                out.push_str(&"  ".repeat(indent));
                out.push_str("]\n");
            }
        }
        out
    }
}
