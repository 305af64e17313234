//! Shapes read out of a shape graph into plain data.
use crate::graph_node::{GraphNode, NodeRef};
use crate::named_nodes::SHACL;
use crate::rdf::read_rdf_list;
use crate::types::{Path, Severity};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, NamedNode, Term, TermRef};
use regex::Regex;
use std::collections::{HashMap, VecDeque};

/// Index of a shape inside a [`ShapeSet`].
pub type ShapeId = usize;

/// How a shape selects its focus nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Class(NamedNode),
    Node(Term),
    SubjectsOf(NamedNode),
    ObjectsOf(NamedNode),
}

/// Data-only description of a constraint component attached to a shape.
#[derive(Debug, Clone)]
pub enum ComponentDescriptor {
    Class { class: NamedNode },
    Datatype { datatype: NamedNode },
    NodeKind { node_kind: NamedNode },
    MinCount { min_count: u64 },
    MaxCount { max_count: u64 },
    MinExclusive { value: Term },
    MinInclusive { value: Term },
    MaxExclusive { value: Term },
    MaxInclusive { value: Term },
    MinLength { length: u64 },
    MaxLength { length: u64 },
    Pattern { pattern: String, regex: Regex },
    In { values: Vec<Term> },
    HasValue { value: Term },
    Node { shape: ShapeId },
    Property { shape: ShapeId },
    And { shapes: Vec<ShapeId> },
    Or { shapes: Vec<ShapeId> },
    Not { shape: ShapeId },
    Closed { ignored: Vec<NamedNode> },
}

impl ComponentDescriptor {
    /// The `sh:...ConstraintComponent` IRI reported as `sh:sourceConstraintComponent`.
    pub fn component_iri(&self) -> NamedNode {
        let name = match self {
            ComponentDescriptor::Class { .. } => "Class",
            ComponentDescriptor::Datatype { .. } => "Datatype",
            ComponentDescriptor::NodeKind { .. } => "NodeKind",
            ComponentDescriptor::MinCount { .. } => "MinCount",
            ComponentDescriptor::MaxCount { .. } => "MaxCount",
            ComponentDescriptor::MinExclusive { .. } => "MinExclusive",
            ComponentDescriptor::MinInclusive { .. } => "MinInclusive",
            ComponentDescriptor::MaxExclusive { .. } => "MaxExclusive",
            ComponentDescriptor::MaxInclusive { .. } => "MaxInclusive",
            ComponentDescriptor::MinLength { .. } => "MinLength",
            ComponentDescriptor::MaxLength { .. } => "MaxLength",
            ComponentDescriptor::Pattern { .. } => "Pattern",
            ComponentDescriptor::In { .. } => "In",
            ComponentDescriptor::HasValue { .. } => "HasValue",
            ComponentDescriptor::Node { .. } => "Node",
            ComponentDescriptor::Property { .. } => "Property",
            ComponentDescriptor::And { .. } => "And",
            ComponentDescriptor::Or { .. } => "Or",
            ComponentDescriptor::Not { .. } => "Not",
            ComponentDescriptor::Closed { .. } => "Closed",
        };
        SHACL::component(name)
    }
}

/// A node or property shape.
#[derive(Debug, Clone)]
pub struct Shape {
    pub id: Term,
    /// Set for property shapes.
    pub path: Option<Path>,
    pub targets: Vec<Target>,
    pub components: Vec<ComponentDescriptor>,
    pub severity: Severity,
    pub message: Option<String>,
    pub deactivated: bool,
}

impl Shape {
    pub fn is_property_shape(&self) -> bool {
        self.path.is_some()
    }
}

/// Every shape reachable from the targeted and declared shapes of a graph.
#[derive(Debug, Clone, Default)]
pub struct ShapeSet {
    shapes: Vec<Shape>,
}

impl ShapeSet {
    /// Reads all shapes of `graph`.
    ///
    /// Shapes are nodes typed `sh:NodeShape` or `sh:PropertyShape`, nodes with a target, and
    /// anything referenced from another shape through `sh:property`, `sh:node`, `sh:not`,
    /// `sh:and` or `sh:or`.
    pub fn parse(graph: &Graph) -> Result<ShapeSet, String> {
        let sh = SHACL::new();
        let mut parser = Parser {
            graph,
            ids: HashMap::new(),
            queue: VecDeque::new(),
        };

        let mut roots: Vec<Term> = Vec::new();
        for class in [sh.node_shape, sh.property_shape] {
            roots.extend(
                graph
                    .subjects_for_predicate_object(rdf::TYPE, class)
                    .map(|s| Term::from(s.into_owned())),
            );
        }
        for predicate in [
            sh.target_class,
            sh.target_node,
            sh.target_subjects_of,
            sh.target_objects_of,
        ] {
            roots.extend(
                graph
                    .triples_for_predicate(predicate)
                    .map(|t| Term::from(t.subject.into_owned())),
            );
        }
        for root in roots {
            parser.intern(root);
        }

        // Ids are handed out in queue order, so the n-th popped shape gets id n.
        let mut shapes = Vec::new();
        while let Some(term) = parser.queue.pop_front() {
            let shape = parser.parse_shape(term)?;
            shapes.push(shape);
        }
        Ok(ShapeSet { shapes })
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

struct Parser<'g> {
    graph: &'g Graph,
    ids: HashMap<Term, ShapeId>,
    queue: VecDeque<Term>,
}

impl Parser<'_> {
    fn intern(&mut self, term: Term) -> ShapeId {
        if let Some(id) = self.ids.get(&term) {
            return *id;
        }
        let id = self.ids.len();
        self.ids.insert(term.clone(), id);
        self.queue.push_back(term);
        id
    }

    fn parse_shape(&mut self, term: Term) -> Result<Shape, String> {
        let sh = SHACL::new();
        let graph = self.graph;
        let Some(node) = NodeRef::from_term(graph, term.as_ref()) else {
            return Err(format!("shape {} is a literal", term));
        };

        let path = match node.object(sh.path) {
            Some(p) => Some(Path::parse(graph, p)?),
            None => None,
        };

        let mut targets = Vec::new();
        targets.extend(node.named_objects(sh.target_class).into_iter().map(Target::Class));
        targets.extend(
            node.objects(sh.target_node)
                .into_iter()
                .map(|t| Target::Node(t.into_owned())),
        );
        targets.extend(
            node.named_objects(sh.target_subjects_of)
                .into_iter()
                .map(Target::SubjectsOf),
        );
        targets.extend(
            node.named_objects(sh.target_objects_of)
                .into_iter()
                .map(Target::ObjectsOf),
        );

        let severity = node
            .named_objects(sh.severity)
            .into_iter()
            .next()
            .map(|s| Severity::from_iri(s.as_ref()))
            .unwrap_or(Severity::Violation);
        let deactivated = node.literal(sh.deactivated).as_deref() == Some("true");

        let components = self.parse_components(&node)?;
        let message = node.localized(sh.message, &["en"]);

        Ok(Shape {
            id: term,
            path,
            targets,
            components,
            severity,
            message,
            deactivated,
        })
    }

    fn parse_components(&mut self, node: &NodeRef<'_>) -> Result<Vec<ComponentDescriptor>, String> {
        let sh = SHACL::new();
        let graph = self.graph;
        let mut components = Vec::new();

        for class in node.named_objects(sh.class) {
            components.push(ComponentDescriptor::Class { class });
        }
        for datatype in node.named_objects(sh.datatype) {
            components.push(ComponentDescriptor::Datatype { datatype });
        }
        for node_kind in node.named_objects(sh.node_kind) {
            components.push(ComponentDescriptor::NodeKind { node_kind });
        }
        if let Some(min_count) = integer(node, sh.min_count)? {
            components.push(ComponentDescriptor::MinCount { min_count });
        }
        if let Some(max_count) = integer(node, sh.max_count)? {
            components.push(ComponentDescriptor::MaxCount { max_count });
        }
        if let Some(value) = node.object(sh.min_exclusive) {
            components.push(ComponentDescriptor::MinExclusive { value: value.into_owned() });
        }
        if let Some(value) = node.object(sh.min_inclusive) {
            components.push(ComponentDescriptor::MinInclusive { value: value.into_owned() });
        }
        if let Some(value) = node.object(sh.max_exclusive) {
            components.push(ComponentDescriptor::MaxExclusive { value: value.into_owned() });
        }
        if let Some(value) = node.object(sh.max_inclusive) {
            components.push(ComponentDescriptor::MaxInclusive { value: value.into_owned() });
        }
        if let Some(length) = integer(node, sh.min_length)? {
            components.push(ComponentDescriptor::MinLength { length });
        }
        if let Some(length) = integer(node, sh.max_length)? {
            components.push(ComponentDescriptor::MaxLength { length });
        }
        if let Some(pattern) = node.literal(sh.pattern) {
            let flags = node.literal(sh.flags);
            let regex = compile_pattern(&pattern, flags.as_deref())?;
            components.push(ComponentDescriptor::Pattern { pattern, regex });
        }
        if let Some(list) = node.object(sh.in_) {
            components.push(ComponentDescriptor::In {
                values: read_rdf_list(graph, list),
            });
        }
        for value in node.objects(sh.has_value) {
            components.push(ComponentDescriptor::HasValue { value: value.into_owned() });
        }
        for shape in node.objects(sh.node) {
            let shape = self.intern(shape.into_owned());
            components.push(ComponentDescriptor::Node { shape });
        }
        for shape in node.objects(sh.property) {
            let shape = self.intern(shape.into_owned());
            components.push(ComponentDescriptor::Property { shape });
        }
        for list in node.objects(sh.and_) {
            let shapes = self.intern_list(list);
            components.push(ComponentDescriptor::And { shapes });
        }
        for list in node.objects(sh.or_) {
            let shapes = self.intern_list(list);
            components.push(ComponentDescriptor::Or { shapes });
        }
        for shape in node.objects(sh.not) {
            let shape = self.intern(shape.into_owned());
            components.push(ComponentDescriptor::Not { shape });
        }
        if node.literal(sh.closed).as_deref() == Some("true") {
            let ignored = node
                .object(sh.ignored_properties)
                .map(|list| read_rdf_list(graph, list))
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| match t {
                    Term::NamedNode(nn) => Some(nn),
                    _ => None,
                })
                .collect();
            components.push(ComponentDescriptor::Closed { ignored });
        }
        Ok(components)
    }

    fn intern_list(&mut self, list: TermRef<'_>) -> Vec<ShapeId> {
        read_rdf_list(self.graph, list)
            .into_iter()
            .map(|member| self.intern(member))
            .collect()
    }
}

fn integer(
    node: &NodeRef<'_>,
    predicate: oxigraph::model::NamedNodeRef<'_>,
) -> Result<Option<u64>, String> {
    match node.literal(predicate) {
        None => Ok(None),
        Some(lexical) => lexical
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| format!("{} on {} is not a count: {}", predicate, node.term(), e)),
    }
}

/// Compiles `sh:pattern` with its `sh:flags`. Only the flags the regex crate shares with
/// XPath (`i`, `m`, `s`, `x`) are accepted.
pub(crate) fn compile_pattern(pattern: &str, flags: Option<&str>) -> Result<Regex, String> {
    let flags = flags.unwrap_or_default();
    if let Some(bad) = flags.chars().find(|c| !"imsx".contains(*c)) {
        return Err(format!("unsupported sh:flags character '{}'", bad));
    }
    let source = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", flags, pattern)
    };
    Regex::new(&source).map_err(|e| format!("invalid sh:pattern {:?}: {}", pattern, e))
}
