//! Thin glue over the oxigraph model: parsing, serializing and list handling.
use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{
    BlankNode, Graph, NamedOrBlankNode, NamedOrBlankNodeRef, Term, TermRef, Triple,
};
use std::collections::HashSet;

const PREFIXES: [(&str, &str); 6] = [
    ("sh", "http://www.w3.org/ns/shacl#"),
    ("cube", "https://cube.link/"),
    ("schema", "http://schema.org/"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
];

/// Parses a Turtle document into a graph.
///
/// Blank nodes are renamed on the way in, so graphs parsed from separate responses can be
/// merged without their labels colliding.
pub fn parse_turtle(body: &str, base_iri: Option<&str>) -> Result<Graph, String> {
    let mut parser = RdfParser::from_format(RdfFormat::Turtle).rename_blank_nodes();
    if let Some(base) = base_iri {
        parser = parser
            .with_base_iri(base)
            .map_err(|e| format!("invalid base IRI '{}': {}", base, e))?;
    }
    let mut graph = Graph::new();
    for quad in parser.for_reader(body.as_bytes()) {
        let quad = quad.map_err(|e| e.to_string())?;
        graph.insert(&Triple::from(quad));
    }
    Ok(graph)
}

/// Serializes a graph as Turtle with the prefixes of the cube and SHACL vocabularies.
pub fn to_turtle(graph: &Graph) -> Result<String, String> {
    let mut serializer = RdfSerializer::from_format(RdfFormat::Turtle);
    for (prefix, namespace) in PREFIXES {
        serializer = serializer
            .with_prefix(prefix, namespace)
            .map_err(|e| e.to_string())?;
    }
    serialize(graph, serializer)
}

/// Serializes a graph as N-Triples.
pub fn to_ntriples(graph: &Graph) -> Result<String, String> {
    serialize(graph, RdfSerializer::from_format(RdfFormat::NTriples))
}

fn serialize(graph: &Graph, serializer: RdfSerializer) -> Result<String, String> {
    let mut writer = serializer.for_writer(Vec::new());
    for triple in graph.iter() {
        writer.serialize_triple(triple).map_err(|e| e.to_string())?;
    }
    let bytes = writer.finish().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Adds every triple of `other` to `graph`.
pub fn merge_into(graph: &mut Graph, other: &Graph) {
    for triple in other.iter() {
        graph.insert(triple);
    }
}

/// Views a term as a triple subject, if it can be one.
pub fn subject_ref(term: TermRef<'_>) -> Option<NamedOrBlankNodeRef<'_>> {
    match term {
        TermRef::NamedNode(nn) => Some(nn.into()),
        TermRef::BlankNode(bn) => Some(bn.into()),
        _ => None,
    }
}

/// Reads the members of the RDF list starting at `head`.
///
/// A list whose `rdf:rest` chain loops back on itself stops at the first repeated cell.
pub fn read_rdf_list(graph: &Graph, head: TermRef<'_>) -> Vec<Term> {
    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut current = head.into_owned();
    while current.as_ref() != TermRef::from(rdf::NIL) {
        if !visited.insert(current.clone()) {
            break;
        }
        let Some(cell) = subject_ref(current.as_ref()) else {
            break;
        };
        if let Some(item) = graph.object_for_subject_predicate(cell, rdf::FIRST) {
            items.push(item.into_owned());
        }
        match graph.object_for_subject_predicate(cell, rdf::REST) {
            Some(next) => current = next.into_owned(),
            None => break,
        }
    }
    items
}

/// Writes `items` as a fresh RDF list into `graph` and returns its head.
pub fn build_rdf_list(items: impl IntoIterator<Item = Term>, graph: &mut Graph) -> Term {
    let items: Vec<Term> = items.into_iter().collect();
    if items.is_empty() {
        return rdf::NIL.into_owned().into();
    }

    let cells: Vec<NamedOrBlankNode> = (0..items.len())
        .map(|_| BlankNode::default().into())
        .collect();

    for (i, item) in items.into_iter().enumerate() {
        graph.insert(&Triple::new(cells[i].clone(), rdf::FIRST, item));
        let rest: Term = match cells.get(i + 1) {
            Some(next) => next.clone().into(),
            None => rdf::NIL.into_owned().into(),
        };
        graph.insert(&Triple::new(cells[i].clone(), rdf::REST, rest));
    }
    cells[0].clone().into()
}
