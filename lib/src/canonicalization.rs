use oxigraph::model::{Graph, NamedNode, Term, TermRef, TripleRef};
use petgraph::algo::is_isomorphic_matching;
use petgraph::graph::{DiGraph, NodeIndex};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Renders a graph as sorted N-Triples with blank nodes labelled by their structure.
///
/// Each blank node gets a hash of its neighbourhood, refined until the partition of blank
/// nodes stops splitting. Nodes still sharing a hash are then told apart one at a time and the
/// refinement repeats. Labels are assigned in hash order, so the text does not depend on the
/// labels a parser handed out. Blank nodes that refinement cannot distinguish are treated as
/// interchangeable, which holds for anything but highly regular blank-node structures.
pub fn canonical_form(graph: &Graph) -> String {
    let triples: Vec<TripleRef<'_>> = graph.iter().collect();
    let colors = blank_node_colors(&triples);

    let mut order: Vec<(&String, &str)> = colors.iter().map(|(b, c)| (c, b.as_str())).collect();
    order.sort();
    let labels: HashMap<&str, usize> = order
        .into_iter()
        .enumerate()
        .map(|(i, (_, b))| (b, i))
        .collect();
    let label = |term: TermRef<'_>| match term {
        TermRef::BlankNode(bn) => format!("_:c14n{}", labels[bn.as_str()]),
        other => other.to_string(),
    };

    let mut lines: Vec<String> = triples
        .iter()
        .map(|t| {
            format!(
                "{} {} {} .\n",
                label(t.subject.into()),
                t.predicate,
                label(t.object)
            )
        })
        .collect();
    lines.sort();
    lines.concat()
}

/// SHA-256 of the canonical form, as lowercase hex.
pub fn fingerprint(graph: &Graph) -> String {
    hex(&Sha256::digest(canonical_form(graph).as_bytes()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn blank_label(term: TermRef<'_>) -> Option<&str> {
    match term {
        TermRef::BlankNode(bn) => Some(bn.as_str()),
        _ => None,
    }
}

/// A distinct colour for every blank node of `triples`, keyed by blank node label.
fn blank_node_colors(triples: &[TripleRef<'_>]) -> HashMap<String, String> {
    let mut colors: HashMap<String, String> = HashMap::new();
    for t in triples {
        for term in [t.subject.into(), t.object] {
            if let Some(b) = blank_label(term) {
                colors.entry(b.to_string()).or_default();
            }
        }
    }

    colors = refine(triples, colors);
    loop {
        let chosen = {
            let mut classes: BTreeMap<&String, Vec<&String>> = BTreeMap::new();
            for (b, c) in &colors {
                classes.entry(c).or_default().push(b);
            }
            classes
                .into_values()
                .find(|members| members.len() > 1)
                .and_then(|members| members.into_iter().min().cloned())
        };
        let Some(chosen) = chosen else {
            return colors;
        };
        if let Some(color) = colors.get_mut(&chosen) {
            color.push('!');
        }
        colors = refine(triples, colors);
    }
}

/// Re-hashes every blank node with its neighbours' colours until no class splits any more.
fn refine(
    triples: &[TripleRef<'_>],
    mut colors: HashMap<String, String>,
) -> HashMap<String, String> {
    let distinct = |colors: &HashMap<String, String>| {
        let mut seen: Vec<&String> = colors.values().collect();
        seen.sort();
        seen.dedup();
        seen.len()
    };
    let mut classes = distinct(&colors);
    loop {
        let repr = |term: TermRef<'_>| match blank_label(term) {
            Some(b) => format!("_:{}", colors[b]),
            None => term.to_string(),
        };
        let mut signatures: HashMap<&str, Vec<String>> = HashMap::new();
        for t in triples {
            let subject: TermRef<'_> = t.subject.into();
            if let Some(b) = blank_label(subject) {
                signatures
                    .entry(b)
                    .or_default()
                    .push(format!("+{} {}", t.predicate, repr(t.object)));
            }
            if let Some(b) = blank_label(t.object) {
                signatures
                    .entry(b)
                    .or_default()
                    .push(format!("-{} {}", repr(subject), t.predicate));
            }
        }
        let next: HashMap<String, String> = colors
            .iter()
            .map(|(b, color)| {
                let mut hasher = Sha256::new();
                hasher.update(color.as_bytes());
                let mut own = signatures.remove(b.as_str()).unwrap_or_default();
                own.sort();
                for signature in own {
                    hasher.update(b"\n");
                    hasher.update(signature.as_bytes());
                }
                (b.clone(), hex(&hasher.finalize()))
            })
            .collect();
        let next_classes = distinct(&next);
        colors = next;
        if next_classes == classes {
            return colors;
        }
        classes = next_classes;
    }
}

/// Converts an `oxigraph::model::Graph` to a `petgraph::graph::DiGraph`.
///
/// Each unique subject and object becomes a node, each triple an edge weighted by its predicate.
pub fn oxigraph_to_petgraph(ox_graph: &Graph) -> DiGraph<Term, NamedNode> {
    let mut pg_graph = DiGraph::<Term, NamedNode>::new();
    let mut node_map = HashMap::<Term, NodeIndex>::new();

    for triple_ref in ox_graph.iter() {
        let subject_term = Term::from(triple_ref.subject.into_owned());
        let object_term = triple_ref.object.into_owned();
        let predicate = triple_ref.predicate.into_owned();

        let s_node = *node_map
            .entry(subject_term.clone())
            .or_insert_with(|| pg_graph.add_node(subject_term));
        let o_node = *node_map
            .entry(object_term.clone())
            .or_insert_with(|| pg_graph.add_node(object_term));

        pg_graph.add_edge(s_node, o_node, predicate);
    }

    pg_graph
}

/// Checks if two graphs are isomorphic, treating any two blank nodes as interchangeable.
pub fn are_isomorphic(g1: &Graph, g2: &Graph) -> bool {
    if g1.len() != g2.len() {
        return false;
    }
    let pg1 = oxigraph_to_petgraph(g1);
    let pg2 = oxigraph_to_petgraph(g2);

    is_isomorphic_matching(
        &pg1,
        &pg2,
        |n1, n2| match (n1, n2) {
            (Term::BlankNode(_), Term::BlankNode(_)) => true,
            _ => n1 == n2,
        },
        |e1, e2| e1 == e2,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::parse_turtle;

    const DOC: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
<http://example.com/shape> sh:property [ sh:path <http://example.com/p> ; sh:minCount 1 ] .
"#;

    #[test]
    fn canonical_form_is_stable_across_parses() {
        let a = parse_turtle(DOC, None).unwrap();
        let b = parse_turtle(DOC, None).unwrap();
        assert_eq!(canonical_form(&a), canonical_form(&b));
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert!(canonical_form(&a).contains("_:c14n0"));
        assert!(are_isomorphic(&a, &b));
    }

    #[test]
    fn sibling_blank_nodes_get_stable_labels() {
        let doc = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.com/> .
ex:shape sh:property [ sh:path ex:a ; sh:minCount 1 ] , [ sh:path ex:b ] , [ sh:path ex:b ] .
"#;
        let forms: std::collections::HashSet<String> = (0..40)
            .map(|_| canonical_form(&parse_turtle(doc, None).unwrap()))
            .collect();
        assert_eq!(forms.len(), 1, "{:?}", forms);

        let reordered = doc.replace(
            "[ sh:path ex:a ; sh:minCount 1 ] , [ sh:path ex:b ]",
            "[ sh:path ex:b ] , [ sh:minCount 1 ; sh:path ex:a ]",
        );
        assert_eq!(
            fingerprint(&parse_turtle(doc, None).unwrap()),
            fingerprint(&parse_turtle(&reordered, None).unwrap())
        );
    }

    #[test]
    fn different_graphs_are_not_isomorphic() {
        let a = parse_turtle(DOC, None).unwrap();
        let b = parse_turtle(&DOC.replace("minCount 1", "minCount 2"), None).unwrap();
        assert!(!are_isomorphic(&a, &b));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
