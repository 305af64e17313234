//! Checks of single value nodes against the value-type, range, string and list components.
use crate::graph_node::{GraphNode, NodeRef};
use crate::named_nodes::SHACL;
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Graph, NamedNode, NamedNodeRef, Term};
use regex::Regex;
use std::cmp::Ordering;

pub(crate) fn has_class(data: &Graph, value: &Term, class: &NamedNode) -> bool {
    NodeRef::from_term(data, value.as_ref()).is_some_and(|node| node.has_type(class.as_ref()))
}

pub(crate) fn has_datatype(value: &Term, datatype: &NamedNode) -> bool {
    match value {
        Term::Literal(lit) => lit.datatype() == datatype.as_ref(),
        _ => false,
    }
}

pub(crate) fn has_node_kind(value: &Term, node_kind: &NamedNode) -> bool {
    let sh = SHACL::new();
    let kind = node_kind.as_ref();
    let (iri, blank, literal) = match value {
        Term::NamedNode(_) => (true, false, false),
        Term::BlankNode(_) => (false, true, false),
        Term::Literal(_) => (false, false, true),
        #[allow(unreachable_patterns)]
        _ => (false, false, false),
    };
    if kind == sh.iri {
        iri
    } else if kind == sh.literal {
        literal
    } else if kind == sh.blank_node {
        blank
    } else if kind == sh.blank_node_or_iri {
        blank || iri
    } else if kind == sh.blank_node_or_literal {
        blank || literal
    } else if kind == sh.iri_or_literal {
        iri || literal
    } else {
        false
    }
}

const NUMERIC: [NamedNodeRef<'static>; 16] = [
    xsd::INTEGER,
    xsd::DECIMAL,
    xsd::DOUBLE,
    xsd::FLOAT,
    xsd::INT,
    xsd::LONG,
    xsd::SHORT,
    xsd::BYTE,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::NON_POSITIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::NEGATIVE_INTEGER,
    xsd::UNSIGNED_INT,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_SHORT,
    xsd::UNSIGNED_BYTE,
];

fn numeric(term: &Term) -> Option<f64> {
    match term {
        Term::Literal(lit) if NUMERIC.iter().any(|n| *n == lit.datatype()) => {
            lit.value().trim().parse().ok()
        }
        _ => None,
    }
}

/// Orders two literals: numerically when both are numeric, lexically when they share a
/// datatype. Anything else is incomparable.
pub(crate) fn compare(value: &Term, bound: &Term) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (numeric(value), numeric(bound)) {
        return a.partial_cmp(&b);
    }
    match (value, bound) {
        (Term::Literal(a), Term::Literal(b)) if a.datatype() == b.datatype() => {
            Some(a.value().cmp(b.value()))
        }
        _ => None,
    }
}

/// The string a length or pattern constraint looks at. Blank nodes have none.
pub(crate) fn string_value(value: &Term) -> Option<&str> {
    match value {
        Term::NamedNode(nn) => Some(nn.as_str()),
        Term::Literal(lit) => Some(lit.value()),
        _ => None,
    }
}

pub(crate) fn length(value: &Term) -> Option<u64> {
    string_value(value).map(|s| s.chars().count() as u64)
}

pub(crate) fn matches_pattern(value: &Term, regex: &Regex) -> bool {
    string_value(value).is_some_and(|s| regex.is_match(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{BlankNode, Literal};

    #[test]
    fn numeric_literals_compare_across_datatypes() {
        let five = Term::from(Literal::new_typed_literal("5", xsd::INTEGER));
        let four_half = Term::from(Literal::new_typed_literal("4.5", xsd::DECIMAL));
        assert_eq!(compare(&five, &four_half), Some(Ordering::Greater));

        let date_a = Term::from(Literal::new_typed_literal("2020-01-01", xsd::DATE));
        let date_b = Term::from(Literal::new_typed_literal("2021-01-01", xsd::DATE));
        assert_eq!(compare(&date_a, &date_b), Some(Ordering::Less));
        assert_eq!(compare(&date_a, &five), None);
    }

    #[test]
    fn node_kinds() {
        let sh = SHACL::new();
        let blank = Term::from(BlankNode::default());
        assert!(has_node_kind(&blank, &sh.blank_node_or_iri.into_owned()));
        assert!(!has_node_kind(&blank, &sh.iri_or_literal.into_owned()));
        assert_eq!(length(&blank), None);
        assert_eq!(length(&Term::from(Literal::new_simple_literal("äbc"))), Some(3));
    }
}
