//! The constraint engine seam and the built-in SHACL Core engine behind it.
use crate::graph_node::{GraphNode, NodeRef};
use crate::report::{read_report_graph, write_report_graph, ValidationResult};
use crate::types::Path;
use log::{debug, trace};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, NamedNode, Term};
use std::cmp::Ordering;
use std::collections::HashSet;

mod components;
pub mod model;

use components::{compare, has_class, has_datatype, has_node_kind, length, matches_pattern};
use model::{ComponentDescriptor, Shape, ShapeId, ShapeSet, Target};

/// Nested `sh:node`/`sh:and`/`sh:or`/`sh:not` evaluation stops with an error past this depth.
const MAX_DEPTH: usize = 64;

/// Validates a data graph against a shape graph and answers with a `sh:ValidationReport` graph.
///
/// Implementations are stateless between calls and may be shared across runs.
pub trait ConstraintEngine: Send + Sync {
    fn validate(&self, shapes: &Graph, data: &Graph) -> Result<Graph, String>;

    /// The results of [`ConstraintEngine::validate`], read back out of the report graph.
    fn results(&self, shapes: &Graph, data: &Graph) -> Result<Vec<ValidationResult>, String> {
        let report = self.validate(shapes, data)?;
        Ok(read_report_graph(&report))
    }
}

/// In-process SHACL Core engine covering targets, value type, cardinality, range, string,
/// list, logical, shape-based and closed components.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreEngine;

impl CoreEngine {
    pub fn new() -> Self {
        CoreEngine
    }

    /// Runs every active shape over its targets and returns the top-level results.
    pub fn evaluate(&self, shapes: &Graph, data: &Graph) -> Result<Vec<ValidationResult>, String> {
        let shape_set = ShapeSet::parse(shapes)?;
        debug!(
            "Evaluating {} shapes against {} data triples",
            shape_set.len(),
            data.len()
        );
        let evaluator = Evaluator {
            shapes: &shape_set,
            data,
        };
        let mut results = Vec::new();
        for (id, shape) in shape_set.iter() {
            if shape.deactivated || shape.targets.is_empty() {
                continue;
            }
            let focus_nodes = evaluator.focus_nodes(&shape.targets);
            trace!("Shape {} has {} focus nodes", shape.id, focus_nodes.len());
            for focus in &focus_nodes {
                results.extend(evaluator.validate_shape(id, focus, 0)?);
            }
        }
        Ok(results)
    }
}

impl ConstraintEngine for CoreEngine {
    fn validate(&self, shapes: &Graph, data: &Graph) -> Result<Graph, String> {
        let results = self.evaluate(shapes, data)?;
        Ok(write_report_graph(&results))
    }
}

struct Evaluator<'a> {
    shapes: &'a ShapeSet,
    data: &'a Graph,
}

impl Evaluator<'_> {
    fn shape(&self, id: ShapeId) -> Result<&Shape, String> {
        self.shapes
            .get(id)
            .ok_or_else(|| format!("shape #{} not found", id))
    }

    fn focus_nodes(&self, targets: &[Target]) -> Vec<Term> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        let mut push = |term: Term| {
            if seen.insert(term.clone()) {
                nodes.push(term);
            }
        };
        for target in targets {
            match target {
                Target::Node(node) => push(node.clone()),
                Target::Class(class) => {
                    for triple in self.data.triples_for_predicate(rdf::TYPE) {
                        let subject = Term::from(triple.subject.into_owned());
                        if has_class(self.data, &subject, class) {
                            push(subject);
                        }
                    }
                }
                Target::SubjectsOf(predicate) => {
                    for triple in self.data.triples_for_predicate(predicate) {
                        push(Term::from(triple.subject.into_owned()));
                    }
                }
                Target::ObjectsOf(predicate) => {
                    for triple in self.data.triples_for_predicate(predicate) {
                        push(triple.object.into_owned());
                    }
                }
            }
        }
        nodes
    }

    fn validate_shape(
        &self,
        id: ShapeId,
        focus: &Term,
        depth: usize,
    ) -> Result<Vec<ValidationResult>, String> {
        if depth > MAX_DEPTH {
            return Err(format!(
                "shape nesting deeper than {} levels at focus node {}",
                MAX_DEPTH, focus
            ));
        }
        let shape = self.shape(id)?;
        if shape.deactivated {
            return Ok(Vec::new());
        }
        let value_nodes = match &shape.path {
            Some(path) => path.evaluate(self.data, focus),
            None => vec![focus.clone()],
        };

        let mut results = Vec::new();
        for component in &shape.components {
            let failure = |value: Option<Term>, detail: Vec<ValidationResult>, default: String| {
                ValidationResult {
                    focus_node: focus.clone(),
                    severity: Some(shape.severity.clone()),
                    result_path: shape.path.clone(),
                    source_shape: Some(shape.id.clone()),
                    source_constraint_component: Some(component.component_iri()),
                    message: Some(shape.message.clone().unwrap_or(default)),
                    value,
                    detail,
                }
            };
            let mut each_value = |ok: &dyn Fn(&Term) -> bool, default: &dyn Fn() -> String| {
                for v in value_nodes.iter().filter(|v| !ok(v)) {
                    results.push(failure(Some(v.clone()), Vec::new(), default()));
                }
            };

            match component {
                ComponentDescriptor::Class { class } => each_value(
                    &|v| has_class(self.data, v, class),
                    &|| format!("Value is not an instance of {}", class),
                ),
                ComponentDescriptor::Datatype { datatype } => each_value(
                    &|v| has_datatype(v, datatype),
                    &|| format!("Value does not have datatype {}", datatype),
                ),
                ComponentDescriptor::NodeKind { node_kind } => each_value(
                    &|v| has_node_kind(v, node_kind),
                    &|| format!("Value does not have node kind {}", node_kind),
                ),
                ComponentDescriptor::MinExclusive { value: bound } => each_value(
                    &|v| compare(v, bound) == Some(Ordering::Greater),
                    &|| format!("Value is not greater than {}", bound),
                ),
                ComponentDescriptor::MinInclusive { value: bound } => each_value(
                    &|v| matches!(compare(v, bound), Some(Ordering::Greater | Ordering::Equal)),
                    &|| format!("Value is less than {}", bound),
                ),
                ComponentDescriptor::MaxExclusive { value: bound } => each_value(
                    &|v| compare(v, bound) == Some(Ordering::Less),
                    &|| format!("Value is not less than {}", bound),
                ),
                ComponentDescriptor::MaxInclusive { value: bound } => each_value(
                    &|v| matches!(compare(v, bound), Some(Ordering::Less | Ordering::Equal)),
                    &|| format!("Value is greater than {}", bound),
                ),
                ComponentDescriptor::MinLength { length: min } => each_value(
                    &|v| length(v).is_some_and(|l| l >= *min),
                    &|| format!("Value has less than {} characters", min),
                ),
                ComponentDescriptor::MaxLength { length: max } => each_value(
                    &|v| length(v).is_some_and(|l| l <= *max),
                    &|| format!("Value has more than {} characters", max),
                ),
                ComponentDescriptor::Pattern { pattern, regex } => each_value(
                    &|v| matches_pattern(v, regex),
                    &|| format!("Value does not match pattern {:?}", pattern),
                ),
                ComponentDescriptor::In { values } => each_value(
                    &|v| values.contains(v),
                    &|| "Value is not in the list of allowed values".to_string(),
                ),
                ComponentDescriptor::MinCount { min_count } => {
                    if (value_nodes.len() as u64) < *min_count {
                        results.push(failure(None, Vec::new(), format!("Less than {} values", min_count)));
                    }
                }
                ComponentDescriptor::MaxCount { max_count } => {
                    if (value_nodes.len() as u64) > *max_count {
                        results.push(failure(None, Vec::new(), format!("More than {} values", max_count)));
                    }
                }
                ComponentDescriptor::HasValue { value } => {
                    if !value_nodes.contains(value) {
                        results.push(failure(None, Vec::new(), format!("Missing expected value {}", value)));
                    }
                }
                ComponentDescriptor::Property { shape: property } => {
                    results.extend(self.validate_shape(*property, focus, depth + 1)?);
                }
                ComponentDescriptor::Node { shape: node } => {
                    for v in &value_nodes {
                        let nested = self.validate_shape(*node, v, depth + 1)?;
                        if !nested.is_empty() {
                            let message = format!("Value does not conform to shape {}", self.shape(*node)?.id);
                            results.push(failure(Some(v.clone()), nested, message));
                        }
                    }
                }
                ComponentDescriptor::And { shapes } => {
                    for v in &value_nodes {
                        let mut nested = Vec::new();
                        for member in shapes {
                            nested.extend(self.validate_shape(*member, v, depth + 1)?);
                        }
                        if !nested.is_empty() {
                            let message = "Value does not conform to every member of sh:and".to_string();
                            results.push(failure(Some(v.clone()), nested, message));
                        }
                    }
                }
                ComponentDescriptor::Or { shapes } => {
                    for v in &value_nodes {
                        let mut nested = Vec::new();
                        let mut matched = false;
                        for member in shapes {
                            let member_results = self.validate_shape(*member, v, depth + 1)?;
                            if member_results.is_empty() {
                                matched = true;
                                break;
                            }
                            nested.extend(member_results);
                        }
                        if !matched {
                            let message = "Value does not conform to any member of sh:or".to_string();
                            results.push(failure(Some(v.clone()), nested, message));
                        }
                    }
                }
                ComponentDescriptor::Not { shape: negated } => {
                    for v in &value_nodes {
                        if self.validate_shape(*negated, v, depth + 1)?.is_empty() {
                            let message = format!("Value conforms to shape {}", self.shape(*negated)?.id);
                            results.push(failure(Some(v.clone()), Vec::new(), message));
                        }
                    }
                }
                ComponentDescriptor::Closed { ignored } => {
                    let allowed = self.allowed_predicates(shape, ignored)?;
                    for v in &value_nodes {
                        let Some(node) = NodeRef::from_term(self.data, v.as_ref()) else {
                            continue;
                        };
                        for triple in self.data.triples_for_subject(node.subject()) {
                            let predicate = triple.predicate.into_owned();
                            if allowed.contains(&predicate) {
                                continue;
                            }
                            let message = format!("Predicate {} is not allowed on a closed shape", predicate);
                            let mut result = failure(Some(triple.object.into_owned()), Vec::new(), message);
                            result.result_path = Some(Path::Simple(predicate.into()));
                            results.push(result);
                        }
                    }
                }
            }
        }
        Ok(results)
    }

    fn allowed_predicates(&self, shape: &Shape, ignored: &[NamedNode]) -> Result<HashSet<NamedNode>, String> {
        let mut allowed: HashSet<NamedNode> = ignored.iter().cloned().collect();
        for component in &shape.components {
            if let ComponentDescriptor::Property { shape: property } = component {
                if let Some(predicate) = self.shape(*property)?.path.as_ref().and_then(|p| p.as_predicate()) {
                    allowed.insert(predicate.clone());
                }
            }
        }
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named_nodes::SHACL;
    use crate::rdf::parse_turtle;
    use crate::types::Severity;

    const SHAPES: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.com/> .
ex:Observation a sh:NodeShape ;
    sh:targetClass ex:Obs ;
    sh:closed true ;
    sh:ignoredProperties ( <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> ) ;
    sh:property [ sh:path ex:year ; sh:minCount 1 ; sh:maxCount 1 ; sh:datatype xsd:gYear ] ,
                [ sh:path ex:value ; sh:minInclusive 0 ; sh:severity sh:Warning ;
                  sh:message "Negative value"@en ] ,
                [ sh:path ex:area ; sh:node ex:Area ] .
ex:Area sh:property [ sh:path ex:code ; sh:pattern "^[A-Z]{2}$" ] .
ex:Disabled a sh:NodeShape ; sh:targetClass ex:Obs ; sh:deactivated true ; sh:maxCount 0 .
"#;

    fn run(data: &str) -> Vec<ValidationResult> {
        let shapes = parse_turtle(SHAPES, None).unwrap();
        let data = parse_turtle(data, None).unwrap();
        CoreEngine::new().results(&shapes, &data).unwrap()
    }

    #[test]
    fn conforming_data_has_no_results() {
        let results = run(r#"
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.com/> .
ex:o1 a ex:Obs ; ex:year "2020"^^xsd:gYear ; ex:value 3 ; ex:area ex:zh .
ex:zh ex:code "ZH" .
"#);
        assert!(results.is_empty(), "{:?}", results);
    }

    #[test]
    fn violations_carry_severity_path_and_detail() {
        let results = run(r#"
@prefix ex: <http://example.com/> .
ex:o1 a ex:Obs ; ex:value -1 ; ex:area ex:zh ; ex:extra "x" .
ex:zh ex:code "zurich" .
"#);
        let component = |r: &ValidationResult| r.source_constraint_component.clone().unwrap();

        assert_eq!(results.len(), 4, "{:#?}", results);
        let min_count = results
            .iter()
            .find(|r| component(r) == SHACL::component("MinCount"))
            .unwrap();
        assert_eq!(min_count.severity, Some(Severity::Violation));

        let negative = results
            .iter()
            .find(|r| component(r) == SHACL::component("MinInclusive"))
            .unwrap();
        assert_eq!(negative.severity, Some(Severity::Warning));
        assert_eq!(negative.message.as_deref(), Some("Negative value"));

        let node = results
            .iter()
            .find(|r| component(r) == SHACL::component("Node"))
            .unwrap();
        assert_eq!(node.detail.len(), 1);
        assert_eq!(
            node.detail[0].focus_node,
            Term::from(NamedNode::new_unchecked("http://example.com/zh"))
        );

        let closed = results
            .iter()
            .find(|r| component(r) == SHACL::component("Closed"))
            .unwrap();
        assert_eq!(
            closed.result_path.as_ref().and_then(|p| p.as_predicate()).map(|p| p.as_str()),
            Some("http://example.com/extra")
        );
    }

    #[test]
    fn logical_components() {
        let shapes = parse_turtle(
            r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.com/> .
ex:S sh:targetNode ex:a, ex:b, "lit" ;
    sh:or ( [ sh:nodeKind sh:Literal ] [ sh:hasValue ex:a ] ) ;
    sh:not [ sh:in ( ex:b ) ] .
"#,
            None,
        )
        .unwrap();
        let results = CoreEngine::new().evaluate(&shapes, &Graph::new()).unwrap();
        let failing: HashSet<String> = results.iter().map(|r| r.focus_node.to_string()).collect();
        assert_eq!(failing, HashSet::from(["<http://example.com/b>".to_string()]));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn cyclic_shape_paths_fail_the_evaluation() {
        let shapes = parse_turtle(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix ex: <http://example.com/> .
            ex:S sh:targetNode ex:a ; sh:property [ sh:path _:p ; sh:minCount 1 ] .
            _:p sh:inversePath _:p ."#,
            None,
        )
        .unwrap();
        let data = parse_turtle("<http://example.com/a> a <http://example.com/T> .", None).unwrap();
        let err = CoreEngine::new().evaluate(&shapes, &data).unwrap_err();
        assert!(err.contains("cyclic property path"), "{}", err);
    }
}
