//! Sorting of report results into cube-level and dimension-level findings.
use crate::graph_node::{Dimension, GraphNode, NodeRef};
use crate::named_nodes::{CUBE, SHACL};
use crate::report::{ValidationReport, ValidationResult};
use crate::types::Severity;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, Term, TripleRef};
use std::collections::HashSet;
use std::fmt;

/// How loudly a result should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Informational,
    Warning,
    Error,
    /// The severity was missing or not one of the three SHACL ones. Never promoted to `Error`.
    Unknown,
}

impl Level {
    pub fn from_severity(severity: Option<&Severity>) -> Level {
        match severity {
            Some(Severity::Info) => Level::Informational,
            Some(Severity::Warning) => Level::Warning,
            Some(Severity::Violation) => Level::Error,
            Some(Severity::Other(_)) | None => Level::Unknown,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Informational => "informational",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// What a result's focus node describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cube,
    Dimension,
    Other,
}

/// A result with its presentation level and scope; details are classified the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedResult {
    pub result: ValidationResult,
    pub level: Level,
    pub scope: Scope,
    /// Set when the focus node is a property shape of the cube's constraint.
    pub dimension: Option<Dimension>,
    pub detail: Vec<ClassifiedResult>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub cube: Vec<ClassifiedResult>,
    pub dimensions: Vec<ClassifiedResult>,
    /// Results about anything else, typically observations.
    pub other: Vec<ClassifiedResult>,
}

impl Classification {
    pub fn len(&self) -> usize {
        self.cube.len() + self.dimensions.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Classifier<'a> {
    graphs: [&'a Graph; 2],
}

impl Classifier<'_> {
    fn scope(&self, focus: &Term) -> Scope {
        let cube = CUBE::new();
        let sh = SHACL::new();
        let nodes = || {
            self.graphs
                .iter()
                .filter_map(|g| NodeRef::from_term(g, focus.as_ref()))
        };
        if nodes().any(|n| n.has_type(cube.cube)) {
            return Scope::Cube;
        }
        if nodes().any(|n| n.has_type(cube.constraint)) {
            return Scope::Dimension;
        }
        let attached = self.graphs.iter().any(|g| {
            g.subjects_for_predicate_object(sh.property, focus.as_ref())
                .any(|owner| {
                    g.contains(TripleRef::new(
                        owner,
                        rdf::TYPE,
                        cube.constraint,
                    ))
                })
        });
        if attached {
            Scope::Dimension
        } else {
            Scope::Other
        }
    }

    fn dimension(&self, focus: &Term) -> Option<Dimension> {
        let sh = SHACL::new();
        self.graphs
            .iter()
            .filter_map(|g| NodeRef::from_term(g, focus.as_ref()))
            .find(|n| n.object(sh.path).is_some())
            .map(|n| Dimension::from_node(&n))
    }

    fn classify(&self, result: &ValidationResult) -> ClassifiedResult {
        let scope = self.scope(&result.focus_node);
        ClassifiedResult {
            level: Level::from_severity(result.severity.as_ref()),
            dimension: match scope {
                Scope::Dimension => self.dimension(&result.focus_node),
                _ => None,
            },
            detail: result.detail.iter().map(|d| self.classify(d)).collect(),
            scope,
            result: result.clone(),
        }
    }
}

/// Splits the report's results by what their focus node describes.
///
/// A top-level result whose focus node is also the focus of some other result's detail is
/// left out; it only shows up nested under that result. Every remaining result lands in
/// exactly one bucket. Node types are looked up in both the data and the shape graph.
pub fn classify(report: &ValidationReport) -> Classification {
    let classifier = Classifier {
        graphs: [&report.data_graph, report.shape_graph.graph()],
    };
    let detail_foci: Vec<HashSet<Term>> = report
        .violations
        .iter()
        .map(ValidationResult::detail_focus_nodes)
        .collect();

    let mut classification = Classification::default();
    for (index, result) in report.violations.iter().enumerate() {
        let nested_elsewhere = detail_foci
            .iter()
            .enumerate()
            .any(|(other, foci)| other != index && foci.contains(&result.focus_node));
        if nested_elsewhere {
            continue;
        }
        let classified = classifier.classify(result);
        match classified.scope {
            Scope::Cube => classification.cube.push(classified),
            Scope::Dimension => classification.dimensions.push(classified),
            Scope::Other => classification.other.push(classified),
        }
    }
    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::parse_turtle;
    use crate::report::read_report_graph;
    use crate::shapes::ShapeGraph;
    use crate::types::Termination;

    const DATA: &str = r#"
@prefix cube: <https://cube.link/> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix schema: <http://schema.org/> .
@prefix ex: <http://example.com/> .
ex:cube a cube:Cube ; cube:observationConstraint ex:shape .
ex:shape a cube:Constraint ;
    sh:property ex:yearShape .
ex:yearShape sh:path ex:year ; schema:name "Year"@en .
ex:obs1 a cube:Observation .
"#;

    const REPORT: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.com/> .
[] a sh:ValidationReport ;
   sh:result
     [ a sh:ValidationResult ; sh:focusNode ex:cube ; sh:resultSeverity sh:Violation ;
       sh:detail [ a sh:ValidationResult ; sh:focusNode ex:shape ; sh:resultSeverity sh:Warning ] ] ,
     [ a sh:ValidationResult ; sh:focusNode ex:shape ; sh:resultSeverity sh:Warning ] ,
     [ a sh:ValidationResult ; sh:focusNode ex:yearShape ; sh:resultSeverity sh:Info ] ,
     [ a sh:ValidationResult ; sh:focusNode ex:obs1 ;
       sh:resultSeverity <http://example.com/Custom> ] .
"#;

    fn report() -> ValidationReport {
        let data = parse_turtle(DATA, None).unwrap();
        let results = read_report_graph(&parse_turtle(REPORT, None).unwrap());
        ValidationReport::new(
            results,
            ShapeGraph::new(Graph::new(), "urn:test"),
            data,
            Termination::Exhausted,
        )
    }

    #[test]
    fn results_are_split_by_focus_node() {
        let classification = classify(&report());
        assert_eq!(classification.cube.len(), 1);
        assert_eq!(classification.cube[0].level, Level::Error);
        assert_eq!(classification.cube[0].detail[0].scope, Scope::Dimension);

        // ex:shape is nested under the cube result, so only the property shape stays.
        assert_eq!(classification.dimensions.len(), 1);
        let year = &classification.dimensions[0];
        assert_eq!(year.level, Level::Informational);
        assert_eq!(year.dimension.as_ref().map(Dimension::label).as_deref(), Some("Year"));

        assert_eq!(classification.other.len(), 1);
        assert_eq!(classification.other[0].level, Level::Unknown);
    }

    #[test]
    fn buckets_are_disjoint() {
        let classification = classify(&report());
        let cube: HashSet<Term> = classification
            .cube
            .iter()
            .map(|c| c.result.focus_node.clone())
            .collect();
        assert!(classification
            .dimensions
            .iter()
            .all(|d| !cube.contains(&d.result.focus_node)));
        assert_eq!(classification.len(), 3);
    }

    #[test]
    fn missing_severity_is_unknown() {
        assert_eq!(Level::from_severity(None), Level::Unknown);
        assert_eq!(Level::from_severity(Some(&Severity::Warning)), Level::Warning);
        assert_eq!(Level::Error.to_string(), "error");
    }
}
