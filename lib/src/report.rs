use crate::graph_node::{describe_tree, GraphNode, NodeRef};
use crate::named_nodes::SHACL;
use crate::rdf::{subject_ref, to_turtle};
use crate::shapes::ShapeGraph;
use crate::types::{Path, Severity, Termination};
use log::warn;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{
    BlankNode, Graph, Literal, NamedNode, NamedOrBlankNode, Term, TermRef, Triple,
};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

/// One `sh:ValidationResult`, with its `sh:detail` results nested below it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub focus_node: Term,
    /// `None` when the report carried no severity at all.
    pub severity: Option<Severity>,
    pub result_path: Option<Path>,
    pub source_shape: Option<Term>,
    pub source_constraint_component: Option<NamedNode>,
    pub message: Option<String>,
    pub value: Option<Term>,
    pub detail: Vec<ValidationResult>,
}

impl ValidationResult {
    /// Reads the result described by `node` in a report graph.
    ///
    /// A result without `sh:focusNode` is malformed; it is skipped with a warning, and so are
    /// details of that kind.
    pub fn from_node(node: &impl GraphNode) -> Option<Self> {
        let mut visited = HashSet::new();
        Self::read(node, &mut visited)
    }

    fn read(node: &impl GraphNode, visited: &mut HashSet<Term>) -> Option<Self> {
        let sh = SHACL::new();
        let Some(focus_node) = node.object(sh.focus_node).map(TermRef::into_owned) else {
            warn!("Skipping validation result {} without a focus node", node.term());
            return None;
        };
        visited.insert(node.term());
        let graph = node.graph();
        let pending: Vec<TermRef<'_>> = node
            .objects(sh.detail)
            .into_iter()
            .filter(|d| !visited.contains(&d.into_owned()))
            .collect();
        let mut detail = Vec::new();
        for d in pending {
            if let Some(result) =
                NodeRef::from_term(graph, d).and_then(|n| Self::read(&n, visited))
            {
                detail.push(result);
            }
        }
        Some(ValidationResult {
            focus_node,
            severity: node.object(sh.result_severity).and_then(|s| match s {
                TermRef::NamedNode(iri) => Some(Severity::from_iri(iri)),
                _ => None,
            }),
            result_path: node
                .object(sh.result_path)
                .and_then(|p| Path::parse(graph, p).ok()),
            source_shape: node.object(sh.source_shape).map(TermRef::into_owned),
            source_constraint_component: node
                .named_objects(sh.source_constraint_component)
                .into_iter()
                .next(),
            message: node.localized(sh.result_message, &["en"]),
            value: node.object(sh.value).map(TermRef::into_owned),
            detail,
        })
    }

    /// Writes this result and its details into `graph`, returning the result node.
    pub fn write(&self, graph: &mut Graph) -> NamedOrBlankNode {
        let sh = SHACL::new();
        let node = NamedOrBlankNode::from(BlankNode::default());
        graph.insert(&Triple::new(
            node.clone(),
            rdf::TYPE,
            sh.validation_result.into_owned(),
        ));
        graph.insert(&Triple::new(
            node.clone(),
            sh.focus_node,
            self.focus_node.clone(),
        ));
        if let Some(severity) = &self.severity {
            graph.insert(&Triple::new(node.clone(), sh.result_severity, severity.iri()));
        }
        if let Some(path) = &self.result_path {
            let path_term = path.to_rdf(graph);
            graph.insert(&Triple::new(node.clone(), sh.result_path, path_term));
        }
        if let Some(shape) = &self.source_shape {
            graph.insert(&Triple::new(node.clone(), sh.source_shape, shape.clone()));
        }
        if let Some(component) = &self.source_constraint_component {
            graph.insert(&Triple::new(
                node.clone(),
                sh.source_constraint_component,
                component.clone(),
            ));
        }
        if let Some(message) = &self.message {
            graph.insert(&Triple::new(
                node.clone(),
                sh.result_message,
                Literal::new_simple_literal(message),
            ));
        }
        if let Some(value) = &self.value {
            graph.insert(&Triple::new(node.clone(), sh.value, value.clone()));
        }
        for detail in &self.detail {
            let detail_node = detail.write(graph);
            graph.insert(&Triple::new(node.clone(), sh.detail, detail_node));
        }
        node
    }

    /// Every focus node in this result's detail tree, excluding its own.
    pub fn detail_focus_nodes(&self) -> HashSet<Term> {
        let mut nodes = HashSet::new();
        let mut pending: Vec<&ValidationResult> = self.detail.iter().collect();
        while let Some(result) = pending.pop() {
            nodes.insert(result.focus_node.clone());
            pending.extend(result.detail.iter());
        }
        nodes
    }
}

/// Builds a `sh:ValidationReport` graph holding `results`.
pub fn write_report_graph(results: &[ValidationResult]) -> Graph {
    let sh = SHACL::new();
    let mut graph = Graph::new();
    let report_node = NamedOrBlankNode::from(BlankNode::default());
    graph.insert(&Triple::new(
        report_node.clone(),
        rdf::TYPE,
        sh.validation_report.into_owned(),
    ));
    graph.insert(&Triple::new(
        report_node.clone(),
        sh.conforms,
        Literal::from(results.is_empty()),
    ));
    for result in results {
        let result_node = result.write(&mut graph);
        graph.insert(&Triple::new(report_node.clone(), sh.result, result_node));
    }
    graph
}

/// Reads the top-level results of a report graph.
///
/// Results hanging off a `sh:ValidationReport` through `sh:result` are top level. A graph
/// without a report node is read as every `sh:ValidationResult` that is nobody's `sh:detail`.
pub fn read_report_graph(graph: &Graph) -> Vec<ValidationResult> {
    let sh = SHACL::new();
    let reports: Vec<Term> = graph
        .subjects_for_predicate_object(rdf::TYPE, sh.validation_report)
        .map(|s| Term::from(s.into_owned()))
        .collect();

    let result_terms: Vec<Term> = if reports.is_empty() {
        graph
            .subjects_for_predicate_object(rdf::TYPE, sh.validation_result)
            .map(|s| Term::from(s.into_owned()))
            .filter(|t| {
                graph
                    .subjects_for_predicate_object(sh.detail, t.as_ref())
                    .next()
                    .is_none()
            })
            .collect()
    } else {
        reports
            .iter()
            .filter_map(|r| subject_ref(r.as_ref()))
            .flat_map(|r| graph.objects_for_subject_predicate(r, sh.result))
            .map(TermRef::into_owned)
            .collect()
    };

    result_terms
        .iter()
        .filter_map(|t| NodeRef::from_term(graph, t.as_ref()))
        .filter_map(|node| ValidationResult::from_node(&node))
        .collect()
}

/// The artifact a run produces: everything found, plus the graphs that were compared.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// True iff `violations` is empty.
    pub conforms: bool,
    pub violations: Vec<ValidationResult>,
    pub shape_graph: ShapeGraph,
    pub data_graph: Graph,
    pub termination: Termination,
}

/// The report as three Turtle documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportExport {
    pub shapes: String,
    pub data: String,
    pub report: String,
}

impl ValidationReport {
    pub fn new(
        violations: Vec<ValidationResult>,
        shape_graph: ShapeGraph,
        data_graph: Graph,
        termination: Termination,
    ) -> Self {
        ValidationReport {
            conforms: violations.is_empty(),
            violations,
            shape_graph,
            data_graph,
            termination,
        }
    }

    pub fn conforms(&self) -> bool {
        self.conforms
    }

    pub fn to_report_graph(&self) -> Graph {
        write_report_graph(&self.violations)
    }

    pub fn export(&self) -> Result<ReportExport, String> {
        Ok(ReportExport {
            shapes: to_turtle(self.shape_graph.graph())?,
            data: to_turtle(&self.data_graph)?,
            report: to_turtle(&self.to_report_graph())?,
        })
    }

    /// A human-readable listing grouped by focus node.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if self.violations.is_empty() {
            let _ = writeln!(out, "Validation report: No errors found ({}).", self.termination);
            return out;
        }

        let _ = writeln!(out, "Validation Report ({}):", self.termination);
        let _ = writeln!(out, "------------------");

        let mut grouped: BTreeMap<String, Vec<&ValidationResult>> = BTreeMap::new();
        for result in &self.violations {
            grouped
                .entry(result.focus_node.to_string())
                .or_default()
                .push(result);
        }
        for (focus_node, results) in grouped {
            let _ = writeln!(out, "\nFocus Node: {}", focus_node);
            for result in results {
                dump_result(&mut out, self.shape_graph.graph(), result, 1);
            }
        }
        let _ = writeln!(out, "\n------------------");
        out
    }
}

fn dump_result(out: &mut String, shapes: &Graph, result: &ValidationResult, depth: usize) {
    let indent = "  ".repeat(depth);
    let severity = result
        .severity
        .as_ref()
        .map(|s| s.iri().to_string())
        .unwrap_or_else(|| "(no severity)".to_string());
    let _ = writeln!(
        out,
        "{}- {}: {}",
        indent,
        severity,
        result.message.as_deref().unwrap_or("(no message)")
    );
    if let Some(path) = &result.result_path {
        let _ = writeln!(out, "{}  Path: {}", indent, path);
    }
    if let Some(value) = &result.value {
        let _ = writeln!(out, "{}  Value: {}", indent, value);
    }
    match &result.source_shape {
        Some(shape @ Term::BlankNode(_)) => {
            let tree = describe_tree(shapes, shape.as_ref());
            let _ = writeln!(out, "{}  From shape [", indent);
            out.push_str(&tree.render(depth + 2));
            let _ = writeln!(out, "{}  ]", indent);
        }
        Some(shape) => {
            let _ = writeln!(out, "{}  From shape: {}", indent, shape);
        }
        None => {}
    }
    for detail in &result.detail {
        let _ = writeln!(out, "{}  Detail on {}:", indent, detail.focus_node);
        dump_result(out, shapes, detail, depth + 2);
    }
}

/// Accumulates pages into one report. The data graph only ever grows.
#[derive(Debug)]
pub struct ReportAggregator {
    shape_graph: ShapeGraph,
    data_graph: Graph,
    violations: Vec<ValidationResult>,
}

impl ReportAggregator {
    pub fn new(shape_graph: ShapeGraph) -> Self {
        ReportAggregator {
            shape_graph,
            data_graph: Graph::new(),
            violations: Vec::new(),
        }
    }

    pub fn shape_graph(&self) -> &ShapeGraph {
        &self.shape_graph
    }

    /// Adds one validated window: its triples and the results found in it.
    pub fn absorb(&mut self, page: &Graph, results: Vec<ValidationResult>) {
        crate::rdf::merge_into(&mut self.data_graph, page);
        self.violations.extend(results);
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn finish(self, termination: Termination) -> ValidationReport {
        ValidationReport::new(
            self.violations,
            self.shape_graph,
            self.data_graph,
            termination,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalization::are_isomorphic;
    use crate::rdf::parse_turtle;

    const REPORT: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <http://example.com/> .
[] a sh:ValidationReport ;
   sh:conforms false ;
   sh:result [
      a sh:ValidationResult ;
      sh:focusNode ex:obs1 ;
      sh:resultSeverity sh:Warning ;
      sh:resultPath ex:year ;
      sh:resultMessage "Falsch"@de, "Wrong"@en ;
      sh:value 1999 ;
      sh:detail [
         a sh:ValidationResult ;
         sh:focusNode ex:year-1999 ;
         sh:resultMessage "Not a year"
      ]
   ] .
"#;

    #[test]
    fn results_are_read_with_details() {
        let graph = parse_turtle(REPORT, None).unwrap();
        let results = read_report_graph(&graph);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.severity, Some(Severity::Warning));
        assert_eq!(result.message.as_deref(), Some("Wrong"));
        assert_eq!(result.detail.len(), 1);
        assert_eq!(result.detail[0].severity, None);
        assert_eq!(
            result.detail_focus_nodes(),
            HashSet::from([Term::from(NamedNode::new_unchecked("http://example.com/year-1999"))])
        );
    }

    #[test]
    fn results_without_focus_node_are_skipped() {
        let graph = parse_turtle(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
            @prefix ex: <http://example.com/> .
            [] a sh:ValidationReport ;
               sh:result [ a sh:ValidationResult ; sh:resultMessage "orphan" ] ,
                         [ a sh:ValidationResult ; sh:focusNode ex:obs2 ;
                           sh:detail [ a sh:ValidationResult ; sh:resultMessage "no focus" ] ] ."#,
            None,
        )
        .unwrap();
        let results = read_report_graph(&graph);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].focus_node,
            Term::from(NamedNode::new_unchecked("http://example.com/obs2"))
        );
        assert!(results[0].detail.is_empty());
    }

    #[test]
    fn written_report_reads_back() {
        let graph = parse_turtle(REPORT, None).unwrap();
        let results = read_report_graph(&graph);
        let rewritten = write_report_graph(&results);
        assert_eq!(read_report_graph(&rewritten), results);
        assert!(are_isomorphic(&rewritten, &write_report_graph(&results)));
    }

    #[test]
    fn aggregator_counts_and_conformance() {
        let shapes = ShapeGraph::new(Graph::new(), "urn:test");
        let mut aggregator = ReportAggregator::new(shapes);
        let page = parse_turtle("<http://example.com/o> a <http://example.com/T> .", None).unwrap();
        aggregator.absorb(&page, Vec::new());
        assert_eq!(aggregator.violation_count(), 0);
        let report = aggregator.finish(Termination::Exhausted);
        assert!(report.conforms());
        assert_eq!(report.data_graph.len(), 1);
        assert!(report.dump().contains("No errors found"));
    }

    #[test]
    fn dump_expands_anonymous_shapes() {
        let shapes = parse_turtle(
            "<http://example.com/s> <http://www.w3.org/ns/shacl#property> \
             [ <http://www.w3.org/ns/shacl#path> <http://example.com/year> ] .",
            None,
        )
        .unwrap();
        let sh = SHACL::new();
        let anonymous = shapes
            .triples_for_predicate(sh.property)
            .next()
            .unwrap()
            .object
            .into_owned();
        let results = read_report_graph(&parse_turtle(REPORT, None).unwrap())
            .into_iter()
            .map(|r| ValidationResult {
                source_shape: Some(anonymous.clone()),
                ..r
            })
            .collect();
        let report = ValidationReport::new(
            results,
            ShapeGraph::new(shapes, "urn:test"),
            Graph::new(),
            Termination::Exhausted,
        );
        let dump = report.dump();
        assert!(dump.contains("Focus Node: <http://example.com/obs1>"));
        assert!(dump.contains("From shape ["));
        assert!(dump.contains("<http://www.w3.org/ns/shacl#path> <http://example.com/year>"));
    }
}
