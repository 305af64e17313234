//! Loading of shape graphs, either from a profile document or from the cube itself.
use crate::canonicalization::{canonical_form, fingerprint};
use crate::error::{Error, Result};
use crate::fetch::ChunkedFetcher;
use crate::named_nodes::{CUBE, SCHEMA, SHACL};
use crate::profile::ValidationProfile;
use crate::rdf::{merge_into, parse_turtle};
use crate::transport::Transport;
use crate::types::CubeReference;
use log::{info, warn};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, NamedOrBlankNode, TermRef, Triple};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use url::Url;

/// A constraint graph together with its canonical text. Immutable once built.
#[derive(Debug, Clone)]
pub struct ShapeGraph {
    graph: Graph,
    source: String,
    canonical: String,
}

impl ShapeGraph {
    pub fn new(graph: Graph, source: impl Into<String>) -> Self {
        let canonical = canonical_form(&graph);
        ShapeGraph {
            graph,
            source: source.into(),
            canonical,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Where the graph came from: a document IRI or a cube IRI.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Sorted N-Triples rendering; see [`canonical_form`].
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.graph)
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

/// Asserts `sh:targetClass cube:Observation` on every node typed `cube:Constraint`.
///
/// Upstream constraint graphs omit the target, which leaves a generic engine matching the shape
/// against every resource of the data graph. Returns the number of constraint nodes found;
/// applying it twice adds nothing the second time.
pub fn inject_target_class(graph: &mut Graph) -> usize {
    let cube = CUBE::new();
    let sh = SHACL::new();
    let constraints: Vec<NamedOrBlankNode> = graph
        .subjects_for_predicate_object(rdf::TYPE, cube.constraint)
        .map(|s| s.into_owned())
        .collect();
    for constraint in &constraints {
        graph.insert(&Triple::new(
            constraint.clone(),
            sh.target_class,
            cube.observation.into_owned(),
        ));
    }
    constraints.len()
}

/// Fetches shape graphs through a [`Transport`].
#[derive(Clone)]
pub struct ShapeGraphLoader {
    transport: Arc<dyn Transport>,
    fetcher: ChunkedFetcher,
}

impl ShapeGraphLoader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        ShapeGraphLoader {
            fetcher: ChunkedFetcher::new(transport.clone()),
            transport,
        }
    }

    /// Loads the shape graph of `profile`, merging everything it transitively `owl:imports`.
    ///
    /// Any failure is an [`Error::Configuration`] carrying the upstream HTTP status if there
    /// was one; no partial graph is returned.
    pub async fn load_for_profile(&self, profile: &ValidationProfile) -> Result<ShapeGraph> {
        let iri = profile.shape_graph_iri.as_str();
        let root = Url::parse(iri).map_err(|e| Error::Configuration {
            iri: iri.to_string(),
            status: None,
            reason: format!("not a URL: {}", e),
        })?;

        let schema = SCHEMA::new();
        let mut merged = Graph::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut pending: VecDeque<Url> = VecDeque::from([root]);
        while let Some(document) = pending.pop_front() {
            if !visited.insert(document.as_str().to_string()) {
                continue;
            }
            let graph = self
                .fetch_document(&document)
                .await
                .map_err(|e| Error::configuration(document.as_str(), e))?;
            for imported in graph.triples_for_predicate(schema.owl_imports) {
                let TermRef::NamedNode(target) = imported.object else {
                    continue;
                };
                match Url::parse(target.as_str()) {
                    Ok(url) if !visited.contains(url.as_str()) => pending.push_back(url),
                    Ok(_) => {}
                    Err(e) => warn!("Ignoring import of {}: {}", target, e),
                }
            }
            merge_into(&mut merged, &graph);
        }

        let shape_graph = ShapeGraph::new(merged, iri);
        info!(
            "Loaded shape graph <{}> for profile '{}' from {} document(s), {} triples (sha256 {})",
            iri,
            profile.key,
            visited.len(),
            shape_graph.graph().len(),
            shape_graph.fingerprint()
        );
        Ok(shape_graph)
    }

    /// Loads the cube's own `cube:observationConstraint` and targets it at observations.
    ///
    /// A cube without a constraint node yields an empty shape graph and a warning; validating
    /// against it trivially conforms.
    pub async fn load_for_observation_constraint(&self, cube: &CubeReference) -> Result<ShapeGraph> {
        let mut graph = self.fetcher.fetch_observation_constraint(cube).await?;
        let constraints = inject_target_class(&mut graph);
        if constraints == 0 {
            warn!(
                "Cube {} has no node typed cube:Constraint; observations will not be checked",
                cube.cube
            );
        } else {
            info!(
                "Targeted {} constraint node(s) of {} at cube:Observation",
                constraints, cube.cube
            );
        }
        Ok(ShapeGraph::new(graph, cube.cube.as_str()))
    }

    async fn fetch_document(&self, document: &Url) -> Result<Graph> {
        let body = self.transport.fetch(document).await?;
        parse_turtle(&body, Some(document.as_str())).map_err(|message| Error::Parse {
            source_iri: document.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::NamedOrBlankNodeRef;

    const CONSTRAINT: &str = r#"
@prefix cube: <https://cube.link/> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
<http://example.com/shape> a cube:Constraint, sh:NodeShape ;
    sh:property [ sh:path <http://example.com/year> ; sh:minCount 1 ] .
"#;

    #[test]
    fn injection_is_idempotent() {
        let mut graph = parse_turtle(CONSTRAINT, None).unwrap();
        assert_eq!(inject_target_class(&mut graph), 1);
        let once = graph.len();
        assert_eq!(inject_target_class(&mut graph), 1);
        assert_eq!(graph.len(), once);

        let sh = SHACL::new();
        let shape = NamedOrBlankNodeRef::from(oxigraph::model::NamedNodeRef::new_unchecked(
            "http://example.com/shape",
        ));
        assert_eq!(
            graph
                .objects_for_subject_predicate(shape, sh.target_class)
                .count(),
            1
        );
    }

    #[test]
    fn graphs_without_constraint_are_left_alone() {
        let mut graph = parse_turtle(
            "<http://example.com/s> <http://example.com/p> <http://example.com/o> .",
            None,
        )
        .unwrap();
        assert_eq!(inject_target_class(&mut graph), 0);
        assert_eq!(graph.len(), 1);
    }
}
