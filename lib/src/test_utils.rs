//! In-memory collaborators for tests.
use crate::error::TransportError;
use crate::rdf::{merge_into, to_turtle};
use crate::transport::{Accept, Transport};
use async_trait::async_trait;
use oxigraph::model::Graph;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// What the mock answers for a dereferenced document.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Body(String),
    Status(u16),
}

/// A request the mock has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRequest {
    Ping,
    CubeGraph,
    ObservationConstraint,
    Page { page_index: u64, chunk_size: u64 },
    Document(String),
}

/// A [`Transport`] answering from in-memory graphs.
///
/// Queries are told apart by their text: windowed observation queries by their
/// `LIMIT`/`OFFSET`, the cube graph by the filter keeping the observation set out, the
/// constraint description by its `cube:observationConstraint` pattern. Documents are looked up
/// by URL.
#[derive(Debug, Default)]
pub struct MockTransport {
    documents: HashMap<String, MockResponse>,
    cube_graph: Graph,
    constraint: Graph,
    observations: Vec<Graph>,
    fail_at_page: Option<(u64, u16)>,
    hang_at_page: Option<u64>,
    requests: Mutex<Vec<MockRequest>>,
    in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, turtle: &str) -> Self {
        self.documents
            .insert(url.to_string(), MockResponse::Body(turtle.to_string()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.documents
            .insert(url.to_string(), MockResponse::Status(status));
        self
    }

    /// The answer to the cube graph query.
    pub fn with_cube_graph(mut self, graph: Graph) -> Self {
        self.cube_graph = graph;
        self
    }

    /// The answer to the observation constraint query.
    pub fn with_constraint(mut self, graph: Graph) -> Self {
        self.constraint = graph;
        self
    }

    /// One graph per observation, in paging order.
    pub fn with_observations(mut self, observations: Vec<Graph>) -> Self {
        self.observations = observations;
        self
    }

    /// Answers the window query for `page_index` with HTTP `status`.
    pub fn failing_at_page(mut self, page_index: u64, status: u16) -> Self {
        self.fail_at_page = Some((page_index, status));
        self
    }

    /// Never answers the window query for `page_index`.
    pub fn hanging_at_page(mut self, page_index: u64) -> Self {
        self.hang_at_page = Some(page_index);
        self
    }

    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Page indexes of all window queries received, in order.
    pub fn pages_requested(&self) -> Vec<u64> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                MockRequest::Page { page_index, .. } => Some(page_index),
                _ => None,
            })
            .collect()
    }

    /// Requests that have started and neither completed nor been dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, request: MockRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }

    fn window(&self, page_index: u64, chunk_size: u64) -> Result<String, TransportError> {
        let start = page_index.saturating_mul(chunk_size) as usize;
        let mut graph = Graph::new();
        for observation in self.observations.iter().skip(start).take(chunk_size as usize) {
            merge_into(&mut graph, observation);
        }
        serialize(&graph)
    }
}

fn serialize(graph: &Graph) -> Result<String, TransportError> {
    to_turtle(graph).map_err(|message| TransportError::Request {
        url: "mock:".to_string(),
        message,
    })
}

/// Reads `LIMIT n` / `OFFSET m` out of a window query.
fn window_of(query: &str) -> Option<(u64, u64)> {
    let number_after = |keyword: &str| -> Option<u64> {
        let rest = &query[query.find(keyword)? + keyword.len()..];
        rest.split_whitespace().next()?.parse().ok()
    };
    let limit = number_after("LIMIT ")?;
    let offset = number_after("OFFSET ")?;
    Some((offset / limit.max(1), limit))
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn start(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn query(
        &self,
        endpoint: &Url,
        query: &str,
        _accept: Accept,
    ) -> Result<String, TransportError> {
        let _guard = InFlight::start(&self.in_flight);
        if query.starts_with("SELECT *") {
            self.record(MockRequest::Ping);
            return Ok("{\"head\":{\"vars\":[]},\"results\":{\"bindings\":[]}}".to_string());
        }
        if let Some((page_index, chunk_size)) = window_of(query) {
            self.record(MockRequest::Page {
                page_index,
                chunk_size,
            });
            if self.hang_at_page == Some(page_index) {
                std::future::pending::<()>().await;
            }
            if let Some((failing, status)) = self.fail_at_page {
                if failing == page_index {
                    return Err(TransportError::Status {
                        url: endpoint.to_string(),
                        status,
                    });
                }
            }
            return self.window(page_index, chunk_size);
        }
        if query.contains("?link != cube:observationSet") {
            self.record(MockRequest::CubeGraph);
            return serialize(&self.cube_graph);
        }
        if query.contains("cube:observationConstraint ?constraint") {
            self.record(MockRequest::ObservationConstraint);
            return serialize(&self.constraint);
        }
        Err(TransportError::Request {
            url: endpoint.to_string(),
            message: format!("unexpected query: {}", query),
        })
    }

    async fn fetch(&self, document: &Url) -> Result<String, TransportError> {
        let _guard = InFlight::start(&self.in_flight);
        self.record(MockRequest::Document(document.to_string()));
        match self.documents.get(document.as_str()) {
            Some(MockResponse::Body(body)) => Ok(body.clone()),
            Some(MockResponse::Status(status)) => Err(TransportError::Status {
                url: document.to_string(),
                status: *status,
            }),
            None => Err(TransportError::Status {
                url: document.to_string(),
                status: 404,
            }),
        }
    }
}
