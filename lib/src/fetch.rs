//! Windowed and one-shot reads of a cube's graph.
use crate::error::{Error, Result};
use crate::graph_node::CubeMetadata;
use crate::query;
use crate::rdf::parse_turtle;
use crate::transport::{Accept, Transport};
use crate::types::CubeReference;
use log::debug;
use oxigraph::model::Graph;
use std::sync::Arc;

/// Issues construct queries for a cube and parses the answers. Holds no state between calls.
#[derive(Clone)]
pub struct ChunkedFetcher {
    transport: Arc<dyn Transport>,
}

impl ChunkedFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        ChunkedFetcher { transport }
    }

    async fn construct(&self, cube: &CubeReference, query: &str) -> Result<Graph> {
        let body = self
            .transport
            .query(&cube.endpoint, query, Accept::ConstructGraph)
            .await?;
        parse_turtle(&body, None).map_err(|message| Error::Parse {
            source_iri: cube.endpoint.to_string(),
            message,
        })
    }

    /// Fetches observations `page_index * chunk_size ..` with all their triples.
    ///
    /// A window past the end of the data yields an empty graph, not an error.
    pub async fn fetch_page(
        &self,
        cube: &CubeReference,
        page_index: u64,
        chunk_size: u64,
    ) -> Result<Graph> {
        let graph = self
            .construct(
                cube,
                &query::observation_window(&cube.cube, page_index, chunk_size),
            )
            .await?;
        debug!(
            "Page {} of {} returned {} triples",
            page_index,
            cube.cube,
            graph.len()
        );
        Ok(graph)
    }

    /// Fetches one observation, if the cube has any.
    pub async fn fetch_first_observation(&self, cube: &CubeReference) -> Result<Option<Graph>> {
        let graph = self
            .construct(cube, &query::first_observation(&cube.cube))
            .await?;
        Ok((!graph.is_empty()).then_some(graph))
    }

    /// Fetches the cube node together with its constraint subgraph.
    pub async fn fetch_cube_graph(&self, cube: &CubeReference) -> Result<Graph> {
        self.construct(cube, &query::cube_graph(&cube.cube)).await
    }

    /// Fetches the subgraph below the cube's `cube:observationConstraint`.
    pub async fn fetch_observation_constraint(&self, cube: &CubeReference) -> Result<Graph> {
        self.construct(cube, &query::observation_constraint(&cube.cube))
            .await
    }

    /// Fetches and reads the cube's descriptive metadata.
    pub async fn fetch_cube_metadata(&self, cube: &CubeReference) -> Result<CubeMetadata> {
        let graph = self.fetch_cube_graph(cube).await?;
        Ok(CubeMetadata::from_graph(&graph, &cube.cube))
    }
}
