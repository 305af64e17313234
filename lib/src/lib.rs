//! Paginated SHACL validation of RDF data cubes served from a SPARQL endpoint.
#![deny(clippy::all)]

// Publicly visible items
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph_node;
pub mod playground;
pub mod profile;
pub mod report;
pub mod shapes;
pub mod transport;
pub mod types;
pub mod validator;

pub use classify::{classify, Classification, Level};
pub use config::{PageFailurePolicy, ValidationLimits};
pub use engine::{ConstraintEngine, CoreEngine};
pub use error::{Error, Result, TransportError};
pub use profile::{ProfileKey, ProfileRegistry, ValidationProfile, PROFILES};
pub use report::{ValidationReport, ValidationResult};
pub use transport::{HttpConfig, HttpTransport, Transport};
pub use types::{CubeReference, Severity, Termination};
pub use validator::until_cancelled;

// Internal modules.
pub mod canonicalization;
pub mod fetch;
pub(crate) mod named_nodes;
pub(crate) mod query;
pub mod rdf;
pub mod test_utils; // pub for integration tests

use crate::fetch::ChunkedFetcher;
use crate::graph_node::CubeMetadata;
use crate::validator::{CubeLevelValidator, IncrementalValidator};
use log::info;
use std::sync::Arc;

/// A simple facade over the validation pipeline.
///
/// It bundles a transport, a constraint engine and a profile registry. Every call starts an
/// independent run; nothing is shared between runs except the immutable registry, so one
/// `CubeValidator` can drive any number of concurrent validations.
#[derive(Clone)]
pub struct CubeValidator {
    transport: Arc<dyn Transport>,
    engine: Arc<dyn ConstraintEngine>,
    profiles: &'static ProfileRegistry,
    limits: ValidationLimits,
}

impl CubeValidator {
    /// Creates a validator using the built-in engine and the standard profiles.
    ///
    /// # Arguments
    ///
    /// * `transport` - How the endpoint and shape documents are reached.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        CubeValidator {
            transport,
            engine: Arc::new(CoreEngine::new()),
            profiles: &PROFILES,
            limits: ValidationLimits::default(),
        }
    }

    /// Creates a validator talking HTTP with the given settings.
    pub fn over_http(config: HttpConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    pub fn with_engine(mut self, engine: Arc<dyn ConstraintEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_profiles(mut self, profiles: &'static ProfileRegistry) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Checks that the cube's endpoint answers.
    pub async fn ping(&self, cube: &CubeReference) -> Result<()> {
        transport::ping(self.transport.as_ref(), &cube.endpoint).await?;
        info!("Endpoint {} is reachable", cube.endpoint);
        Ok(())
    }

    /// Fetches the cube's descriptive metadata.
    pub async fn cube_metadata(&self, cube: &CubeReference) -> Result<CubeMetadata> {
        ChunkedFetcher::new(self.transport.clone())
            .fetch_cube_metadata(cube)
            .await
    }

    /// Every profile applicable to the cube, the default profile last.
    pub fn available_profiles(&self, metadata: &CubeMetadata) -> Vec<ValidationProfile> {
        self.profiles.available_profiles(metadata)
    }

    /// The profile a cube is validated against when the user does not pick one.
    pub fn resolve_profile(&self, metadata: &CubeMetadata) -> ValidationProfile {
        self.profiles.resolve(metadata)
    }

    /// Validates the cube's metadata and structure against `profile` in one shot.
    ///
    /// # Arguments
    ///
    /// * `cube` - The endpoint and cube IRI.
    /// * `profile` - The profile whose shape graph is applied.
    pub async fn validate_cube(
        &self,
        cube: &CubeReference,
        profile: &ValidationProfile,
    ) -> Result<ValidationReport> {
        CubeLevelValidator::new(self.transport.clone(), self.engine.clone())
            .validate_cube(cube, profile)
            .await
    }

    /// Validates the cube's observations page by page against its observation constraint,
    /// within the configured limits.
    pub async fn validate_observations(&self, cube: &CubeReference) -> Result<ValidationReport> {
        IncrementalValidator::new(self.transport.clone(), self.engine.clone(), self.limits)
            .validate_observations(cube)
            .await
    }
}
