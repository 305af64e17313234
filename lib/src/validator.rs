//! The paginated observation run and the one-shot cube run.
use crate::config::{PageFailurePolicy, ValidationLimits};
use crate::engine::ConstraintEngine;
use crate::error::{Error, Result};
use crate::fetch::ChunkedFetcher;
use crate::profile::ValidationProfile;
use crate::rdf::merge_into;
use crate::report::{ReportAggregator, ValidationReport, ValidationResult};
use crate::shapes::ShapeGraphLoader;
use crate::transport::Transport;
use crate::types::{CubeReference, Termination};
use log::{debug, info, warn};
use oxigraph::model::Graph;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Counters of one paginated run. Never shared between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// The next page to fetch.
    pub page_index: u64,
    pub chunk_size: u64,
    pub accumulated_violation_count: u64,
    /// Non-empty pages validated so far.
    pub pages_fetched: u64,
}

impl PaginationState {
    pub fn new(chunk_size: u64) -> Self {
        PaginationState {
            page_index: 0,
            chunk_size: chunk_size.max(1),
            accumulated_violation_count: 0,
            pages_fetched: 0,
        }
    }

    /// Counts a validated page and moves to the next one.
    pub fn record_page(&mut self, violations: usize) {
        self.accumulated_violation_count += violations as u64;
        self.pages_fetched += 1;
        self.page_index += 1;
    }

    /// The ceiling that stops the run now, if any. Checked only between pages.
    pub fn ceiling(&self, limits: &ValidationLimits) -> Option<Termination> {
        if self.accumulated_violation_count >= limits.max_violations() {
            Some(Termination::ViolationCeiling)
        } else if self.pages_fetched >= limits.max_pages() {
            Some(Termination::PageCeiling)
        } else {
            None
        }
    }

    /// Whether the page currently being processed is the last one the page ceiling allows.
    pub fn at_last_page(&self, limits: &ValidationLimits) -> bool {
        self.pages_fetched + 1 >= limits.max_pages()
    }
}

/// A fetch of the next page running while the current one is validated.
///
/// Dropping it aborts the request, so a run that stops or is cancelled leaves nothing behind.
struct Prefetch {
    page_index: u64,
    handle: JoinHandle<Result<Graph>>,
}

impl Prefetch {
    fn spawn(fetcher: ChunkedFetcher, cube: CubeReference, page_index: u64, chunk_size: u64) -> Self {
        debug!("Prefetching page {} of {}", page_index, cube.cube);
        let handle =
            tokio::spawn(async move { fetcher.fetch_page(&cube, page_index, chunk_size).await });
        Prefetch { page_index, handle }
    }

    async fn join(mut self) -> Result<Graph> {
        match (&mut self.handle).await {
            Ok(page) => page,
            Err(e) => Err(Error::Engine(format!(
                "prefetch of page {} did not complete: {}",
                self.page_index, e
            ))),
        }
    }
}

impl Drop for Prefetch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

enum RunState {
    Loading,
    Continuing(ReportAggregator),
    Validating(ReportAggregator, Graph),
    Done(ReportAggregator, Termination),
    Failed(Error),
}

/// Validates a cube's observations page by page against its own observation constraint.
#[derive(Clone)]
pub struct IncrementalValidator {
    fetcher: ChunkedFetcher,
    loader: ShapeGraphLoader,
    engine: Arc<dyn ConstraintEngine>,
    limits: ValidationLimits,
}

impl IncrementalValidator {
    pub fn new(
        transport: Arc<dyn Transport>,
        engine: Arc<dyn ConstraintEngine>,
        limits: ValidationLimits,
    ) -> Self {
        IncrementalValidator {
            fetcher: ChunkedFetcher::new(transport.clone()),
            loader: ShapeGraphLoader::new(transport),
            engine,
            limits,
        }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Runs the paginated validation of `cube`.
    ///
    /// Pages are fetched in order until one comes back empty or a ceiling trips. Ceilings are
    /// checked after a page is fully validated, so the page that crosses one is still part of
    /// the report. A failing page fails the run unless the limits ask to keep partial reports.
    pub async fn validate_observations(&self, cube: &CubeReference) -> Result<ValidationReport> {
        let limits = &self.limits;
        let mut pagination = PaginationState::new(limits.chunk_size());
        let mut prefetch: Option<Prefetch> = None;
        let mut state = RunState::Loading;

        loop {
            state = match state {
                RunState::Loading => match self.loader.load_for_observation_constraint(cube).await {
                    Ok(shapes) => RunState::Continuing(ReportAggregator::new(shapes)),
                    Err(e) => RunState::Failed(e),
                },
                RunState::Continuing(aggregator) => {
                    let page = match prefetch.take() {
                        Some(pending) => pending.join().await,
                        None => {
                            self.fetcher
                                .fetch_page(cube, pagination.page_index, pagination.chunk_size)
                                .await
                        }
                    };
                    match page {
                        Ok(page) if page.is_empty() => {
                            RunState::Done(aggregator, Termination::Exhausted)
                        }
                        Ok(page) => {
                            if limits.prefetch() && !pagination.at_last_page(limits) {
                                prefetch = Some(Prefetch::spawn(
                                    self.fetcher.clone(),
                                    cube.clone(),
                                    pagination.page_index + 1,
                                    pagination.chunk_size,
                                ));
                            }
                            RunState::Validating(aggregator, page)
                        }
                        Err(e) => match limits.on_page_failure() {
                            PageFailurePolicy::Discard => RunState::Failed(e),
                            PageFailurePolicy::KeepPartial => {
                                warn!(
                                    "Page {} of {} failed; keeping the {} violation(s) found so far: {}",
                                    pagination.page_index,
                                    cube.cube,
                                    aggregator.violation_count(),
                                    e
                                );
                                RunState::Done(
                                    aggregator,
                                    Termination::Interrupted {
                                        page_index: pagination.page_index,
                                        reason: e.to_string(),
                                    },
                                )
                            }
                        },
                    }
                }
                RunState::Validating(mut aggregator, page) => {
                    let shapes = aggregator.shape_graph().graph().clone();
                    match evaluate(self.engine.clone(), shapes, page).await {
                        Ok((page, results)) => {
                            let found = results.len();
                            aggregator.absorb(&page, results);
                            pagination.record_page(found);
                            debug!(
                                "Page {} of {}: {} violation(s), {} in total",
                                pagination.page_index - 1,
                                cube.cube,
                                found,
                                pagination.accumulated_violation_count
                            );
                            match pagination.ceiling(limits) {
                                Some(termination) => {
                                    prefetch = None;
                                    RunState::Done(aggregator, termination)
                                }
                                None => RunState::Continuing(aggregator),
                            }
                        }
                        Err(e) => RunState::Failed(e),
                    }
                }
                RunState::Done(aggregator, termination) => {
                    info!(
                        "Validated {} page(s) of {}: {} violation(s), {}",
                        pagination.pages_fetched,
                        cube.cube,
                        pagination.accumulated_violation_count,
                        termination
                    );
                    return Ok(aggregator.finish(termination));
                }
                RunState::Failed(e) => return Err(e),
            };
        }
    }
}

/// Validates a cube's own metadata and structure against a profile in one pass.
#[derive(Clone)]
pub struct CubeLevelValidator {
    fetcher: ChunkedFetcher,
    loader: ShapeGraphLoader,
    engine: Arc<dyn ConstraintEngine>,
}

impl CubeLevelValidator {
    pub fn new(transport: Arc<dyn Transport>, engine: Arc<dyn ConstraintEngine>) -> Self {
        CubeLevelValidator {
            fetcher: ChunkedFetcher::new(transport.clone()),
            loader: ShapeGraphLoader::new(transport),
            engine,
        }
    }

    /// Validates the cube graph plus one real observation against `profile`.
    ///
    /// The observation keeps engines from reporting an empty observation set on metadata that
    /// is otherwise fine.
    pub async fn validate_cube(
        &self,
        cube: &CubeReference,
        profile: &ValidationProfile,
    ) -> Result<ValidationReport> {
        let shapes = self.loader.load_for_profile(profile).await?;
        let mut data = self.fetcher.fetch_cube_graph(cube).await?;
        match self.fetcher.fetch_first_observation(cube).await? {
            Some(observation) => merge_into(&mut data, &observation),
            None => warn!("Cube {} has no observations", cube.cube),
        }

        let (data, results) =
            evaluate(self.engine.clone(), shapes.graph().clone(), data).await?;
        info!(
            "Cube {} against profile '{}': {} result(s)",
            cube.cube,
            profile.key,
            results.len()
        );
        let mut aggregator = ReportAggregator::new(shapes);
        aggregator.absorb(&data, results);
        Ok(aggregator.finish(Termination::Exhausted))
    }
}

/// Runs the engine on the blocking pool so a large page does not stall the runtime.
///
/// The data graph is handed back with the results.
async fn evaluate(
    engine: Arc<dyn ConstraintEngine>,
    shapes: Graph,
    data: Graph,
) -> Result<(Graph, Vec<ValidationResult>)> {
    let task = tokio::task::spawn_blocking(move || {
        let results = engine.results(&shapes, &data);
        (data, results)
    });
    match task.await {
        Ok((data, Ok(results))) => Ok((data, results)),
        Ok((_, Err(e))) => Err(Error::Engine(e)),
        Err(e) => Err(Error::Engine(format!("constraint engine task failed: {}", e))),
    }
}

/// Drives `run` unless `cancel` resolves first.
///
/// A cancelled run yields `None`: no partial report, and dropping the run aborts its in-flight
/// requests and prefetch.
pub async fn until_cancelled<F, C>(run: F, cancel: C) -> Option<F::Output>
where
    F: Future,
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = cancel => {
            info!("Validation run cancelled");
            None
        }
        output = run => Some(output),
    }
}
