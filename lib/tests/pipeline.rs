use cube_validator::classify::classify;
use cube_validator::rdf::parse_turtle;
use cube_validator::test_utils::{MockRequest, MockTransport};
use cube_validator::{
    until_cancelled, CubeReference, CubeValidator, Error, Level, PageFailurePolicy, ProfileKey,
    Termination, Transport, ValidationLimits, ValidationProfile, PROFILES,
};
use oxigraph::model::{Graph, NamedNode, NamedOrBlankNodeRef};
use std::sync::Arc;

const PREFIXES: &str = r#"
@prefix cube: <https://cube.link/> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix schema: <http://schema.org/> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <http://example.com/> .
"#;

fn turtle(body: &str) -> Graph {
    parse_turtle(&format!("{}{}", PREFIXES, body), None).unwrap()
}

fn cube() -> CubeReference {
    CubeReference::parse("http://example.com/sparql", "http://example.com/cube").unwrap()
}

fn constraint() -> Graph {
    turtle(
        r#"
ex:shape a cube:Constraint, sh:NodeShape ;
    sh:property [ sh:path ex:year ; sh:minCount 1 ; sh:datatype xsd:gYear ] ,
                [ sh:path ex:value ; sh:datatype xsd:decimal ] .
"#,
    )
}

/// `count` observations; those for which `invalid` holds lack their year.
fn observations(count: usize, invalid: impl Fn(usize) -> bool) -> Vec<Graph> {
    (0..count)
        .map(|i| {
            let year = if invalid(i) {
                ""
            } else {
                "ex:year \"2020\"^^xsd:gYear ;"
            };
            turtle(&format!(
                "<http://example.com/obs/{:04}> a cube:Observation ; {} ex:value \"1.5\"^^xsd:decimal .",
                i, year
            ))
        })
        .collect()
}

/// 35 observations, the first three of every ten missing their year.
fn three_per_page() -> MockTransport {
    MockTransport::new()
        .with_constraint(constraint())
        .with_observations(observations(35, |i| i % 10 < 3))
}

fn validator(transport: Arc<MockTransport>, limits: ValidationLimits) -> CubeValidator {
    let transport: Arc<dyn Transport> = transport;
    CubeValidator::new(transport).with_limits(limits)
}

#[tokio::test]
async fn exhaustion_after_the_last_page() {
    let transport = Arc::new(three_per_page());
    let report = validator(transport.clone(), ValidationLimits::default())
        .validate_observations(&cube())
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.violations.len(), 12);
    assert!(!report.conforms);
    // Four pages with data, then the empty one that ends the run.
    assert_eq!(transport.pages_requested(), vec![0, 1, 2, 3, 4]);
    assert_eq!(
        transport.requests()[0],
        MockRequest::ObservationConstraint,
        "the shape graph is loaded before any page"
    );
}

#[tokio::test]
async fn a_page_crossing_the_violation_ceiling_is_kept_whole() {
    let transport = Arc::new(
        MockTransport::new()
            .with_constraint(constraint())
            .with_observations(observations(50, |_| true)),
    );
    let limits = ValidationLimits::default().with_max_violations(5);
    let report = validator(transport.clone(), limits)
        .validate_observations(&cube())
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::ViolationCeiling);
    assert_eq!(report.violations.len(), 10);
    assert_eq!(transport.pages_requested(), vec![0]);
}

#[tokio::test]
async fn page_ceiling_bounds_the_fetches() {
    for max_pages in 1..=4u64 {
        let transport = Arc::new(
            MockTransport::new()
                .with_constraint(constraint())
                .with_observations(observations(1000, |_| false)),
        );
        let limits = ValidationLimits::default().with_max_pages(max_pages);
        let report = validator(transport.clone(), limits)
            .validate_observations(&cube())
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::PageCeiling);
        assert!(report.conforms);
        assert_eq!(transport.pages_requested().len() as u64, max_pages);
    }
}

#[tokio::test]
async fn violation_count_grows_with_every_page() {
    let mut previous = 0;
    for max_pages in 1..=4u64 {
        let limits = ValidationLimits::default()
            .with_max_pages(max_pages)
            .with_max_violations(1000);
        let report = validator(Arc::new(three_per_page()), limits)
            .validate_observations(&cube())
            .await
            .unwrap();
        assert!(report.violations.len() >= previous);
        previous = report.violations.len();
    }
    assert_eq!(previous, 12);
}

#[tokio::test]
async fn a_cube_without_constraint_conforms_vacuously() {
    let transport = Arc::new(MockTransport::new().with_observations(observations(5, |_| true)));
    let report = validator(transport.clone(), ValidationLimits::default())
        .validate_observations(&cube())
        .await
        .unwrap();

    assert!(report.conforms);
    assert!(report.violations.is_empty());
    assert!(report.shape_graph.is_empty());
    // The data was still fetched and looked at.
    assert_eq!(transport.pages_requested(), vec![0, 1]);
    assert!(!report.data_graph.is_empty());
}

#[tokio::test]
async fn a_failing_page_discards_everything_by_default() {
    let transport = Arc::new(three_per_page().failing_at_page(2, 503));
    let err = validator(transport, ValidationLimits::default())
        .validate_observations(&cube())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(err.status(), Some(503));
    assert!(!err.is_configuration());
}

#[tokio::test]
async fn a_failing_page_can_keep_the_partial_report() {
    let transport = Arc::new(three_per_page().failing_at_page(2, 503));
    let limits =
        ValidationLimits::default().with_page_failure_policy(PageFailurePolicy::KeepPartial);
    let report = validator(transport, limits)
        .validate_observations(&cube())
        .await
        .unwrap();

    assert_eq!(report.violations.len(), 6);
    match &report.termination {
        Termination::Interrupted { page_index, reason } => {
            assert_eq!(*page_index, 2);
            assert!(reason.contains("503"));
        }
        other => panic!("unexpected termination {:?}", other),
    }
    assert!(!report.termination.is_policy());
}

#[tokio::test]
async fn prefetch_does_not_change_the_report() {
    let plain = validator(Arc::new(three_per_page()), ValidationLimits::default())
        .validate_observations(&cube())
        .await
        .unwrap();
    let transport = Arc::new(three_per_page());
    let prefetched = validator(
        transport.clone(),
        ValidationLimits::default().with_prefetch(true),
    )
    .validate_observations(&cube())
    .await
    .unwrap();

    assert_eq!(prefetched.violations.len(), plain.violations.len());
    assert_eq!(prefetched.termination, plain.termination);
    assert_eq!(prefetched.data_graph.len(), plain.data_graph.len());
    assert_eq!(transport.pages_requested(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn prefetch_stops_at_the_page_ceiling() {
    let transport = Arc::new(
        MockTransport::new()
            .with_constraint(constraint())
            .with_observations(observations(100, |_| false)),
    );
    let limits = ValidationLimits::default()
        .with_prefetch(true)
        .with_max_pages(2);
    let report = validator(transport.clone(), limits)
        .validate_observations(&cube())
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::PageCeiling);
    assert_eq!(transport.pages_requested(), vec![0, 1]);
}

#[tokio::test]
async fn violation_ceiling_aborts_the_pending_prefetch() {
    let transport = Arc::new(
        MockTransport::new()
            .with_constraint(constraint())
            .with_observations(observations(50, |_| true))
            .hanging_at_page(1),
    );
    let limits = ValidationLimits::default()
        .with_prefetch(true)
        .with_max_violations(5);
    let report = validator(transport.clone(), limits)
        .validate_observations(&cube())
        .await
        .unwrap();

    assert_eq!(report.termination, Termination::ViolationCeiling);
    assert_eq!(report.violations.len(), 10);
    let pages = transport.pages_requested();
    assert_eq!(pages[0], 0);
    assert!(pages.iter().all(|p| *p <= 1), "{:?}", pages);
    for _ in 0..100 {
        if transport.in_flight() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.in_flight(), 0);
}

#[tokio::test]
async fn cancelled_runs_produce_nothing_and_leave_nothing_in_flight() {
    let transport = Arc::new(three_per_page().hanging_at_page(1));
    let validator = validator(transport.clone(), ValidationLimits::default());
    let cube = cube();
    let watched = transport.clone();
    let cancel = async move {
        while watched.pages_requested().len() < 2 {
            tokio::task::yield_now().await;
        }
    };

    let outcome = until_cancelled(validator.validate_observations(&cube), cancel).await;
    assert!(outcome.is_none());
    assert_eq!(transport.pages_requested(), vec![0, 1]);
    assert_eq!(transport.in_flight(), 0);
}

#[tokio::test]
async fn cancelling_aborts_the_prefetch() {
    let transport = Arc::new(three_per_page().hanging_at_page(1));
    let validator = validator(
        transport.clone(),
        ValidationLimits::default().with_prefetch(true),
    );
    let cube = cube();
    let watched = transport.clone();
    let cancel = async move {
        while watched.pages_requested().len() < 2 {
            tokio::task::yield_now().await;
        }
    };

    assert!(until_cancelled(validator.validate_observations(&cube), cancel)
        .await
        .is_none());
    for _ in 0..100 {
        if transport.in_flight() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.in_flight(), 0);
}

#[tokio::test]
async fn concurrent_runs_are_independent() {
    let transport = Arc::new(three_per_page());
    let wide = validator(transport.clone(), ValidationLimits::default());
    let narrow = validator(transport.clone(), ValidationLimits::default().with_max_pages(1));
    let cube = cube();

    let (wide, narrow) = tokio::join!(
        wide.validate_observations(&cube),
        narrow.validate_observations(&cube)
    );
    let (wide, narrow) = (wide.unwrap(), narrow.unwrap());
    assert_eq!(wide.violations.len(), 12);
    assert_eq!(wide.termination, Termination::Exhausted);
    assert_eq!(narrow.violations.len(), 3);
    assert_eq!(narrow.termination, Termination::PageCeiling);
}

const VISUALIZE: &str = "https://cube.link/ref/main/shape/profile-visualize";
const IMPORTED: &str = "https://example.com/shapes/observation";

fn cube_graph(with_name: bool) -> Graph {
    let name = if with_name {
        "schema:name \"Temperature\"@en ;"
    } else {
        ""
    };
    turtle(&format!(
        r#"
ex:cube a cube:Cube ; {}
    schema:workExample <https://ld.admin.ch/application/visualize> ;
    cube:observationConstraint ex:shape .
ex:shape a cube:Constraint ;
    sh:property [ sh:path ex:year ; schema:name "Year"@en ; sh:minCount 1 ] .
"#,
        name
    ))
}

fn profile_documents(transport: MockTransport) -> MockTransport {
    transport
        .with_document(
            VISUALIZE,
            &format!(
                r#"{}
<{}> owl:imports <{}> .
ex:CubeShape a sh:NodeShape ;
    sh:targetClass cube:Cube ;
    sh:property [ sh:path schema:name ; sh:minCount 1 ; sh:severity sh:Warning ] .
"#,
                PREFIXES, VISUALIZE, IMPORTED
            ),
        )
        .with_document(
            IMPORTED,
            &format!(
                r#"{}
<{}> owl:imports <{}> .
ex:ObservationShape a sh:NodeShape ;
    sh:targetClass cube:Observation ;
    sh:property [ sh:path ex:year ; sh:minCount 1 ] .
"#,
                PREFIXES, IMPORTED, VISUALIZE
            ),
        )
}

#[tokio::test]
async fn cube_validation_injects_one_observation() {
    let transport = Arc::new(profile_documents(
        MockTransport::new()
            .with_cube_graph(cube_graph(false))
            .with_observations(observations(20, |_| false)),
    ));
    let validator = validator(transport.clone(), ValidationLimits::default());
    let cube = cube();

    let metadata = validator.cube_metadata(&cube).await.unwrap();
    let profile = validator.resolve_profile(&metadata);
    assert_eq!(profile.key, ProfileKey::Visualize);
    let available = validator.available_profiles(&metadata);
    assert_eq!(available.last().map(|p| p.key), Some(ProfileKey::Default));

    let report = validator.validate_cube(&cube, &profile).await.unwrap();
    // Both documents were merged; each fetched exactly once despite the import cycle.
    let documents: Vec<MockRequest> = transport
        .requests()
        .into_iter()
        .filter(|r| matches!(r, MockRequest::Document(_)))
        .collect();
    assert_eq!(documents.len(), 2);
    assert!(transport.requests().contains(&MockRequest::Page {
        page_index: 0,
        chunk_size: 1
    }));
    let observation = NamedNode::new_unchecked("http://example.com/obs/0000");
    assert!(report
        .data_graph
        .iter()
        .any(|t| t.subject == NamedOrBlankNodeRef::from(observation.as_ref())));

    // Only the missing name is reported; the injected observation conforms.
    assert_eq!(report.violations.len(), 1);
    let classification = classify(&report);
    assert_eq!(classification.cube.len(), 1);
    assert_eq!(classification.cube[0].level, Level::Warning);
    assert!(classification.dimensions.is_empty());

    let exported = report.export().unwrap();
    assert!(exported.report.contains("Warning"));
}

#[tokio::test]
async fn a_named_cube_passes_its_profile() {
    let transport = Arc::new(profile_documents(
        MockTransport::new()
            .with_cube_graph(cube_graph(true))
            .with_observations(observations(1, |_| false)),
    ));
    let report = validator(transport, ValidationLimits::default())
        .validate_cube(&cube(), PROFILES.get(ProfileKey::Visualize).unwrap())
        .await
        .unwrap();
    assert!(report.conforms);
    assert_eq!(report.termination, Termination::Exhausted);
}

#[tokio::test]
async fn a_missing_profile_document_is_a_configuration_error() {
    let transport = Arc::new(
        MockTransport::new()
            .with_status("http://example.com/missing-shapes", 404)
            .with_cube_graph(cube_graph(true)),
    );
    let profile =
        ValidationProfile::manual(NamedNode::new_unchecked("http://example.com/missing-shapes"));
    let err = validator(transport.clone(), ValidationLimits::default())
        .validate_cube(&cube(), &profile)
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(err.status(), Some(404));
    // Nothing else was attempted.
    assert!(!transport.requests().contains(&MockRequest::CubeGraph));
}

#[tokio::test]
async fn ping_reaches_the_endpoint() {
    let transport = Arc::new(MockTransport::new());
    validator(transport.clone(), ValidationLimits::default())
        .ping(&cube())
        .await
        .unwrap();
    assert_eq!(transport.requests(), vec![MockRequest::Ping]);
}
