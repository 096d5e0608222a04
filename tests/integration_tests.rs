//! Integration tests for who-cited
//!
//! These tests drive whole pipeline runs against mock providers, plus one
//! end-to-end run against mock HTTP servers through the real provider clients.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mockito::Matcher;
use tokio_util::sync::CancellationToken;
use who_cited::config::{Config, PipelineSettings};
use who_cited::io::write_records;
use who_cited::models::{Doi, Metadata, ProviderKind};
use who_cited::pipeline::{Pipeline, PipelineInput, PipelineState, RunOutcome};
use who_cited::sources::mock::make_citer;
use who_cited::sources::{MockSource, SourceCapabilities, SourceError, SourceRegistry};
use who_cited::utils::HttpClient;

fn settings(concurrency: usize) -> PipelineSettings {
    PipelineSettings {
        concurrency,
        ..PipelineSettings::default()
    }
}

fn registry(sources: Vec<Arc<MockSource>>) -> SourceRegistry {
    let mut registry = SourceRegistry::empty();
    for source in sources {
        registry.register(source);
    }
    registry
}

fn dois(values: &[&str]) -> PipelineInput {
    PipelineInput::Dois(values.iter().map(|v| v.to_string()).collect())
}

fn doi(value: &str) -> Doi {
    Doi::parse(value).unwrap()
}

fn listing(pages: &[&[&str]]) -> MockSource {
    pages.iter().fold(
        MockSource::new("listing").with_capabilities(SourceCapabilities::JOURNAL_LISTING),
        |source, page| source.with_listing_page(page.iter().copied()),
    )
}

#[tokio::test]
async fn test_same_citer_for_two_targets_yields_one_row() {
    let provider = Arc::new(
        MockSource::new("a")
            .with_citers("10.1/A", [make_citer("10.2/X", Some("Foo"), Some(2020))])
            .with_citers("10.1/B", [make_citer("10.2/X", None, Some(2020))]),
    );
    let pipeline = Pipeline::new(
        &registry(vec![provider]),
        &settings(2),
        CancellationToken::new(),
    );

    let report = pipeline.run(dois(&["10.1/A", "10.1/B"])).await;

    assert!(matches!(report.outcome, RunOutcome::Done));
    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.doi.as_str(), "10.2/x");
    assert_eq!(record.title(), Some("Foo"));
    assert_eq!(record.year(), Some(2020));
    assert_eq!(record.cites, vec![doi("10.1/a"), doi("10.1/b")]);
}

#[tokio::test]
async fn test_journal_mode_with_one_degraded_target() {
    let provider = Arc::new(
        MockSource::new("a")
            .fail_for("10.3/P1")
            .with_citers("10.3/P2", [make_citer("10.4/Q", Some("Q"), Some(2022))]),
    );
    let pipeline = Pipeline::new(
        &registry(vec![provider, Arc::new(listing(&[&["10.3/P1", "10.3/P2"]]))]),
        &settings(2),
        CancellationToken::new(),
    );

    let report = pipeline.run(PipelineInput::Journal("J297249".to_string())).await;

    assert!(matches!(report.outcome, RunOutcome::Done));
    assert_eq!(report.targets, vec![doi("10.3/p1"), doi("10.3/p2")]);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].doi.as_str(), "10.4/q");
    assert_eq!(report.degraded_targets(), vec![&doi("10.3/p1")]);
    assert!(matches!(
        report.failures[0].error,
        SourceError::ProviderUnavailable { .. }
    ));
    assert!(!report.is_failure());
}

#[tokio::test]
async fn test_journal_listing_failure_aborts_run() {
    let provider = Arc::new(
        MockSource::new("a").with_citers("10.3/p1", [make_citer("10.4/q", None, None)]),
    );
    let pipeline = Pipeline::new(
        &registry(vec![provider.clone(), Arc::new(listing(&[]).fail_listing())]),
        &settings(2),
        CancellationToken::new(),
    );

    let report = pipeline.run(PipelineInput::Journal("J297249".to_string())).await;

    assert_eq!(report.state(), PipelineState::Failed);
    assert!(report.records.is_empty());
    assert!(report.target_outcomes.is_empty());
    assert_eq!(provider.citer_calls(), 0);
    assert!(report.is_failure());
}

#[tokio::test]
async fn test_invalid_journal_id_fails_without_listing() {
    let listing = Arc::new(listing(&[&["10.3/p1"]]));
    let pipeline = Pipeline::new(
        &registry(vec![Arc::new(MockSource::new("a")), listing.clone()]),
        &settings(1),
        CancellationToken::new(),
    );

    let report = pipeline.run(PipelineInput::Journal("J12".to_string())).await;

    assert!(matches!(
        report.outcome,
        RunOutcome::Failed(SourceError::InvalidIdentifier(_))
    ));
    assert_eq!(listing.listing_calls(), 0);
}

#[tokio::test]
async fn test_journal_listing_is_paged_and_deduplicated() {
    let provider = Arc::new(MockSource::new("a"));
    let pipeline = Pipeline::new(
        &registry(vec![
            provider.clone(),
            Arc::new(listing(&[&["10.3/p1", "10.3/p2"], &["10.3/P2", "10.3/p3"]])),
        ]),
        &settings(1),
        CancellationToken::new(),
    );

    let report = pipeline.run(PipelineInput::Journal("j297249".to_string())).await;

    assert_eq!(
        report.targets,
        vec![doi("10.3/p1"), doi("10.3/p2"), doi("10.3/p3")]
    );
    assert_eq!(provider.citer_calls(), 3);
    assert!(report.records.is_empty());
    assert!(!report.is_failure());
}

#[tokio::test]
async fn test_duplicate_and_invalid_inputs() {
    let provider = Arc::new(
        MockSource::new("a").with_citers("10.1/a", [make_citer("10.2/x", Some("X"), None)]),
    );
    let pipeline = Pipeline::new(
        &registry(vec![provider.clone()]),
        &settings(2),
        CancellationToken::new(),
    );

    let report = pipeline
        .run(dois(&["10.1/a", "not a doi", "https://doi.org/10.1/A", "10.1/b"]))
        .await;

    assert_eq!(report.targets, vec![doi("10.1/a"), doi("10.1/b")]);
    assert_eq!(report.invalid_inputs.len(), 1);
    assert_eq!(report.invalid_inputs[0].input, "not a doi");
    assert_eq!(provider.citer_calls(), 2);
    assert_eq!(report.records.len(), 1);
}

#[tokio::test]
async fn test_failing_provider_does_not_hide_others() {
    let broken = Arc::new(MockSource::new("broken").fail_for("10.1/a"));
    let healthy = Arc::new(
        MockSource::new("healthy")
            .with_citers("10.1/a", [make_citer("10.2/y", Some("Y"), Some(2021))]),
    );
    let pipeline = Pipeline::new(
        &registry(vec![broken, healthy]),
        &settings(1),
        CancellationToken::new(),
    );

    let report = pipeline.run(dois(&["10.1/a"])).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].providers, vec![ProviderKind::Other("healthy".into())]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].provider, ProviderKind::Other("broken".into()));
    assert!(!report.is_failure());
}

#[tokio::test]
async fn test_zero_records_with_failures_is_a_failure() {
    let broken = Arc::new(MockSource::new("broken").fail_for("10.1/a"));
    let pipeline = Pipeline::new(&registry(vec![broken]), &settings(1), CancellationToken::new());

    let report = pipeline.run(dois(&["10.1/a"])).await;

    assert!(matches!(report.outcome, RunOutcome::Done));
    assert!(report.is_failure());
}

#[tokio::test]
async fn test_fields_are_never_replaced() {
    let first = Arc::new(
        MockSource::new("first")
            .with_citers("10.1/a", [make_citer("10.2/x", Some("Original"), None)])
            .with_citers("10.1/b", [make_citer("10.2/x", Some("Later"), Some(1999))]),
    );
    let second = Arc::new(
        MockSource::new("second")
            .with_citers("10.1/a", [make_citer("10.2/x", Some("Second"), Some(2020))]),
    );
    let pipeline = Pipeline::new(
        &registry(vec![first, second]),
        &settings(3),
        CancellationToken::new(),
    );

    let report = pipeline.run(dois(&["10.1/a", "10.1/b"])).await;

    let record = &report.records[0];
    assert_eq!(record.title(), Some("Original"));
    assert_eq!(record.year(), Some(2020));
    assert_eq!(record.cites.len(), 2);
}

#[tokio::test]
async fn test_concurrency_does_not_change_results() {
    let build = || {
        Arc::new(
            MockSource::new("a")
                .with_citers(
                    "10.1/a",
                    [
                        make_citer("10.2/x", None, Some(2020)),
                        make_citer("10.2/y", Some("Y"), None),
                    ],
                )
                .with_citers("10.1/b", [make_citer("10.2/x", Some("From B"), None)])
                .with_citers(
                    "10.1/c",
                    [
                        make_citer("10.2/z", Some("Z"), Some(2001)),
                        make_citer("10.2/y", Some("Other"), Some(2002)),
                    ],
                ),
        )
    };
    let input = ["10.1/a", "10.1/b", "10.1/c"];

    let serial = Pipeline::new(&registry(vec![build()]), &settings(1), CancellationToken::new())
        .run(dois(&input))
        .await;
    let parallel = Pipeline::new(&registry(vec![build()]), &settings(8), CancellationToken::new())
        .run(dois(&input))
        .await;

    assert_eq!(serial.records, parallel.records);
    assert_eq!(serial.records.len(), 3);
}

#[tokio::test]
async fn test_later_harvests_progress_while_earlier_target_enriches() {
    let step = Duration::from_millis(200);
    let complete = |doi: &str| make_citer(doi, Some("Done"), Some(2020)).authors(["Ann Author"]);
    let links = Arc::new(
        MockSource::new("links")
            .with_citers("10.1/a", [make_citer("10.2/bare", None, None)])
            .with_citers(
                "10.1/b",
                [complete("10.2/b1"), complete("10.2/b2"), complete("10.2/b3")],
            )
            .with_latency(step),
    );
    let registry_source = Arc::new(
        MockSource::new("registry")
            .with_capabilities(SourceCapabilities::METADATA)
            .with_metadata(
                "10.2/bare",
                Metadata {
                    title: Some("Resolved".to_string()),
                    authors: vec!["Bo Author".to_string()],
                    year: Some(2018),
                },
            )
            .with_latency(step * 4),
    );
    let pipeline = Pipeline::new(
        &registry(vec![links, registry_source]),
        &settings(2),
        CancellationToken::new(),
    );

    let started = Instant::now();
    let report = pipeline.run(dois(&["10.1/a", "10.1/b"])).await;
    let elapsed = started.elapsed();

    // a: one step to harvest, four to enrich; b's three steps overlap with that
    assert!(elapsed < step * 6, "run took {:?}", elapsed);
    assert_eq!(report.records.len(), 4);
    assert_eq!(report.records[0].title(), Some("Resolved"));
    assert_eq!(report.target_outcomes[1].inserted, 3);
}

#[tokio::test]
async fn test_cancellation_keeps_partial_results() {
    let cancel = CancellationToken::new();
    let provider = Arc::new(
        MockSource::new("a")
            .with_citers("10.1/a", [make_citer("10.2/from-a", None, None)])
            .with_citers("10.1/b", [make_citer("10.2/from-b", None, None)])
            .with_citers("10.1/c", [make_citer("10.2/from-c", None, None)])
            .cancel_on("10.1/b", cancel.clone()),
    );
    let pipeline = Pipeline::new(&registry(vec![provider.clone()]), &settings(1), cancel);

    let report = pipeline.run(dois(&["10.1/a", "10.1/b", "10.1/c"])).await;

    assert_eq!(report.state(), PipelineState::Cancelled);
    let found: Vec<&str> = report.records.iter().map(|r| r.doi.as_str()).collect();
    assert_eq!(found, vec!["10.2/from-a", "10.2/from-b"]);
    assert_eq!(provider.citer_calls(), 2);
    assert!(!report.is_failure());
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let provider = Arc::new(
        MockSource::new("a").with_citers("10.1/a", [make_citer("10.2/x", None, None)]),
    );
    let pipeline = Pipeline::new(&registry(vec![provider.clone()]), &settings(1), cancel);

    let report = pipeline.run(dois(&["10.1/a"])).await;

    assert!(report.is_cancelled());
    assert!(report.records.is_empty());
    assert_eq!(provider.citer_calls(), 0);
}

#[tokio::test]
async fn test_metadata_enrichment_in_pipeline() {
    let citers = Arc::new(MockSource::new("links").with_citers(
        "10.1/a",
        [make_citer("10.2/bare", None, None), make_citer("10.2/unknown", None, None)],
    ));
    let registry_source = Arc::new(
        MockSource::new("registry")
            .with_capabilities(SourceCapabilities::METADATA)
            .with_metadata(
                "10.2/bare",
                Metadata {
                    title: Some("Resolved".to_string()),
                    authors: vec!["Ann Author".to_string()],
                    year: Some(2017),
                },
            ),
    );
    let pipeline = Pipeline::new(
        &registry(vec![citers, registry_source]),
        &settings(1),
        CancellationToken::new(),
    );

    let report = pipeline.run(dois(&["10.1/a"])).await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].title(), Some("Resolved"));
    assert_eq!(report.records[0].authors(), ["Ann Author".to_string()]);
    assert!(report.records[1].metadata.is_empty());
    assert_eq!(report.target_outcomes[0].metadata_misses, 1);
}

#[tokio::test]
async fn test_end_to_end_against_http_providers() {
    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let _work = server
        .mock("GET", "/works/doi:10.1/a")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"id": "https://openalex.org/W1", "cited_by_count": 1}"#)
        .create_async()
        .await;
    let _citers = server
        .mock("GET", "/works")
        .match_query(Matcher::UrlEncoded("filter".into(), "cites:W1".into()))
        .with_status(200)
        .with_body(
            r#"{
                "meta": {"next_cursor": null},
                "results": [{
                    "doi": "https://doi.org/10.2/X",
                    "title": "Foo",
                    "publication_year": 2020,
                    "authorships": [{"author": {"display_name": "Jane Doe"}}]
                }]
            }"#,
        )
        .create_async()
        .await;
    let _links = server
        .mock("GET", "/coci/citations/10.1/a")
        .with_status(200)
        .with_body(r#"[{"citing": "10.2/x"}, {"citing": "10.2/y", "creation": "2019-01"}]"#)
        .create_async()
        .await;
    let metadata = server
        .mock("GET", "/crossref/works/10.2/y")
        .with_status(200)
        .with_body(
            r#"{"message": {"title": ["Bar"], "author": [{"given": "Ann", "family": "Author"}]}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let mut config = Config::default();
    config.providers.openalex.base_url = url.clone();
    config.providers.openalex.min_interval_ms = 0;
    config.providers.opencitations.base_url = format!("{}/coci", url);
    config.providers.opencitations.min_interval_ms = 0;
    config.providers.crossref.base_url = format!("{}/crossref", url);
    config.providers.crossref.min_interval_ms = 0;

    let cancel = CancellationToken::new();
    let registry =
        SourceRegistry::from_config(&config, HttpClient::new().unwrap(), cancel.clone()).unwrap();
    let pipeline = Pipeline::new(&registry, &config.pipeline, cancel);

    let report = pipeline.run(dois(&["https://doi.org/10.1/A"])).await;

    assert!(matches!(report.outcome, RunOutcome::Done));
    assert!(report.failures.is_empty());
    metadata.assert_async().await;

    let mut buffer = Vec::new();
    write_records(&mut buffer, &report.records, false).unwrap();
    assert_eq!(
        String::from_utf8(buffer).unwrap(),
        "DOI,Title,Authors,Year\n\
         10.2/x,Foo,Jane Doe,2020\n\
         10.2/y,Bar,Ann Author,2019\n"
    );
    assert_eq!(
        report.records[0].providers,
        vec![ProviderKind::OpenAlex, ProviderKind::OpenCitations]
    );
}
