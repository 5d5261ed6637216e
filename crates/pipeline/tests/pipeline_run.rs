//! End-to-end tests for `Pipeline::run`.
//!
//! The fetch side is either a scripted `QuoteSource` or the real client against
//! a wiremock server; storage is the in-memory store, which shares the
//! replace-on-conflict semantics of the Postgres repository.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_client::{AlphaVantageClient, FetchOutcome, QuoteRequest, QuoteSource, RetryPolicy};
use async_trait::async_trait;
use chrono::NaiveDate;
use configuration::{ApiSettings, ParserSettings};
use core_types::QuoteRow;
use database::{MemoryConnector, MemoryQuoteStore};
use pipeline::{Pipeline, PipelineConfig, PipelineResult};
use serde_json::{json, Value};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A `QuoteSource` that always answers with the same outcome and counts calls.
struct ScriptedSource {
    outcome: FetchOutcome,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(outcome: FetchOutcome) -> Arc<Self> {
        Arc::new(Self { outcome, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch_daily(&self, _request: &QuoteRequest) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

fn config(api_key: Option<&str>) -> PipelineConfig {
    PipelineConfig {
        api_key: api_key.map(str::to_string),
        symbol: "GOOG".to_string(),
        parser: ParserSettings::default(),
    }
}

fn daily_payload(close: &str) -> Value {
    json!({
        "Meta Data": { "2. Symbol": "GOOG" },
        "Time Series (Daily)": {
            "2024-01-02": { "1. open": "10", "2. high": "12", "3. low": "9", "4. close": close, "5. volume": "1000" },
            "2024-01-03": { "1. open": "11", "2. high": "13", "3. low": "10", "4. close": "12", "5. volume": "2000" }
        }
    })
}

fn pipeline(
    api_key: Option<&str>,
    source: Arc<dyn QuoteSource>,
    connector: &MemoryConnector,
) -> Pipeline {
    Pipeline::new(config(api_key), source, Arc::new(connector.clone()))
}

#[tokio::test]
async fn missing_api_key_is_a_config_error_without_network_calls() {
    let source = ScriptedSource::new(FetchOutcome::Success(daily_payload("11")));
    let connector = MemoryConnector::new(MemoryQuoteStore::new());

    for key in [None, Some(""), Some("   ")] {
        let result = pipeline(key, source.clone(), &connector).run().await;
        assert!(matches!(result, PipelineResult::ConfigError { .. }), "key {key:?}");
    }

    assert_eq!(source.calls(), 0);
    assert_eq!(connector.connections(), 0);
}

#[tokio::test]
async fn fetch_outcomes_map_to_results() {
    let connector = MemoryConnector::new(MemoryQuoteStore::new());

    let result = pipeline(Some("k"), ScriptedSource::new(FetchOutcome::ExhaustedRetries { attempts: 3 }), &connector)
        .run()
        .await;
    assert_eq!(result, PipelineResult::FetchError { reason: "fetch failed after 3 attempts".to_string() });

    let result = pipeline(Some("k"), ScriptedSource::new(FetchOutcome::ApiError("Invalid API call.".to_string())), &connector)
        .run()
        .await;
    assert_eq!(result, PipelineResult::FetchError { reason: "Invalid API call.".to_string() });

    let result = pipeline(Some("k"), ScriptedSource::new(FetchOutcome::RateLimited("5 per minute".to_string())), &connector)
        .run()
        .await;
    assert_eq!(result, PipelineResult::RateLimited { message: "5 per minute".to_string() });

    assert_eq!(connector.connections(), 0);
}

#[tokio::test]
async fn parse_failure_stops_before_storage() {
    let connector = MemoryConnector::new(MemoryQuoteStore::new());
    let source = ScriptedSource::new(FetchOutcome::Success(json!({ "Meta Data": {} })));

    let result = pipeline(Some("k"), source, &connector).run().await;

    assert!(matches!(result, PipelineResult::ParseError { .. }));
    assert_eq!(connector.connections(), 0);
}

#[tokio::test]
async fn empty_series_succeeds_with_zero_rows_and_no_connection() {
    let connector = MemoryConnector::new(MemoryQuoteStore::new());
    let source = ScriptedSource::new(FetchOutcome::Success(json!({ "Time Series (Daily)": {} })));

    let result = pipeline(Some("k"), source, &connector).run().await;

    assert_eq!(result, PipelineResult::Success { rows: 0 });
    assert_eq!(connector.connections(), 0);
}

#[tokio::test]
async fn refused_connection_is_a_storage_error() {
    let connector = MemoryConnector::refusing(MemoryQuoteStore::new());
    let source = ScriptedSource::new(FetchOutcome::Success(daily_payload("11")));

    let result = pipeline(Some("k"), source, &connector).run().await;

    assert!(matches!(result, PipelineResult::StorageError { .. }));
    assert!(connector.store().rows().await.is_empty());
}

#[tokio::test]
async fn failed_write_is_a_storage_error_and_still_closes_the_store() {
    let store = MemoryQuoteStore::new();
    store.fail_writes(true).await;
    let connector = MemoryConnector::new(store.clone());
    let source = ScriptedSource::new(FetchOutcome::Success(daily_payload("11")));

    let result = pipeline(Some("k"), source, &connector).run().await;

    assert!(matches!(result, PipelineResult::StorageError { .. }));
    assert_eq!(store.closes().await, 1);
    assert!(store.rows().await.is_empty());
}

#[tokio::test]
async fn rerunning_keeps_one_row_per_day_with_latest_values() {
    let store = MemoryQuoteStore::new();
    let connector = MemoryConnector::new(store.clone());

    let first = pipeline(Some("k"), ScriptedSource::new(FetchOutcome::Success(daily_payload("11"))), &connector)
        .run()
        .await;
    let second = pipeline(Some("k"), ScriptedSource::new(FetchOutcome::Success(daily_payload("11.5"))), &connector)
        .run()
        .await;

    assert_eq!(first, PipelineResult::Success { rows: 2 });
    assert_eq!(second, PipelineResult::Success { rows: 2 });

    let rows = store.rows().await;
    assert_eq!(rows.len(), 2);
    let jan_2 = rows
        .iter()
        .find(|r| r.date == NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        .unwrap();
    assert_eq!(jan_2.close, 11.5);
    assert_eq!(jan_2.adjusted_close, 11.5);
    assert_eq!(store.closes().await, 2);
}

#[tokio::test]
async fn identical_runs_converge_to_the_same_state() {
    let store = MemoryQuoteStore::new();
    let connector = MemoryConnector::new(store.clone());
    let source = ScriptedSource::new(FetchOutcome::Success(daily_payload("11")));
    let run = pipeline(Some("k"), source, &connector);

    let (a, b) = tokio::join!(run.run(), run.run());

    assert_eq!(a, PipelineResult::Success { rows: 2 });
    assert_eq!(b, PipelineResult::Success { rows: 2 });
    assert_eq!(store.rows().await.len(), 2);
}

fn wiremock_client(server: &MockServer) -> Arc<AlphaVantageClient> {
    let settings = ApiSettings { base_url: format!("{}/query", server.uri()), ..ApiSettings::default() };
    Arc::new(
        AlphaVantageClient::new(&settings)
            .unwrap()
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10))),
    )
}

#[tokio::test]
async fn transport_failing_every_attempt_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;
    let connector = MemoryConnector::new(MemoryQuoteStore::new());

    let result = pipeline(Some("k"), wiremock_client(&server), &connector).run().await;

    assert!(matches!(result, PipelineResult::FetchError { .. }));
    assert_eq!(connector.connections(), 0);
}

#[tokio::test]
async fn reference_payload_is_stored_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Time Series (Daily)": {
                "2024-01-02": { "1. open": "10", "2. high": "12", "3. low": "9", "4. close": "11", "5. volume": "1000" }
            }
        })))
        .mount(&server)
        .await;
    let store = MemoryQuoteStore::new();
    let connector = MemoryConnector::new(store.clone());

    let result = pipeline(Some("k"), wiremock_client(&server), &connector).run().await;

    assert_eq!(result, PipelineResult::Success { rows: 1 });
    assert_eq!(
        store.rows().await,
        vec![QuoteRow {
            symbol: "GOOG".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 11.0,
            adjusted_close: 11.0,
            volume: 1000,
        }]
    );
}
