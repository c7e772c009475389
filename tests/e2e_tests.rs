//! End-to-end tests of the load engine against a real HTTP server
//!
//! These go through the public library API: configuration, request
//! preparation, the reqwest client, the scheduler and the aggregator.

use async_trait::async_trait;
use http_load_tester::{
    client::{HttpClient, HttpResponse, PreparedRequest, ReqwestClient},
    error::{AppError, Result},
    models::{Config, RequestBody, RequestSpec, ScenarioConfig, Stage, StatusExpectation, ThresholdRule},
    ScenarioScheduler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Wraps the real client and tracks how many requests overlap
struct CountingClient {
    inner: ReqwestClient,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingClient {
    fn new(timeout: Duration) -> Self {
        Self {
            inner: ReqwestClient::new(timeout).unwrap(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpClient for CountingClient {
    async fn execute(&self, request: &PreparedRequest) -> Result<HttpResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.execute(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn client() -> Arc<ReqwestClient> {
    Arc::new(ReqwestClient::new(Duration::from_secs(5)).unwrap())
}

fn rules(expressions: &[&str]) -> Vec<ThresholdRule> {
    ThresholdRule::parse_all(expressions).unwrap()
}

#[tokio::test]
async fn test_default_scenario_shape_against_gateway_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("data-source", "gatewayB"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let scenario = ScenarioConfig::constant(5, Duration::from_millis(500)).unwrap();
    let spec = RequestSpec::get(format!("{}/users?data-source=gatewayB", server.uri()));

    let result = ScenarioScheduler::new(scenario, client())
        .with_thresholds(rules(&["failure_rate<0.01", "count>=1"]))
        .run(&spec)
        .await
        .unwrap();

    let report = &result.report;
    assert!(report.total_requests > 0);
    assert_eq!(report.failed_requests, 0);
    assert_eq!(report.failure_rate, 0.0);
    assert_eq!(result.emitted(), report.total_requests);
    assert_eq!(report.status_codes[&200], report.total_requests);
    assert!(report.peak_vus <= 5);
    assert!(report.passed);
    assert!(report.latency.min_ms <= report.latency.p50_ms);
    assert!(report.latency.p50_ms <= report.latency.p99_ms);
    assert!(report.latency.p99_ms <= report.latency.max_ms);
}

#[tokio::test]
async fn test_live_requests_never_exceed_concurrency() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(30)))
        .mount(&server)
        .await;

    let counting = Arc::new(CountingClient::new(Duration::from_secs(5)));
    let scenario = ScenarioConfig::ramping(vec![
        Stage::new(Duration::from_millis(300), 3),
        Stage::new(Duration::from_millis(300), 6),
        Stage::new(Duration::from_millis(300), 2),
    ])
    .unwrap();

    let result = ScenarioScheduler::new(scenario, counting.clone())
        .run(&RequestSpec::get(server.uri()))
        .await
        .unwrap();

    assert!(counting.peak.load(Ordering::SeqCst) <= 6);
    assert_eq!(result.report.peak_vus, 6);
    assert_eq!(result.emitted(), result.report.total_requests);
}

#[tokio::test]
async fn test_form_body_and_custom_headers_reach_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/create"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(header("authorization", "Bearer token"))
        .and(body_string("username=teste&password=123"))
        .respond_with(ResponseTemplate::new(201))
        .expect(6)
        .mount(&server)
        .await;

    let body = RequestBody::form_from_json(&serde_json::json!({"username": "teste", "password": "123"})).unwrap();
    let spec = RequestSpec::post(format!("{}/users/create", server.uri()))
        .with_body(body)
        .with_header("Authorization", "Bearer token");

    let scenario = ScenarioConfig::per_vu_iterations(3, 2, Duration::from_secs(30)).unwrap();
    let report = ScenarioScheduler::new(scenario, client())
        .with_expectation(StatusExpectation::new(vec![201]))
        .with_thresholds(rules(&["count==6", "failure_rate==0"]))
        .execute(&spec)
        .await
        .unwrap();

    assert_eq!(report.successful_requests, 6);
    assert!(report.passed);
}

#[tokio::test]
async fn test_unexpected_status_is_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let scenario = ScenarioConfig::per_vu_iterations(2, 5, Duration::from_secs(30)).unwrap();
    let report = ScenarioScheduler::new(scenario, client())
        .with_thresholds(rules(&["failure_rate<0.01"]))
        .execute(&RequestSpec::get(server.uri()))
        .await
        .unwrap();

    assert_eq!(report.total_requests, 10);
    assert_eq!(report.failed_requests, 10);
    assert_eq!(report.status_codes[&503], 10);
    assert_eq!(report.errors["http_failure"], 10);
    assert!(!report.passed);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_unreachable_target_counts_every_attempt_as_failed() {
    let scenario = ScenarioConfig::per_vu_iterations(2, 3, Duration::from_secs(30)).unwrap();
    let report = ScenarioScheduler::new(scenario, client())
        .with_thresholds(rules(&["failure_rate<0.01"]))
        .execute(&RequestSpec::get("http://127.0.0.1:1/users"))
        .await
        .unwrap();

    assert_eq!(report.total_requests, 6);
    assert_eq!(report.failed_requests, report.total_requests);
    assert_eq!(report.failure_rate, 1.0);
    assert_eq!(report.status_codes[&0], 6);
    assert!(!report.passed);
}

#[tokio::test]
async fn test_slow_responses_time_out_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = Arc::new(ReqwestClient::new(Duration::from_millis(100)).unwrap());
    let scenario = ScenarioConfig::per_vu_iterations(1, 2, Duration::from_secs(30)).unwrap();
    let report = ScenarioScheduler::new(scenario, client)
        .execute(&RequestSpec::get(server.uri()))
        .await
        .unwrap();

    assert_eq!(report.total_requests, 2);
    assert_eq!(report.errors["timeout"], 2);
}

#[tokio::test]
async fn test_hard_stop_records_abandoned_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let scenario = ScenarioConfig::constant(2, Duration::from_millis(200))
        .unwrap()
        .with_graceful_stop(Duration::from_millis(100));
    let result = ScenarioScheduler::new(scenario, client())
        .run(&RequestSpec::get(server.uri()))
        .await
        .unwrap();

    let report = &result.report;
    assert_eq!(report.total_requests, 2);
    assert_eq!(report.errors["abandoned"], 2);
    assert_eq!(report.iterations, 0);
    assert_eq!(result.emitted(), 2);
}

#[tokio::test]
async fn test_external_stop_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(10)))
        .mount(&server)
        .await;

    let stop = CancellationToken::new();
    let scenario = ScenarioConfig::constant(3, Duration::from_secs(120)).unwrap();
    let scheduler = ScenarioScheduler::new(scenario, client()).with_stop_token(stop.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        stop.cancel();
    });

    let started = std::time::Instant::now();
    let report = scheduler.execute(&RequestSpec::get(server.uri())).await.unwrap();
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(report.total_requests > 0);
    assert_eq!(report.failed_requests, 0);
}

#[tokio::test]
async fn test_config_drives_a_full_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.url = format!("{}/users?data-source=gatewayB", server.uri());
    config.vus = 3;
    config.set_iterations(4);
    config.pause = Some(Duration::from_millis(10));
    config.thresholds = vec!["failure_rate<0.01".into(), "p95<2s".into(), "count==12".into()];
    config.validate().unwrap();

    let report = ScenarioScheduler::new(config.scenario().unwrap(), client())
        .with_thresholds(config.threshold_rules().unwrap())
        .with_expectation(config.status_expectation())
        .execute(&config.request_spec().unwrap())
        .await
        .unwrap();

    assert_eq!(report.total_requests, 12);
    assert_eq!(report.iterations, 12);
    assert_eq!(report.thresholds.len(), 3);
    assert!(report.thresholds.iter().all(|t| t.passed));
}

#[tokio::test]
async fn test_encoding_error_aborts_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let spec = RequestSpec::post(server.uri()).with_header("Bad Header", "x");
    let scenario = ScenarioConfig::per_vu_iterations(1, 1, Duration::from_secs(5)).unwrap();
    let err = ScenarioScheduler::new(scenario, client()).execute(&spec).await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)));

    let err = RequestBody::form_from_json(&serde_json::json!({"nested": {"a": 1}})).unwrap_err();
    assert!(matches!(err, AppError::Encoding(_)));
}
