/// Integration tests with mocked external APIs
/// Tests the proxy/cache path, upstream error propagation, the circuit
/// breaker, and the auth middleware without hitting real services.
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rust_insights_api::auth::TokenVerifier;
use rust_insights_api::cache::FileCache;
use rust_insights_api::config::Config;
use rust_insights_api::handlers::AppState;
use rust_insights_api::router::build_router;
use rust_insights_api::services::SyntageService;

/// Helper function to create test config
fn create_test_config(syntage_base_url: String) -> Config {
    Config {
        port: 8080,
        syntage_api_key: "test_key".to_string(),
        syntage_base_url,
        firebase_project_id: "demo-project".to_string(),
        allowed_origins: vec![],
        cache_file: "cache.json".to_string(),
        cache_ttl_secs: 300,
    }
}

async fn empty_cache(dir: &tempfile::TempDir) -> FileCache {
    FileCache::load(dir.path().join("cache.json"), Duration::from_secs(300)).await
}

#[tokio::test]
async fn test_proxy_fetch_and_cache_hit() {
    let mock_server = MockServer::start().await;

    let mock_response = json!({
        "data": { "liquidity": { "current_ratio": { "2024": "1.33" } } }
    });

    Mock::given(method("GET"))
        .and(path("/insights/biz-1/financial-ratios"))
        .and(header_matcher("X-API-Key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dir = tempfile::tempdir().unwrap();
    let cache = empty_cache(&dir).await;
    let service = SyntageService::new(&config);

    let first = service
        .fetch_insight(&cache, "insights/biz-1/financial-ratios")
        .await
        .unwrap();
    assert_eq!(first, mock_response);

    // Second call is served from the cache; the mock's expect(1) verifies
    // the upstream saw exactly one request.
    let second = service
        .fetch_insight(&cache, "insights/biz-1/financial-ratios")
        .await
        .unwrap();
    assert_eq!(second, mock_response);
}

#[tokio::test]
async fn test_upstream_status_propagated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/insights/missing/employees"))
        .respond_with(ResponseTemplate::new(404).set_body_string("entity not found"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dir = tempfile::tempdir().unwrap();
    let cache = empty_cache(&dir).await;
    let service = SyntageService::new(&config);

    let result = service
        .fetch_insight(&cache, "insights/missing/employees")
        .await;

    match result {
        Err(rust_insights_api::errors::AppError::UpstreamStatus { status, detail }) => {
            assert_eq!(status, 404);
            assert!(detail.contains("entity not found"));
        }
        other => panic!("Expected UpstreamStatus error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_failed_responses_are_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/insights/biz-2/employees"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dir = tempfile::tempdir().unwrap();
    let cache = empty_cache(&dir).await;
    let service = SyntageService::new(&config);

    for _ in 0..2 {
        let result = service
            .fetch_insight(&cache, "insights/biz-2/employees")
            .await;
        assert!(result.is_err());
    }
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_upstream_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let dir = tempfile::tempdir().unwrap();
    let cache = empty_cache(&dir).await;
    let service = SyntageService::new(&config);

    for i in 0..5 {
        let result = service
            .fetch_insight(&cache, &format!("insights/biz-{}/risks", i))
            .await;
        assert!(result.is_err());
    }

    // Circuit is open now: the next call is rejected without reaching the
    // upstream (the mock's expect(5) verifies).
    let rejected = service.fetch_insight(&cache, "insights/biz-9/risks").await;
    match rejected {
        Err(rust_insights_api::errors::AppError::ExternalApiError(msg)) => {
            assert!(msg.contains("temporarily unavailable"));
        }
        other => panic!("Expected fast-fail rejection, got {:?}", other.map(|_| ())),
    }
}

// ── Auth middleware over the full router ───────────────────────

/// Unsigned token with a plausible RS256 header (`kid: test-kid`) and
/// claims for `demo-project`; verification must fail at the signature.
const FAKE_RS256_TOKEN: &str = concat!(
    "eyJhbGciOiJSUzI1NiIsImtpZCI6InRlc3Qta2lkIn0",
    ".",
    "eyJzdWIiOiJ1c2VyLTEiLCJhdWQiOiJkZW1vLXByb2plY3QiLCJpc3MiOiJodHRwczovL3Nl",
    "Y3VyZXRva2VuLmdvb2dsZS5jb20vZGVtby1wcm9qZWN0IiwiZXhwIjo5OTk5OTk5OTk5fQ",
    ".",
    "c2lnbmF0dXJl"
);

async fn build_test_app(keys_url: String) -> axum::Router {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config("https://api.sandbox.syntage.com".to_string());
    let cache = empty_cache(&dir).await;
    let syntage = SyntageService::new(&config);
    let verifier = TokenVerifier::with_keys_url("demo-project".to_string(), keys_url);

    let state = Arc::new(AppState {
        config,
        cache,
        syntage,
        verifier,
    });
    build_router(state)
}

fn normalize_request(token: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method("POST")
        .uri("/map-to-evaluate-request")
        .header(header::CONTENT_TYPE, "application/json")
        // SmartIpKeyExtractor needs a client address for rate limiting
        .header("x-forwarded-for", "203.0.113.7");

    let builder = match token {
        Some(value) => builder.header(header::AUTHORIZATION, value),
        None => builder,
    };

    builder
        .body(Body::from(r#"{"summaryData": {"rfc": "x"}}"#))
        .unwrap()
}

#[tokio::test]
async fn test_health_bypasses_auth() {
    let app = build_test_app("http://127.0.0.1:0/keys".to_string()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_token_rejected_with_401() {
    let app = build_test_app("http://127.0.0.1:0/keys".to_string()).await;

    let response = app.oneshot(normalize_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
}

#[tokio::test]
async fn test_wrong_scheme_rejected_with_401() {
    let app = build_test_app("http://127.0.0.1:0/keys".to_string()).await;

    let response = app
        .oneshot(normalize_request(Some("Token abc123")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_rejected_with_403() {
    let app = build_test_app("http://127.0.0.1:0/keys".to_string()).await;

    let response = app
        .oneshot(normalize_request(Some("Bearer not-a-jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_signing_key_rejected_and_keys_cached() {
    let mock_server = MockServer::start().await;

    // Empty key set with a long max-age: the second verification must be
    // served from the verifier's cache (expect(1)).
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Cache-Control", "public, max-age=21600, must-revalidate")
                .set_body_json(json!({ "keys": [] })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let verifier = TokenVerifier::with_keys_url(
        "demo-project".to_string(),
        format!("{}/keys", mock_server.uri()),
    );

    for _ in 0..2 {
        let result = verifier.verify(FAKE_RS256_TOKEN).await;
        match result {
            Err(rust_insights_api::errors::AppError::Forbidden(msg)) => {
                assert!(msg.contains("Unknown signing key"));
            }
            other => panic!("Expected Forbidden, got {:?}", other.map(|_| ())),
        }
    }
}

#[tokio::test]
async fn test_bad_signature_rejected() {
    let mock_server = MockServer::start().await;

    // Key set carrying the token's kid with a structurally valid RSA
    // public key; the fake signature cannot verify against it.
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{
                "kid": "test-kid",
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "n": "xGKgQ3XA4S0Wn4mVYq9jzRGGlqmVUSpfrkc5kVqQvJxyP1fJk0Wn4mVYq9jzRGGlqmVUSpfrkc5kVqQvJxyP1fJk0Wn4mVYq9jzRGGlqmVUSpfrkc5kVqQvJxyP1fJk0Wn4mVYq9jzRGGlqmVUSpfrkc5kVqQvJxyP1fJk0Wn4mVYq9jzRGGlqmVUSpfrkc5kVqQvJxyP1fJk0Wn4mVYq9jzRGGlqmVUSpfrkc5kVqQvJxyP1fJw",
                "e": "AQAB"
            }]
        })))
        .mount(&mock_server)
        .await;

    let verifier = TokenVerifier::with_keys_url(
        "demo-project".to_string(),
        format!("{}/keys", mock_server.uri()),
    );

    let result = verifier.verify(FAKE_RS256_TOKEN).await;
    assert!(matches!(
        result,
        Err(rust_insights_api::errors::AppError::Forbidden(_))
    ));
}

// ── Normalize endpoint handlers (called directly) ──────────────

#[tokio::test]
async fn test_normalize_endpoint_requires_summary_section() {
    use axum::Json;
    use rust_insights_api::errors::AppError;
    use rust_insights_api::handlers::map_to_evaluate_request;

    for payload in [
        json!({}),
        json!({ "summaryData": null }),
        json!({ "summaryData": {} }),
        json!({ "financialRatiosData": {} }),
    ] {
        let result = map_to_evaluate_request(Json(payload)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}

#[tokio::test]
async fn test_normalize_endpoint_maps_valid_payload() {
    use axum::Json;
    use rust_insights_api::handlers::map_to_evaluate_request;

    let payload = json!({
        "summaryData": {
            "rfc": "GODE561231GR8",
            "lastYearNetIncome": 19339633,
            "fiscalAddress": "TLALNEPANTLA, MEXICO"
        }
    });

    let Json(result) = map_to_evaluate_request(Json(payload)).await.unwrap();
    assert_eq!(result.fin.utilidad_neta_anual, 19339633.0);
    assert_eq!(result.geo.estado, "MEXICO");
}

#[tokio::test]
async fn test_by_ids_endpoint_validates_ids() {
    use axum::Json;
    use rust_insights_api::errors::AppError;
    use rust_insights_api::handlers::map_to_evaluate_request_by_ids;

    let missing_entity = map_to_evaluate_request_by_ids(Json(json!({ "business_id": "b" }))).await;
    assert!(matches!(missing_entity, Err(AppError::BadRequest(_))));

    let missing_business = map_to_evaluate_request_by_ids(Json(json!({ "entity_id": "e" }))).await;
    assert!(matches!(missing_business, Err(AppError::BadRequest(_))));

    let Json(ok) = map_to_evaluate_request_by_ids(Json(json!({
        "entity_id": "e-1",
        "business_id": "b-1"
    })))
    .await
    .unwrap();
    assert_eq!(ok["entity_id"], "e-1");
    assert_eq!(ok["business_id"], "b-1");
}
