//! Integration tests for `ElasticBackend` against a wiremock `_msearch` endpoint.

use georef::{
    AddressData, AddressQuery, QueryParams, Resolver, SearchBackend, SearchError,
    error::GeorefError,
    search::{IndexKind, SearchQuery},
};
use georef_elastic::{ElasticBackend, ElasticConfig, ElasticError};
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{header, method, path},
};

fn setup_test_env() {
    let _ = georef::init_logging(tracing::Level::WARN);
}

fn start_server(runtime: &Runtime) -> MockServer {
    runtime.block_on(MockServer::start())
}

fn backend(server: &MockServer, multisearch_max_len: usize) -> ElasticBackend {
    let config = ElasticConfig::builder()
        .base_url(server.uri())
        .multisearch_max_len(multisearch_max_len)
        .build()
        .expect("Config should be valid");
    ElasticBackend::new(config).expect("Backend should build")
}

/// Answers every search of a request with the same hits.
struct RepeatHits(Vec<Value>);

impl Respond for RepeatHits {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let searches = String::from_utf8_lossy(&request.body).lines().count() / 2;
        let item = json!({
            "hits": {
                "total": { "value": self.0.len(), "relation": "eq" },
                "hits": self.0.iter().map(|source| json!({ "_source": source })).collect::<Vec<_>>()
            }
        });
        ResponseTemplate::new(200).set_body_json(json!({ "responses": vec![item; searches] }))
    }
}

fn corrientes_block() -> Value {
    json!({
        "id": "020070100325508",
        "calle": {
            "id": "0200701003255",
            "nombre": "AV CORRIENTES",
            "categoria": "AV",
            "provincia": { "id": "02", "nombre": "CIUDAD AUTÓNOMA DE BUENOS AIRES" },
            "departamento": { "id": "02007", "nombre": "COMUNA 1" },
            "localidad_censal": { "id": "02007010", "nombre": "CIUDAD DE BUENOS AIRES" },
            "fuente": "INDEC"
        },
        "altura": {
            "inicio": { "derecha": 800, "izquierda": 801 },
            "fin": { "derecha": 1198, "izquierda": 1200 }
        },
        "geometria": {
            "type": "MultiLineString",
            "coordinates": [
                [[-58.3900, -34.6040], [-58.38945, -34.6040]],
                [[-58.38945, -34.6040], [-58.3889, -34.6040]]
            ]
        }
    })
}

#[test]
fn test_rounds_are_chunked() {
    setup_test_env();
    let runtime = Runtime::new().unwrap();
    let server = start_server(&runtime);
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/_msearch"))
            .and(header("content-type", "application/x-ndjson"))
            .respond_with(RepeatHits(Vec::new()))
            .expect(3)
            .mount(&server),
    );

    let queries: Vec<SearchQuery> = (0..5)
        .map(|i| SearchQuery::new(IndexKind::StreetBlocks).offset(i))
        .collect();
    let refs: Vec<&SearchQuery> = queries.iter().collect();
    let responses = backend(&server, 2)
        .multi_search(&refs)
        .expect("Multi-search should succeed");

    // Five searches, at most two per request.
    assert_eq!(responses.len(), 5);
    let offsets: Vec<usize> = responses.iter().map(|response| response.offset).collect();
    assert_eq!(offsets, vec![0, 1, 2, 3, 4]);

    let requests = runtime.block_on(server.received_requests()).unwrap();
    let first = String::from_utf8_lossy(&requests[0].body).to_string();
    assert_eq!(first.lines().count(), 4);
    assert_eq!(first.lines().next(), Some(r#"{"index":"cuadras"}"#));
}

#[test]
fn test_resolver_over_elasticsearch() {
    setup_test_env();
    let runtime = Runtime::new().unwrap();
    let server = start_server(&runtime);
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/_msearch"))
            .respond_with(RepeatHits(vec![corrientes_block()]))
            .mount(&server),
    );

    let resolver = Resolver::new(backend(&server, 100));
    assert_eq!(resolver.info().backend, "elasticsearch");

    let result = resolver
        .resolve_address(AddressQuery::new(
            AddressData::simple("Corrientes").with_door_number(1000, None),
            QueryParams::new(),
        ))
        .expect("Address should resolve");

    assert_eq!(result.total(), 1);
    let hit = result.addresses().next().unwrap();
    assert_eq!(hit.street.name.as_deref(), Some("AV CORRIENTES"));
    assert!((hit.location.lon.unwrap() - -58.38945).abs() < 1e-6);

    // The request carried the door number range filter.
    let requests = runtime.block_on(server.received_requests()).unwrap();
    let body = String::from_utf8_lossy(&requests[0].body).to_string();
    let search: Value = serde_json::from_str(body.lines().nth(1).unwrap()).unwrap();
    let filters = search["query"]["bool"]["filter"].to_string();
    assert!(filters.contains("altura.inicio.derecha"));
}

#[test]
fn test_item_error_fails_batch() {
    setup_test_env();
    let runtime = Runtime::new().unwrap();
    let server = start_server(&runtime);
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/_msearch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "responses": [
                    { "error": { "type": "search_phase_execution_exception" }, "status": 400 }
                ]
            })))
            .mount(&server),
    );

    let resolver = Resolver::new(backend(&server, 100));
    let err = resolver
        .resolve_addresses(vec![AddressQuery::new(
            AddressData::simple("Corrientes"),
            QueryParams::new(),
        )])
        .unwrap_err();

    assert!(matches!(
        err,
        GeorefError::SearchError(SearchError::ItemFailed { position: 0, .. })
    ));
}

#[test]
fn test_http_error_status() {
    setup_test_env();
    let runtime = Runtime::new().unwrap();
    let server = start_server(&runtime);
    runtime.block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server),
    );

    let query = SearchQuery::new(IndexKind::States);
    let err = backend(&server, 100).multi_search(&[&query]).unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_async_multi_search() {
    setup_test_env();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_msearch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responses": [{
                "hits": {
                    "total": 1,
                    "hits": [{ "_source": { "id": "02", "nombre": "CIUDAD AUTÓNOMA DE BUENOS AIRES" } }]
                }
            }]
        })))
        .mount(&server)
        .await;

    let backend = backend(&server, 100);
    let query = SearchQuery::new(IndexKind::States);
    let responses = backend.multi_search_async(&[&query]).await.unwrap();

    assert_eq!(responses[0].total, 1);
    assert_eq!(responses[0].hits[0].id(), "02");
}

#[tokio::test]
async fn test_malformed_response() {
    setup_test_env();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "responses": [] })))
        .mount(&server)
        .await;

    let query = SearchQuery::new(IndexKind::States);
    let err = backend(&server, 100)
        .multi_search_async(&[&query])
        .await
        .unwrap_err();
    assert!(matches!(err, ElasticError::MalformedResponse(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resolver_inside_multi_thread_runtime() {
    setup_test_env();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_msearch"))
        .respond_with(RepeatHits(vec![corrientes_block()]))
        .mount(&server)
        .await;

    let resolver = Resolver::new(backend(&server, 100));
    let result = resolver
        .resolve_address(AddressQuery::new(
            AddressData::simple("Corrientes").with_door_number(1000, None),
            QueryParams::new(),
        ))
        .expect("Address should resolve from async code");

    assert_eq!(result.total(), 1);
    let hit = result.addresses().next().unwrap();
    assert!((hit.location.lon.unwrap() - -58.38945).abs() < 1e-6);
}

#[tokio::test]
async fn test_resolver_inside_current_thread_runtime_fails() {
    setup_test_env();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(RepeatHits(vec![corrientes_block()]))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = Resolver::new(backend(&server, 100));
    let err = resolver
        .resolve_address(AddressQuery::new(
            AddressData::simple("Corrientes"),
            QueryParams::new(),
        ))
        .unwrap_err();

    assert!(matches!(err, GeorefError::SearchError(SearchError::Other(_))));
    assert!(err.to_string().contains("current-thread"));
}
