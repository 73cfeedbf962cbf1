use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use recommend_gateway::adapters::server;
use recommend_gateway::config::Settings;
use recommend_gateway::core::aggregator::RECOMMENDATIONS_BREAKER;
use recommend_gateway::{
    Aggregator, BreakerRegistry, HalTraversal, HttpPageFetcher, RecommendationService,
    StaticRegistry, StoreDetails,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn store_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Store {}", id),
        "address": {
            "street": "Main Street",
            "city": "Springfield",
            "zip": "12345",
            "location": { "x": 1.0, "y": 2.0 }
        }
    })
}

/// 模擬 CUSTOMERS 與 RECOMMENDATIONS 兩個 HAL 服務
fn mock_hal_services(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/customers/42");
        then.status(200).json_body(json!({
            "_links": {
                "self": { "href": "/customers/42" },
                "stores-nearby": { "href": "/customers/42/stores{?page,size,sort}", "templated": true }
            }
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/customers/42/stores")
            .query_param("page", "0");
        then.status(200).json_body(json!({
            "_embedded": { "stores": [store_json("S1"), store_json("S2")] },
            "page": { "size": 20, "totalElements": 2, "totalPages": 1, "number": 0 }
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/stores/S1");
        then.status(200).json_body(json!({
            "_links": { "recommendations": { "href": "/stores/S1/recommendations" } }
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/stores/S1/recommendations")
            .query_param("page", "0");
        then.status(200).json_body(json!({
            "_embedded": { "recommendations": [
                { "id": "R1", "storeId": "S1" },
                { "id": "R2", "storeId": "S1" }
            ] },
            "page": { "size": 20, "totalElements": 2, "totalPages": 1, "number": 0 }
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/stores/S2");
        then.status(503);
    });
}

fn build_service(
    server: &MockServer,
) -> Arc<RecommendationService<HttpPageFetcher<StaticRegistry>, HttpPageFetcher<StaticRegistry>>> {
    let mut discovery = StaticRegistry::new();
    discovery.register("CUSTOMERS", &server.base_url()).unwrap();
    discovery
        .register("RECOMMENDATIONS", &server.base_url())
        .unwrap();

    let settings = Settings::default();
    let fetcher = Arc::new(HttpPageFetcher::new(
        Arc::new(discovery),
        HalTraversal::new(),
    ));
    let registry = Arc::new(BreakerRegistry::new((&settings.breaker).into()));
    let aggregator = Aggregator::new(
        Arc::clone(&fetcher),
        fetcher,
        Arc::clone(&registry),
        settings.aggregation,
    );
    Arc::new(RecommendationService::new(aggregator, registry))
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_end_to_end_aggregation_over_hal() {
    let server = MockServer::start();
    mock_hal_services(&server);
    let service = build_service(&server);

    let details = service.recommend("42").wait().await.unwrap();

    assert_eq!(details.len(), 2);
    assert_eq!(details[0].store.id, "S1");
    assert_eq!(details[0].store.address.city, "Springfield");
    let ids: Vec<&str> = details[0]
        .recommendations
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(ids, vec!["R1", "R2"]);
    assert_eq!(details[1].store.id, "S2");
    assert!(details[1].recommendations.is_empty());

    let failures = service
        .breakers()
        .into_iter()
        .find(|stats| stats.name == RECOMMENDATIONS_BREAKER)
        .map(|stats| stats.total_failures);
    assert_eq!(failures, Some(1));
}

#[tokio::test]
async fn test_recommend_route_returns_json() {
    let server = MockServer::start();
    mock_hal_services(&server);
    let router = server::router(build_service(&server));

    let (status, body) = get(router, "/42").await;

    assert_eq!(status, StatusCode::OK);
    let details: Vec<StoreDetails> = serde_json::from_value(body).unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].recommendations[0].store_id, "S1");
}

#[tokio::test]
async fn test_blank_customer_id_is_bad_request() {
    let server = MockServer::start();
    let router = server::router(build_service(&server));

    let (status, body) = get(router, "/%20").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("customer"));
}

#[tokio::test]
async fn test_unknown_customer_yields_empty_list() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/customers/404");
        then.status(404);
    });
    let router = server::router(build_service(&server));

    let (status, body) = get(router, "/404").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_health_reports_breakers() {
    let server = MockServer::start();
    mock_hal_services(&server);
    let service = build_service(&server);
    service.recommend("42").wait().await.unwrap();

    let (status, body) = get(server::router(service), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    let names: Vec<&str> = body["breakers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["recommendations-lookup", "stores-lookup"]);
    assert_eq!(body["breakers"][0]["state"], "closed");
}
