mod common;

use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    GenericImage,
};
use tower::ServiceExt;

use common::{Harness, SOFA_ID};
use storefront_core::middleware::idempotency::IdempotencyService;
use storefront_core::{create_app, AppState, HttpSettings};

async fn redis_url() -> (String, impl std::any::Any) {
    let container = GenericImage::new("redis", "7.2.4")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .unwrap();
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    (format!("redis://127.0.0.1:{}", port), container)
}

fn app(h: &Harness, service: IdempotencyService) -> Router {
    let state = AppState::new(h.engine.clone());
    create_app(
        state,
        HttpSettings {
            idempotency: Some(service),
            ..Default::default()
        },
    )
}

fn checkout(key: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .header("x-idempotency-key", key)
        .body(Body::from(
            json!({
                "customerName": "Asha Rao",
                "customerPhone": "9876543210",
                "shippingAddress": "12 MG Road, Bengaluru",
                "pincode": "560001",
                "paymentMethod": "cod",
                "productId": SOFA_ID,
                "quantity": 1
            })
            .to_string(),
        ))
        .unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_repeated_key_replays_first_response() {
    let (url, _container) = redis_url().await;
    let h = Harness::new().await;
    let service = IdempotencyService::new(&url).unwrap();

    let first = app(&h, service.clone()).oneshot(checkout("key-1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = axum::body::to_bytes(first.into_body(), usize::MAX).await.unwrap();

    let replay = app(&h, service).oneshot(checkout("key-1")).await.unwrap();
    assert_eq!(replay.status(), StatusCode::OK);
    assert_eq!(replay.headers()["x-idempotent-replay"], "true");
    let replay_body = axum::body::to_bytes(replay.into_body(), usize::MAX).await.unwrap();

    assert_eq!(first_body, replay_body);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_distinct_keys_are_independent() {
    let (url, _container) = redis_url().await;
    let h = Harness::new().await;
    let service = IdempotencyService::new(&url).unwrap();

    for key in ["key-a", "key-b"] {
        let response = app(&h, service.clone()).oneshot(checkout(key)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(h.store.order_count().await, 2);
}

#[tokio::test]
async fn test_oversized_key_is_rejected_before_redis() {
    let h = Harness::new().await;
    let service = IdempotencyService::new("redis://127.0.0.1:1").unwrap();

    let response = app(&h, service).oneshot(checkout(&"k".repeat(200))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.store.order_count().await, 0);
}
