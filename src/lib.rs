pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod signature;
pub mod startup;
pub mod utils;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::handlers::{admin, cart, orders, payments};
use crate::middleware::auth::admin_auth;
use crate::middleware::idempotency::{idempotency_middleware, IdempotencyService};
use crate::middleware::request_logger::{request_logger_middleware, RequestLogSettings};
use crate::services::OrderEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrderEngine>,
    pub admin_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<OrderEngine>) -> Self {
        Self {
            engine,
            admin_api_key: None,
            redis_url: None,
            start_time: Instant::now(),
        }
    }
}

/// Router-level settings that do not belong in handler state.
#[derive(Clone, Default)]
pub struct HttpSettings {
    pub cors_allowed_origins: Option<Vec<String>>,
    pub request_log: RequestLogSettings,
    pub idempotency: Option<IdempotencyService>,
}

pub fn create_app(state: AppState, settings: HttpSettings) -> Router {
    let mut money_routes = Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/verify-payment", post(payments::verify_payment))
        .route("/verify-payment-direct", post(payments::verify_payment_direct));
    if let Some(service) = settings.idempotency.clone() {
        money_routes = money_routes.route_layer(from_fn_with_state(service, idempotency_middleware));
    }

    let admin_routes = Router::new()
        .route("/orders/:id", get(admin::get_order))
        .route("/orders/:id/status", patch(admin::update_order_status))
        .route_layer(from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(money_routes)
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route("/payment-intent", post(payments::create_intent))
        .route("/cart", get(cart::get_cart).post(cart::add_to_cart))
        .nest("/admin", admin_routes)
        .layer(from_fn_with_state(settings.request_log, request_logger_middleware))
        .layer(cors_layer(settings.cors_allowed_origins.as_deref()))
        .with_state(state)
}

/// Permissive until `CORS_ALLOWED_ORIGINS` narrows it.
fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-idempotency-key"),
        ])
}
