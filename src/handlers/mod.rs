pub mod admin;
pub mod cart;
pub mod dto;
pub mod orders;
pub mod payments;

use crate::health::{check_health, GatewayChecker, RedisChecker, RepositoryChecker};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = check_health(
        RepositoryChecker::new(state.engine.repository().clone()),
        state.redis_url.clone().map(RedisChecker::new),
        GatewayChecker::new(state.engine.gateway().clone()),
        state.start_time,
    )
    .await;

    // 503 only when order storage is down
    let status_code = if response.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}
