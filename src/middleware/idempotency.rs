use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const IDEMPOTENCY_TTL: u64 = 86400; // 24 hours in seconds
const PROCESSING_TTL: u64 = 300;
const IDEMPOTENCY_PREFIX: &str = "idempotency:";
const PROCESSING_MARKER: &str = "PROCESSING";
const MAX_CACHED_BODY: usize = 64 * 1024;
const MAX_KEY_LEN: usize = 128;

#[derive(Clone)]
pub struct IdempotencyService {
    redis_client: redis::Client,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CachedResponse {
    status: u16,
    body: String,
}

#[derive(Debug)]
pub enum IdempotencyStatus {
    New,
    Processing,
    Completed(CachedResponse),
}

impl IdempotencyService {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let redis_client = redis::Client::open(redis_url)?;
        Ok(Self { redis_client })
    }

    fn key(scope: &str, idempotency_key: &str) -> String {
        format!("{}{}:{}", IDEMPOTENCY_PREFIX, scope, idempotency_key)
    }

    /// Claims the key, or reports the in-flight or completed request holding it.
    pub async fn check_idempotency(&self, scope: &str, idempotency_key: &str) -> anyhow::Result<IdempotencyStatus> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let key = Self::key(scope, idempotency_key);

        // atomic claim: SET NX EX
        let claimed: bool = redis::cmd("SET")
            .arg(&key)
            .arg(PROCESSING_MARKER)
            .arg("NX")
            .arg("EX")
            .arg(PROCESSING_TTL)
            .query_async::<_, Option<String>>(&mut conn)
            .await?
            .is_some();
        if claimed {
            return Ok(IdempotencyStatus::New);
        }

        let existing: Option<String> = conn.get(&key).await?;
        match existing {
            Some(value) if value == PROCESSING_MARKER => Ok(IdempotencyStatus::Processing),
            Some(value) => Ok(IdempotencyStatus::Completed(serde_json::from_str(&value)?)),
            // expired between the two commands
            None => Ok(IdempotencyStatus::Processing),
        }
    }

    pub async fn store_response(
        &self,
        scope: &str,
        idempotency_key: &str,
        status: u16,
        body: String,
    ) -> anyhow::Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached = serde_json::to_string(&CachedResponse { status, body })?;
        let _: () = conn
            .set_ex(Self::key(scope, idempotency_key), cached, IDEMPOTENCY_TTL)
            .await?;
        Ok(())
    }

    pub async fn release_lock(&self, scope: &str, idempotency_key: &str) -> anyhow::Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(Self::key(scope, idempotency_key)).await?;
        Ok(())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        })),
    )
        .into_response()
}

/// Replays the first successful response for a repeated `x-idempotency-key`.
/// Requests without the header pass straight through.
pub async fn idempotency_middleware(
    State(service): State<IdempotencyService>,
    request: Request,
    next: Next,
) -> Response {
    let idempotency_key = match request.headers().get("x-idempotency-key") {
        Some(key) => match key.to_str() {
            Ok(k) if !k.trim().is_empty() && k.len() <= MAX_KEY_LEN => k.trim().to_string(),
            _ => return error_response(StatusCode::BAD_REQUEST, "Invalid idempotency key format"),
        },
        None => return next.run(request).await,
    };
    let caller = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| crate::signature::token_digest(v)[..16].to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    let scope = format!("{}:{}:{}", request.method(), request.uri().path(), caller);

    match service.check_idempotency(&scope, &idempotency_key).await {
        Ok(IdempotencyStatus::New) => {
            let response = next.run(request).await;

            if !response.status().is_success() {
                if let Err(e) = service.release_lock(&scope, &idempotency_key).await {
                    tracing::error!("Failed to release idempotency lock: {}", e);
                }
                return response;
            }

            let (parts, body) = response.into_parts();
            let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!("Failed to buffer response for idempotency cache: {}", e);
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
                }
            };

            let cached_body = String::from_utf8_lossy(&bytes).into_owned();
            if let Err(e) = service
                .store_response(&scope, &idempotency_key, parts.status.as_u16(), cached_body)
                .await
            {
                tracing::error!("Failed to store idempotency response: {}", e);
            }

            Response::from_parts(parts, Body::from(bytes))
        }
        Ok(IdempotencyStatus::Processing) => {
            error_response(StatusCode::CONFLICT, "Request with this idempotency key is in progress")
        }
        Ok(IdempotencyStatus::Completed(cached)) => {
            let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
            let mut response = (status, cached.body).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
                .headers_mut()
                .insert("x-idempotent-replay", HeaderValue::from_static("true"));
            response
        }
        Err(e) => {
            tracing::error!("Idempotency check failed: {}", e);
            // fail open
            next.run(request).await
        }
    }
}
