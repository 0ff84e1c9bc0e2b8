use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::ports::{PaymentGateway, Repository};

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const CRITICAL_DEPENDENCIES: [&str; 1] = ["database"];

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

impl HealthResponse {
    pub fn is_unhealthy(&self) -> bool {
        self.status == "unhealthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

/// Order storage: Postgres or the in-memory store.
pub struct RepositoryChecker {
    repo: Arc<dyn Repository>,
}

impl RepositoryChecker {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl DependencyChecker for RepositoryChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.repo.ping().await {
            Ok(()) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

pub struct RedisChecker {
    url: String,
}

impl RedisChecker {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl DependencyChecker for RedisChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let client = match redis::Client::open(self.url.as_str()) {
            Ok(client) => client,
            Err(e) => return DependencyStatus::unhealthy(e.to_string()),
        };
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => return DependencyStatus::unhealthy(e.to_string()),
        };
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Reports the gateway circuit breaker without calling the provider.
pub struct GatewayChecker {
    gateway: Arc<dyn PaymentGateway>,
}

impl GatewayChecker {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl DependencyChecker for GatewayChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.gateway.circuit_state() {
            "open" => DependencyStatus::unhealthy(format!("{} circuit open", self.gateway.method())),
            "disabled" => DependencyStatus::unhealthy("online payments not configured"),
            _ => DependencyStatus::healthy(start),
        }
    }
}

async fn run_check(checker: &dyn DependencyChecker) -> DependencyStatus {
    timeout(CHECK_TIMEOUT, checker.check())
        .await
        .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"))
}

pub async fn check_health(
    database: RepositoryChecker,
    redis: Option<RedisChecker>,
    gateway: GatewayChecker,
    start_time: Instant,
) -> HealthResponse {
    let redis_check = async {
        match &redis {
            Some(checker) => Some(run_check(checker).await),
            None => None,
        }
    };

    let (database_result, redis_result, gateway_result) =
        tokio::join!(run_check(&database), redis_check, run_check(&gateway));

    let mut dependencies = HashMap::new();
    dependencies.insert("database".to_string(), database_result);
    dependencies.insert("gateway".to_string(), gateway_result);
    if let Some(redis_result) = redis_result {
        dependencies.insert("redis".to_string(), redis_result);
    }

    HealthResponse {
        status: determine_overall_status(&dependencies),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

fn determine_overall_status(dependencies: &HashMap<String, DependencyStatus>) -> String {
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if CRITICAL_DEPENDENCIES.contains(&name.as_str()) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
