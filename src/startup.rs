//! Wires adapters into an `OrderEngine` from configuration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::adapters::{
    ChannelNotifier, DisabledGateway, HttpChannel, InMemoryRepository, LogChannel, PostgresRepository,
    RazorpayGateway, StripeGateway,
};
use crate::config::{Config, GatewayKind};
use crate::domain::{Product, User};
use crate::middleware::idempotency::IdempotencyService;
use crate::middleware::request_logger::RequestLogSettings;
use crate::ports::{MessageChannel, Notifier, PaymentGateway, Repository};
use crate::services::{EngineSettings, OrderEngine};
use crate::signature::token_digest;
use crate::{AppState, HttpSettings};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Catalog and customer sessions for the in-memory store (`CATALOG_SEED_FILE`).
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProduct {
    pub id: String,
    pub name: String,
    pub price: BigDecimal,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    pub deal_price: Option<BigDecimal>,
    pub deal_expiry: Option<DateTime<Utc>>,
}

fn default_in_stock() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Bearer token the user signs in with; only its digest is stored.
    pub token: String,
}

impl CatalogSeed {
    pub async fn load(path: &str) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read CATALOG_SEED_FILE {}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid catalog seed in {}", path))
    }

    /// Loads the seed into `repo`, returning (products, users) inserted.
    pub async fn apply(self, repo: &InMemoryRepository) -> (usize, usize) {
        let counts = (self.products.len(), self.users.len());

        for seed in self.products {
            let mut product = Product::new(seed.id, seed.name, seed.price);
            product.in_stock = seed.in_stock;
            if let Some(deal_price) = seed.deal_price {
                product = product.with_deal(deal_price, seed.deal_expiry);
            }
            repo.insert_product(product).await;
        }

        for seed in self.users {
            let user = User::new(seed.name, seed.email, seed.phone);
            repo.insert_user(user, token_digest(&seed.token)).await;
        }

        counts
    }
}

pub async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn Repository>> {
    match &config.database_url {
        Some(url) => {
            if config.catalog_seed_file.is_some() {
                tracing::warn!("CATALOG_SEED_FILE is ignored when DATABASE_URL is set");
            }
            let pool = crate::db::create_pool(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            crate::db::run_migrations(&pool).await?;
            Ok(Arc::new(PostgresRepository::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory and lost on restart");
            let repo = InMemoryRepository::new();
            match &config.catalog_seed_file {
                Some(path) => {
                    let (products, users) = CatalogSeed::load(path).await?.apply(&repo).await;
                    tracing::info!(path = %path, products, users, "seeded in-memory store");
                }
                None => tracing::warn!("CATALOG_SEED_FILE not set, the in-memory catalog is empty"),
            }
            Ok(Arc::new(repo))
        }
    }
}

pub fn build_gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    let gateway: Arc<dyn PaymentGateway> = match config.gateway {
        GatewayKind::Razorpay => {
            let credentials = config.razorpay.as_ref().context("razorpay credentials missing")?;
            Arc::new(RazorpayGateway::init(credentials, config.gateway_timeout)?)
        }
        GatewayKind::Stripe => {
            let credentials = config.stripe.as_ref().context("stripe credentials missing")?;
            Arc::new(StripeGateway::init(credentials, config.gateway_timeout)?)
        }
        GatewayKind::Disabled => {
            tracing::warn!("no payment gateway configured, checkout falls back to cash on delivery");
            Arc::new(DisabledGateway::default())
        }
    };
    tracing::info!(gateway = %gateway.method(), "payment gateway initialized");
    Ok(gateway)
}

pub fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    let primary: Arc<dyn MessageChannel> = match &config.notify_primary {
        Some(endpoint) => Arc::new(HttpChannel::new(
            "primary",
            endpoint,
            config.notify_from_email.clone(),
            NOTIFY_TIMEOUT,
        )?),
        None => Arc::new(LogChannel),
    };

    let fallback: Option<Arc<dyn MessageChannel>> = match &config.notify_fallback {
        Some(endpoint) => Some(Arc::new(HttpChannel::new(
            "fallback",
            endpoint,
            config.notify_from_email.clone(),
            NOTIFY_TIMEOUT,
        )?)),
        None => None,
    };

    Ok(Arc::new(ChannelNotifier::new(primary, fallback)))
}

pub async fn build_engine(config: &Config) -> anyhow::Result<OrderEngine> {
    let repo = build_repository(config).await?;
    let gateway = build_gateway(config)?;
    let notifier = build_notifier(config)?;

    Ok(OrderEngine::new(
        repo,
        gateway,
        notifier,
        EngineSettings {
            currency: config.currency.clone(),
            gateway_timeout: config.gateway_timeout,
        },
    ))
}

pub async fn build_app_state(config: &Config) -> anyhow::Result<(AppState, HttpSettings)> {
    let engine = build_engine(config).await?;

    let idempotency = match &config.redis_url {
        Some(url) => Some(IdempotencyService::new(url).context("invalid REDIS_URL")?),
        None => {
            tracing::info!("REDIS_URL not set, idempotency keys are not enforced");
            None
        }
    };

    let state = AppState {
        engine: Arc::new(engine),
        admin_api_key: config.admin_api_key.clone(),
        redis_url: config.redis_url.clone(),
        start_time: Instant::now(),
    };

    let settings = HttpSettings {
        cors_allowed_origins: config.cors_allowed_origins.clone(),
        request_log: RequestLogSettings {
            log_body: config.log_request_body,
        },
        idempotency,
    };

    Ok((state, settings))
}
