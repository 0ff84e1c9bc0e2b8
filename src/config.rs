use std::env;
use std::time::Duration;

use anyhow::Context;
use dotenvy::dotenv;
use thiserror::Error;

use crate::domain::PaymentMethod;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid url for {name}: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Razorpay,
    Stripe,
    /// No online gateway: every intent request degrades to COD.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RazorpayCredentials {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeCredentials {
    pub secret_key: String,
    pub publishable_key: Option<String>,
    pub signing_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub gateway: GatewayKind,
    pub razorpay: Option<RazorpayCredentials>,
    pub stripe: Option<StripeCredentials>,
    pub gateway_timeout: Duration,
    pub currency: String,
    pub notify_primary: Option<ProviderEndpoint>,
    pub notify_fallback: Option<ProviderEndpoint>,
    pub notify_from_email: String,
    pub admin_api_key: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub log_json: bool,
    pub log_request_body: bool,
    /// JSON catalog and sessions loaded into the in-memory store.
    pub catalog_seed_file: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let gateway = parse_gateway_kind(&env::var("PAYMENT_GATEWAY").unwrap_or_else(|_| "razorpay".to_string()))?;

        let razorpay = match (env_opt("RAZORPAY_KEY_ID"), env_opt("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayCredentials {
                key_id,
                key_secret,
                base_url: env_opt("RAZORPAY_BASE_URL").unwrap_or_else(|| "https://api.razorpay.com".to_string()),
            }),
            _ => None,
        };

        let stripe = match (env_opt("STRIPE_SECRET_KEY"), env_opt("STRIPE_SIGNING_SECRET")) {
            (Some(secret_key), Some(signing_secret)) => Some(StripeCredentials {
                secret_key,
                publishable_key: env_opt("STRIPE_PUBLISHABLE_KEY"),
                signing_secret,
                base_url: env_opt("STRIPE_BASE_URL").unwrap_or_else(|| "https://api.stripe.com".to_string()),
            }),
            _ => None,
        };

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env_opt("DATABASE_URL"),
            redis_url: env_opt("REDIS_URL"),
            gateway,
            razorpay,
            stripe,
            gateway_timeout: Duration::from_secs(
                env::var("GATEWAY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .context("GATEWAY_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "INR".to_string()).to_uppercase(),
            notify_primary: env_opt("NOTIFY_PRIMARY_URL").map(|url| ProviderEndpoint {
                url,
                token: env_opt("NOTIFY_PRIMARY_TOKEN"),
            }),
            notify_fallback: env_opt("NOTIFY_FALLBACK_URL").map(|url| ProviderEndpoint {
                url,
                token: env_opt("NOTIFY_FALLBACK_TOKEN"),
            }),
            notify_from_email: env::var("NOTIFY_FROM_EMAIL").unwrap_or_else(|_| "orders@localhost".to_string()),
            admin_api_key: env_opt("ADMIN_API_KEY"),
            cors_allowed_origins: env_opt("CORS_ALLOWED_ORIGINS").map(|raw| parse_origins(&raw)),
            log_json: env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false),
            log_request_body: env::var("LOG_REQUEST_BODY")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
            catalog_seed_file: env_opt("CATALOG_SEED_FILE"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field requirements that a plain env read cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.gateway_timeout.is_zero() {
            anyhow::bail!("GATEWAY_TIMEOUT_SECS must be greater than 0");
        }

        match self.gateway {
            GatewayKind::Razorpay => {
                let creds = self
                    .razorpay
                    .as_ref()
                    .context("PAYMENT_GATEWAY=razorpay requires RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET")?;
                check_url("RAZORPAY_BASE_URL", &creds.base_url)?;
            }
            GatewayKind::Stripe => {
                let creds = self
                    .stripe
                    .as_ref()
                    .context("PAYMENT_GATEWAY=stripe requires STRIPE_SECRET_KEY and STRIPE_SIGNING_SECRET")?;
                check_url("STRIPE_BASE_URL", &creds.base_url)?;
            }
            GatewayKind::Disabled => {}
        }

        for (name, endpoint) in [
            ("NOTIFY_PRIMARY_URL", &self.notify_primary),
            ("NOTIFY_FALLBACK_URL", &self.notify_fallback),
        ] {
            if let Some(endpoint) = endpoint {
                check_url(name, &endpoint.url)?;
            }
        }

        Ok(())
    }

    pub fn gateway_method(&self) -> Option<PaymentMethod> {
        match self.gateway {
            GatewayKind::Razorpay => Some(PaymentMethod::Razorpay),
            GatewayKind::Stripe => Some(PaymentMethod::Stripe),
            GatewayKind::Disabled => None,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_gateway_kind(raw: &str) -> anyhow::Result<GatewayKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "razorpay" => Ok(GatewayKind::Razorpay),
        "stripe" => Ok(GatewayKind::Stripe),
        "none" | "disabled" | "cod" => Ok(GatewayKind::Disabled),
        other => anyhow::bail!("PAYMENT_GATEWAY must be razorpay, stripe or none (got '{}')", other),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidUrl {
            name,
            value: value.to_string(),
        })
}

#[cfg(test)]
impl Config {
    /// In-memory, gateway-less configuration for unit tests.
    pub(crate) fn for_tests() -> Self {
        Config {
            server_port: 3000,
            database_url: None,
            redis_url: None,
            gateway: GatewayKind::Disabled,
            razorpay: None,
            stripe: None,
            gateway_timeout: Duration::from_secs(15),
            currency: "INR".to_string(),
            notify_primary: None,
            notify_fallback: None,
            notify_from_email: "orders@localhost".to_string(),
            admin_api_key: None,
            cors_allowed_origins: None,
            log_json: false,
            log_request_body: false,
            catalog_seed_file: None,
        }
    }
}
