//! Payment gateway port.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::domain::PaymentMethod;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Credentials rejected (401/403). Checkout degrades to COD.
    #[error("gateway rejected credentials: {0}")]
    Auth(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("gateway call timed out")]
    Timeout,

    #[error("gateway resource not found: {0}")]
    NotFound(String),

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Failures that say nothing about the request itself and should trip the breaker.
    pub fn is_outage(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::Timeout)
    }
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub receipt: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayIntent {
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Stripe client secret; Razorpay needs none.
    pub checkout_token: Option<String>,
    /// Publishable key the browser checkout needs.
    pub key_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Captured,
    Authorized,
    Pending,
    Failed,
    Other(String),
}

impl GatewayPaymentStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, GatewayPaymentStatus::Captured | GatewayPaymentStatus::Authorized)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub payment_id: String,
    pub gateway_order_id: Option<String>,
    pub status: GatewayPaymentStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError>;

    /// Pure HMAC check of a client-relayed callback. A mismatch is `false`, not an error.
    fn verify_callback(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool;

    /// Looks a payment up on the gateway; ground truth for degraded verification.
    async fn fetch_payment(&self, gateway_payment_id: &str) -> Result<GatewayPayment, GatewayError>;

    fn circuit_state(&self) -> &'static str {
        "closed"
    }
}
