//! Razorpay orders/payments API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::adapters::gateway_transport::GatewayTransport;
use crate::config::{ConfigError, RazorpayCredentials};
use crate::domain::PaymentMethod;
use crate::ports::{GatewayError, GatewayIntent, GatewayPayment, GatewayPaymentStatus, IntentRequest, PaymentGateway};
use crate::services::pricing::to_minor_units;
use crate::signature;

#[derive(Debug, Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayPayment {
    id: String,
    order_id: Option<String>,
    status: String,
    amount: i64,
    currency: String,
}

pub struct RazorpayGateway {
    transport: GatewayTransport,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn init(credentials: &RazorpayCredentials, timeout: Duration) -> Result<Self, ConfigError> {
        if credentials.key_id.trim().is_empty() {
            return Err(ConfigError::MissingCredential("RAZORPAY_KEY_ID"));
        }
        if credentials.key_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredential("RAZORPAY_KEY_SECRET"));
        }

        Ok(Self {
            transport: GatewayTransport::new(&credentials.base_url, timeout)?,
            key_id: credentials.key_id.clone(),
            key_secret: credentials.key_secret.clone(),
        })
    }
}

fn payment_status(raw: &str) -> GatewayPaymentStatus {
    match raw {
        "captured" => GatewayPaymentStatus::Captured,
        "authorized" => GatewayPaymentStatus::Authorized,
        "created" => GatewayPaymentStatus::Pending,
        "failed" => GatewayPaymentStatus::Failed,
        other => GatewayPaymentStatus::Other(other.to_string()),
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Razorpay
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        let amount_minor = to_minor_units(&request.amount)
            .ok_or_else(|| GatewayError::InvalidResponse("amount does not fit in minor units".to_string()))?;

        let url = self.transport.endpoint(&["v1", "orders"])?;
        let body = json!({
            "amount": amount_minor,
            "currency": request.currency,
            "receipt": request.receipt,
            "notes": request.metadata,
            "payment_capture": 1,
        });

        let value = self
            .transport
            .send_json(
                self.transport
                    .client()
                    .post(url)
                    .basic_auth(&self.key_id, Some(&self.key_secret))
                    .json(&body),
            )
            .await?;

        let order: RazorpayOrder =
            serde_json::from_value(value).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(GatewayIntent {
            gateway_order_id: order.id,
            amount_minor: order.amount,
            currency: order.currency.to_uppercase(),
            checkout_token: None,
            key_id: Some(self.key_id.clone()),
        })
    }

    fn verify_callback(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        signature::verify_callback(gateway_order_id, gateway_payment_id, signature, &self.key_secret)
    }

    async fn fetch_payment(&self, gateway_payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let url = self.transport.endpoint(&["v1", "payments", gateway_payment_id])?;
        let raw = self
            .transport
            .send_json(
                self.transport
                    .client()
                    .get(url)
                    .basic_auth(&self.key_id, Some(&self.key_secret)),
            )
            .await?;

        let payment: RazorpayPayment =
            serde_json::from_value(raw.clone()).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(GatewayPayment {
            payment_id: payment.id,
            gateway_order_id: payment.order_id,
            status: payment_status(&payment.status),
            amount_minor: payment.amount,
            currency: payment.currency.to_uppercase(),
            raw,
        })
    }

    fn circuit_state(&self) -> &'static str {
        self.transport.circuit_state()
    }
}
