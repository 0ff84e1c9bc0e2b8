//! Stripe PaymentIntents API. The intent id plays the gateway-order role
//! and the client relays it back as the payment id as well.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapters::gateway_transport::GatewayTransport;
use crate::config::{ConfigError, StripeCredentials};
use crate::domain::PaymentMethod;
use crate::ports::{GatewayError, GatewayIntent, GatewayPayment, GatewayPaymentStatus, IntentRequest, PaymentGateway};
use crate::services::pricing::to_minor_units;
use crate::signature;

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    amount: i64,
    #[serde(default)]
    amount_received: i64,
    currency: String,
    status: String,
    client_secret: Option<String>,
}

pub struct StripeGateway {
    transport: GatewayTransport,
    secret_key: String,
    publishable_key: Option<String>,
    signing_secret: String,
}

impl StripeGateway {
    pub fn init(credentials: &StripeCredentials, timeout: Duration) -> Result<Self, ConfigError> {
        if credentials.secret_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("STRIPE_SECRET_KEY"));
        }
        if credentials.signing_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredential("STRIPE_SIGNING_SECRET"));
        }

        Ok(Self {
            transport: GatewayTransport::new(&credentials.base_url, timeout)?,
            secret_key: credentials.secret_key.clone(),
            publishable_key: credentials.publishable_key.clone(),
            signing_secret: credentials.signing_secret.clone(),
        })
    }
}

fn intent_status(raw: &str) -> GatewayPaymentStatus {
    match raw {
        "succeeded" => GatewayPaymentStatus::Captured,
        "requires_capture" => GatewayPaymentStatus::Authorized,
        "processing" | "requires_payment_method" | "requires_confirmation" | "requires_action" => {
            GatewayPaymentStatus::Pending
        }
        "canceled" => GatewayPaymentStatus::Failed,
        other => GatewayPaymentStatus::Other(other.to_string()),
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Stripe
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        let amount_minor = to_minor_units(&request.amount)
            .ok_or_else(|| GatewayError::InvalidResponse("amount does not fit in minor units".to_string()))?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
            ("metadata[receipt]".to_string(), request.receipt.clone()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let url = self.transport.endpoint(&["v1", "payment_intents"])?;
        let value = self
            .transport
            .send_json(
                self.transport
                    .client()
                    .post(url)
                    .bearer_auth(&self.secret_key)
                    .form(&form),
            )
            .await?;

        let intent: PaymentIntent =
            serde_json::from_value(value).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(GatewayIntent {
            gateway_order_id: intent.id,
            amount_minor: intent.amount,
            currency: intent.currency.to_uppercase(),
            checkout_token: intent.client_secret,
            key_id: self.publishable_key.clone(),
        })
    }

    fn verify_callback(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        signature::verify_callback(gateway_order_id, gateway_payment_id, signature, &self.signing_secret)
    }

    async fn fetch_payment(&self, gateway_payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let url = self
            .transport
            .endpoint(&["v1", "payment_intents", gateway_payment_id])?;
        let raw = self
            .transport
            .send_json(self.transport.client().get(url).bearer_auth(&self.secret_key))
            .await?;

        let intent: PaymentIntent =
            serde_json::from_value(raw.clone()).map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let status = intent_status(&intent.status);
        let amount_minor = if status == GatewayPaymentStatus::Captured {
            intent.amount_received
        } else {
            intent.amount
        };

        Ok(GatewayPayment {
            payment_id: intent.id.clone(),
            gateway_order_id: Some(intent.id),
            status,
            amount_minor,
            currency: intent.currency.to_uppercase(),
            raw,
        })
    }

    fn circuit_state(&self) -> &'static str {
        self.transport.circuit_state()
    }
}
