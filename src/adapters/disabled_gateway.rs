use async_trait::async_trait;

use crate::domain::PaymentMethod;
use crate::ports::{GatewayError, GatewayIntent, GatewayPayment, IntentRequest, PaymentGateway};

/// Stand-in when no online gateway is configured. Intents fail as outages,
/// so checkout degrades to cash on delivery.
pub struct DisabledGateway {
    method: PaymentMethod,
}

impl DisabledGateway {
    pub fn new(method: PaymentMethod) -> Self {
        Self { method }
    }
}

impl Default for DisabledGateway {
    fn default() -> Self {
        Self::new(PaymentMethod::Razorpay)
    }
}

#[async_trait]
impl PaymentGateway for DisabledGateway {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn create_intent(&self, _request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        Err(GatewayError::Unavailable("online payments are not configured".to_string()))
    }

    fn verify_callback(&self, _gateway_order_id: &str, _gateway_payment_id: &str, _signature: &str) -> bool {
        false
    }

    async fn fetch_payment(&self, _gateway_payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        Err(GatewayError::Unavailable("online payments are not configured".to_string()))
    }

    fn circuit_state(&self) -> &'static str {
        "disabled"
    }
}
