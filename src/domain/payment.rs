//! Payment record: proof that money moved, kept apart from the order row
//! because gateway callbacks can race or repeat.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{PaymentStatus, Verification};

/// Stored in place of the signature (and missing gateway order id) for
/// payments confirmed by gateway lookup alone.
pub const DIRECT_VERIFICATION_SENTINEL: &str = "direct-verification";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub gateway: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub verification: Verification,
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn signed(
        order_id: Uuid,
        gateway: impl Into<String>,
        gateway_order_id: impl Into<String>,
        gateway_payment_id: impl Into<String>,
        signature: impl Into<String>,
        amount: BigDecimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            gateway: gateway.into(),
            gateway_order_id: gateway_order_id.into(),
            gateway_payment_id: gateway_payment_id.into(),
            signature: signature.into(),
            amount,
            currency: currency.into(),
            status: PaymentStatus::Completed,
            verification: Verification::Signature,
            raw_response: None,
            created_at: Utc::now(),
        }
    }

    pub fn direct(
        order_id: Uuid,
        gateway: impl Into<String>,
        gateway_order_id: Option<String>,
        gateway_payment_id: impl Into<String>,
        amount: BigDecimal,
        currency: impl Into<String>,
        raw_response: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            gateway: gateway.into(),
            gateway_order_id: gateway_order_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| DIRECT_VERIFICATION_SENTINEL.to_string()),
            gateway_payment_id: gateway_payment_id.into(),
            signature: DIRECT_VERIFICATION_SENTINEL.to_string(),
            amount,
            currency: currency.into(),
            status: PaymentStatus::Completed,
            verification: Verification::Direct,
            raw_response: Some(raw_response),
            created_at: Utc::now(),
        }
    }

    pub fn for_order(mut self, order_id: Uuid) -> Self {
        self.order_id = order_id;
        self
    }
}
