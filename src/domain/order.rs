//! Order aggregate and its status machine.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment::PaymentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    CodPending,
    Confirmed,
    Processing,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::CodPending => "cod_pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }

    /// States from which the owning customer may cancel.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::CodPending
                | OrderStatus::Processing
                | OrderStatus::Confirmed
        )
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed | CodPending | Processing | Cancelled) => true,
            (CodPending, Processing | Fulfilled | Cancelled) => true,
            (Confirmed, Processing | Fulfilled | Cancelled) => true,
            (Processing, Fulfilled | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "cod_pending" => Ok(OrderStatus::CodPending),
            // legacy rows written before the paid/confirmed merge
            "confirmed" | "paid" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "fulfilled" => Ok(OrderStatus::Fulfilled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// Payment state, tracked separately from the order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[serde(alias = "cash_on_delivery")]
    Cod,
    Razorpay,
    Stripe,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Razorpay => "razorpay",
            PaymentMethod::Stripe => "stripe",
        }
    }

    pub fn is_online(self) -> bool {
        !matches!(self, PaymentMethod::Cod)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" | "cash_on_delivery" => Ok(PaymentMethod::Cod),
            "razorpay" => Ok(PaymentMethod::Razorpay),
            "stripe" => Ok(PaymentMethod::Stripe),
            other => Err(format!("unsupported payment method '{}'", other)),
        }
    }
}

/// How the payment behind an order was proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// No online payment (COD, or still awaiting the gateway).
    None,
    /// HMAC signature over the gateway order and payment ids.
    Signature,
    /// Gateway payment lookup only; weaker guarantee.
    Direct,
}

impl Verification {
    pub fn as_str(self) -> &'static str {
        match self {
            Verification::None => "none",
            Verification::Signature => "signature",
            Verification::Direct => "direct",
        }
    }
}

impl FromStr for Verification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Verification::None),
            "signature" => Ok(Verification::Signature),
            "direct" => Ok(Verification::Direct),
            other => Err(format!("unknown verification '{}'", other)),
        }
    }
}

/// Contact details copied into the order when it is created. Never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub pincode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub total: BigDecimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub verification: Verification,
    pub gateway: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub signature: Option<String>,
    pub customer: CustomerSnapshot,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: Option<Uuid>,
        customer: CustomerSnapshot,
        total: BigDecimal,
        currency: impl Into<String>,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        let status = if payment_method.is_online() {
            OrderStatus::Pending
        } else {
            OrderStatus::CodPending
        };

        Self {
            id: Uuid::new_v4(),
            user_id,
            total,
            currency: currency.into(),
            status,
            payment_method,
            payment_status: PaymentStatus::Pending,
            verification: Verification::None,
            gateway: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            signature: None,
            customer,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copies the settled payment onto the order and marks it confirmed.
    pub fn apply_payment(&mut self, payment: &PaymentRecord) {
        self.status = OrderStatus::Confirmed;
        self.payment_status = PaymentStatus::Completed;
        self.verification = payment.verification;
        self.gateway = Some(payment.gateway.clone());
        self.gateway_order_id = Some(payment.gateway_order_id.clone());
        self.gateway_payment_id = Some(payment.gateway_payment_id.clone());
        self.signature = Some(payment.signature.clone());
        self.updated_at = Utc::now();
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

/// Line of an order. Items outlive cancellation as an audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    /// Price at purchase time; unaffected by later catalog changes.
    pub unit_price: BigDecimal,
}

/// An order together with the items that must be persisted with it.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}
