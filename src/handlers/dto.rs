//! Request and response bodies. Client-sent prices and totals are accepted
//! on the wire for compatibility and ignored.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    CustomerSnapshot, LineRequest, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, PurchaseSelection,
    Verification,
};
use crate::ports::GatewayIntent;
use crate::validation::{
    sanitize_string, validate_email, validate_max_len, validate_phone, validate_pincode, validate_product_id,
    validate_quantity, validate_required, ValidationError, ADDRESS_MAX_LEN, CANCEL_DETAILS_MAX_LEN,
    CANCEL_REASON_MAX_LEN, MAX_ORDER_LINES, NAME_MAX_LEN,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineBody {
    pub product_id: String,
    pub quantity: i32,
}

/// Either a single product (`productId` + `quantity`) or `orderItems`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionBody {
    pub product_id: Option<String>,
    pub quantity: Option<i32>,
    pub order_items: Option<Vec<OrderLineBody>>,
}

impl SelectionBody {
    pub fn into_selection(self) -> Result<PurchaseSelection, ValidationError> {
        self.into_optional_selection()?
            .ok_or_else(|| ValidationError::new("orderItems", "productId or orderItems is required"))
    }

    pub fn into_optional_selection(self) -> Result<Option<PurchaseSelection>, ValidationError> {
        if let Some(items) = self.order_items.filter(|items| !items.is_empty()) {
            if items.len() > MAX_ORDER_LINES {
                return Err(ValidationError::new(
                    "orderItems",
                    format!("must contain at most {} lines", MAX_ORDER_LINES),
                ));
            }

            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                let product_id = item.product_id.trim().to_string();
                validate_product_id(&product_id)?;
                validate_quantity(item.quantity)?;
                lines.push(LineRequest {
                    product_id,
                    quantity: item.quantity,
                });
            }
            return Ok(Some(PurchaseSelection::Cart { items: lines }));
        }

        match self.product_id {
            Some(product_id) => {
                let product_id = product_id.trim().to_string();
                let quantity = self.quantity.unwrap_or(1);
                validate_product_id(&product_id)?;
                validate_quantity(quantity)?;
                Ok(Some(PurchaseSelection::Single { product_id, quantity }))
            }
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetailsBody {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub shipping_address: String,
    pub pincode: String,
}

impl CustomerDetailsBody {
    pub fn into_snapshot(self) -> Result<CustomerSnapshot, ValidationError> {
        let name = sanitize_string(&self.customer_name);
        validate_required("customerName", &name)?;
        validate_max_len("customerName", &name, NAME_MAX_LEN)?;

        validate_phone(&self.customer_phone)?;
        let phone = sanitize_string(&self.customer_phone);

        let address = sanitize_string(&self.shipping_address);
        validate_required("shippingAddress", &address)?;
        validate_max_len("shippingAddress", &address, ADDRESS_MAX_LEN)?;

        validate_pincode(&self.pincode)?;

        let email = match self.customer_email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
            Some(email) => {
                validate_email(&email)?;
                Some(email)
            }
            None => None,
        };

        Ok(CustomerSnapshot {
            name,
            phone,
            email,
            address,
            pincode: self.pincode.trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[serde(flatten)]
    pub customer: CustomerDetailsBody,
    pub payment_method: String,
    #[serde(flatten)]
    pub selection: SelectionBody,
}

impl CheckoutBody {
    pub fn payment_method(&self) -> Result<PaymentMethod, ValidationError> {
        self.payment_method
            .parse()
            .map_err(|_| ValidationError::new("paymentMethod", "must be one of: cod, razorpay, stripe"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentBody {
    pub currency: Option<String>,
    #[serde(flatten)]
    pub selection: SelectionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentBody {
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: Option<String>,
    #[serde(alias = "razorpay_payment_id")]
    pub gateway_payment_id: Option<String>,
    #[serde(alias = "razorpay_signature")]
    pub signature: Option<String>,
    pub order_id: Option<Uuid>,
    pub customer_details: Option<CustomerDetailsBody>,
    #[serde(flatten)]
    pub selection: SelectionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDirectBody {
    #[serde(alias = "razorpay_payment_id")]
    pub gateway_payment_id: Option<String>,
    pub order_id: Option<Uuid>,
    pub customer_details: Option<CustomerDetailsBody>,
    #[serde(flatten)]
    pub selection: SelectionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub reason: String,
    pub details: Option<String>,
}

impl CancelBody {
    pub fn validated(self) -> Result<(String, Option<String>), ValidationError> {
        let reason = sanitize_string(&self.reason);
        validate_required("reason", &reason)?;
        validate_max_len("reason", &reason, CANCEL_REASON_MAX_LEN)?;

        let details = self.details.map(|d| sanitize_string(&d)).filter(|d| !d.is_empty());
        if let Some(details) = &details {
            validate_max_len("details", details, CANCEL_DETAILS_MAX_LEN)?;
        }

        Ok((reason, details))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartBody {
    pub product_id: String,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

/// Client view of an order. The stored signature stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub status: OrderStatus,
    pub total: BigDecimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub verification: Verification,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub shipping_address: String,
    pub pincode: String,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItem>>,
}

impl OrderView {
    pub fn with_items(order: Order, items: Vec<OrderItem>) -> Self {
        let mut view = Self::from(order);
        view.items = Some(items);
        view
    }
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            total: order.total,
            currency: order.currency,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            verification: order.verification,
            gateway_order_id: order.gateway_order_id,
            gateway_payment_id: order.gateway_payment_id,
            customer_name: order.customer.name,
            customer_phone: order.customer.phone,
            customer_email: order.customer.email,
            shipping_address: order.customer.address,
            pincode: order.customer.pincode,
            cancellation_reason: order.cancellation_reason,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentView {
    pub gateway_order_id: String,
    /// Minor units (paise, cents).
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_token: Option<String>,
}

impl From<GatewayIntent> for IntentView {
    fn from(intent: GatewayIntent) -> Self {
        Self {
            gateway_order_id: intent.gateway_order_id,
            amount: intent.amount_minor,
            currency: intent.currency,
            key_id: intent.key_id,
            checkout_token: intent.checkout_token,
        }
    }
}
