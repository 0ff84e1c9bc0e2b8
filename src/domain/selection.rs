//! What the customer wants to buy, normalized once at the HTTP boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseSelection {
    /// "Buy now" on a single product page.
    Single { product_id: String, quantity: i32 },
    /// Checkout of several lines, usually the user's cart.
    Cart { items: Vec<LineRequest> },
}

impl PurchaseSelection {
    pub fn lines(&self) -> Vec<LineRequest> {
        match self {
            PurchaseSelection::Single {
                product_id,
                quantity,
            } => vec![LineRequest {
                product_id: product_id.clone(),
                quantity: *quantity,
            }],
            PurchaseSelection::Cart { items } => items.clone(),
        }
    }

    pub fn is_cart(&self) -> bool {
        matches!(self, PurchaseSelection::Cart { .. })
    }
}
