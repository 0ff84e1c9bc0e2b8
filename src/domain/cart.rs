use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One (user, product) row. Adding the same pair again increments `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub user_id: Uuid,
    pub product_id: String,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}
