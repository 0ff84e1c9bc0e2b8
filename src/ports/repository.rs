//! Storage port. One interface, backend picked at the composition root.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{CartItem, NewOrder, Order, OrderItem, OrderStatus, PaymentRecord, Product, User};

/// Name of the uniqueness constraint guarding one order per gateway payment.
pub const PAYMENT_ID_CONSTRAINT: &str = "orders_gateway_payment_id_key";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The gateway payment id is already attached to an order.
    #[error("payment {0} already reconciled")]
    DuplicatePayment(String),

    /// A conditional update found the row in another state.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let constraint = db_err.constraint().unwrap_or_default();
                if constraint == PAYMENT_ID_CONSTRAINT || constraint == "payments_gateway_payment_id_key" {
                    RepositoryError::DuplicatePayment(constraint.to_string())
                } else {
                    RepositoryError::Conflict(db_err.message().to_string())
                }
            }
            _ => RepositoryError::Storage(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait Repository: Send + Sync {
    /// Resolves a session by the SHA-256 hex digest of its bearer token.
    async fn find_user_by_token_hash(&self, token_hash: &str) -> RepositoryResult<Option<User>>;

    async fn get_user(&self, id: Uuid) -> RepositoryResult<User>;

    /// Returns the products that exist among `ids`; missing ids are simply absent.
    async fn get_products(&self, ids: &[String]) -> RepositoryResult<Vec<Product>>;

    async fn add_to_cart(&self, user_id: Uuid, product_id: &str, quantity: i32) -> RepositoryResult<CartItem>;

    async fn list_cart(&self, user_id: Uuid) -> RepositoryResult<Vec<CartItem>>;

    /// Persists order, items, optional payment record and optional cart clear
    /// in one transaction. Fails with `DuplicatePayment` when the order's
    /// gateway payment id is already taken.
    async fn create_order(
        &self,
        new_order: &NewOrder,
        payment: Option<&PaymentRecord>,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order>;

    /// Moves a `pending` order to `confirmed` with the given payment, in one
    /// transaction with the payment record and cart clear.
    async fn confirm_order(
        &self,
        order_id: Uuid,
        payment: &PaymentRecord,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order>;

    /// Records the gateway-side intent id on a pending order.
    async fn attach_gateway_order(
        &self,
        order_id: Uuid,
        gateway: &str,
        gateway_order_id: &str,
    ) -> RepositoryResult<Order>;

    async fn get_order(&self, id: Uuid) -> RepositoryResult<Order>;

    async fn get_order_items(&self, order_id: Uuid) -> RepositoryResult<Vec<OrderItem>>;

    async fn find_order_by_payment_id(&self, gateway_payment_id: &str) -> RepositoryResult<Option<Order>>;

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Order>>;

    /// Conditional status update; `Conflict` if the order is no longer in `from`.
    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<Order>;

    async fn ping(&self) -> RepositoryResult<()>;
}
