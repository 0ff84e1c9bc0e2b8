//! In-process repository. Used when no DATABASE_URL is configured and by tests.
//!
//! A single write lock covers each multi-step operation, so order, payment
//! and cart changes land together or not at all.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{CartItem, NewOrder, Order, OrderItem, OrderStatus, PaymentRecord, Product, User};
use crate::ports::{Repository, RepositoryError, RepositoryResult};
use crate::validation::MAX_LINE_QUANTITY;

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Uuid>,
    products: HashMap<String, Product>,
    carts: HashMap<Uuid, Vec<CartItem>>,
    orders: HashMap<Uuid, Order>,
    items: HashMap<Uuid, Vec<OrderItem>>,
    payments: HashMap<String, PaymentRecord>,
}

impl Store {
    fn payment_taken(&self, gateway_payment_id: &str) -> bool {
        self.payments.contains_key(gateway_payment_id)
            || self
                .orders
                .values()
                .any(|o| o.gateway_payment_id.as_deref() == Some(gateway_payment_id))
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.store.write().await.products.insert(product.id.clone(), product);
    }

    /// Registers a user whose session is identified by `token_hash`.
    pub async fn insert_user(&self, user: User, token_hash: impl Into<String>) {
        let mut store = self.store.write().await;
        store.sessions.insert(token_hash.into(), user.id);
        store.users.insert(user.id, user);
    }

    pub async fn payment_count(&self) -> usize {
        self.store.read().await.payments.len()
    }

    pub async fn payment(&self, gateway_payment_id: &str) -> Option<PaymentRecord> {
        self.store.read().await.payments.get(gateway_payment_id).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.store.read().await.orders.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user_by_token_hash(&self, token_hash: &str) -> RepositoryResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store
            .sessions
            .get(token_hash)
            .and_then(|id| store.users.get(id))
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> RepositoryResult<User> {
        self.store
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_products(&self, ids: &[String]) -> RepositoryResult<Vec<Product>> {
        let store = self.store.read().await;
        Ok(ids.iter().filter_map(|id| store.products.get(id)).cloned().collect())
    }

    async fn add_to_cart(&self, user_id: Uuid, product_id: &str, quantity: i32) -> RepositoryResult<CartItem> {
        let mut store = self.store.write().await;
        let cart = store.carts.entry(user_id).or_default();

        if let Some(existing) = cart.iter_mut().find(|item| item.product_id == product_id) {
            existing.quantity = (existing.quantity + quantity).min(MAX_LINE_QUANTITY);
            return Ok(existing.clone());
        }

        let item = CartItem {
            user_id,
            product_id: product_id.to_string(),
            quantity,
            added_at: Utc::now(),
        };
        cart.push(item.clone());
        Ok(item)
    }

    async fn list_cart(&self, user_id: Uuid) -> RepositoryResult<Vec<CartItem>> {
        Ok(self
            .store
            .read()
            .await
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_order(
        &self,
        new_order: &NewOrder,
        payment: Option<&PaymentRecord>,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order> {
        let mut store = self.store.write().await;
        let order = &new_order.order;

        if store.orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict(format!("order {} exists", order.id)));
        }
        for payment_id in order
            .gateway_payment_id
            .iter()
            .chain(payment.map(|p| &p.gateway_payment_id))
        {
            if store.payment_taken(payment_id) {
                return Err(RepositoryError::DuplicatePayment(payment_id.clone()));
            }
        }

        store.orders.insert(order.id, order.clone());
        store.items.insert(order.id, new_order.items.clone());
        if let Some(payment) = payment {
            store
                .payments
                .insert(payment.gateway_payment_id.clone(), payment.clone());
        }
        if let Some(user_id) = clear_cart_for {
            store.carts.remove(&user_id);
        }

        Ok(order.clone())
    }

    async fn confirm_order(
        &self,
        order_id: Uuid,
        payment: &PaymentRecord,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order> {
        let mut store = self.store.write().await;

        if store.payment_taken(&payment.gateway_payment_id) {
            return Err(RepositoryError::DuplicatePayment(payment.gateway_payment_id.clone()));
        }

        let order = store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))?;
        if order.status != OrderStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "order {} is {}, expected pending",
                order_id, order.status
            )));
        }

        order.apply_payment(payment);
        let confirmed = order.clone();

        store
            .payments
            .insert(payment.gateway_payment_id.clone(), payment.clone());
        if let Some(user_id) = clear_cart_for {
            store.carts.remove(&user_id);
        }

        Ok(confirmed)
    }

    async fn attach_gateway_order(
        &self,
        order_id: Uuid,
        gateway: &str,
        gateway_order_id: &str,
    ) -> RepositoryResult<Order> {
        let mut store = self.store.write().await;
        let order = store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))?;
        if order.status != OrderStatus::Pending {
            return Err(RepositoryError::Conflict(format!("order {} is {}", order_id, order.status)));
        }

        order.gateway = Some(gateway.to_string());
        order.gateway_order_id = Some(gateway_order_id.to_string());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn get_order(&self, id: Uuid) -> RepositoryResult<Order> {
        self.store
            .read()
            .await
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_order_items(&self, order_id: Uuid) -> RepositoryResult<Vec<OrderItem>> {
        Ok(self
            .store
            .read()
            .await
            .items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_order_by_payment_id(&self, gateway_payment_id: &str) -> RepositoryResult<Option<Order>> {
        Ok(self
            .store
            .read()
            .await
            .orders
            .values()
            .find(|o| o.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Order>> {
        let store = self.store.read().await;
        let mut orders: Vec<Order> = store
            .orders
            .values()
            .filter(|o| o.is_owned_by(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<Order> {
        let mut store = self.store.write().await;
        let order = store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| RepositoryError::NotFound(order_id.to_string()))?;
        if order.status != from {
            return Err(RepositoryError::Conflict(format!(
                "order {} is {}, expected {}",
                order_id, order.status, from
            )));
        }

        order.status = to;
        if let Some(reason) = reason {
            order.cancellation_reason = Some(reason.to_string());
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}
