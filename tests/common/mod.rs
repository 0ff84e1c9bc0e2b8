#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_core::adapters::InMemoryRepository;
use storefront_core::domain::{
    CartItem, CustomerSnapshot, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, PaymentRecord, Product, User,
};
use storefront_core::ports::{
    GatewayError, GatewayIntent, GatewayPayment, GatewayPaymentStatus, IntentRequest, NotificationReport, Notifier,
    PaymentGateway, Recipient, Repository, RepositoryError, RepositoryResult,
};
use storefront_core::services::{EngineSettings, OrderEngine};
use storefront_core::signature::{compute_signature, token_digest, verify_callback};

pub const GATEWAY_SECRET: &str = "test_gateway_secret";
pub const SOFA_ID: &str = "SOFA-1";
pub const TABLE_ID: &str = "TABLE-1";

/// Gateway double with scripted intent failures, issued intents and a payment ledger.
pub struct ScriptedGateway {
    intent_failure: Mutex<Option<GatewayError>>,
    intents: Mutex<HashMap<String, i64>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
    intent_calls: AtomicUsize,
    intent_delay: Mutex<Option<Duration>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            intent_failure: Mutex::new(None),
            intents: Mutex::new(HashMap::new()),
            payments: Mutex::new(HashMap::new()),
            intent_calls: AtomicUsize::new(0),
            intent_delay: Mutex::new(None),
        }
    }

    pub fn fail_intents_with(&self, err: GatewayError) {
        *self.intent_failure.lock().unwrap() = Some(err);
    }

    pub fn delay_intents(&self, delay: Duration) {
        *self.intent_delay.lock().unwrap() = Some(delay);
    }

    pub fn intent_calls(&self) -> usize {
        self.intent_calls.load(Ordering::SeqCst)
    }

    pub fn record_payment(&self, payment_id: &str, status: GatewayPaymentStatus, amount_minor: i64) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            GatewayPayment {
                payment_id: payment_id.to_string(),
                gateway_order_id: None,
                status,
                amount_minor,
                currency: "INR".to_string(),
                raw: serde_json::json!({ "id": payment_id }),
            },
        );
    }

    /// Customer pays an issued intent in full.
    pub fn pay(&self, gateway_order_id: &str, payment_id: &str) {
        let amount_minor = *self
            .intents
            .lock()
            .unwrap()
            .get(gateway_order_id)
            .expect("intent was never issued");
        self.pay_amount(gateway_order_id, payment_id, amount_minor);
    }

    pub fn pay_amount(&self, gateway_order_id: &str, payment_id: &str, amount_minor: i64) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            GatewayPayment {
                payment_id: payment_id.to_string(),
                gateway_order_id: Some(gateway_order_id.to_string()),
                status: GatewayPaymentStatus::Captured,
                amount_minor,
                currency: "INR".to_string(),
                raw: serde_json::json!({ "id": payment_id, "order_id": gateway_order_id }),
            },
        );
    }

    pub fn sign(gateway_order_id: &str, gateway_payment_id: &str) -> String {
        compute_signature(gateway_order_id, gateway_payment_id, GATEWAY_SECRET)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Razorpay
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.intent_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.intent_failure.lock().unwrap().clone() {
            return Err(err);
        }

        let gateway_order_id = format!("order_{}", Uuid::new_v4().simple());
        let amount_minor = storefront_core::services::pricing::to_minor_units(&request.amount)
            .ok_or_else(|| GatewayError::InvalidResponse("amount overflow".to_string()))?;
        self.intents
            .lock()
            .unwrap()
            .insert(gateway_order_id.clone(), amount_minor);

        Ok(GatewayIntent {
            gateway_order_id,
            amount_minor,
            currency: request.currency.clone(),
            checkout_token: None,
            key_id: Some("rzp_test_key".to_string()),
        })
    }

    fn verify_callback(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        verify_callback(gateway_order_id, gateway_payment_id, signature, GATEWAY_SECRET)
    }

    async fn fetch_payment(&self, gateway_payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .get(gateway_payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(gateway_payment_id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Created { order_id: Uuid },
    Cancelled { order_id: Uuid, recipient: Recipient, reason: String },
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn order_created(&self, order: &Order, _items: &[OrderItem]) -> NotificationReport {
        let _ = self.tx.send(Notification::Created { order_id: order.id });
        NotificationReport::default()
    }

    async fn order_cancelled(&self, order: &Order, recipient: &Recipient, reason: &str) -> NotificationReport {
        let _ = self.tx.send(Notification::Cancelled {
            order_id: order.id,
            recipient: recipient.clone(),
            reason: reason.to_string(),
        });
        NotificationReport::default()
    }
}

/// Delegates to the in-memory store but can be told to fail order writes or
/// to miss recorded payments on lookup, as a racing reader would.
pub struct FlakyRepository {
    inner: Arc<InMemoryRepository>,
    fail_writes: AtomicBool,
    stale_payment_lookups: AtomicUsize,
}

impl FlakyRepository {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            stale_payment_lookups: AtomicUsize::new(0),
        }
    }

    /// The next `count` payment-id lookups report no order.
    pub fn miss_payment_lookups(&self, count: usize) {
        self.stale_payment_lookups.store(count, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Storage("connection reset by peer".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Repository for FlakyRepository {
    async fn find_user_by_token_hash(&self, token_hash: &str) -> RepositoryResult<Option<User>> {
        self.inner.find_user_by_token_hash(token_hash).await
    }

    async fn get_user(&self, id: Uuid) -> RepositoryResult<User> {
        self.inner.get_user(id).await
    }

    async fn get_products(&self, ids: &[String]) -> RepositoryResult<Vec<Product>> {
        self.inner.get_products(ids).await
    }

    async fn add_to_cart(&self, user_id: Uuid, product_id: &str, quantity: i32) -> RepositoryResult<CartItem> {
        self.inner.add_to_cart(user_id, product_id, quantity).await
    }

    async fn list_cart(&self, user_id: Uuid) -> RepositoryResult<Vec<CartItem>> {
        self.inner.list_cart(user_id).await
    }

    async fn create_order(
        &self,
        new_order: &NewOrder,
        payment: Option<&PaymentRecord>,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order> {
        self.check_writes()?;
        self.inner.create_order(new_order, payment, clear_cart_for).await
    }

    async fn confirm_order(
        &self,
        order_id: Uuid,
        payment: &PaymentRecord,
        clear_cart_for: Option<Uuid>,
    ) -> RepositoryResult<Order> {
        self.check_writes()?;
        self.inner.confirm_order(order_id, payment, clear_cart_for).await
    }

    async fn attach_gateway_order(
        &self,
        order_id: Uuid,
        gateway: &str,
        gateway_order_id: &str,
    ) -> RepositoryResult<Order> {
        self.inner.attach_gateway_order(order_id, gateway, gateway_order_id).await
    }

    async fn get_order(&self, id: Uuid) -> RepositoryResult<Order> {
        self.inner.get_order(id).await
    }

    async fn get_order_items(&self, order_id: Uuid) -> RepositoryResult<Vec<OrderItem>> {
        self.inner.get_order_items(order_id).await
    }

    async fn find_order_by_payment_id(&self, gateway_payment_id: &str) -> RepositoryResult<Option<Order>> {
        let stale = self
            .stale_payment_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        self.inner.find_order_by_payment_id(gateway_payment_id).await
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Order>> {
        self.inner.list_orders_for_user(user_id).await
    }

    async fn transition_status(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> RepositoryResult<Order> {
        self.inner.transition_status(order_id, from, to, reason).await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.inner.ping().await
    }
}

pub struct Harness {
    pub store: Arc<InMemoryRepository>,
    pub repo: Arc<FlakyRepository>,
    pub gateway: Arc<ScriptedGateway>,
    pub engine: Arc<OrderEngine>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(EngineSettings::default()).await
    }

    pub async fn with_settings(settings: EngineSettings) -> Self {
        let store = Arc::new(InMemoryRepository::new());
        store
            .insert_product(Product::new(SOFA_ID, "Three seater sofa", BigDecimal::from(1000)))
            .await;
        store
            .insert_product(Product::new(TABLE_ID, "Teak coffee table", BigDecimal::from(450)))
            .await;

        let repo = Arc::new(FlakyRepository::new(store.clone()));
        let gateway = Arc::new(ScriptedGateway::new());
        let (notifier, notifications) = RecordingNotifier::new();

        let engine = Arc::new(OrderEngine::new(
            repo.clone(),
            gateway.clone(),
            Arc::new(notifier),
            settings,
        ));

        Self {
            store,
            repo,
            gateway,
            engine,
            notifications,
        }
    }

    /// Registers a user whose bearer token is `token`.
    pub async fn user(&self, name: &str, email: &str, token: &str) -> User {
        let user = User::new(name, email, Some("9876543210".to_string()));
        self.store.insert_user(user.clone(), token_digest(token)).await;
        user
    }

    pub async fn next_notification(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(2), self.notifications.recv())
            .await
            .expect("notification not dispatched")
            .expect("notifier dropped")
    }
}

pub fn customer() -> CustomerSnapshot {
    CustomerSnapshot {
        name: "Asha Rao".to_string(),
        phone: "9876543210".to_string(),
        email: Some("asha@example.com".to_string()),
        address: "12 MG Road, Bengaluru".to_string(),
        pincode: "560001".to_string(),
    }
}
