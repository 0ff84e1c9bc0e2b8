//! Order reconciliation engine.
//!
//! Creates purchase intents, verifies gateway callbacks against stored
//! orders, moves orders through their status machine and fires
//! notifications after the fact. Persistence is awaited; notifications are
//! spawned and never affect the outcome.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    CartItem, CustomerSnapshot, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, PaymentRecord,
    PurchaseSelection, User, Verification, DIRECT_VERIFICATION_SENTINEL,
};
use crate::ports::{
    GatewayError, GatewayIntent, GatewayPayment, IntentRequest, Notifier, PaymentGateway, Recipient, Repository,
    RepositoryError,
};
use crate::validation::MAX_LINE_QUANTITY;

use super::errors::{EngineError, EngineResult};
use super::pricing::{self, from_minor_units, to_minor_units, Quote};

const COD_FALLBACK_MESSAGE: &str =
    "Online payment is temporarily unavailable. You can still place this order with cash on delivery.";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub currency: String,
    pub gateway_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            gateway_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer: CustomerSnapshot,
    pub selection: PurchaseSelection,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub intent: Option<GatewayIntent>,
    /// Set when the gateway could not issue an intent; the client should offer COD.
    pub cod_fallback: Option<String>,
}

#[derive(Debug, Clone)]
pub enum IntentOutcome {
    Created { intent: GatewayIntent, amount: BigDecimal },
    CodFallback { reason: String },
}

/// Gateway fields relayed by the client after checkout.
#[derive(Debug, Clone, Default)]
pub struct PaymentCallback {
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub signature: Option<String>,
}

/// What a verified payment settles: an existing pending order, or a new
/// order built from the customer details and selection.
#[derive(Debug, Clone, Default)]
pub struct SettlementContext {
    pub order_id: Option<Uuid>,
    pub customer: Option<CustomerSnapshot>,
    pub selection: Option<PurchaseSelection>,
    pub user: Option<User>,
    /// Why the supplied customer details or items were unusable.
    pub invalid_details: Option<String>,
}

#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Confirmed { order: Order },
    /// The payment id was reconciled before; this is that order.
    AlreadyProcessed { order: Order },
    /// Money was taken but no order could be recorded. Needs manual follow-up.
    PaymentCapturedOrderFailed { gateway_payment_id: String, reason: String },
}

pub struct OrderEngine {
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
}

impl OrderEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            repo,
            gateway,
            notifier,
            settings,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub fn currency(&self) -> &str {
        &self.settings.currency
    }

    /// Prices a selection from catalog data as of now.
    pub async fn quote(&self, selection: &PurchaseSelection) -> EngineResult<Quote> {
        pricing::quote(self.repo.as_ref(), selection, Utc::now()).await
    }

    pub async fn create_intent(
        &self,
        selection: &PurchaseSelection,
        user: Option<&User>,
    ) -> EngineResult<IntentOutcome> {
        let quote = self.quote(selection).await?;

        let mut metadata = BTreeMap::new();
        if let Some(user) = user {
            metadata.insert("user_id".to_string(), user.id.to_string());
        }

        let receipt = format!("rcpt_{}", Uuid::new_v4().simple());
        Ok(self.request_intent(&quote.total, receipt, metadata).await)
    }

    /// `POST /orders`. COD orders are final here; online orders stay
    /// `pending` until a verified callback confirms them.
    pub async fn checkout(&self, request: CheckoutRequest, user: Option<&User>) -> EngineResult<CheckoutOutcome> {
        let method = request.payment_method;
        if method.is_online() {
            if user.is_none() {
                return Err(EngineError::AuthRequired);
            }
            if method != self.gateway.method() {
                return Err(EngineError::Validation(format!(
                    "payment method {} is not available",
                    method
                )));
            }
        }

        let quote = self.quote(&request.selection).await?;
        let new_order = build_new_order(
            user.map(|u| u.id),
            request.customer,
            &quote,
            &self.settings.currency,
            method,
        );

        // Online carts are cleared when the payment is confirmed.
        let clear_cart_for = match user {
            Some(user) if !method.is_online() && request.selection.is_cart() => Some(user.id),
            _ => None,
        };

        let order = self.repo.create_order(&new_order, None, clear_cart_for).await?;
        info!(
            order_id = %order.id,
            total = %order.total,
            payment_method = %method,
            "order created"
        );

        if !method.is_online() {
            self.dispatch_created(order.clone());
            return Ok(CheckoutOutcome {
                order,
                intent: None,
                cod_fallback: None,
            });
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("order_id".to_string(), order.id.to_string());

        match self
            .request_intent(&order.total, order.id.simple().to_string(), metadata)
            .await
        {
            IntentOutcome::Created { intent, .. } => {
                let order = match self
                    .repo
                    .attach_gateway_order(order.id, method.as_str(), &intent.gateway_order_id)
                    .await
                {
                    Ok(updated) => updated,
                    Err(err) => {
                        // The signature still ties a later callback to this intent.
                        error!(order_id = %order.id, error = %err, "failed to record gateway order id");
                        order
                    }
                };
                Ok(CheckoutOutcome {
                    order,
                    intent: Some(intent),
                    cod_fallback: None,
                })
            }
            IntentOutcome::CodFallback { reason } => Ok(CheckoutOutcome {
                order,
                intent: None,
                cod_fallback: Some(reason),
            }),
        }
    }

    /// Verifies a relayed gateway callback and confirms the order it pays for.
    ///
    /// The signature only binds the payment id to a gateway order, so the
    /// payment is also looked up and must cover the server-side total.
    pub async fn verify_and_confirm(
        &self,
        callback: PaymentCallback,
        context: SettlementContext,
    ) -> EngineResult<VerificationOutcome> {
        let gateway_order_id = non_empty(callback.gateway_order_id);
        let gateway_payment_id = non_empty(callback.gateway_payment_id);
        let signature = non_empty(callback.signature);

        let (gateway_order_id, gateway_payment_id, signature) =
            match (gateway_order_id, gateway_payment_id, signature) {
                (Some(order_ref), Some(payment_id), Some(signature)) => (order_ref, payment_id, signature),
                (_, Some(payment_id), _) => {
                    warn!(
                        gateway_payment_id = %payment_id,
                        "callback lacks signature fields, falling back to direct verification"
                    );
                    return self.verify_direct(payment_id, context).await;
                }
                _ => {
                    error!("payment callback carried no payment id; customer may have been charged");
                    return Err(EngineError::PaymentDataMissing);
                }
            };

        if !self
            .gateway
            .verify_callback(&gateway_order_id, &gateway_payment_id, &signature)
        {
            warn!(
                gateway_order_id = %gateway_order_id,
                gateway_payment_id = %gateway_payment_id,
                "payment signature mismatch"
            );
            return Err(EngineError::verification("signature mismatch", false));
        }

        if let Some(order) = self.repo.find_order_by_payment_id(&gateway_payment_id).await? {
            info!(order_id = %order.id, gateway_payment_id = %gateway_payment_id, "payment already reconciled");
            return Ok(VerificationOutcome::AlreadyProcessed { order });
        }

        if let Err(reason) = settlement_target(&context) {
            return Ok(captured_without_order(gateway_payment_id, reason));
        }

        let payment = self.lookup_payment(&gateway_payment_id).await?;
        if payment.gateway_order_id.as_deref() != Some(gateway_order_id.as_str()) {
            warn!(
                gateway_order_id = %gateway_order_id,
                gateway_payment_id = %gateway_payment_id,
                reported_order_id = ?payment.gateway_order_id,
                "payment does not belong to the signed gateway order"
            );
            return Err(EngineError::verification(
                "payment belongs to a different gateway order",
                true,
            ));
        }
        self.ensure_captured(&payment)?;

        let expected_total = match self.expected_total(&context).await {
            Ok(total) => total,
            Err(err) => return Ok(captured_without_order(gateway_payment_id, err.to_string())),
        };
        ensure_covers(&payment, &expected_total)?;

        let record = PaymentRecord::signed(
            Uuid::nil(),
            self.gateway.method().as_str(),
            gateway_order_id,
            gateway_payment_id,
            signature,
            from_minor_units(payment.amount_minor),
            self.settings.currency.clone(),
        );

        self.settle(record, context).await
    }

    /// Degraded path: trusts the gateway's payment lookup when the client
    /// could not relay a signature.
    pub async fn verify_direct(
        &self,
        gateway_payment_id: String,
        context: SettlementContext,
    ) -> EngineResult<VerificationOutcome> {
        let gateway_payment_id = gateway_payment_id.trim().to_string();
        if gateway_payment_id.is_empty() {
            return Err(EngineError::PaymentDataMissing);
        }

        if let Some(order) = self.repo.find_order_by_payment_id(&gateway_payment_id).await? {
            info!(order_id = %order.id, gateway_payment_id = %gateway_payment_id, "payment already reconciled");
            return Ok(VerificationOutcome::AlreadyProcessed { order });
        }

        let payment = self.lookup_payment(&gateway_payment_id).await?;
        self.ensure_captured(&payment)?;

        if let Err(reason) = settlement_target(&context) {
            return Ok(captured_without_order(gateway_payment_id, reason));
        }

        let expected_total = match self.expected_total(&context).await {
            Ok(total) => total,
            Err(err) => return Ok(captured_without_order(gateway_payment_id, err.to_string())),
        };
        ensure_covers(&payment, &expected_total)?;

        warn!(
            gateway_payment_id = %gateway_payment_id,
            verification = "direct",
            "confirming payment by gateway lookup only, without signature proof"
        );

        let record = PaymentRecord::direct(
            Uuid::nil(),
            self.gateway.method().as_str(),
            payment.gateway_order_id.clone(),
            gateway_payment_id,
            from_minor_units(payment.amount_minor),
            self.settings.currency.clone(),
            payment.raw,
        );

        self.settle(record, context).await
    }

    /// Customer cancellation. The notification goes to the session user's
    /// own name and email, never to values from the request.
    pub async fn cancel(
        &self,
        order_id: Uuid,
        user: &User,
        reason: &str,
        details: Option<&str>,
    ) -> EngineResult<Order> {
        let order = self.load_order(order_id).await?;

        if !order.is_owned_by(user.id) {
            warn!(order_id = %order_id, user_id = %user.id, "cancellation attempted by non-owner");
            return Err(EngineError::Forbidden(order_id));
        }

        if !order.status.is_cancellable() {
            return Err(EngineError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        let reason = cancellation_text(reason, details);
        let cancelled = self
            .transition(order.id, order.status, OrderStatus::Cancelled, Some(&reason))
            .await?;

        info!(order_id = %cancelled.id, user_id = %user.id, "order cancelled by customer");

        let recipient = Recipient {
            name: user.name.clone(),
            email: Some(user.email.clone()),
            phone: user.phone.clone().or_else(|| Some(cancelled.customer.phone.clone())),
        };
        self.dispatch_cancelled(cancelled.clone(), recipient, reason);

        Ok(cancelled)
    }

    /// Store-side status change (fulfilment, processing, cancellation).
    pub async fn update_status(&self, order_id: Uuid, to: OrderStatus) -> EngineResult<Order> {
        let order = self.load_order(order_id).await?;
        if !order.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from: order.status, to });
        }

        let reason = (to == OrderStatus::Cancelled).then_some("cancelled by store");
        let updated = self.transition(order.id, order.status, to, reason).await?;
        info!(order_id = %updated.id, from = %order.status, to = %to, "order status updated");

        if to == OrderStatus::Cancelled {
            let recipient = match updated.user_id {
                Some(user_id) => match self.repo.get_user(user_id).await {
                    Ok(user) => Recipient {
                        name: user.name,
                        email: Some(user.email),
                        phone: user.phone.or_else(|| Some(updated.customer.phone.clone())),
                    },
                    Err(err) => {
                        warn!(order_id = %updated.id, error = %err, "owner lookup failed, using order snapshot");
                        snapshot_recipient(&updated)
                    }
                },
                None => snapshot_recipient(&updated),
            };
            self.dispatch_cancelled(updated.clone(), recipient, "cancelled by store".to_string());
        }

        Ok(updated)
    }

    pub async fn order_for_user(&self, order_id: Uuid, user: &User) -> EngineResult<(Order, Vec<OrderItem>)> {
        let order = self.load_order(order_id).await?;
        if !order.is_owned_by(user.id) {
            return Err(EngineError::Forbidden(order_id));
        }
        let items = self.repo.get_order_items(order.id).await?;
        Ok((order, items))
    }

    pub async fn order_with_items(&self, order_id: Uuid) -> EngineResult<(Order, Vec<OrderItem>)> {
        let order = self.load_order(order_id).await?;
        let items = self.repo.get_order_items(order.id).await?;
        Ok((order, items))
    }

    pub async fn orders_for_user(&self, user: &User) -> EngineResult<Vec<Order>> {
        Ok(self.repo.list_orders_for_user(user.id).await?)
    }

    pub async fn add_to_cart(&self, user: &User, product_id: &str, quantity: i32) -> EngineResult<CartItem> {
        if quantity <= 0 || quantity > MAX_LINE_QUANTITY {
            return Err(EngineError::Validation(format!(
                "quantity must be between 1 and {}",
                MAX_LINE_QUANTITY
            )));
        }

        let products = self.repo.get_products(&[product_id.to_string()]).await?;
        if products.is_empty() {
            return Err(EngineError::ProductNotFound(product_id.to_string()));
        }

        Ok(self.repo.add_to_cart(user.id, product_id, quantity).await?)
    }

    pub async fn cart(&self, user: &User) -> EngineResult<Vec<CartItem>> {
        Ok(self.repo.list_cart(user.id).await?)
    }

    async fn request_intent(
        &self,
        amount: &BigDecimal,
        receipt: String,
        metadata: BTreeMap<String, String>,
    ) -> IntentOutcome {
        let request = IntentRequest {
            amount: amount.clone(),
            currency: self.settings.currency.clone(),
            receipt,
            metadata,
        };

        match self.with_timeout(self.gateway.create_intent(&request)).await {
            Ok(intent) => {
                info!(
                    gateway = %self.gateway.method(),
                    gateway_order_id = %intent.gateway_order_id,
                    amount_minor = intent.amount_minor,
                    "payment intent created"
                );
                IntentOutcome::Created {
                    intent,
                    amount: amount.clone(),
                }
            }
            Err(GatewayError::Auth(detail)) => {
                warn!(gateway = %self.gateway.method(), detail = %detail, "gateway rejected credentials, offering cash on delivery");
                IntentOutcome::CodFallback {
                    reason: COD_FALLBACK_MESSAGE.to_string(),
                }
            }
            Err(err) => {
                warn!(gateway = %self.gateway.method(), error = %err, "intent creation failed, offering cash on delivery");
                IntentOutcome::CodFallback {
                    reason: COD_FALLBACK_MESSAGE.to_string(),
                }
            }
        }
    }

    /// Persists a verified payment. Every failure past this point still
    /// reports the payment as taken.
    async fn settle(&self, record: PaymentRecord, context: SettlementContext) -> EngineResult<VerificationOutcome> {
        let gateway_payment_id = record.gateway_payment_id.clone();

        let persisted = match context.order_id {
            Some(order_id) => self.confirm_existing(order_id, record, &context).await,
            None => self.create_confirmed(record, &context).await,
        };

        match persisted {
            Ok(order) => {
                if order.verification == Verification::Direct {
                    warn!(order_id = %order.id, gateway_payment_id = %gateway_payment_id, verification = "direct", "order confirmed without signature proof");
                } else {
                    info!(order_id = %order.id, gateway_payment_id = %gateway_payment_id, "order confirmed");
                }
                self.dispatch_created(order.clone());
                Ok(VerificationOutcome::Confirmed { order })
            }
            Err(EngineError::Storage(RepositoryError::DuplicatePayment(_))) => {
                match self.repo.find_order_by_payment_id(&gateway_payment_id).await {
                    Ok(Some(order)) => {
                        info!(order_id = %order.id, gateway_payment_id = %gateway_payment_id, "concurrent reconciliation already recorded this payment");
                        Ok(VerificationOutcome::AlreadyProcessed { order })
                    }
                    other => {
                        error!(gateway_payment_id = %gateway_payment_id, lookup = ?other.map(|o| o.map(|o| o.id)), "duplicate payment reported but no order found");
                        Ok(VerificationOutcome::PaymentCapturedOrderFailed {
                            gateway_payment_id,
                            reason: "payment already recorded but order lookup failed".to_string(),
                        })
                    }
                }
            }
            Err(err) => Ok(captured_without_order(gateway_payment_id, err.to_string())),
        }
    }

    async fn confirm_existing(
        &self,
        order_id: Uuid,
        record: PaymentRecord,
        context: &SettlementContext,
    ) -> EngineResult<Order> {
        let order = self.load_order(order_id).await?;

        if let Some(owner) = order.user_id {
            if context.user.as_ref().map(|u| u.id) != Some(owner) {
                return Err(EngineError::Forbidden(order_id));
            }
        }

        if let Some(expected) = &order.gateway_order_id {
            if record.gateway_order_id != DIRECT_VERIFICATION_SENTINEL && expected != &record.gateway_order_id {
                return Err(EngineError::verification(
                    "payment belongs to a different gateway order",
                    true,
                ));
            }
        }

        if order.status != OrderStatus::Pending {
            return Err(EngineError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Confirmed,
            });
        }

        let record = record.for_order(order.id);

        let clear_cart_for = cart_owner(context);
        Ok(self.repo.confirm_order(order.id, &record, clear_cart_for).await?)
    }

    async fn create_confirmed(&self, record: PaymentRecord, context: &SettlementContext) -> EngineResult<Order> {
        let (Some(customer), Some(selection)) = (context.customer.clone(), context.selection.as_ref()) else {
            return Err(missing_settlement_target());
        };

        // Re-priced now: a deal quoted earlier may have lapsed since.
        let quote = self.quote(selection).await?;
        let mut new_order = build_new_order(
            context.user.as_ref().map(|u| u.id),
            customer,
            &quote,
            &self.settings.currency,
            self.gateway.method(),
        );

        let record = record.for_order(new_order.order.id);
        new_order.order.apply_payment(&record);

        let clear_cart_for = cart_owner(context);
        Ok(self.repo.create_order(&new_order, Some(&record), clear_cart_for).await?)
    }

    async fn lookup_payment(&self, gateway_payment_id: &str) -> EngineResult<GatewayPayment> {
        match self
            .with_timeout(self.gateway.fetch_payment(gateway_payment_id))
            .await
        {
            Ok(payment) => Ok(payment),
            Err(GatewayError::NotFound(_)) => Err(EngineError::verification("payment not found at gateway", true)),
            Err(err) => {
                error!(gateway_payment_id = %gateway_payment_id, error = %err, "gateway payment lookup failed");
                Err(EngineError::GatewayUnavailable(err))
            }
        }
    }

    fn ensure_captured(&self, payment: &GatewayPayment) -> EngineResult<()> {
        if !payment.status.is_settled() {
            warn!(
                gateway_payment_id = %payment.payment_id,
                status = ?payment.status,
                "payment refused: not captured"
            );
            return Err(EngineError::verification("payment has not been captured", true));
        }

        if !payment.currency.eq_ignore_ascii_case(&self.settings.currency) {
            return Err(EngineError::verification(
                format!("payment currency {} does not match {}", payment.currency, self.settings.currency),
                true,
            ));
        }
        Ok(())
    }

    /// The server-side total the payment must cover.
    async fn expected_total(&self, context: &SettlementContext) -> EngineResult<BigDecimal> {
        match (context.order_id, &context.selection) {
            (Some(order_id), _) => Ok(self.load_order(order_id).await?.total),
            (None, Some(selection)) => Ok(self.quote(selection).await?.total),
            (None, None) => Err(missing_settlement_target()),
        }
    }

    async fn load_order(&self, order_id: Uuid) -> EngineResult<Order> {
        match self.repo.get_order(order_id).await {
            Ok(order) => Ok(order),
            Err(RepositoryError::NotFound(_)) => Err(EngineError::OrderNotFound(order_id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn transition(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> EngineResult<Order> {
        match self.repo.transition_status(order_id, from, to, reason).await {
            Ok(order) => Ok(order),
            Err(RepositoryError::Conflict(_)) => Err(EngineError::Conflict(order_id)),
            Err(RepositoryError::NotFound(_)) => Err(EngineError::OrderNotFound(order_id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn with_timeout<T>(&self, call: impl Future<Output = Result<T, GatewayError>>) -> Result<T, GatewayError> {
        match tokio::time::timeout(self.settings.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    fn dispatch_created(&self, order: Order) {
        let repo = Arc::clone(&self.repo);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let items = match repo.get_order_items(order.id).await {
                Ok(items) => items,
                Err(err) => {
                    warn!(order_id = %order.id, error = %err, "could not load items for notification");
                    Vec::new()
                }
            };
            let report = notifier.order_created(&order, &items).await;
            info!(
                order_id = %order.id,
                email_sent = report.email_sent,
                sms_sent = report.sms_sent,
                "order notification dispatched"
            );
        });
    }

    fn dispatch_cancelled(&self, order: Order, recipient: Recipient, reason: String) {
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let report = notifier.order_cancelled(&order, &recipient, &reason).await;
            info!(
                order_id = %order.id,
                email_sent = report.email_sent,
                sms_sent = report.sms_sent,
                "cancellation notification dispatched"
            );
        });
    }
}

fn build_new_order(
    user_id: Option<Uuid>,
    customer: CustomerSnapshot,
    quote: &Quote,
    currency: &str,
    method: PaymentMethod,
) -> NewOrder {
    let order = Order::new(user_id, customer, quote.total.clone(), currency, method);
    let items = quote
        .lines
        .iter()
        .map(|line| OrderItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price.clone(),
        })
        .collect();

    NewOrder { order, items }
}

/// Whether the context names something a verified payment can settle.
fn settlement_target(context: &SettlementContext) -> Result<(), String> {
    if context.order_id.is_some() {
        return Ok(());
    }
    if let Some(problem) = &context.invalid_details {
        return Err(problem.clone());
    }
    if context.customer.is_some() && context.selection.is_some() {
        Ok(())
    } else {
        Err(missing_settlement_target().to_string())
    }
}

fn ensure_covers(payment: &GatewayPayment, expected_total: &BigDecimal) -> EngineResult<()> {
    let expected_minor = to_minor_units(expected_total).unwrap_or(i64::MAX);
    if payment.amount_minor < expected_minor {
        warn!(
            gateway_payment_id = %payment.payment_id,
            paid_minor = payment.amount_minor,
            expected_minor,
            "payment refused: captured amount below order total"
        );
        return Err(EngineError::verification("captured amount is below the order total", true));
    }
    Ok(())
}

/// Money was taken but no order can be recorded for it.
fn captured_without_order(gateway_payment_id: String, reason: impl Into<String>) -> VerificationOutcome {
    let reason = reason.into();
    error!(
        gateway_payment_id = %gateway_payment_id,
        reason = %reason,
        "payment verified but order could not be recorded; manual follow-up required"
    );
    VerificationOutcome::PaymentCapturedOrderFailed {
        gateway_payment_id,
        reason,
    }
}

fn missing_settlement_target() -> EngineError {
    EngineError::Validation(
        "customer details and items are required when no order id is supplied".to_string(),
    )
}

/// Only authenticated cart checkouts empty the cart.
fn cart_owner(context: &SettlementContext) -> Option<Uuid> {
    match (&context.user, &context.selection) {
        (Some(user), Some(selection)) if selection.is_cart() => Some(user.id),
        _ => None,
    }
}

fn snapshot_recipient(order: &Order) -> Recipient {
    Recipient {
        name: order.customer.name.clone(),
        email: order.customer.email.clone(),
        phone: Some(order.customer.phone.clone()),
    }
}

fn cancellation_text(reason: &str, details: Option<&str>) -> String {
    match details.map(str::trim).filter(|d| !d.is_empty()) {
        Some(details) => format!("{}: {}", reason.trim(), details),
        None => reason.trim().to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
