//! Notifier that renders plain-text messages and hands them to a primary
//! channel, falling back to a secondary one when the primary fails.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{Order, OrderItem, PaymentStatus};
use crate::ports::{EmailMessage, MessageChannel, NotificationReport, Notifier, Recipient, SmsMessage};

pub struct ChannelNotifier {
    primary: Arc<dyn MessageChannel>,
    fallback: Option<Arc<dyn MessageChannel>>,
    store_name: String,
}

impl ChannelNotifier {
    pub fn new(primary: Arc<dyn MessageChannel>, fallback: Option<Arc<dyn MessageChannel>>) -> Self {
        Self {
            primary,
            fallback,
            store_name: "Furniture Store".to_string(),
        }
    }

    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self
    }

    async fn deliver_email(&self, message: Option<EmailMessage>) -> bool {
        let Some(message) = message else {
            return false;
        };

        match self.primary.send_email(&message).await {
            Ok(()) => return true,
            Err(err) => warn!(channel = self.primary.name(), error = %err, "email delivery failed"),
        }

        if let Some(fallback) = &self.fallback {
            match fallback.send_email(&message).await {
                Ok(()) => return true,
                Err(err) => warn!(channel = fallback.name(), error = %err, "fallback email delivery failed"),
            }
        }
        false
    }

    async fn deliver_sms(&self, message: Option<SmsMessage>) -> bool {
        let Some(message) = message else {
            return false;
        };

        match self.primary.send_sms(&message).await {
            Ok(()) => return true,
            Err(err) => warn!(channel = self.primary.name(), error = %err, "sms delivery failed"),
        }

        if let Some(fallback) = &self.fallback {
            match fallback.send_sms(&message).await {
                Ok(()) => return true,
                Err(err) => warn!(channel = fallback.name(), error = %err, "fallback sms delivery failed"),
            }
        }
        false
    }
}

fn short_id(order: &Order) -> String {
    order.id.simple().to_string()[..8].to_uppercase()
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

fn created_email(store: &str, order: &Order, items: &[OrderItem]) -> Option<EmailMessage> {
    let to = non_blank(order.customer.email.as_ref())?;
    let reference = short_id(order);

    let mut body = format!("Hi {},\n\nThank you for shopping with {}. ", order.customer.name, store);
    if order.payment_status == PaymentStatus::Completed {
        let _ = writeln!(body, "Your payment was received and order {} is confirmed.\n", reference);
    } else {
        let _ = writeln!(body, "Order {} is placed and will be paid on delivery.\n", reference);
    }
    for item in items {
        let _ = writeln!(
            body,
            "- {} x {} @ {} {}",
            item.quantity, item.product_name, order.currency, item.unit_price
        );
    }
    let _ = writeln!(body, "\nTotal: {} {}", order.currency, order.total);
    let _ = writeln!(body, "Payment: {}", order.payment_method);
    let _ = writeln!(body, "Ship to: {}, {}", order.customer.address, order.customer.pincode);

    Some(EmailMessage {
        to,
        subject: format!("{}: order {} received", store, reference),
        body,
    })
}

fn created_sms(store: &str, order: &Order) -> Option<SmsMessage> {
    let to = non_blank(Some(&order.customer.phone))?;
    Some(SmsMessage {
        to,
        body: format!(
            "{}: order {} for {} {} is {}. We will update you when it ships.",
            store,
            short_id(order),
            order.currency,
            order.total,
            if order.payment_status == PaymentStatus::Completed {
                "confirmed"
            } else {
                "placed (cash on delivery)"
            }
        ),
    })
}

fn cancelled_email(store: &str, order: &Order, recipient: &Recipient, reason: &str) -> Option<EmailMessage> {
    let to = non_blank(recipient.email.as_ref())?;
    let reference = short_id(order);

    let mut body = format!(
        "Hi {},\n\nYour order {} has been cancelled.\nReason: {}\n",
        recipient.name, reference, reason
    );
    if order.payment_status == PaymentStatus::Completed {
        let _ = writeln!(
            body,
            "\nA refund of {} {} will go back to your original payment method.",
            order.currency, order.total
        );
    }

    Some(EmailMessage {
        to,
        subject: format!("{}: order {} cancelled", store, reference),
        body,
    })
}

fn cancelled_sms(store: &str, order: &Order, recipient: &Recipient, reason: &str) -> Option<SmsMessage> {
    let to = non_blank(recipient.phone.as_ref())?;
    Some(SmsMessage {
        to,
        body: format!("{}: order {} was cancelled. Reason: {}", store, short_id(order), reason),
    })
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn order_created(&self, order: &Order, items: &[OrderItem]) -> NotificationReport {
        let email = created_email(&self.store_name, order, items);
        let sms = created_sms(&self.store_name, order);

        let (email_sent, sms_sent) = tokio::join!(self.deliver_email(email), self.deliver_sms(sms));
        NotificationReport { email_sent, sms_sent }
    }

    async fn order_cancelled(&self, order: &Order, recipient: &Recipient, reason: &str) -> NotificationReport {
        let email = cancelled_email(&self.store_name, order, recipient, reason);
        let sms = cancelled_sms(&self.store_name, order, recipient, reason);

        let (email_sent, sms_sent) = tokio::join!(self.deliver_email(email), self.deliver_sms(sms));
        NotificationReport { email_sent, sms_sent }
    }
}
