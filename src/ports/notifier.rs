//! Notification port: best-effort email and SMS after order transitions.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Order, OrderItem};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("provider returned status {0}")]
    Provider(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReport {
    pub email_sent: bool,
    pub sms_sent: bool,
}

/// Who a message goes to. For cancellations this comes from the session user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

/// Never fails: implementations swallow and log delivery errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_created(&self, order: &Order, items: &[OrderItem]) -> NotificationReport;

    async fn order_cancelled(&self, order: &Order, recipient: &Recipient, reason: &str) -> NotificationReport;
}

/// A single delivery provider.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError>;

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotificationError>;
}
