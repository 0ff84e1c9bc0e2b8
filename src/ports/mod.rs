//! Seams between the reconciliation engine and the outside world.

pub mod gateway;
pub mod notifier;
pub mod repository;

pub use gateway::{
    GatewayError, GatewayIntent, GatewayPayment, GatewayPaymentStatus, IntentRequest,
    PaymentGateway,
};
pub use notifier::{
    EmailMessage, MessageChannel, NotificationError, NotificationReport, Notifier, Recipient,
    SmsMessage,
};
pub use repository::{Repository, RepositoryError, RepositoryResult};
