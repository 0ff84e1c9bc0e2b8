use async_trait::async_trait;
use tracing::info;

use crate::ports::{EmailMessage, MessageChannel, NotificationError, SmsMessage};

/// Writes messages to the log instead of delivering them. Used when no
/// provider is configured.
#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl MessageChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "email (log channel)");
        Ok(())
    }

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, chars = message.body.len(), "sms (log channel)");
        Ok(())
    }
}
