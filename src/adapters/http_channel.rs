//! Generic HTTP messaging provider: JSON POSTs to `{base}/email` and `{base}/sms`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::{ConfigError, ProviderEndpoint};
use crate::ports::{EmailMessage, MessageChannel, NotificationError, SmsMessage};

pub struct HttpChannel {
    name: String,
    client: Client,
    base_url: String,
    token: Option<String>,
    from_email: String,
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpChannel {
    pub fn new(
        name: impl Into<String>,
        endpoint: &ProviderEndpoint,
        from_email: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            token: endpoint.token.clone(),
            from_email: from_email.into(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), NotificationError> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotificationError::Provider(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl MessageChannel for HttpChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let payload = EmailPayload {
            from: &self.from_email,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        };
        self.post("email", &payload).await
    }

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotificationError> {
        self.post("sms", message).await
    }
}
