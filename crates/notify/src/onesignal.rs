//! OneSignal notification API adapter.
//!
//! Sends SMS through OneSignal's notification endpoint, addressing the
//! recipient by external user id (the phone number).

use std::time::Duration;

use textcast_core::config::{OneSignalSettings, Secret};
use textcast_core::{ChannelKind, Message, Recipient, ValidAddress};

use crate::traits::{
    checked_address, http_client, ChannelAdapter, NotifyError, SendOutcome, HTTP_TIMEOUT,
};

/// Posts JSON notifications to the OneSignal REST API.
#[derive(Debug)]
pub struct OneSignalAdapter {
    api_key: Secret,
    app_id: String,
    /// Full notifications URL.
    url: reqwest::Url,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl OneSignalAdapter {
    pub fn from_settings(settings: &OneSignalSettings) -> Result<Self, NotifyError> {
        let url = reqwest::Url::parse(&settings.api_url)
            .and_then(|base| base.join("/api/v1/notifications"))
            .map_err(|e| NotifyError::Config(format!("invalid OneSignal URL: {e}")))?;

        Ok(Self {
            api_key: settings.api_key.clone(),
            app_id: settings.app_id.clone(),
            url,
            client: http_client(HTTP_TIMEOUT)?,
        })
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, NotifyError> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    fn payload(&self, to: &ValidAddress, message: &Message) -> serde_json::Value {
        serde_json::json!({
            "app_id": self.app_id,
            "include_external_user_ids": [to.as_str()],
            "contents": { "en": message.text() },
            "channel_for_external_user_ids": "sms",
        })
    }

    async fn deliver(
        &self,
        to: &ValidAddress,
        message: &Message,
    ) -> Result<Option<String>, NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/json; charset=utf-8",
            )
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", self.api_key.expose()),
            )
            .json(&self.payload(to, message))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        Ok(body.get("id").and_then(|v| v.as_str()).map(str::to_string))
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for OneSignalAdapter {
    async fn send(&self, recipient: &Recipient, message: &Message) -> SendOutcome {
        let to = match checked_address(self.channel(), self.address_kind(), recipient) {
            Ok(to) => to,
            Err(reason) => return SendOutcome::InvalidAddress(reason),
        };

        tracing::debug!(recipient = %recipient.redacted(), "sending SMS via OneSignal");
        match self.deliver(&to, message).await {
            Ok(id) => SendOutcome::delivered(id),
            Err(e) => SendOutcome::TransientFailure(e.to_string()),
        }
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::OneSignal
    }
}
