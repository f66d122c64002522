//! Vonage (Nexmo) SMS API adapter.

use std::time::Duration;

use serde::Deserialize;
use textcast_core::config::{Secret, VonageSettings};
use textcast_core::{ChannelKind, Message, Recipient, ValidAddress};

use crate::traits::{
    checked_address, http_client, ChannelAdapter, NotifyError, SendOutcome, HTTP_TIMEOUT,
};

#[derive(Debug, Deserialize)]
struct SmsResponse {
    #[serde(default)]
    messages: Vec<SmsStatus>,
}

#[derive(Debug, Deserialize)]
struct SmsStatus {
    status: String,
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

/// What the Vonage API said about one submission.
#[derive(Debug, PartialEq)]
enum Submission {
    Accepted(Option<String>),
    Refused(String),
}

/// Submits messages to the Vonage `sms/json` endpoint.
#[derive(Debug)]
pub struct VonageAdapter {
    api_key: String,
    api_secret: Secret,
    from_number: String,
    url: reqwest::Url,
    client: reqwest::Client,
}

impl VonageAdapter {
    pub fn from_settings(settings: &VonageSettings) -> Result<Self, NotifyError> {
        let url = reqwest::Url::parse(&settings.api_url)
            .and_then(|base| base.join("/sms/json"))
            .map_err(|e| NotifyError::Config(format!("invalid Vonage URL: {e}")))?;

        Ok(Self {
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            from_number: settings.from_number.clone(),
            url,
            client: http_client(HTTP_TIMEOUT)?,
        })
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, NotifyError> {
        self.client = http_client(timeout)?;
        Ok(self)
    }

    async fn deliver(&self, to: &ValidAddress, message: &Message) -> Result<Submission, NotifyError> {
        // Vonage expects the number without a leading '+'.
        let to = to.as_str().trim_start_matches('+');
        let form = [
            ("api_key", self.api_key.as_str()),
            ("api_secret", self.api_secret.expose()),
            ("from", self.from_number.as_str()),
            ("to", to),
            ("text", message.text()),
        ];

        let response = self.client.post(self.url.clone()).form(&form).send().await?;
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

        let body: SmsResponse = response.json().await?;
        let first = body.messages.into_iter().next().ok_or_else(|| NotifyError::Provider {
            status: status.as_u16(),
            body: "response contained no message status".to_string(),
        })?;

        if first.status == "0" {
            Ok(Submission::Accepted(first.message_id))
        } else {
            Ok(Submission::Refused(format!(
                "status {}: {}",
                first.status,
                first.error_text.unwrap_or_default()
            )))
        }
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for VonageAdapter {
    async fn send(&self, recipient: &Recipient, message: &Message) -> SendOutcome {
        let to = match checked_address(self.channel(), self.address_kind(), recipient) {
            Ok(to) => to,
            Err(reason) => return SendOutcome::InvalidAddress(reason),
        };

        tracing::debug!(recipient = %recipient.redacted(), "sending SMS via Vonage");
        match self.deliver(&to, message).await {
            Ok(Submission::Accepted(id)) => SendOutcome::delivered(id),
            Ok(Submission::Refused(reason)) => SendOutcome::Rejected(reason),
            Err(e) => SendOutcome::TransientFailure(e.to_string()),
        }
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::Vonage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn adapter(base: &str) -> VonageAdapter {
        VonageAdapter::from_settings(&VonageSettings {
            api_key: "nx-key".to_string(),
            api_secret: Secret::new("nx-secret"),
            from_number: "15550002222".to_string(),
            api_url: base.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn accepted_submission_is_delivered() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sms/json")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_key".into(), "nx-key".into()),
                Matcher::UrlEncoded("api_secret".into(), "nx-secret".into()),
                Matcher::UrlEncoded("to".into(), "14155552671".into()),
                Matcher::UrlEncoded("text".into(), "Hi".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"message-count": "1", "messages": [
                    {"to": "14155552671", "message-id": "0A0000000123ABCD1", "status": "0"}
                ]}"#,
            )
            .create_async()
            .await;

        let outcome = adapter(&server.url())
            .send(&Recipient::phone("+14155552671"), &Message::new("Hi"))
            .await;

        mock.assert_async().await;
        assert_eq!(
            outcome,
            SendOutcome::delivered(Some("0A0000000123ABCD1".to_string()))
        );
    }

    #[tokio::test]
    async fn non_zero_status_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sms/json")
            .with_status(200)
            .with_body(
                r#"{"message-count": "1", "messages": [
                    {"status": "4", "error-text": "Bad Credentials"}
                ]}"#,
            )
            .create_async()
            .await;

        let outcome = adapter(&server.url())
            .send(&Recipient::phone("+14155552671"), &Message::new("Hi"))
            .await;
        assert_eq!(
            outcome,
            SendOutcome::Rejected("status 4: Bad Credentials".to_string())
        );
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sms/json")
            .with_status(503)
            .create_async()
            .await;

        let outcome = adapter(&server.url())
            .send(&Recipient::phone("+14155552671"), &Message::new("Hi"))
            .await;
        assert!(matches!(outcome, SendOutcome::TransientFailure(_)));
    }

    #[tokio::test]
    async fn silent_provider_times_out() {
        // Accepts the connection but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let adapter = adapter(&base)
            .with_timeout(Duration::from_millis(200))
            .unwrap();

        let start = std::time::Instant::now();
        let outcome = adapter
            .send(&Recipient::phone("+14155552671"), &Message::new("Hi"))
            .await;

        assert!(matches!(outcome, SendOutcome::TransientFailure(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
        drop(listener);
    }
}
