//! Channel adapter trait definition and shared outcome/error types.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use textcast_core::{validate, AddressKind, ChannelKind, Message, Recipient, ValidAddress};

/// Errors raised inside adapters and while constructing them.
///
/// These never cross the [`ChannelAdapter::send`] boundary; each adapter
/// folds them into a [`SendOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("AWS request failed: {0}")]
    Aws(String),

    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Upper bound on one provider HTTP call, connect through response body.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by the REST adapters.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, NotifyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))
}

/// Result of one (recipient, channel) attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Provider accepted the message; carries its message id when it returns one.
    Delivered { provider_id: Option<String> },
    /// Provider explicitly declined. Not retried.
    Rejected(String),
    /// Network or provider error.
    TransientFailure(String),
    /// The address does not fit the channel; nothing was sent.
    InvalidAddress(String),
}

impl SendOutcome {
    pub fn delivered(provider_id: Option<String>) -> Self {
        Self::Delivered { provider_id }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Rejected(_) => "rejected",
            Self::TransientFailure(_) => "transient_failure",
            Self::InvalidAddress(_) => "invalid_address",
        }
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered {
                provider_id: Some(id),
            } => write!(f, "delivered ({id})"),
            Self::Delivered { provider_id: None } => f.write_str("delivered"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
            Self::TransientFailure(reason) => write!(f, "transient failure: {reason}"),
            Self::InvalidAddress(reason) => write!(f, "invalid address: {reason}"),
        }
    }
}

/// Uniform send capability implemented once per provider.
#[async_trait::async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Deliver `message` to one recipient. Never fails: every error is
    /// reported as a [`SendOutcome`].
    async fn send(&self, recipient: &Recipient, message: &Message) -> SendOutcome;

    /// Which provider this adapter talks to.
    fn channel(&self) -> ChannelKind;

    /// Addressing scheme this adapter accepts.
    fn address_kind(&self) -> AddressKind {
        self.channel().address_kind()
    }
}

/// Validate a recipient against the scheme `kind` at the adapter boundary,
/// logging the rejection.
pub(crate) fn checked_address(
    channel: ChannelKind,
    kind: AddressKind,
    recipient: &Recipient,
) -> Result<ValidAddress, String> {
    validate(recipient.address(), kind).map_err(|e| {
        tracing::warn!(
            channel = %channel,
            recipient = %recipient.redacted(),
            error = %e,
            "recipient failed validation"
        );
        e.to_string()
    })
}

/// One attempt as recorded by the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub channel: ChannelKind,
    /// Redacted recipient address.
    pub recipient: String,
    pub outcome: SendOutcome,
    pub duration_ms: u64,
}

/// Everything that happened during one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub attempts: Vec<AttemptRecord>,
    pub delivered: usize,
    pub rejected: usize,
    pub transient_failures: usize,
    pub invalid_addresses: usize,
}

impl BatchReport {
    pub(crate) fn record(&mut self, attempt: AttemptRecord) {
        match attempt.outcome {
            SendOutcome::Delivered { .. } => self.delivered += 1,
            SendOutcome::Rejected(_) => self.rejected += 1,
            SendOutcome::TransientFailure(_) => self.transient_failures += 1,
            SendOutcome::InvalidAddress(_) => self.invalid_addresses += 1,
        }
        self.attempts.push(attempt);
    }

    pub fn total(&self) -> usize {
        self.attempts.len()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.delivered
    }

    /// Attempts made on one channel, in order.
    pub fn for_channel(&self, channel: ChannelKind) -> impl Iterator<Item = &AttemptRecord> {
        self.attempts.iter().filter(move |a| a.channel == channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(outcome: SendOutcome) -> AttemptRecord {
        AttemptRecord {
            channel: ChannelKind::Twilio,
            recipient: "****2671".to_string(),
            outcome,
            duration_ms: 1,
        }
    }

    #[test]
    fn report_counts_each_outcome_class() {
        let mut report = BatchReport::default();
        report.record(attempt(SendOutcome::delivered(Some("SM1".to_string()))));
        report.record(attempt(SendOutcome::Rejected("no".into())));
        report.record(attempt(SendOutcome::TransientFailure("timeout".into())));
        report.record(attempt(SendOutcome::InvalidAddress("bad".into())));
        report.record(attempt(SendOutcome::delivered(None)));

        assert_eq!(report.total(), 5);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.transient_failures, 1);
        assert_eq!(report.invalid_addresses, 1);
        assert_eq!(report.failed(), 3);
    }

    #[test]
    fn outcome_display_and_serialization() {
        let outcome = SendOutcome::Rejected("quota exceeded".into());
        assert_eq!(outcome.to_string(), "rejected: quota exceeded");
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"outcome": "rejected", "detail": "quota exceeded"})
        );
        assert_eq!(SendOutcome::delivered(None).label(), "delivered");
    }

    #[test]
    fn checked_address_uses_requested_kind() {
        let gateway = Recipient::gateway("+14155552671");
        assert!(checked_address(ChannelKind::Twilio, AddressKind::PhoneE164, &gateway).is_ok());
        assert!(checked_address(ChannelKind::Smtp, AddressKind::EmailGateway, &gateway).is_err());
    }
}
