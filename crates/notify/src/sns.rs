//! AWS SNS direct-to-phone publishing with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use aws_credential_types::Credentials;
use aws_sdk_sns::config::retry::RetryConfig;
use aws_sdk_sns::config::{BehaviorVersion, Region};
use aws_sdk_sns::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sns::operation::publish::PublishError;
use aws_sdk_sns::Client;
use textcast_core::config::SnsSettings;
use textcast_core::{ChannelKind, Message, Recipient};
use tracing::warn;

use crate::pacing::Clock;
use crate::traits::{checked_address, ChannelAdapter, NotifyError, SendOutcome};

pub const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Error codes that are worth another attempt.
const RETRYABLE_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "Throttled",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "InternalError",
    "InternalFailure",
    "RequestTimeout",
];

/// Why a publish call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishFailure {
    /// Throttling, server-side or network trouble.
    Retryable(String),
    /// Bad recipient, denied permission, opt-out and the like.
    Fatal(String),
}

/// The one SNS operation the adapter needs.
#[async_trait::async_trait]
pub trait SmsPublisher: Send + Sync {
    /// Publish `text` to `phone`, returning the SNS message id.
    async fn publish(&self, phone: &str, text: &str) -> Result<String, PublishFailure>;
}

/// [`SmsPublisher`] backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct SnsPublisher {
    client: Client,
}

impl SnsPublisher {
    pub fn from_settings(settings: &SnsSettings) -> Result<Self, NotifyError> {
        if settings.region.trim().is_empty() {
            return Err(NotifyError::Config("AWS region must not be empty".into()));
        }

        let creds = Credentials::new(
            &settings.access_key,
            settings.secret_key.expose(),
            None,
            None,
            "textcast-sns-static",
        );

        // SDK retries are disabled so the adapter's own loop is the only one.
        let mut config = aws_sdk_sns::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(creds)
            .retry_config(RetryConfig::disabled());

        if let Some(ref endpoint) = settings.endpoint_url {
            if !endpoint.is_empty() {
                config = config.endpoint_url(endpoint);
            }
        }

        Ok(Self {
            client: Client::from_conf(config.build()),
        })
    }
}

#[async_trait::async_trait]
impl SmsPublisher for SnsPublisher {
    async fn publish(&self, phone: &str, text: &str) -> Result<String, PublishFailure> {
        let output = self
            .client
            .publish()
            .phone_number(phone)
            .message(text)
            .send()
            .await
            .map_err(classify)?;
        Ok(output.message_id().unwrap_or_default().to_string())
    }
}

fn classify(err: SdkError<PublishError>) -> PublishFailure {
    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(ctx) => {
            let e = ctx.err();
            e.is_internal_error_exception()
                || e.is_kms_throttling_exception()
                || is_retryable_code(e.code())
        }
        _ => false,
    };

    let message = DisplayErrorContext(&err).to_string();
    if retryable {
        PublishFailure::Retryable(message)
    } else {
        PublishFailure::Fatal(message)
    }
}

fn is_retryable_code(code: Option<&str>) -> bool {
    code.is_some_and(|c| RETRYABLE_CODES.contains(&c))
}

/// Publishes SMS through SNS, retrying retryable failures up to
/// [`MAX_ATTEMPTS`] times with [`RETRY_DELAY`] between attempts.
pub struct SnsAdapter<P = SnsPublisher> {
    publisher: P,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl SnsAdapter<SnsPublisher> {
    pub fn from_settings(settings: &SnsSettings, clock: Arc<dyn Clock>) -> Result<Self, NotifyError> {
        Ok(Self::with_publisher(SnsPublisher::from_settings(settings)?, clock))
    }
}

impl<P: SmsPublisher> SnsAdapter<P> {
    pub fn with_publisher(publisher: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            publisher,
            clock,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

#[async_trait::async_trait]
impl<P: SmsPublisher> ChannelAdapter for SnsAdapter<P> {
    async fn send(&self, recipient: &Recipient, message: &Message) -> SendOutcome {
        let to = match checked_address(self.channel(), self.address_kind(), recipient) {
            Ok(to) => to,
            Err(reason) => return SendOutcome::InvalidAddress(reason),
        };

        tracing::debug!(recipient = %recipient.redacted(), "sending SMS via AWS SNS");
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self.publisher.publish(to.as_str(), message.text()).await {
                Ok(id) => {
                    return SendOutcome::delivered(Some(id).filter(|s| !s.is_empty()));
                }
                Err(PublishFailure::Fatal(reason)) => {
                    return SendOutcome::Rejected(reason);
                }
                Err(PublishFailure::Retryable(reason)) => {
                    warn!(
                        channel = %self.channel(),
                        recipient = %recipient.redacted(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %reason,
                        "SNS publish failed"
                    );
                    last_error = reason;
                    if attempt < self.max_attempts {
                        self.clock.sleep(self.retry_delay).await;
                    }
                }
            }
        }

        SendOutcome::TransientFailure(format!(
            "gave up after {} attempts: {last_error}",
            self.max_attempts
        ))
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::AwsSns
    }
}
