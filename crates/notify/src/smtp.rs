//! Email-to-SMS gateway adapter via `lettre`.
//!
//! Each send opens its own authenticated, encrypted SMTP session, submits a
//! single-recipient plain-text message, and closes the session when the
//! transport is dropped at the end of the call, on success and on failure.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use textcast_core::config::SmtpSettings;
use textcast_core::{AddressKind, ChannelKind, Message, Recipient};

use crate::traits::{checked_address, ChannelAdapter, NotifyError, SendOutcome};

pub const SUBJECT: &str = "Notification";

/// Port on which the server speaks TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Opens one mail submission session per call.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    /// Open a session, submit `email`, and close the session.
    async fn submit(&self, email: lettre::Message) -> Result<(), NotifyError>;
}

/// Real SMTP submission over STARTTLS (or implicit TLS on port 465).
#[derive(Debug, Clone)]
pub struct LettreTransport {
    server: String,
    port: u16,
    credentials: Credentials,
}

impl LettreTransport {
    pub fn new(server: &str, port: u16, user: &str, password: &str) -> Self {
        Self {
            server: server.to_string(),
            port,
            credentials: Credentials::new(user.to_string(), password.to_string()),
        }
    }

    fn session(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let builder = if self.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)
        }
        .map_err(|e| NotifyError::Config(e.to_string()))?;

        Ok(builder
            .port(self.port)
            .credentials(self.credentials.clone())
            .build())
    }
}

#[async_trait::async_trait]
impl MailTransport for LettreTransport {
    async fn submit(&self, email: lettre::Message) -> Result<(), NotifyError> {
        // Unpooled transport: the connection lives only for this call.
        let session = self.session()?;
        session
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        Ok(())
    }
}

/// Delivers SMS through a carrier's email gateway (`<number>@<carrier domain>`).
#[derive(Debug)]
pub struct SmtpAdapter<T = LettreTransport> {
    from: Mailbox,
    transport: T,
}

impl SmtpAdapter<LettreTransport> {
    /// The SMTP user doubles as the sender address.
    pub fn from_settings(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let transport = LettreTransport::new(
            &settings.server,
            settings.port,
            &settings.user,
            settings.password.expose(),
        );
        // Fail construction early rather than on the first send.
        transport.session()?;
        Self::with_transport(&settings.user, transport)
    }
}

impl<T: MailTransport> SmtpAdapter<T> {
    pub fn with_transport(from: &str, transport: T) -> Result<Self, NotifyError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;
        Ok(Self { from, transport })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn compose(&self, to: Mailbox, message: &Message) -> Result<lettre::Message, NotifyError> {
        lettre::Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(message.text().to_string())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl<T: MailTransport> ChannelAdapter for SmtpAdapter<T> {
    async fn send(&self, recipient: &Recipient, message: &Message) -> SendOutcome {
        // A missing carrier domain is a refusal on this channel, decided before any session.
        let to = match checked_address(self.channel(), AddressKind::EmailGateway, recipient) {
            Ok(to) => to,
            Err(reason) => return SendOutcome::Rejected(reason),
        };

        let result = match to.as_str().parse::<Mailbox>() {
            Ok(mailbox) => match self.compose(mailbox, message) {
                Ok(email) => self.transport.submit(email).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(NotifyError::Smtp(format!("unusable gateway address: {e}"))),
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    recipient = %recipient.redacted(),
                    gateway = to.domain().unwrap_or_default(),
                    "gateway email submitted"
                );
                SendOutcome::delivered(None)
            }
            Err(e) => SendOutcome::Rejected(e.to_string()),
        }
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::Smtp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use textcast_core::config::Secret;

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<lettre::Message>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MailTransport for FakeTransport {
        async fn submit(&self, email: lettre::Message) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(email);
            if self.fail {
                Err(NotifyError::Smtp("535 authentication failed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn adapter(fail: bool) -> SmtpAdapter<FakeTransport> {
        SmtpAdapter::with_transport(
            "sender@example.com",
            FakeTransport {
                fail,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn submits_plain_text_to_gateway() {
        let adapter = adapter(false);
        let outcome = adapter
            .send(&Recipient::gateway("5551234567@txt.carrier.com"), &Message::new("Hi"))
            .await;
        assert_eq!(outcome, SendOutcome::delivered(None));

        let sent = adapter.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let envelope = sent[0].envelope();
        assert_eq!(envelope.to().len(), 1);
        assert_eq!(envelope.to()[0].to_string(), "5551234567@txt.carrier.com");
        assert_eq!(
            envelope.from().map(|a| a.to_string()).as_deref(),
            Some("sender@example.com")
        );
        let raw = String::from_utf8(sent[0].formatted()).unwrap();
        assert!(raw.contains("Subject: Notification"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("Hi"));
    }

    #[tokio::test]
    async fn address_without_at_is_rejected_without_session() {
        let adapter = adapter(false);
        let outcome = adapter
            .send(&Recipient::gateway("not-an-email"), &Message::new("Hi"))
            .await;
        assert!(matches!(outcome, SendOutcome::Rejected(_)));
        assert!(adapter.transport().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_failure_is_rejected() {
        let adapter = adapter(true);
        let outcome = adapter
            .send(&Recipient::gateway("5551234567@txt.carrier.com"), &Message::new("Hi"))
            .await;
        match outcome {
            SendOutcome::Rejected(reason) => assert!(reason.contains("535"), "{reason}"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn invalid_sender_is_config_error() {
        let result = SmtpAdapter::with_transport("sender", FakeTransport::default());
        assert!(matches!(result, Err(NotifyError::Config(_))));
    }

    #[test]
    fn from_settings_builds_without_connecting() {
        for port in [587, 465] {
            let adapter = SmtpAdapter::from_settings(&SmtpSettings {
                server: "smtp.example.com".to_string(),
                port,
                user: "sender@example.com".to_string(),
                password: Secret::new("pw"),
            });
            assert!(adapter.is_ok(), "port {port}");
        }
    }
}
