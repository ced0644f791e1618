use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::DeliveryError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A rendered notification ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub subject: String,
    /// HTML body
    pub body: String,
}

/// Trait for notification delivery implementations
///
/// One call delivers one message to one recipient. Implementations make a
/// single attempt and report failure instead of retrying.
pub trait Notifier: Send + Sync {
    fn send<'a>(
        &'a self,
        message: &'a OutgoingMessage,
        recipient: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;
}

/// Email notifier using an async SMTP transport
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Create a new SMTP notifier
    ///
    /// The transport is built once and reused for every message.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::InvalidAddress` if the sender address does not
    /// parse, or `DeliveryError::Build` if TLS parameters cannot be built.
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let from: Mailbox = config
            .sender()
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(config.sender().to_string()))?;

        let tls = match config.security {
            SmtpSecurity::Plain => Tls::None,
            security => {
                let parameters = TlsParameters::builder(config.server.clone())
                    .dangerous_accept_invalid_certs(config.accept_invalid_certs)
                    .build()
                    .map_err(|e| DeliveryError::Build(format!("TLS parameters: {}", e)))?;
                if security == SmtpSecurity::Tls {
                    Tls::Wrapper(parameters)
                } else {
                    Tls::Required(parameters)
                }
            }
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
            .port(config.port)
            .tls(tls)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .build();

        Ok(Self { transport, from })
    }
}

impl Notifier for SmtpNotifier {
    fn send<'a>(
        &'a self,
        message: &'a OutgoingMessage,
        recipient: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>> {
        Box::pin(async move {
            let to: Mailbox = recipient
                .parse()
                .map_err(|_| DeliveryError::InvalidAddress(recipient.to_string()))?;

            let email = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(message.subject.clone())
                .header(ContentType::TEXT_HTML)
                .body(message.body.clone())
                .map_err(|e| DeliveryError::Build(e.to_string()))?;

            self.transport
                .send(email)
                .await
                .map_err(|e| DeliveryError::NotificationFailed(e.to_string()))?;

            Ok(())
        })
    }
}

/// A delivery recorded by [`MockNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub message: OutgoingMessage,
}

/// Mock notifier for testing
///
/// Records every successful delivery. Recipients registered with
/// [`MockNotifier::failing_for`] are rejected. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<Mutex<usize>>,
    failing: Vec<String>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock notifier that rejects the given recipients
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            failing: recipients.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of delivery attempts, failed ones included
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Notifier for MockNotifier {
    fn send<'a>(
        &'a self,
        message: &'a OutgoingMessage,
        recipient: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>> {
        Box::pin(async move {
            *self.attempts.lock().unwrap() += 1;

            if self.failing.iter().any(|r| r == recipient) {
                return Err(DeliveryError::NotificationFailed(format!(
                    "mock rejection for {}",
                    recipient
                )));
            }

            self.sent.lock().unwrap().push(SentMessage {
                recipient: recipient.to_string(),
                message: message.clone(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config(from: Option<&str>) -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".to_string(),
            port: 465,
            username: "bot@example.com".to_string(),
            password: "secret".to_string(),
            from: from.map(str::to_string),
            security: SmtpSecurity::Plain,
            accept_invalid_certs: false,
            timeout_seconds: 5,
        }
    }

    fn message() -> OutgoingMessage {
        OutgoingMessage {
            subject: "Low balance".to_string(),
            body: "<p>hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_smtp_notifier_builds_with_valid_sender() {
        assert!(SmtpNotifier::new(&smtp_config(None)).is_ok());
    }

    #[tokio::test]
    async fn test_smtp_notifier_rejects_invalid_sender() {
        let result = SmtpNotifier::new(&smtp_config(Some("not-an-address")));
        assert!(matches!(result, Err(DeliveryError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_smtp_notifier_rejects_invalid_recipient_before_connecting() {
        let notifier = SmtpNotifier::new(&smtp_config(None)).unwrap();
        let result = notifier.send(&message(), "nobody").await;
        assert!(matches!(result, Err(DeliveryError::InvalidAddress(addr)) if addr == "nobody"));
    }

    #[tokio::test]
    async fn test_mock_notifier_records_deliveries() {
        let notifier = MockNotifier::new();
        notifier.send(&message(), "a@example.com").await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "a@example.com");
        assert_eq!(sent[0].message, message());
    }

    #[tokio::test]
    async fn test_mock_notifier_failing_recipient() {
        let notifier = MockNotifier::failing_for(&["b@example.com"]);
        assert!(notifier.send(&message(), "a@example.com").await.is_ok());
        assert!(notifier.send(&message(), "b@example.com").await.is_err());
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.attempts(), 2);
    }
}
