use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use super::BackendError;

/// Outbound mail used for one-time codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), BackendError>;
}

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(server: &str, user: &str, pass: &str, from: &str) -> Result<Self, BackendError> {
        let transport = SmtpTransport::relay(server)
            .map_err(|e| BackendError::Mail(format!("invalid SMTP relay '{server}': {e}")))?
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .build();
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| BackendError::Mail(format!("invalid from address '{from}': {e}")))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), BackendError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| BackendError::Mail(format!("invalid recipient: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| BackendError::Mail(e.to_string()))?;

        // lettre's SmtpTransport is blocking
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| BackendError::Mail(format!("mail task failed: {e}")))?
            .map_err(|e| BackendError::Mail(e.to_string()))?;

        debug!("One-time code mail sent");
        Ok(())
    }
}

/// Writes the mail to the log instead of sending it. Used when SMTP is not configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), BackendError> {
        info!("Mail to {to}: {subject}\n{body}");
        Ok(())
    }
}
