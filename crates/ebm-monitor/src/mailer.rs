use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::config::SmtpSettings;
use crate::errors::MailError;

/// Delivers finished notifications to people.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification. Returns whether it was accepted for
    /// delivery; callers do not retry.
    async fn notify(
        &self,
        recipients: &[String],
        subject_context: &str,
        title: &str,
        body: &str,
    ) -> bool;
}

/// Plain-text email over implicit-TLS SMTP.
pub struct SmtpNotifier {
    inner: Option<SmtpInner>,
}

struct SmtpInner {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Address,
}

impl SmtpNotifier {
    /// Build the notifier. Without settings every delivery fails and is
    /// logged, but monitoring still runs.
    pub fn new(settings: Option<SmtpSettings>) -> Result<Self, MailError> {
        let Some(settings) = settings else {
            return Ok(Self { inner: None });
        };

        let sender: Address = settings.sender.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)?
            .port(settings.port)
            .credentials(Credentials::new(settings.sender, settings.password))
            .build();

        Ok(Self {
            inner: Some(SmtpInner { transport, sender }),
        })
    }

    async fn send(
        &self,
        recipients: &[String],
        subject_context: &str,
        title: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let inner = self.inner.as_ref().ok_or(MailError::MissingSettings)?;
        let message = build_message(&inner.sender, recipients, subject_context, title, body)?;
        inner.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(
        &self,
        recipients: &[String],
        subject_context: &str,
        title: &str,
        body: &str,
    ) -> bool {
        match self.send(recipients, subject_context, title, body).await {
            Ok(()) => {
                info!(title, recipients = ?recipients, "email sent");
                true
            }
            Err(e) => {
                error!(title, error = %e, "failed to send email");
                false
            }
        }
    }
}

/// Build the email: From `"<context> stock alert" <sender>`, To every
/// recipient, plain-text UTF-8 body.
fn build_message(
    sender: &Address,
    recipients: &[String],
    subject_context: &str,
    title: &str,
    body: &str,
) -> Result<Message, MailError> {
    let from = Mailbox::new(Some(format!("{subject_context} stock alert")), sender.clone());

    let mut builder = Message::builder()
        .from(from)
        .subject(title)
        .header(ContentType::TEXT_PLAIN);
    for recipient in recipients {
        let address: Address = recipient.trim().parse()?;
        builder = builder.to(Mailbox::new(None, address));
    }

    Ok(builder.body(body.to_string())?)
}
