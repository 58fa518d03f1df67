//! Mail delivery of prepared report files.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::MailConfig;
use crate::errors::MonitorError;

const SUBJECT: &str = "watchtrail report";

/// Sends a prepared report document to a recipient address over SMTP.
/// No delivery guarantee beyond what the transport provides.
pub struct MailNotifier {
    config: MailConfig,
    recipient: String,
}

impl MailNotifier {
    pub fn new(config: MailConfig, recipient: impl Into<String>) -> Result<Self, MonitorError> {
        let mut notifier = Self {
            config,
            recipient: String::new(),
        };
        notifier.set_recipient(recipient)?;
        Ok(notifier)
    }

    /// Changes the recipient address. Fails with
    /// [`MonitorError::InvalidArgument`] on a blank address.
    pub fn set_recipient(&mut self, recipient: impl Into<String>) -> Result<(), MonitorError> {
        let recipient = recipient.into();
        if recipient.trim().is_empty() {
            return Err(MonitorError::InvalidArgument(
                "recipient address is empty".into(),
            ));
        }
        self.recipient = recipient;
        Ok(())
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Mails the file at `attachment_path` to the configured recipient.
    pub fn send_report(&self, attachment_path: impl AsRef<Path>) -> Result<()> {
        let path = attachment_path.as_ref();
        let content = std::fs::read(path)
            .with_context(|| format!("failed to read attachment {}", path.display()))?;
        let attachment_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.csv".to_string());

        let from: Mailbox = self
            .config
            .from
            .parse()
            .with_context(|| format!("invalid sender address '{}'", self.config.from))?;
        let to: Mailbox = self
            .recipient
            .parse()
            .with_context(|| format!("invalid recipient address '{}'", self.recipient))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(SUBJECT)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(format!(
                        "Here is the report prepared on: {}",
                        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
                    )))
                    .singlepart(
                        Attachment::new(attachment_name).body(
                            content,
                            ContentType::parse("text/csv").context("invalid content type")?,
                        ),
                    ),
            )
            .context("failed to build report message")?;

        let transport = SmtpTransport::starttls_relay(&self.config.smtp_host)
            .with_context(|| format!("failed to connect to {}", self.config.smtp_host))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        transport
            .send(&message)
            .with_context(|| format!("failed to send report to {}", self.recipient))?;
        tracing::info!("report {} sent to {}", path.display(), self.recipient);
        Ok(())
    }
}
