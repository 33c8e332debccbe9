//! Digest delivery: the `Notifier` seam and its SMTP implementation.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::SmtpConfig;
use crate::error::NotifyError;
use crate::jobs::digest::{DIGEST_SUBJECT, Digest};

/// Sends a rendered digest to its mailbox.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, digest: &Digest) -> Result<(), NotifyError>;
}

/// SMTP (STARTTLS relay) notifier.
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Build the HTML message for a digest.
    pub fn build_message(&self, digest: &Digest) -> Result<Message, NotifyError> {
        let mailbox = digest.mailbox.to_string();
        let to: lettre::message::Mailbox = mailbox
            .parse()
            .map_err(|_| NotifyError::InvalidMailbox(mailbox.clone()))?;
        let from: lettre::message::Mailbox = self.config.address.parse().map_err(|e| NotifyError::Build {
            mailbox: mailbox.clone(),
            reason: format!("Invalid from address: {e}"),
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(DIGEST_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(digest.render_html())
            .map_err(|e| NotifyError::Build {
                mailbox,
                reason: format!("Failed to build email: {e}"),
            })
    }

    fn send_blocking(config: &SmtpConfig, mailbox: &str, email: &Message) -> Result<(), NotifyError> {
        let creds = Credentials::new(
            config.address.clone(),
            config.passkey.expose_secret().to_string(),
        );

        let transport = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| NotifyError::SendFailed {
                mailbox: mailbox.to_string(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        transport.send(email).map_err(|e| NotifyError::SendFailed {
            mailbox: mailbox.to_string(),
            reason: format!("SMTP send failed: {e}"),
        })?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, digest: &Digest) -> Result<(), NotifyError> {
        let email = self.build_message(digest)?;
        let config = self.config.clone();
        let mailbox = digest.mailbox.to_string();

        let target = mailbox.clone();
        tokio::task::spawn_blocking(move || Self::send_blocking(&config, &target, &email))
            .await
            .unwrap_or_else(|e| {
                Err(NotifyError::SendFailed {
                    mailbox: mailbox.clone(),
                    reason: format!("SMTP task panicked: {e}"),
                })
            })?;

        tracing::info!(mailbox = %mailbox, entries = digest.entries.len(), "Digest sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::jobs::digest::DigestEntry;
    use crate::mailbox::Mailbox;

    fn notifier(from: &str) -> SmtpNotifier {
        SmtpNotifier::new(SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            address: from.into(),
            passkey: SecretString::from("secret".to_string()),
        })
    }

    fn digest() -> Digest {
        Digest {
            mailbox: Mailbox::parse("alice@example.com").unwrap(),
            entries: vec![DigestEntry {
                sender: "boss@example.com".into(),
                task: "Quarterly report".into(),
                deadline: Some("2026-03-11T08:00:00+00:00".into()),
            }],
        }
    }

    #[test]
    fn build_message_is_html_with_digest_subject() {
        let message = notifier("digest@example.com").build_message(&digest()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Urgent Tasks for Today"));
        assert!(raw.contains("To: alice@example.com"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[test]
    fn build_message_rejects_bad_sender() {
        let err = notifier("not an address").build_message(&digest()).unwrap_err();
        assert!(matches!(err, NotifyError::Build { .. }));
    }
}
