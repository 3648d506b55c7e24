pub mod compose;

use error_stack::ResultExt;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::instrument;

use crate::config::mail_config::MailConfig;
use crate::ports::mailer::{MailError, Mailer, OutgoingMail};

/// SMTP submission over STARTTLS with username/password login.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: MailConfig,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("relay", &format!("{}:{}", self.config.smtp_host, self.config.smtp_port))
            .field("login", &self.config.login())
            .finish()
    }
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> error_stack::Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .change_context(MailError::Connection)
            .attach_printable_lazy(|| format!("smtp_host: {}", config.smtp_host))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.login().to_owned(),
                config.password.expose().to_owned(),
            ))
            .build();

        Ok(Self {
            transport,
            config: config.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, mail), name = "SmtpMailer::send", fields(to = %self.config.to_address))]
    async fn send(&self, mail: &OutgoingMail) -> error_stack::Result<(), MailError> {
        let attachment = tokio::fs::read(&mail.attachment)
            .await
            .change_context(MailError::Attachment)
            .attach_printable_lazy(|| format!("attachment: {}", mail.attachment.display()))?;
        let message = compose::compose(&self.config, mail, attachment)?;

        tracing::trace!(
            "Connecting to {}:{} as {}",
            self.config.smtp_host,
            self.config.smtp_port,
            self.config.login()
        );

        let response = self.transport.send(message).await.map_err(|err| {
            // 4xx/5xx replies (including a refused login) came from the relay.
            let context = if err.is_permanent() || err.is_transient() {
                MailError::Rejected
            } else {
                MailError::Connection
            };
            error_stack::report!(err).change_context(context)
        })?;

        tracing::info!(
            "Email sent to {} ({})",
            self.config.to_address,
            response.code()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::app_config::EXAMPLE_CONFIG;
    use crate::config::AppConfig;

    #[test]
    fn test_debug_hides_password() {
        let config = AppConfig::from_toml(EXAMPLE_CONFIG).unwrap().mail;
        let mailer = SmtpMailer::new(&config).unwrap();

        let debug = format!("{:?}", mailer);
        assert!(debug.contains("smtp-mail.outlook.com:587"));
        assert!(!debug.contains("app-password"));
    }

    #[tokio::test]
    async fn test_missing_attachment_fails_before_connecting() {
        let config = AppConfig::from_toml(EXAMPLE_CONFIG).unwrap().mail;
        let mailer = SmtpMailer::new(&config).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let report = mailer
            .send(&OutgoingMail {
                subject: "subject".to_owned(),
                body: "body".to_owned(),
                attachment: dir.path().join("missing.xlsx"),
            })
            .await
            .unwrap_err();
        assert!(matches!(report.current_context(), MailError::Attachment));
    }
}
