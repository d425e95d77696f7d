use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use monitor_core::{AlertEvent, AlertSink, MonitorError};

use crate::templates::EmailTemplate;
use crate::{AlertConfig, SmtpTls};

/// Email alert channel. One message per recipient per alert; a transport
/// failure surfaces as `MonitorError::Delivery` and is the caller's to
/// contain.
pub struct SmtpAlerter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpAlerter {
    pub fn new(config: &AlertConfig) -> Result<Self, MonitorError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| MonitorError::Config("SMTP_HOST not set".into()))?;
        let from_addr = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| MonitorError::Config("EMAIL_FROM/EMAIL_USER not set".into()))?;

        let from: Mailbox = from_addr
            .parse()
            .map_err(|e| MonitorError::Config(format!("Invalid from address: {}", e)))?;

        let to: Vec<Mailbox> = config
            .smtp_to
            .iter()
            .filter_map(|addr| addr.parse().ok())
            .collect();

        if to.is_empty() {
            return Err(MonitorError::Config(
                "No valid RECIPIENT_EMAIL addresses".into(),
            ));
        }

        let mut builder = match config.smtp_tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                host,
            )),
        }
        .map_err(|e| MonitorError::Config(format!("SMTP transport error: {}", e)))?;

        builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }
}

#[async_trait]
impl AlertSink for SmtpAlerter {
    async fn notify(&self, event: &AlertEvent) -> Result<(), MonitorError> {
        let subject = EmailTemplate::subject(event);
        let body = EmailTemplate::body(event);

        for recipient in &self.to {
            let email = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(&subject)
                .body(body.clone())
                .map_err(|e| MonitorError::Delivery(format!("Failed to build email: {}", e)))?;

            self.transport
                .send(email)
                .await
                .map_err(|e| MonitorError::Delivery(format!("Failed to send email: {}", e)))?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
