mod smtp;
mod templates;

pub use smtp::SmtpAlerter;
pub use templates::EmailTemplate;

/// SMTP settings for the alert channel, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
}

#[derive(Debug, Clone, Default)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl AlertConfig {
    pub fn from_env() -> Self {
        let smtp_to = std::env::var("RECIPIENT_EMAIL")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let smtp_tls = match std::env::var("SMTP_TLS").unwrap_or_default().as_str() {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            smtp_host: std::env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            smtp_username: std::env::var("EMAIL_USER").ok().filter(|s| !s.is_empty()),
            smtp_password: std::env::var("EMAIL_PASS").ok().filter(|s| !s.is_empty()),
            smtp_from: std::env::var("EMAIL_FROM")
                .or_else(|_| std::env::var("EMAIL_USER"))
                .ok()
                .filter(|s| !s.is_empty()),
            smtp_to,
            smtp_tls,
        }
    }

    /// True when enough is configured to build a transport and address a
    /// message. The daemon runs without alerting otherwise.
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some() && !self.smtp_to.is_empty()
    }
}
