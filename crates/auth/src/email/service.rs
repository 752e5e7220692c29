use crate::error::{AuthError, Result};
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP relay; messages go to the in-process outbox when unset
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_email: "noreply@visor.local".to_string(),
            from_name: "Visor".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[derive(Clone)]
enum EmailProvider {
    Smtp {
        mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
        from: Mailbox,
    },
    Outbox(Arc<Mutex<Vec<EmailMessage>>>),
}

#[derive(Clone)]
pub struct EmailService {
    provider: EmailProvider,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let host = match config.smtp_host.as_deref().filter(|h| !h.is_empty()) {
            Some(host) => host,
            None => return Ok(Self::outbox()),
        };

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AuthError::ConfigurationError(format!("Invalid from address: {}", e)))?;

        // Local catchers (MailHog, Mailpit) listen on 1025 without TLS
        let builder = if config.smtp_port == 1025 {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(|e| {
                AuthError::ConfigurationError(format!("Failed to create SMTP transport: {}", e))
            })?
        };
        let mut builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            provider: EmailProvider::Smtp {
                mailer: Arc::new(builder.build()),
                from,
            },
        })
    }

    /// Keeps messages in memory and logs them
    pub fn outbox() -> Self {
        Self {
            provider: EmailProvider::Outbox(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            EmailProvider::Smtp { .. } => "smtp",
            EmailProvider::Outbox(_) => "outbox",
        }
    }

    /// Messages captured by the outbox provider
    pub fn sent(&self) -> Vec<EmailMessage> {
        match &self.provider {
            EmailProvider::Outbox(outbox) => outbox
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
            EmailProvider::Smtp { .. } => Vec::new(),
        }
    }

    pub async fn send(&self, email: EmailMessage) -> Result<()> {
        match &self.provider {
            EmailProvider::Smtp { mailer, from } => {
                let message = build_message(from.clone(), &email)?;

                mailer
                    .send(message)
                    .await
                    .map_err(|e| AuthError::Email(e.to_string()))?;

                tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
            }
            EmailProvider::Outbox(outbox) => {
                tracing::info!(
                    to = %email.to,
                    subject = %email.subject,
                    "Email captured in outbox:\n{}",
                    email.text_body
                );
                outbox
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(email);
            }
        }

        Ok(())
    }
}

fn build_message(from: Mailbox, email: &EmailMessage) -> Result<Message> {
    let to = match &email.to_name {
        Some(name) => format!("{} <{}>", name, email.to),
        None => email.to.clone(),
    }
    .parse::<Mailbox>()
    .map_err(|e| AuthError::Email(format!("Invalid to address: {}", e)))?;

    let builder = Message::builder().from(from).to(to).subject(&email.subject);

    let message = match &email.html_body {
        Some(html) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.text_body.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                ),
        ),
        None => builder.body(email.text_body.clone()),
    };

    message.map_err(|e| AuthError::Email(format!("Failed to build email: {}", e)))
}
