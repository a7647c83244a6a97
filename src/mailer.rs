//! Email capability boundary.
//!
//! Everything that leaves the process by email goes through the [`Mailer`]
//! trait: the owner notification sent on each contact submission and the
//! periodic report with its CSV attachment. Two real providers exist, a
//! transactional HTTP API (Resend) and an authenticated SMTP relay, picked
//! by configuration. When neither is usable an [`UnconfiguredMailer`] stands
//! in so callers get a clean [`DeliveryError::Unconfigured`] instead of a
//! panic.

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as EmailMessage, Tokio1Executor};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::DeliveryError;

/// Default sender identity when `MAIL_FROM` is unset.
const DEFAULT_FROM: &str = "Portfolio Contact <onboarding@resend.dev>";

/// Transactional API endpoint for the Resend provider.
const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// A file attached to an outgoing email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    /// Raw (unencoded) file content. Providers encode as they require.
    pub content: String,
}

/// One email to deliver to the site owner.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub subject: String,
    pub html: String,
    /// Optional plaintext alternative.
    pub text: Option<String>,
    pub attachment: Option<EmailAttachment>,
}

/// The external email-sending capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Build a mailer from environment configuration.
///
/// `MAIL_PROVIDER` selects `resend` (default) or `smtp`. Missing or
/// implausible credentials yield an [`UnconfiguredMailer`] rather than an
/// error, so the server still starts and intake keeps persisting messages.
pub fn from_env() -> SharedMailer {
    let from = env::var("MAIL_FROM").unwrap_or_else(|_| DEFAULT_FROM.to_string());
    let Ok(to) = env::var("MAIL_TO") else {
        return Arc::new(UnconfiguredMailer::new("MAIL_TO is not set"));
    };

    let provider = env::var("MAIL_PROVIDER").unwrap_or_else(|_| "resend".to_string());
    match provider.as_str() {
        "resend" => match env::var("RESEND_API_KEY") {
            Ok(key) if key.starts_with("re_") => Arc::new(ResendMailer::new(key, from, to)),
            Ok(_) => Arc::new(UnconfiguredMailer::new(
                "RESEND_API_KEY does not look like a Resend key",
            )),
            Err(_) => Arc::new(UnconfiguredMailer::new("RESEND_API_KEY is not set")),
        },
        "smtp" => {
            let host = env::var("SMTP_HOST");
            let username = env::var("SMTP_USERNAME");
            let password = env::var("SMTP_PASSWORD");
            match (host, username, password) {
                (Ok(host), Ok(username), Ok(password)) => {
                    match SmtpMailer::new(&host, username, password, &from, &to) {
                        Ok(mailer) => Arc::new(mailer),
                        Err(e) => Arc::new(UnconfiguredMailer::new(e.to_string())),
                    }
                }
                _ => Arc::new(UnconfiguredMailer::new(
                    "SMTP_HOST, SMTP_USERNAME and SMTP_PASSWORD must all be set",
                )),
            }
        }
        other => Arc::new(UnconfiguredMailer::new(format!(
            "unknown MAIL_PROVIDER '{other}'"
        ))),
    }
}

/// Transactional HTTP API provider (Resend).
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    to: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ResendAttachment<'a>>,
}

#[derive(Serialize)]
struct ResendAttachment<'a> {
    filename: &'a str,
    /// Base64-encoded file content, as the API expects.
    content: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String, to: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
            to,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let attachments = email
            .attachment
            .iter()
            .map(|a| ResendAttachment {
                filename: &a.filename,
                content: BASE64.encode(a.content.as_bytes()),
            })
            .collect();

        let request = ResendRequest {
            from: &self.from,
            to: [&self.to],
            subject: &email.subject,
            html: &email.html,
            text: email.text.as_deref(),
            attachments,
        };

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "transactional email API rejected the send");
            return Err(DeliveryError::Send(format!(
                "resend returned {status}: {body}"
            )));
        }

        info!(subject = %email.subject, "email sent via transactional API");
        Ok(())
    }
}

/// Authenticated SMTP relay provider.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        username: String,
        password: String,
        from: &str,
        to: &str,
    ) -> Result<Self, DeliveryError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| DeliveryError::Unconfigured(format!("smtp relay '{host}': {e}")))?
            .credentials(Credentials::new(username, password))
            .build();

        let from = from
            .parse()
            .map_err(|e| DeliveryError::Unconfigured(format!("invalid MAIL_FROM: {e}")))?;
        let to = to
            .parse()
            .map_err(|e| DeliveryError::Unconfigured(format!("invalid MAIL_TO: {e}")))?;

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let alternative = match &email.text {
            Some(text) => MultiPart::alternative_plain_html(text.clone(), email.html.clone()),
            None => MultiPart::alternative().singlepart(SinglePart::html(email.html.clone())),
        };

        let body = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse("text/csv")
                    .map_err(|e| DeliveryError::Send(e.to_string()))?;
                let part = MimeAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone().into_bytes(), content_type);
                MultiPart::mixed().multipart(alternative).singlepart(part)
            }
            None => alternative,
        };

        let message = EmailMessage::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(email.subject.clone())
            .multipart(body)
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        info!(subject = %email.subject, "email sent via smtp relay");
        Ok(())
    }
}

/// Stand-in used when no provider is configured: every send fails with
/// [`DeliveryError::Unconfigured`] carrying the reason.
pub struct UnconfiguredMailer {
    reason: String,
}

impl UnconfiguredMailer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        warn!(subject = %email.subject, reason = %self.reason, "dropping email, no mail provider configured");
        Err(DeliveryError::Unconfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_mailer_always_fails() {
        let mailer = UnconfiguredMailer::new("RESEND_API_KEY is not set");
        let email = OutgoingEmail {
            subject: "s".to_string(),
            html: "<p>h</p>".to_string(),
            text: None,
            attachment: None,
        };

        let error = mailer.send(&email).await.unwrap_err();
        assert!(matches!(error, DeliveryError::Unconfigured(_)));
        assert!(error.to_string().contains("RESEND_API_KEY"));
    }

    #[test]
    fn test_resend_payload_shape() {
        let request = ResendRequest {
            from: "a <a@x.com>",
            to: ["b@x.com"],
            subject: "hi",
            html: "<p>hi</p>",
            text: None,
            attachments: vec![ResendAttachment {
                filename: "messages.csv",
                content: BASE64.encode("ID,Name"),
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["to"][0], "b@x.com");
        assert!(value.get("text").is_none());
        assert_eq!(value["attachments"][0]["filename"], "messages.csv");
        // Content is base64 on the wire
        assert_eq!(value["attachments"][0]["content"], BASE64.encode("ID,Name"));
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_addresses() {
        let result = SmtpMailer::new(
            "smtp.example.com",
            "user".to_string(),
            "pass".to_string(),
            "not-a-mailbox",
            "also not one",
        );
        assert!(matches!(result, Err(DeliveryError::Unconfigured(_))));
    }
}
