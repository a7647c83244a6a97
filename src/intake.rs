//! Contact submission pipeline.
//!
//! Order of operations: rate limit, validate, sanitize, persist, notify.
//! The store-then-notify policy is intentional: once a message is persisted
//! it stays persisted even if the owner notification fails, and the failure
//! is still reported to the caller.

use tracing::info;

use crate::error::ApiError;
use crate::mailer::{Mailer, OutgoingEmail};
use crate::model::{ContactRequest, NewMessage};
use crate::rate_limit::RateLimiter;
use crate::storage::MessageStore;

/// Minimum field lengths (chars, after trimming).
const MIN_NAME: usize = 2;
const MIN_SUBJECT: usize = 5;
const MIN_MESSAGE: usize = 10;

/// Maximum field lengths applied during sanitization (chars).
const MAX_NAME: usize = 100;
const MAX_EMAIL: usize = 100;
const MAX_SUBJECT: usize = 200;
const MAX_MESSAGE: usize = 2000;

/// A submission after validation and sanitization.
#[derive(Debug, Clone)]
pub struct Submission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Run the full submission pipeline and return the user-facing confirmation
/// message.
///
/// `client_key` is the transport-level source identifier (typically the
/// client IP) used for both rate limiting and the stored origin field.
pub async fn handle_submission(
    store: &MessageStore,
    limiter: &RateLimiter,
    mailer: &dyn Mailer,
    request: &ContactRequest,
    client_key: &str,
    user_agent: Option<String>,
) -> Result<String, ApiError> {
    if !limiter.allow(client_key) {
        info!(client = %client_key, "submission rejected by rate limiter");
        return Err(ApiError::RateLimited);
    }

    validate(request)?;
    let submission = sanitize(request);

    let id = store
        .add(NewMessage {
            name: submission.name.clone(),
            email: submission.email.clone(),
            subject: submission.subject.clone(),
            message: submission.message.clone(),
            ip: Some(client_key.to_string()),
            user_agent,
        })
        .await?;
    info!(%id, "contact message stored");

    // The message above is already persisted; a delivery failure from here
    // on is reported but does not roll it back.
    let notification = OutgoingEmail {
        subject: format!("New portfolio contact: {}", submission.subject),
        html: notification_html(&id, &submission),
        text: Some(notification_text(&id, &submission)),
        attachment: None,
    };
    mailer.send(&notification).await?;
    info!(%id, "owner notification sent");

    Ok(format!(
        "Thank you {}! Your message was sent successfully. I will get back to you at {} soon.",
        submission.name, submission.email
    ))
}

/// Check every validation rule, reporting the first violated one.
pub fn validate(request: &ContactRequest) -> Result<(), ApiError> {
    if request.name.trim().chars().count() < MIN_NAME {
        return Err(ApiError::Validation(format!(
            "Name must be at least {MIN_NAME} characters long."
        )));
    }
    if !is_valid_email(request.email.trim()) {
        return Err(ApiError::Validation(
            "Email address is not valid.".to_string(),
        ));
    }
    if request.subject.trim().chars().count() < MIN_SUBJECT {
        return Err(ApiError::Validation(format!(
            "Subject must be at least {MIN_SUBJECT} characters long."
        )));
    }
    if request.message.trim().chars().count() < MIN_MESSAGE {
        return Err(ApiError::Validation(format!(
            "Message must be at least {MIN_MESSAGE} characters long."
        )));
    }
    Ok(())
}

/// Simple `local@domain.tld` shape check: nonempty local part, a domain
/// containing a dot with a nonempty tail, no whitespace or extra `@`
/// anywhere.
fn is_valid_email(email: &str) -> bool {
    fn plain(part: &str) -> bool {
        !part.is_empty() && !part.chars().any(|c| c.is_whitespace() || c == '@')
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    plain(local) && plain(host) && plain(tld)
}

/// Trim and cap each field; the email is additionally lowercased.
pub fn sanitize(request: &ContactRequest) -> Submission {
    Submission {
        name: truncate_chars(request.name.trim(), MAX_NAME),
        email: truncate_chars(request.email.trim(), MAX_EMAIL).to_lowercase(),
        subject: truncate_chars(request.subject.trim(), MAX_SUBJECT),
        message: truncate_chars(request.message.trim(), MAX_MESSAGE),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// HTML variant of the owner notification.
fn notification_html(id: &str, submission: &Submission) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <div style="background: #7c3aed; padding: 24px; text-align: center;">
    <h1 style="color: white; margin: 0;">New portfolio message</h1>
  </div>
  <div style="padding: 24px; background: white;">
    <p><strong>ID:</strong> {id}</p>
    <p><strong>Name:</strong> {name}</p>
    <p><strong>Email:</strong> <a href="mailto:{email}">{email}</a></p>
    <p><strong>Subject:</strong> {subject}</p>
    <h3 style="color: #374151;">Message</h3>
    <div style="background: #f9fafb; padding: 16px; border-left: 3px solid #7c3aed;">
      {body}
    </div>
  </div>
</div>"#,
        id = id,
        name = submission.name,
        email = submission.email,
        subject = submission.subject,
        body = submission.message.replace('\n', "<br>"),
    )
}

/// Plaintext variant of the owner notification.
fn notification_text(id: &str, submission: &Submission) -> String {
    format!(
        "New portfolio message\n\n\
         ID: {id}\n\
         Name: {name}\n\
         Email: {email}\n\
         Subject: {subject}\n\n\
         MESSAGE:\n{body}\n\n\
         ---\n\
         Reply to: {email}\n",
        id = id,
        name = submission.name,
        email = submission.email,
        subject = submission.subject,
        body = submission.message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, subject: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.to_string(),
            email: email.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_valid_submission_passes() {
        let req = request("Jo", "jo@x.com", "Hello?", "1234567890");
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn test_name_shorter_than_two_chars_rejected() {
        let req = request(" J ", "jo@x.com", "Hello?", "1234567890");
        let err = validate(&req).unwrap_err();
        assert!(err.to_string().contains("Name"));
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last@mail.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@b."));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@b@c.co"));
    }

    #[test]
    fn test_message_length_boundary() {
        let nine = request("Jo", "jo@x.com", "Hello?", "123456789");
        assert!(validate(&nine).is_err());

        let ten = request("Jo", "jo@x.com", "Hello?", "1234567890");
        assert!(validate(&ten).is_ok());
    }

    #[test]
    fn test_subject_length_boundary() {
        let four = request("Jo", "jo@x.com", "Hey!", "1234567890");
        assert!(validate(&four).is_err());

        let five = request("Jo", "jo@x.com", "Hey!!", "1234567890");
        assert!(validate(&five).is_ok());
    }

    #[test]
    fn test_sanitize_trims_caps_and_lowercases() {
        let long_name = "N".repeat(150);
        let req = request(
            &format!("  {long_name}  "),
            "  Jo@Example.COM  ",
            "Hello?",
            "1234567890",
        );

        let submission = sanitize(&req);
        assert_eq!(submission.name.chars().count(), 100);
        assert_eq!(submission.email, "jo@example.com");
        assert_eq!(submission.message, "1234567890");
    }

    #[test]
    fn test_sanitize_caps_message_at_2000_chars() {
        let req = request("Jo", "jo@x.com", "Hello?", &"x".repeat(5000));
        assert_eq!(sanitize(&req).message.chars().count(), 2000);
    }

    struct OkMailer;

    #[async_trait::async_trait]
    impl Mailer for OkMailer {
        async fn send(&self, _email: &OutgoingEmail) -> Result<(), crate::error::DeliveryError> {
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait::async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &OutgoingEmail) -> Result<(), crate::error::DeliveryError> {
            Err(crate::error::DeliveryError::Send("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_pipeline_confirmation_echoes_sender() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        let limiter = RateLimiter::default();

        let confirmation = handle_submission(
            &store,
            &limiter,
            &OkMailer,
            &request("Jo", "jo@x.com", "Hello?", "1234567890"),
            "203.0.113.7",
            None,
        )
        .await
        .unwrap();

        assert!(confirmation.contains("Jo"));
        assert!(confirmation.contains("jo@x.com"));
        assert_eq!(store.list(None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_the_stored_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        let limiter = RateLimiter::default();

        let result = handle_submission(
            &store,
            &limiter,
            &FailingMailer,
            &request("Jo", "jo@x.com", "Hello?", "1234567890"),
            "203.0.113.7",
            None,
        )
        .await;

        assert!(matches!(result, Err(ApiError::Delivery(_))));
        // Store-then-notify: the message is not rolled back.
        assert_eq!(store.list(None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_submission_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        let limiter = RateLimiter::new(chrono::Duration::minutes(15), 1);
        let req = request("Jo", "jo@x.com", "Hello?", "1234567890");

        handle_submission(&store, &limiter, &OkMailer, &req, "k", None)
            .await
            .unwrap();
        let result = handle_submission(&store, &limiter, &OkMailer, &req, "k", None).await;

        assert!(matches!(result, Err(ApiError::RateLimited)));
        assert_eq!(store.list(None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_submission_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::new(dir.path());
        let limiter = RateLimiter::default();

        let result = handle_submission(
            &store,
            &limiter,
            &OkMailer,
            &request("Jo", "not-an-email", "Hello?", "1234567890"),
            "k",
            None,
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(store.list(None).await.is_empty());
    }

    #[test]
    fn test_notification_bodies_echo_the_submission() {
        let submission = Submission {
            name: "Jo".to_string(),
            email: "jo@x.com".to_string(),
            subject: "Hello?".to_string(),
            message: "line one\nline two".to_string(),
        };

        let html = notification_html("id-1", &submission);
        assert!(html.contains("id-1"));
        assert!(html.contains("mailto:jo@x.com"));
        assert!(html.contains("line one<br>line two"));

        let text = notification_text("id-1", &submission);
        assert!(text.contains("Subject: Hello?"));
        assert!(text.contains("line one\nline two"));
    }
}
