use std::time::Duration;

use chrono::Local;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{Message, SmtpTransport, Transport};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::emails::{merge_emails, parse_emails};
use crate::error::AoiError;
use crate::records::{DatasetRecord, EmailInput, JobInfo, MetadataRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

pub trait Mailer {
    fn send(&self, notification: &Notification) -> Result<(), AoiError>;
}

/// Plain-text mail over an unauthenticated SMTP relay.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, AoiError> {
        let sender = self
            .config
            .sender
            .parse::<Mailbox>()
            .map_err(|err| AoiError::Email(format!("invalid sender {}: {err}", self.config.sender)))?;
        let mut builder = Message::builder()
            .from(sender)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        let mut has_recipient = false;
        for recipient in &notification.recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.to(mailbox);
                    has_recipient = true;
                }
                Err(err) => warn!(%recipient, "skipping invalid recipient: {err}"),
            }
        }
        if !has_recipient {
            return Err(AoiError::Email("no valid recipients".to_string()));
        }
        builder
            .body(notification.body.clone())
            .map_err(|err| AoiError::Email(err.to_string()))
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, notification: &Notification) -> Result<(), AoiError> {
        let message = self.build_message(notification)?;
        info!(
            from = %self.config.sender,
            to = ?notification.recipients,
            subject = %notification.subject,
            "sending email\n{}",
            notification.body
        );
        let mailer = SmtpTransport::builder_dangerous(self.config.host.as_str())
            .port(self.config.port)
            .timeout(Some(Duration::from_secs(30)))
            .build();
        let response = mailer
            .send(&message)
            .map_err(|err| AoiError::Email(err.to_string()))?;
        if response.is_positive() {
            Ok(())
        } else {
            Err(AoiError::Email(format!("{response:?}")))
        }
    }
}

/// Fills `{}` / `{N}` placeholders the way the email templates expect.
/// `{{` and `}}` produce literal braces; a `:format` suffix is ignored.
pub fn render_positional(template: &str, args: &[&str]) -> Result<String, AoiError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0usize;
    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => {
                            return Err(AoiError::EmailTemplate(
                                "unterminated placeholder".to_string(),
                            ));
                        }
                    }
                }
                let name = field
                    .split([':', '!'])
                    .next()
                    .unwrap_or_default()
                    .trim();
                let index = if name.is_empty() {
                    next_auto += 1;
                    next_auto - 1
                } else {
                    name.parse::<usize>().map_err(|_| {
                        AoiError::EmailTemplate(format!("unsupported placeholder {{{field}}}"))
                    })?
                };
                let value = args.get(index).ok_or_else(|| {
                    AoiError::EmailTemplate(format!("placeholder {index} has no value"))
                })?;
                out.push_str(value);
            }
            '}' => {
                return Err(AoiError::EmailTemplate(
                    "single '}' encountered in template".to_string(),
                ));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub fn success_notification(
    ds: &DatasetRecord,
    met: &MetadataRecord,
    template: &str,
    now: &str,
) -> Result<Notification, AoiError> {
    let coordinates = match ds.location.as_ref().map(|location| &location.value) {
        Some(geojson::Value::Polygon(rings)) => serde_json::to_string(rings)
            .map_err(|err| AoiError::EmailTemplate(err.to_string()))?,
        _ => "[]".to_string(),
    };
    let eventtime = met.eventtime.as_deref().unwrap_or("None");
    let username = met.username.as_deref().unwrap_or("");
    let body = render_positional(
        template,
        &[
            &ds.label,
            &ds.aoi_type,
            &ds.starttime,
            eventtime,
            &ds.endtime,
            &coordinates,
            now,
            username,
        ],
    )?;
    Ok(Notification {
        recipients: ds.emails.clone(),
        subject: format!("Completed: Create AOI {}", ds.label),
        body,
    })
}

/// Works from the raw context so it can report contexts that failed to parse.
pub fn failure_notification(
    context: &Value,
    default_emails: &[String],
    job: &JobInfo,
    error: &str,
    template: &str,
    now: &str,
) -> Result<Notification, AoiError> {
    let name = context
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let context_emails = context
        .get("emails")
        .cloned()
        .and_then(|value| serde_json::from_value::<EmailInput>(value).ok())
        .map(|input| parse_emails(&input))
        .unwrap_or_default();
    let username = context
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or("");
    let error = error.trim().trim_matches('"');
    let body = render_positional(
        template,
        &[now, name, &job.job_id, &job.task_id, error, username],
    )?;
    Ok(Notification {
        recipients: merge_emails(default_emails, &context_emails),
        subject: format!("Failed: Create AOI {name}"),
        body,
    })
}
