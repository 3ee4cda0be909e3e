use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ReconError, Result};

pub fn build_message(from: &str, to: &str, subject: &str, html: &str) -> Result<Message> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| ReconError::Mail(format!("invalid from address '{from}': {e}")))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| ReconError::Mail(format!("invalid recipient '{to}': {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html.to_string())
        .map_err(|e| ReconError::Mail(format!("failed to build email: {e}")))
}

fn transport(config: &Config) -> Result<SmtpTransport> {
    match (&config.smtp_user, &config.smtp_pass) {
        (Some(user), Some(pass)) => Ok(SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| ReconError::Mail(format!("SMTP relay error: {e}")))?
            .credentials(Credentials::new(user.clone(), pass.clone()))
            .build()),
        _ => Ok(SmtpTransport::builder_dangerous(&config.smtp_host).build()),
    }
}

/// Sends one message per recipient and returns how many were delivered.
/// A failed recipient is logged and does not stop the others.
pub async fn send_html(
    config: &Config,
    recipients: &[String],
    subject: &str,
    html: &str,
) -> Result<usize> {
    let mut messages = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        messages.push((
            recipient.clone(),
            build_message(&config.smtp_from, recipient, subject, html)?,
        ));
    }

    let mailer = transport(config)?;
    tokio::task::spawn_blocking(move || {
        let mut delivered = 0usize;
        for (recipient, message) in messages {
            match mailer.send(&message) {
                Ok(_) => {
                    delivered += 1;
                    info!(%recipient, "summary email sent");
                }
                Err(e) => warn!(%recipient, error = %e, "summary email failed"),
            }
        }
        delivered
    })
    .await
    .map_err(|e| ReconError::Mail(format!("mail task failed: {e}")))
}
