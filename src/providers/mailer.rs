// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outgoing email for account verification and password reset.
//!
//! With `SMTP_HOST` set, mail is relayed through lettre's async SMTP
//! transport. Otherwise messages are kept in an in-memory [`Outbox`] and
//! logged, which is what development and tests use.

use std::sync::Mutex;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid mailbox '{0}'")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, MailerError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailerError::Transport(e.to_string()))?;
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(from)?,
        })
    }

    async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|e| MailerError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// In-memory sink for outgoing email.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Mutex<Vec<OutgoingEmail>>,
}

impl Outbox {
    fn push(&self, email: OutgoingEmail) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(email);
        }
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

pub enum Mailer {
    Smtp(SmtpMailer),
    Outbox(Outbox),
}

impl Mailer {
    pub fn from_config(config: Option<&SmtpConfig>, from: &str) -> Result<Self, MailerError> {
        match config {
            Some(config) => Ok(Mailer::Smtp(SmtpMailer::new(config, from)?)),
            None => Ok(Mailer::Outbox(Outbox::default())),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Mailer::Smtp(_) => "smtp",
            Mailer::Outbox(_) => "outbox",
        }
    }

    pub fn outbox(&self) -> Option<&Outbox> {
        match self {
            Mailer::Outbox(outbox) => Some(outbox),
            Mailer::Smtp(_) => None,
        }
    }

    pub async fn send(&self, email: OutgoingEmail) -> Result<(), MailerError> {
        match self {
            Mailer::Smtp(smtp) => smtp.send(email).await,
            Mailer::Outbox(outbox) => {
                info!(to = %email.to, subject = %email.subject, "Email queued in outbox");
                outbox.push(email);
                Ok(())
            }
        }
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, MailerError> {
    raw.parse()
        .map_err(|_| MailerError::Address(raw.to_string()))
}

pub fn verification_email(to: &str, name: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify your email".to_string(),
        html_body: format!(
            "<p>Hello {name},</p><p>Please verify your email by clicking <a href=\"{link}\">this link</a>.</p>"
        ),
    }
}

pub fn password_reset_email(to: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        html_body: format!(
            "<p>You requested a password reset.</p><p>Click <a href=\"{link}\">here</a> to choose a new password. The link expires in 10 minutes.</p>"
        ),
    }
}
