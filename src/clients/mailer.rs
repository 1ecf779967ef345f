//! Transactional email delivery.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::EmailApiConfig;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("email API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email API returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Posts mail to a JSON email API authenticated with an `api-key` header.
pub struct HttpMailer {
    http: reqwest::Client,
    config: EmailApiConfig,
    from: String,
}

impl HttpMailer {
    pub fn new(http: reqwest::Client, config: EmailApiConfig, from: impl Into<String>) -> Self {
        Self { http, config, from: from.into() }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    sender: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    html_content: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip_all, fields(to = %mail.to, subject = %mail.subject))]
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let body = SendBody {
            sender: Address { email: &self.from },
            to: [Address { email: &mail.to }],
            subject: &mail.subject,
            html_content: &mail.html,
        };
        let response = self
            .http
            .post(&self.config.url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status: status.as_u16(), body });
        }
        info!("email sent");
        Ok(())
    }
}

/// Writes mail to the log instead of delivering it.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let preview: String = mail.html.chars().take(80).collect();
        info!(to = %mail.to, subject = %mail.subject, %preview, "email delivery disabled, logging instead");
        Ok(())
    }
}
