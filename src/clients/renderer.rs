//! HTML to PDF through a headless-browser conversion service.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("renderer returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("no PDF renderer configured")]
    NotConfigured,
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

/// Chromium conversion endpoint that takes an `index.html` upload and
/// answers with the PDF bytes.
pub struct ChromiumRenderer {
    http: reqwest::Client,
    endpoint: String,
}

impl ChromiumRenderer {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { http, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl PdfRenderer for ChromiumRenderer {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, html_len = html.len()))]
    async fn render(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let page = Part::text(html.to_string()).file_name("index.html").mime_str("text/html")?;
        let form = Form::new()
            .part("files", page)
            .text("printBackground", "true")
            .text("preferCssPageSize", "true");
        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::Rejected { status: status.as_u16(), body });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Used when no renderer endpoint is configured; every render fails.
#[derive(Default)]
pub struct UnconfiguredRenderer;

#[async_trait]
impl PdfRenderer for UnconfiguredRenderer {
    async fn render(&self, _html: &str) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::NotConfigured)
    }
}
