//! External collaborators, each behind a trait so tests can swap in fakes.

use std::time::Duration;

pub mod events;
pub mod mailer;
pub mod payment;
pub mod renderer;
pub mod templates;

pub use events::{EventPublisher, LogPublisher, NatsPublisher};
pub use mailer::{HttpMailer, LogMailer, MailError, Mailer, OutgoingMail};
pub use payment::{GatewayError, GatewayOrder, PaymentGateway, RazorpayClient, SandboxGateway, SignatureVerifier};
pub use renderer::{ChromiumRenderer, PdfRenderer, RenderError, UnconfiguredRenderer};
pub use templates::TemplateStore;

/// Shared HTTP client for every outbound integration.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
        .build()
}
