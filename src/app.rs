//! Wiring: turns configuration into services and the HTTP state.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::clients::{
    http_client, ChromiumRenderer, EventPublisher, HttpMailer, LogMailer, LogPublisher, Mailer, NatsPublisher,
    PaymentGateway, PdfRenderer, RazorpayClient, SandboxGateway, SignatureVerifier, TemplateStore,
    UnconfiguredRenderer,
};
use crate::config::AppConfig;
use crate::http::AppState;
use crate::services::{
    AuthDeps, AuthService, CartService, CatalogService, EngagementService, InvoiceService, OrderDeps, OrderService,
    TokenKeys,
};
use crate::store::{MemoryStore, PgStore, Store};

const MAX_DB_CONNECTIONS: u32 = 10;

/// Everything a running instance talks to. Tests build this by hand.
pub struct Components {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub renderer: Arc<dyn PdfRenderer>,
    pub mailer: Arc<dyn Mailer>,
    pub events: Arc<dyn EventPublisher>,
}

impl Components {
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url, MAX_DB_CONNECTIONS).await.context("connecting to Postgres")?),
            None => {
                warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let http = http_client(config.http_timeout).context("building HTTP client")?;

        let gateway: Arc<dyn PaymentGateway> = match &config.razorpay {
            Some(rzp) => Arc::new(RazorpayClient::new(http.clone(), rzp.clone())),
            None => {
                warn!("Razorpay credentials not set, using the sandbox gateway");
                Arc::new(SandboxGateway)
            }
        };

        let renderer: Arc<dyn PdfRenderer> = match &config.pdf_renderer_url {
            Some(url) => Arc::new(ChromiumRenderer::new(http.clone(), url.clone())),
            None => {
                warn!("PDF_RENDERER_URL not set, invoice downloads will fail");
                Arc::new(UnconfiguredRenderer)
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.email_api {
            Some(api) => Arc::new(HttpMailer::new(http.clone(), api.clone(), config.mail_from.clone())),
            None => {
                info!("email API not configured, mail is logged only");
                Arc::new(LogMailer)
            }
        };

        let events: Arc<dyn EventPublisher> = match &config.nats_url {
            Some(url) => match NatsPublisher::connect(url).await {
                Ok(publisher) => {
                    info!(%url, "publishing domain events to NATS");
                    Arc::new(publisher)
                }
                Err(e) => {
                    warn!(%url, error = %e, "NATS unavailable, domain events are logged only");
                    Arc::new(LogPublisher)
                }
            },
            None => Arc::new(LogPublisher),
        };

        Ok(Self { store, gateway, renderer, mailer, events })
    }
}

pub fn build_state(config: &AppConfig, components: Components) -> anyhow::Result<AppState> {
    let Components { store, gateway, renderer, mailer, events } = components;
    let templates = Arc::new(TemplateStore::new(config.template_dir.clone()));
    let verifier = SignatureVerifier::new(&config.payment_secret).context("payment secret")?;

    let auth = AuthService::new(AuthDeps {
        store: store.clone(),
        tokens: TokenKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
        mailer: mailer.clone(),
        templates: templates.clone(),
        otp_ttl: chrono::Duration::minutes(config.otp_ttl_minutes),
        store_name: config.store_name.clone(),
    });
    let orders = OrderService::new(OrderDeps {
        store: store.clone(),
        gateway,
        verifier,
        events,
        mailer,
        templates: templates.clone(),
        pricing: config.pricing,
        currency: config.currency.clone(),
        gateway_key_id: config.razorpay.as_ref().map(|r| r.key_id.clone()),
    });
    let invoices =
        InvoiceService::new(store.clone(), renderer, templates, config.invoice_dir.clone(), config.currency.clone());

    Ok(AppState {
        auth: Arc::new(auth),
        catalog: Arc::new(CatalogService::new(store.clone())),
        cart: Arc::new(CartService::new(store.clone())),
        orders: Arc::new(orders),
        invoices: Arc::new(invoices),
        engagement: Arc::new(EngagementService::new(store)),
    })
}
