//! Invoice PDFs: order → HTML template → external renderer → file.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::clients::templates::escape_html;
use crate::clients::{PdfRenderer, TemplateStore};
use crate::domain::{Order, OrderLine};
use crate::error::{AppError, Result};
use crate::services::Actor;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct Invoice {
    pub number: String,
    pub path: PathBuf,
    pub pdf: Vec<u8>,
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn Store>,
    renderer: Arc<dyn PdfRenderer>,
    templates: Arc<TemplateStore>,
    dir: PathBuf,
    currency: String,
}

pub fn invoice_number(now: DateTime<Utc>) -> String {
    let seq = rand::thread_rng().gen_range(0..100_000);
    format!("INV-{}-{:05}", now.format("%Y%m%d"), seq)
}

fn row(line: &OrderLine, currency: &str) -> String {
    format!(
        "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td>\
         <td class=\"num\">{} {}</td><td class=\"num\">{} {}</td></tr>",
        escape_html(&line.product_name),
        escape_html(line.size_label.as_deref().unwrap_or("-")),
        line.quantity,
        currency,
        line.discounted_price,
        currency,
        line.line_total(),
    )
}

impl InvoiceService {
    pub fn new(
        store: Arc<dyn Store>,
        renderer: Arc<dyn PdfRenderer>,
        templates: Arc<TemplateStore>,
        dir: PathBuf,
        currency: impl Into<String>,
    ) -> Self {
        Self { store, renderer, templates, dir, currency: currency.into() }
    }

    pub fn path_for(&self, order_id: Uuid) -> PathBuf {
        self.dir.join(format!("invoice-{order_id}.pdf"))
    }

    async fn html(&self, order: &Order, number: &str) -> String {
        let rows: String = order.items.iter().map(|l| row(l, &self.currency)).collect();
        let data = json!({
            "invoiceNumber": number,
            "date": order.created_at.format("%d %b %Y").to_string(),
            "order": order,
            "rows": rows,
            "currency": self.currency,
        });
        self.templates.render("invoice.html", &data).await
    }

    /// Renders and stores the invoice for an order the actor may see.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn generate(&self, actor: &Actor, order_id: Uuid) -> Result<Invoice> {
        let order = self.store.order(order_id).await?.ok_or_else(|| AppError::not_found("Order"))?;
        if order.user_id != actor.user_id && !actor.is_admin {
            return Err(AppError::Forbidden("Not authorized".into()));
        }
        let number = match &order.invoice_number {
            Some(number) => number.clone(),
            None => self
                .store
                .set_invoice_number(order.id, &invoice_number(Utc::now()))
                .await?
                .ok_or_else(|| AppError::not_found("Order"))?,
        };

        let html = self.html(&order, &number).await;
        let pdf = self.renderer.render(&html).await?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| anyhow::anyhow!("creating invoice dir: {e}"))?;
        let path = self.path_for(order.id);
        tokio::fs::write(&path, &pdf).await.map_err(|e| anyhow::anyhow!("writing {}: {e}", path.display()))?;

        info!(%order_id, invoice = %number, bytes = pdf.len(), "invoice written");
        Ok(Invoice { number, path, pdf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    use crate::clients::{LogMailer, LogPublisher, RenderError, SandboxGateway, SignatureVerifier};
    use crate::domain::{OrderStatus, PaymentMethod, PricingPolicy, Product, ShippingAddress};
    use crate::services::{CheckoutRequest, ItemRequest, OrderDeps, OrderService};
    use crate::store::{MemoryStore, OrderStore, ProductStore};

    /// Captures the HTML it is given and answers with a fixed PDF.
    #[derive(Default)]
    struct FakeRenderer {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PdfRenderer for FakeRenderer {
        async fn render(&self, html: &str) -> std::result::Result<Vec<u8>, RenderError> {
            self.seen.lock().push(html.to_string());
            Ok(b"%PDF-1.4 fake".to_vec())
        }
    }

    /// Cancels the order it is rendering, the way a concurrent request would.
    struct CancellingRenderer {
        orders: Arc<OrderService>,
        actor: Actor,
        order_id: Uuid,
    }

    #[async_trait]
    impl PdfRenderer for CancellingRenderer {
        async fn render(&self, _html: &str) -> std::result::Result<Vec<u8>, RenderError> {
            self.orders.cancel(&self.actor, self.order_id).await.unwrap();
            Ok(b"%PDF-1.4 fake".to_vec())
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            city: "Pune".into(),
            state: "MH".into(),
            pincode: "411001".into(),
            country: "India".into(),
            ..Default::default()
        }
    }

    fn order(user_id: Uuid) -> Order {
        let line = OrderLine {
            product_id: Uuid::new_v4(),
            size_entry_id: None,
            size_label: Some("M".into()),
            product_name: "Tee <Limited>".into(),
            image: None,
            quantity: 2,
            price: Decimal::from(100),
            discounted_price: Decimal::from(90),
            discount_percentage: Decimal::from(10),
        };
        Order::create(user_id, vec![line], address(), PaymentMethod::CashOnDelivery, &PricingPolicy::default()).unwrap()
    }

    #[test]
    fn number_format() {
        let n = invoice_number(Utc::now());
        assert!(n.starts_with("INV-"));
        assert_eq!(n.len(), "INV-20240101-00000".len());
    }

    #[tokio::test]
    async fn writes_pdf_and_keeps_invoice_number() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let renderer = Arc::new(FakeRenderer::default());
        let user = Actor { user_id: Uuid::new_v4(), is_admin: false };
        let order = order(user.user_id);
        store.insert_order(&order).await.unwrap();

        let svc = InvoiceService::new(
            store.clone(),
            renderer.clone(),
            Arc::new(TemplateStore::new(None)),
            dir.path().join("invoices"),
            "INR",
        );
        let first = svc.generate(&user, order.id).await.unwrap();
        assert_eq!(first.path, dir.path().join("invoices").join(format!("invoice-{}.pdf", order.id)));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"%PDF-1.4 fake");

        let html = renderer.seen.lock()[0].clone();
        assert!(html.contains(&first.number));
        assert!(html.contains("Tee &lt;Limited&gt;"));
        assert!(html.contains("Pune"));

        let second = svc.generate(&user, order.id).await.unwrap();
        assert_eq!(second.number, first.number);
        let stored = store.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.invoice_number.as_deref(), Some(first.number.as_str()));
    }

    #[tokio::test]
    async fn unknown_order_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Arc::new(FakeRenderer::default());
        let svc = InvoiceService::new(
            Arc::new(MemoryStore::new()),
            renderer.clone(),
            Arc::new(TemplateStore::new(None)),
            dir.path().to_path_buf(),
            "INR",
        );
        let id = Uuid::new_v4();
        let actor = Actor { user_id: Uuid::new_v4(), is_admin: true };
        assert!(matches!(svc.generate(&actor, id).await, Err(AppError::NotFound(_))));
        assert!(!svc.path_for(id).exists());
        assert!(renderer.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn other_users_cannot_fetch_invoices() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let order = order(Uuid::new_v4());
        store.insert_order(&order).await.unwrap();
        let svc = InvoiceService::new(
            store,
            Arc::new(FakeRenderer::default()),
            Arc::new(TemplateStore::new(None)),
            dir.path().to_path_buf(),
            "INR",
        );
        let stranger = Actor { user_id: Uuid::new_v4(), is_admin: false };
        assert!(matches!(svc.generate(&stranger, order.id).await, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn address_fields_reach_the_renderer_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let renderer = Arc::new(FakeRenderer::default());
        let user = Actor { user_id: Uuid::new_v4(), is_admin: false };
        let mut order = order(user.user_id);
        order.shipping_address.city = "<iframe src=\"file:///etc/passwd\"></iframe>".into();
        store.insert_order(&order).await.unwrap();

        let svc = InvoiceService::new(
            store,
            renderer.clone(),
            Arc::new(TemplateStore::new(None)),
            dir.path().to_path_buf(),
            "INR",
        );
        svc.generate(&user, order.id).await.unwrap();

        let html = renderer.seen.lock()[0].clone();
        assert!(!html.contains("<iframe"));
        assert!(html.contains("&lt;iframe src=&quot;file:///etc/passwd&quot;&gt;"));
        assert!(html.contains("<tr><td>Tee &lt;Limited&gt;</td>"));
    }

    #[tokio::test]
    async fn cancel_during_rendering_is_not_undone() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let product = Product::create("Mug", Decimal::from(10), 5);
        store.insert_product(&product).await.unwrap();
        let orders = Arc::new(OrderService::new(OrderDeps {
            store: store.clone(),
            gateway: Arc::new(SandboxGateway),
            verifier: SignatureVerifier::new("test_secret").unwrap(),
            events: Arc::new(LogPublisher),
            mailer: Arc::new(LogMailer),
            templates: Arc::new(TemplateStore::new(None)),
            pricing: PricingPolicy::default(),
            currency: "INR".into(),
            gateway_key_id: None,
        }));
        let user = Actor { user_id: Uuid::new_v4(), is_admin: false };
        let request = CheckoutRequest {
            items: Some(vec![ItemRequest { product_id: product.id, size: None, quantity: 2 }]),
            shipping_address: address(),
            client_amount: None,
        };
        let placed = orders.place_cod(user.user_id, request).await.unwrap();
        assert_eq!(store.product(product.id).await.unwrap().unwrap().stock, 3);

        let renderer = Arc::new(CancellingRenderer { orders: orders.clone(), actor: user, order_id: placed.id });
        let svc = InvoiceService::new(
            store.clone(),
            renderer,
            Arc::new(TemplateStore::new(None)),
            dir.path().to_path_buf(),
            "INR",
        );
        let invoice = svc.generate(&user, placed.id).await.unwrap();

        let stored = store.order(placed.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(!stored.stock_committed);
        assert_eq!(stored.invoice_number.as_deref(), Some(invoice.number.as_str()));
        assert_eq!(store.product(product.id).await.unwrap().unwrap().stock, 5);

        assert!(orders.cancel(&user, placed.id).await.is_err());
        assert_eq!(store.product(product.id).await.unwrap().unwrap().stock, 5);
    }
}
