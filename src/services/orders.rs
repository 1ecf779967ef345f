//! Checkout and order lifecycle.
//!
//! Stock is committed with one all-or-nothing store call per order and is
//! released again if the order cannot be persisted, when it is cancelled, or
//! when an admin rejects it. `Order::stock_committed` records which of these
//! states an order is in.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::clients::{
    EventPublisher, GatewayOrder, Mailer, OutgoingMail, PaymentGateway, SignatureVerifier, TemplateStore,
};
use crate::domain::{
    DomainEvent, Order, OrderEvent, OrderLine, OrderStatus, PaymentMethod, PricingPolicy, Product, ShippingAddress,
};
use crate::error::{AppError, Result};
use crate::services::cart::snapshot;
use crate::services::items::ItemRequest;
use crate::services::Actor;
use crate::store::{StockMove, Store};

/// What to check out: the caller's cart, or an explicit "buy now" list.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Option<Vec<ItemRequest>>,
    pub shipping_address: ShippingAddress,
    /// Amount the client believes it is paying. Only compared, never used.
    pub client_amount: Option<Decimal>,
}

/// Everything a client needs to open the gateway's checkout widget.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCheckout {
    pub order: Order,
    pub gateway_order: GatewayOrder,
    pub key_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

pub struct OrderDeps {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub verifier: SignatureVerifier,
    pub events: Arc<dyn EventPublisher>,
    pub mailer: Arc<dyn Mailer>,
    pub templates: Arc<TemplateStore>,
    pub pricing: PricingPolicy,
    pub currency: String,
    pub gateway_key_id: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    events: Arc<dyn EventPublisher>,
    mailer: Arc<dyn Mailer>,
    templates: Arc<TemplateStore>,
    pricing: PricingPolicy,
    currency: String,
    gateway_key_id: Option<String>,
}

fn stock_moves(order: &Order) -> Vec<StockMove> {
    order
        .items
        .iter()
        .map(|l| StockMove { product_id: l.product_id, size_entry_id: l.size_entry_id, quantity: l.quantity })
        .collect()
}

impl OrderService {
    pub fn new(deps: OrderDeps) -> Self {
        Self {
            store: deps.store,
            gateway: deps.gateway,
            verifier: deps.verifier,
            events: deps.events,
            mailer: deps.mailer,
            templates: deps.templates,
            pricing: deps.pricing,
            currency: deps.currency,
            gateway_key_id: deps.gateway_key_id,
        }
    }

    /// Resolves the checkout source into order lines and checks stock.
    /// The flag is true when the lines came from the cart.
    async fn lines(&self, user_id: Uuid, items: Option<Vec<ItemRequest>>) -> Result<(Vec<OrderLine>, bool)> {
        match items.filter(|i| !i.is_empty()) {
            Some(items) => {
                let mut lines = Vec::with_capacity(items.len());
                for item in items {
                    if item.quantity < 1 {
                        return Err(AppError::validation("quantity must be at least 1"));
                    }
                    let product =
                        self.store.product(item.product_id).await?.ok_or_else(|| AppError::not_found("Product"))?;
                    let snap = snapshot(&product, item.size.as_ref())?;
                    let quantity =
                        u32::try_from(item.quantity).map_err(|_| AppError::validation("quantity is too large"))?;
                    ensure_available(&product, snap.size_entry_id, quantity)?;
                    lines.push(OrderLine {
                        product_id: snap.product_id,
                        size_entry_id: snap.size_entry_id,
                        size_label: snap.size_label,
                        product_name: snap.product_name,
                        image: snap.image,
                        quantity,
                        price: snap.quote.price,
                        discounted_price: snap.quote.discounted_price,
                        discount_percentage: snap.quote.discount_percentage,
                    });
                }
                Ok((lines, false))
            }
            None => {
                let cart = self.store.cart(user_id).await?.filter(|c| !c.is_empty());
                let cart = cart.ok_or_else(|| AppError::validation("Cart is empty"))?;
                let mut lines = Vec::with_capacity(cart.items.len());
                for line in cart.items {
                    let product = self
                        .store
                        .product(line.product_id)
                        .await?
                        .ok_or_else(|| AppError::validation(format!("{} is no longer available", line.product_name)))?;
                    if product.has_sizes() && line.size_entry_id.and_then(|id| product.size_entry(id)).is_none() {
                        return Err(AppError::validation(format!("Size required for {}", product.name)));
                    }
                    ensure_available(&product, line.size_entry_id, line.quantity)?;
                    lines.push(OrderLine {
                        product_id: line.product_id,
                        size_entry_id: line.size_entry_id,
                        size_label: line.size_label,
                        product_name: line.product_name,
                        image: line.image,
                        quantity: line.quantity,
                        price: line.price,
                        discounted_price: line.discounted_price,
                        discount_percentage: line.discount_percentage,
                    });
                }
                Ok((lines, true))
            }
        }
    }

    fn build(
        &self,
        user_id: Uuid,
        lines: Vec<OrderLine>,
        address: ShippingAddress,
        method: PaymentMethod,
    ) -> Result<Order> {
        let missing = address.missing_fields();
        if !missing.is_empty() {
            return Err(AppError::validation(format!("Shipping address is missing: {}", missing.join(", "))));
        }
        Ok(Order::create(user_id, lines, address, method, &self.pricing)?)
    }

    /// Cash on delivery: stock is taken now and the order persisted.
    #[instrument(skip(self, request), fields(%user_id))]
    pub async fn place_cod(&self, user_id: Uuid, request: CheckoutRequest) -> Result<Order> {
        let (lines, from_cart) = self.lines(user_id, request.items).await?;
        let mut order = self.build(user_id, lines, request.shipping_address, PaymentMethod::CashOnDelivery)?;

        let moves = stock_moves(&order);
        self.store.take_stock(&moves).await?;
        order.stock_committed = true;
        if let Err(e) = self.store.insert_order(&order).await {
            self.release(&moves, order.id).await;
            return Err(e.into());
        }
        if from_cart {
            self.store.clear_cart(user_id).await?;
        }
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.totals.total,
            "COD order placed"
        );
        self.publish_placed(&order).await;
        self.send_order_mail(&order).await;
        Ok(order)
    }

    /// Opens a gateway order for the server-computed total. Stock is left
    /// alone until the payment is verified.
    #[instrument(skip(self, request), fields(%user_id))]
    pub async fn create_gateway_order(&self, user_id: Uuid, request: CheckoutRequest) -> Result<GatewayCheckout> {
        let (lines, _) = self.lines(user_id, request.items).await?;
        let mut order = self.build(user_id, lines, request.shipping_address, PaymentMethod::Razorpay)?;
        if let Some(claimed) = request.client_amount {
            if claimed != order.totals.total {
                warn!(%claimed, computed = %order.totals.total, "client amount ignored");
            }
        }
        let gateway_order = self
            .gateway
            .create_order(order.totals.total_minor_units(), &self.currency, &order.order_number)
            .await?;
        order.razorpay_order_id = Some(gateway_order.id.clone());
        self.store.insert_order(&order).await?;
        info!(order_id = %order.id, gateway_order_id = %gateway_order.id, "gateway order opened");
        self.publish_placed(&order).await;
        Ok(GatewayCheckout { order, gateway_order, key_id: self.gateway_key_id.clone() })
    }

    /// Settles a gateway payment. A bad signature changes nothing.
    #[instrument(skip(self, confirmation), fields(%user_id, gateway_order_id = %confirmation.razorpay_order_id))]
    pub async fn verify_payment(&self, user_id: Uuid, confirmation: PaymentConfirmation) -> Result<Order> {
        let PaymentConfirmation { razorpay_order_id, razorpay_payment_id, razorpay_signature } = confirmation;
        if !self.verifier.verify(&razorpay_order_id, &razorpay_payment_id, &razorpay_signature) {
            warn!("payment signature mismatch");
            return Err(AppError::InvalidSignature);
        }
        let mut order = self
            .store
            .order_by_gateway_id(&razorpay_order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))?;
        if order.user_id != user_id {
            return Err(AppError::Forbidden("Not authorized".into()));
        }
        if order.is_paid() {
            return Ok(order);
        }
        if order.status.is_terminal() {
            return Err(AppError::validation(format!("Order is {}", order.status)));
        }

        let expected = order.state();
        let moves = stock_moves(&order);
        self.store.take_stock(&moves).await?;
        order.mark_paid(razorpay_payment_id.clone());
        order.stock_committed = true;
        match self.store.update_order(&order, expected).await {
            Ok(true) => {}
            Ok(false) => {
                self.release(&moves, order.id).await;
                let current = self.store.order(order.id).await?.ok_or_else(|| AppError::not_found("Order"))?;
                if current.is_paid() {
                    return Ok(current);
                }
                return Err(changed_elsewhere());
            }
            Err(e) => {
                self.release(&moves, order.id).await;
                return Err(e.into());
            }
        }
        self.store.clear_cart(user_id).await?;
        info!(order_id = %order.id, payment_id = %razorpay_payment_id, "payment captured");
        let event = OrderEvent::PaymentCaptured { order_id: order.id, payment_id: razorpay_payment_id };
        self.events.publish(DomainEvent::Order(event)).await;
        self.send_order_mail(&order).await;
        Ok(order)
    }

    /// Cancels an order on behalf of its owner or an admin.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn cancel(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        let order = self.order_for(actor, order_id).await?;
        self.move_to(order, OrderStatus::Cancelled).await
    }

    /// Admin status change along the order state machine.
    #[instrument(skip(self))]
    pub async fn update_status(&self, order_id: Uuid, next: OrderStatus) -> Result<Order> {
        let order = self.store.order(order_id).await?.ok_or_else(|| AppError::not_found("Order"))?;
        self.move_to(order, next).await
    }

    async fn move_to(&self, mut order: Order, next: OrderStatus) -> Result<Order> {
        let expected = order.state();
        let from = order.status;
        order.transition(next)?;

        let restore = next.releases_stock() && order.stock_committed;
        if restore {
            order.stock_committed = false;
        }
        if !self.store.update_order(&order, expected).await? {
            return Err(changed_elsewhere());
        }
        // Only the request whose status write landed gives the stock back.
        if restore {
            if let Err(e) = self.store.return_stock(&stock_moves(&order)).await {
                error!(order_id = %order.id, error = %e, "order moved to {next} but its stock was not returned");
                return Err(e.into());
            }
        }

        info!(order_id = %order.id, %from, to = %next, stock_restored = restore, "order status changed");
        let event = if next == OrderStatus::Cancelled {
            OrderEvent::Cancelled { order_id: order.id, stock_restored: restore }
        } else {
            OrderEvent::StatusChanged { order_id: order.id, from, to: next }
        };
        self.events.publish(DomainEvent::Order(event)).await;
        Ok(order)
    }

    pub async fn my_orders(&self, user_id: Uuid) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.all_orders().await?)
    }

    /// An order visible to `actor`: their own, or any order for an admin.
    pub async fn order_for(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        let order = self.store.order(order_id).await?.ok_or_else(|| AppError::not_found("Order"))?;
        if order.user_id != actor.user_id && !actor.is_admin {
            return Err(AppError::Forbidden("Not authorized".into()));
        }
        Ok(order)
    }

    async fn release(&self, moves: &[StockMove], order_id: Uuid) {
        match self.store.return_stock(moves).await {
            Ok(()) => warn!(%order_id, "order not saved, stock released"),
            Err(e) => error!(%order_id, error = %e, "order not saved and stock release failed"),
        }
    }

    async fn publish_placed(&self, order: &Order) {
        let event = OrderEvent::Placed {
            order_id: order.id,
            user_id: order.user_id,
            method: order.payment_method,
            total: order.totals.total,
        };
        self.events.publish(DomainEvent::Order(event)).await;
    }

    /// Best effort: failures are logged only.
    async fn send_order_mail(&self, order: &Order) {
        let user = match self.store.user(order.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "could not load user for order mail");
                return;
            }
        };
        let data = json!({ "username": user.username, "order": order, "currency": self.currency });
        let html = self.templates.render("order_reply.html", &data).await;
        let mail = OutgoingMail { to: user.email, subject: format!("Order {} received", order.order_number), html };
        if let Err(e) = self.mailer.send(mail).await {
            warn!(order_id = %order.id, error = %e, "order mail failed");
        }
    }
}

fn changed_elsewhere() -> AppError {
    AppError::Conflict("Order was changed by another request".into())
}

fn ensure_available(product: &Product, size_entry: Option<Uuid>, quantity: u32) -> Result<()> {
    let available = product.available(size_entry);
    if i64::from(available) < i64::from(quantity) {
        return Err(AppError::InsufficientStock { product_id: product.id, size_entry_id: size_entry });
    }
    Ok(())
}
