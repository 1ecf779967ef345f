//! Order aggregate: immutable line snapshot plus status and payment state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::{PriceQuote, PricingPolicy, Totals};

/// Fulfilment status. `Delivered`, `Rejected` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Received,
    Confirmed,
    Shipped,
    Delivered,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Confirmed => "Confirmed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Rejected | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Confirmed => 1,
            Self::Shipped => 2,
            Self::Delivered => 3,
            Self::Rejected | Self::Cancelled => 4,
        }
    }

    /// Forward moves along the main line (skips allowed), or a side branch
    /// from any non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        match next {
            Self::Rejected | Self::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }

    /// Whether reaching this status gives the order's stock back.
    pub fn releases_stock(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Received" => Ok(Self::Received),
            "Confirmed" => Ok(Self::Confirmed),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Rejected" => Ok(Self::Rejected),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "COD")]
    CashOnDelivery,
    Razorpay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "COD",
            Self::Razorpay => "Razorpay",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::CashOnDelivery),
            "Razorpay" => Ok(Self::Razorpay),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub houseno: Option<String>,
    pub street: Option<String>,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default = "default_country")]
    pub country: String,
    pub phone: Option<String>,
}

fn default_country() -> String {
    "India".to_string()
}

impl ShippingAddress {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [("city", &self.city), ("state", &self.state), ("pincode", &self.pincode)]
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect()
    }
}

/// Denormalized copy of a purchased line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub size_entry_id: Option<Uuid>,
    pub size_label: Option<String>,
    pub product_name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub discounted_price: Decimal,
    pub discount_percentage: Decimal,
}

impl OrderLine {
    pub fn quote(&self) -> PriceQuote {
        PriceQuote {
            price: self.price,
            discounted_price: self.discounted_price,
            discount_percentage: self.discount_percentage,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.discounted_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    #[serde(flatten)]
    pub totals: Totals,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub razorpay_order_id: Option<String>,
    pub payment_id: Option<String>,
    pub invoice_number: Option<String>,
    /// Set once stock has been decremented for this order's lines.
    pub stock_committed: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The status pair a stored order must still have for an update to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderState {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Delivered order cannot be cancelled")]
    CannotCancelDelivered,
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Unknown value: {0}")]
    UnknownValue(String),
}

pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = rand::thread_rng().gen_range(0..1000);
    format!("ORD-{}-{}", now.timestamp_millis(), suffix)
}

impl Order {
    /// Builds a new order with totals computed from its lines.
    pub fn create(
        user_id: Uuid,
        items: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        policy: &PricingPolicy,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        let quotes: Vec<(PriceQuote, u32)> = items.iter().map(|l| (l.quote(), l.quantity)).collect();
        let totals = Totals::compute(quotes.iter().map(|(q, n)| (q, *n)), policy);
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            order_number: generate_order_number(now),
            user_id,
            items,
            shipping_address,
            totals,
            payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Received,
            razorpay_order_id: None,
            payment_id: None,
            invoice_number: None,
            stock_committed: false,
            paid_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn state(&self) -> OrderState {
        OrderState { status: self.status, payment_status: self.payment_status }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn mark_paid(&mut self, payment_id: impl Into<String>) {
        self.payment_status = PaymentStatus::Paid;
        self.payment_id = Some(payment_id.into());
        self.status = OrderStatus::Received;
        self.paid_at = Some(Utc::now());
        self.touch();
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if next == OrderStatus::Cancelled && self.status == OrderStatus::Delivered {
            return Err(OrderError::CannotCancelDelivered);
        }
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        if next == OrderStatus::Delivered {
            self.delivered_at = Some(Utc::now());
        }
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, qty: u32) -> OrderLine {
        OrderLine {
            product_id: Uuid::new_v4(),
            size_entry_id: None,
            size_label: None,
            product_name: "Widget".into(),
            image: None,
            quantity: qty,
            price: Decimal::from(price),
            discounted_price: Decimal::from(price),
            discount_percentage: Decimal::ZERO,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            city: "Pune".into(),
            state: "MH".into(),
            pincode: "411001".into(),
            country: default_country(),
            ..Default::default()
        }
    }

    #[test]
    fn order_workflow() {
        let mut order = Order::create(
            Uuid::new_v4(),
            vec![line(100, 2), line(50, 1)],
            address(),
            PaymentMethod::CashOnDelivery,
            &PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(order.totals.subtotal, Decimal::from(250));
        assert_eq!(order.totals.total, Decimal::from(250));
        assert!(order.totals.is_consistent());
        assert!(order.order_number.starts_with("ORD-"));

        order.transition(OrderStatus::Confirmed).unwrap();
        order.transition(OrderStatus::Shipped).unwrap();
        assert!(order.transition(OrderStatus::Confirmed).is_err());
        order.transition(OrderStatus::Delivered).unwrap();
        assert!(order.delivered_at.is_some());
        assert_eq!(order.transition(OrderStatus::Cancelled), Err(OrderError::CannotCancelDelivered));
    }

    #[test]
    fn empty_order_is_rejected() {
        let err = Order::create(Uuid::new_v4(), vec![], address(), PaymentMethod::Razorpay, &PricingPolicy::default());
        assert_eq!(err.unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn side_branches_from_any_open_state() {
        for start in [OrderStatus::Received, OrderStatus::Confirmed, OrderStatus::Shipped] {
            assert!(start.can_transition_to(OrderStatus::Cancelled));
            assert!(start.can_transition_to(OrderStatus::Rejected));
        }
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Received));
        assert!(!OrderStatus::Rejected.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in ["Received", "Confirmed", "Shipped", "Delivered", "Rejected", "Cancelled"] {
            assert_eq!(s.parse::<OrderStatus>().unwrap().as_str(), s);
        }
        assert!("Lost".parse::<OrderStatus>().is_err());
        assert_eq!("COD".parse::<PaymentMethod>().unwrap(), PaymentMethod::CashOnDelivery);
    }

    #[test]
    fn missing_address_fields_are_reported() {
        let addr = ShippingAddress { city: " ".into(), ..address() };
        assert_eq!(addr.missing_fields(), vec!["city"]);
    }
}
