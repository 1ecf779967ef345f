//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::order::{OrderStatus, PaymentMethod};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", rename_all = "lowercase")]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, method: PaymentMethod, total: Decimal },
    PaymentCaptured { order_id: Uuid, payment_id: String },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    Cancelled { order_id: Uuid, stock_restored: bool },
}

impl DomainEvent {
    /// Bus subject, e.g. `storefront.order.placed`.
    pub fn subject(&self) -> String {
        match self {
            Self::Order(e) => format!("storefront.order.{}", e.name()),
        }
    }
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::PaymentCaptured { .. } => "payment_captured",
            Self::StatusChanged { .. } => "status_changed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}
