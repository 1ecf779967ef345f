use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use uuid::Uuid;

use super::{corrupt, unique_or, PgStore};
use crate::domain::{
    Cart, CartLine, Order, OrderLine, OrderState, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, Totals,
};
use crate::store::{CartStore, OrderStore, StoreResult};

#[derive(sqlx::FromRow)]
struct CartRow {
    user_id: Uuid,
    items: Json<Vec<CartLine>>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart(&self, user_id: Uuid) -> StoreResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>("SELECT user_id, items, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| Cart { user_id: r.user_id, items: r.items.0, updated_at: r.updated_at }))
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO carts (user_id, items, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.user_id)
        .bind(Json(&cart.items))
        .bind(cart.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE carts SET items = '[]', updated_at = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    items: Json<Vec<OrderLine>>,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
    total_price: Decimal,
    payment_method: String,
    payment_status: String,
    status: String,
    razorpay_order_id: Option<String>,
    payment_id: Option<String>,
    invoice_number: Option<String>,
    stock_committed: bool,
    paid_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = crate::store::StoreError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let payment_method = PaymentMethod::from_str(&r.payment_method)
            .map_err(|_| corrupt("orders.payment_method", &r.payment_method))?;
        let payment_status = PaymentStatus::from_str(&r.payment_status)
            .map_err(|_| corrupt("orders.payment_status", &r.payment_status))?;
        let status = OrderStatus::from_str(&r.status).map_err(|_| corrupt("orders.status", &r.status))?;
        Ok(Order {
            id: r.id,
            order_number: r.order_number,
            user_id: r.user_id,
            items: r.items.0,
            shipping_address: r.shipping_address.0,
            totals: Totals { subtotal: r.subtotal, discount: r.discount, tax: r.tax, total: r.total_price },
            payment_method,
            payment_status,
            status,
            razorpay_order_id: r.razorpay_order_id,
            payment_id: r.payment_id,
            invoice_number: r.invoice_number,
            stock_committed: r.stock_committed,
            paid_at: r.paid_at,
            delivered_at: r.delivered_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn collect(rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, o: &Order) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO orders (id, order_number, user_id, items, shipping_address, subtotal, discount, tax, \
             total_price, payment_method, payment_status, status, razorpay_order_id, payment_id, invoice_number, \
             stock_committed, paid_at, delivered_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        )
        .bind(o.id)
        .bind(&o.order_number)
        .bind(o.user_id)
        .bind(Json(&o.items))
        .bind(Json(&o.shipping_address))
        .bind(o.totals.subtotal)
        .bind(o.totals.discount)
        .bind(o.totals.tax)
        .bind(o.totals.total)
        .bind(o.payment_method.as_str())
        .bind(o.payment_status.as_str())
        .bind(o.status.as_str())
        .bind(&o.razorpay_order_id)
        .bind(&o.payment_id)
        .bind(&o.invoice_number)
        .bind(o.stock_committed)
        .bind(o.paid_at)
        .bind(o.delivered_at)
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(self.pool())
        .await
        .map_err(unique_or("Order"))?;
        Ok(())
    }

    async fn update_order(&self, o: &Order, expected: OrderState) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE orders SET payment_status = $2, status = $3, razorpay_order_id = $4, payment_id = $5, \
             stock_committed = $6, paid_at = $7, delivered_at = $8, updated_at = $9 \
             WHERE id = $1 AND status = $10 AND payment_status = $11",
        )
        .bind(o.id)
        .bind(o.payment_status.as_str())
        .bind(o.status.as_str())
        .bind(&o.razorpay_order_id)
        .bind(&o.payment_id)
        .bind(o.stock_committed)
        .bind(o.paid_at)
        .bind(o.delivered_at)
        .bind(o.updated_at)
        .bind(expected.status.as_str())
        .bind(expected.payment_status.as_str())
        .execute(self.pool())
        .await
        .map_err(unique_or("Order"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_invoice_number(&self, id: Uuid, number: &str) -> StoreResult<Option<String>> {
        let stored: Option<Option<String>> = sqlx::query_scalar(
            "UPDATE orders SET invoice_number = COALESCE(invoice_number, $2) WHERE id = $1 RETURNING invoice_number",
        )
        .bind(id)
        .bind(number)
        .fetch_optional(self.pool())
        .await?;
        Ok(stored.flatten())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn order_by_gateway_id(&self, razorpay_order_id: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE razorpay_order_id = $1")
            .bind(razorpay_order_id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;
        collect(rows)
    }

    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        collect(rows)
    }
}
