use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, ShippingAddress};
use crate::error::{AppError, Result};
use crate::http::{reply, text, AdminUser, AppState, AuthUser, Body, Param, Reply};
use crate::services::{normalize_items, CheckoutRequest, GatewayCheckout, PaymentConfirmation};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-razorpay-order", post(create_gateway_order))
        .route("/verify-payment", post(verify_payment))
        .route("/placeorder", post(place_order))
        .route("/myorders", get(my_orders))
        .route("/order/:id", get(get_order))
        .route("/cancel/:id", put(cancel_order))
        .route("/invoice/:id", get(download_invoice))
        .route("/all", get(all_orders))
        .route("/status/:id", put(update_status))
}

#[derive(Debug, Default, Deserialize)]
struct AddressBody {
    houseno: Option<Value>,
    street: Option<Value>,
    landmark: Option<Value>,
    city: Option<Value>,
    state: Option<Value>,
    pincode: Option<Value>,
    country: Option<Value>,
    phone: Option<Value>,
}

impl From<AddressBody> for ShippingAddress {
    fn from(b: AddressBody) -> Self {
        Self {
            houseno: text(b.houseno),
            street: text(b.street),
            landmark: text(b.landmark),
            city: text(b.city).unwrap_or_default(),
            state: text(b.state).unwrap_or_default(),
            pincode: text(b.pincode).unwrap_or_default(),
            country: text(b.country).unwrap_or_else(|| "India".to_string()),
            phone: text(b.phone),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody {
    shipping_address: Option<AddressBody>,
    /// Buy-now items. Absent or empty means "check out the cart".
    #[serde(default)]
    items: Vec<Value>,
    amount: Option<Decimal>,
}

impl CheckoutBody {
    fn into_request(self) -> Result<CheckoutRequest> {
        let address = self.shipping_address.ok_or_else(|| AppError::validation("shippingAddress is required"))?;
        let items = if self.items.is_empty() { None } else { Some(normalize_items(&self.items)?) };
        Ok(CheckoutRequest { items, shipping_address: address.into(), client_amount: self.amount })
    }
}

async fn place_order(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Body(b): Body<CheckoutBody>,
) -> Result<(StatusCode, Json<Reply<Order>>)> {
    let order = s.orders.place_cod(user.id, b.into_request()?).await?;
    Ok((StatusCode::CREATED, reply("Order placed successfully", order)))
}

async fn create_gateway_order(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Body(b): Body<CheckoutBody>,
) -> Result<(StatusCode, Json<Reply<GatewayCheckout>>)> {
    let checkout = s.orders.create_gateway_order(user.id, b.into_request()?).await?;
    Ok((StatusCode::CREATED, reply("Razorpay order created", checkout)))
}

#[derive(Debug, Deserialize)]
struct VerifyBody {
    razorpay_order_id: String,
    razorpay_payment_id: String,
    razorpay_signature: String,
}

async fn verify_payment(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Body(b): Body<VerifyBody>,
) -> Result<Json<Reply<Order>>> {
    let confirmation = PaymentConfirmation {
        razorpay_order_id: b.razorpay_order_id,
        razorpay_payment_id: b.razorpay_payment_id,
        razorpay_signature: b.razorpay_signature,
    };
    Ok(reply("Payment verified successfully", s.orders.verify_payment(user.id, confirmation).await?))
}

async fn my_orders(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Reply<Vec<Order>>>> {
    Ok(reply("Orders fetched successfully", s.orders.my_orders(user.id).await?))
}

async fn get_order(State(s): State<AppState>, caller: AuthUser, Param(id): Param<Uuid>) -> Result<Json<Reply<Order>>> {
    Ok(reply("Order fetched successfully", s.orders.order_for(&caller.actor(), id).await?))
}

async fn cancel_order(
    State(s): State<AppState>,
    caller: AuthUser,
    Param(id): Param<Uuid>,
) -> Result<Json<Reply<Order>>> {
    Ok(reply("Order cancelled", s.orders.cancel(&caller.actor(), id).await?))
}

async fn download_invoice(
    State(s): State<AppState>,
    caller: AuthUser,
    Param(id): Param<Uuid>,
) -> Result<impl IntoResponse> {
    let invoice = s.invoices.generate(&caller.actor(), id).await?;
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}.pdf\"", invoice.number)),
    ];
    Ok((headers, invoice.pdf))
}

async fn all_orders(State(s): State<AppState>, _admin: AdminUser) -> Result<Json<Reply<Vec<Order>>>> {
    Ok(reply("Orders fetched successfully", s.orders.all_orders().await?))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_status(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
    Body(b): Body<StatusBody>,
) -> Result<Json<Reply<Order>>> {
    let next: OrderStatus = b.status.trim().parse()?;
    Ok(reply("Order status updated", s.orders.update_status(id, next).await?))
}
