use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::http::{reply, AppState, AuthUser, Body, Param, Reply};
use crate::services::{normalize_item, CartView};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/addtocart", post(add_to_cart))
        .route("/getcart", get(get_cart))
        .route("/updatecart/:line_id", put(update_cart))
        .route("/removecart/:line_id", delete(remove_from_cart))
        .route("/clearcart", delete(clear_cart))
}

async fn add_to_cart(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Body(b): Body<Value>,
) -> Result<Json<Reply<CartView>>> {
    let item = normalize_item(&b)?;
    Ok(reply("Item added to cart", s.cart.add_item(user.id, item).await?))
}

async fn get_cart(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Reply<CartView>>> {
    Ok(reply("Cart fetched successfully", s.cart.cart(user.id).await?))
}

#[derive(Debug, Deserialize)]
struct QuantityBody {
    quantity: i64,
}

async fn update_cart(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Param(line_id): Param<Uuid>,
    Body(b): Body<QuantityBody>,
) -> Result<Json<Reply<CartView>>> {
    Ok(reply("Cart updated", s.cart.update_item(user.id, line_id, b.quantity).await?))
}

async fn remove_from_cart(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Param(line_id): Param<Uuid>,
) -> Result<Json<Reply<CartView>>> {
    Ok(reply("Item removed from cart", s.cart.remove_item(user.id, line_id).await?))
}

async fn clear_cart(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Value>> {
    s.cart.clear(user.id).await?;
    Ok(Json(json!({ "message": "Cart cleared" })))
}
