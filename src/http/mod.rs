//! HTTP surface: one router per resource, mounted under its prefix.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, FromRequest, FromRequestParts},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::services::{AuthService, CartService, CatalogService, EngagementService, InvoiceService, OrderService};

mod cart;
mod catalog;
mod engagement;
mod extract;
mod orders;
mod users;

pub use extract::{AdminUser, AuthUser};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub invoices: Arc<InvoiceService>,
    pub engagement: Arc<EngagementService>,
}

/// JSON body whose rejections use the app's error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Body<T>(pub T);

/// Path parameters whose rejections use the app's error format.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Param<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// `{"message": ..., "data": ...}` envelope used by every success response.
#[derive(Serialize)]
pub struct Reply<T> {
    pub message: &'static str,
    pub data: T,
}

pub fn reply<T: Serialize>(message: &'static str, data: T) -> Json<Reply<T>> {
    Json(Reply { message, data })
}

/// Text from a field that clients send as either a string or a number.
pub(crate) fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront"})) }))
        .nest("/user", users::routes())
        .nest("/category", catalog::category_routes())
        .nest("/subcategory", catalog::subcategory_routes())
        .nest("/size", catalog::size_routes())
        .nest("/product", catalog::product_routes())
        .nest("/banner", engagement::banner_routes())
        .nest("/cart", cart::routes())
        .nest("/order", orders::routes())
        .nest("/wishlist", engagement::wishlist_routes())
        .nest("/message", engagement::message_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_accepts_strings_and_numbers() {
        assert_eq!(text(Some(json!(411001))), Some("411001".into()));
        assert_eq!(text(Some(json!(" Pune "))), Some("Pune".into()));
        assert_eq!(text(Some(json!(""))), None);
        assert_eq!(text(Some(json!(null))), None);
        assert_eq!(text(None), None);
    }
}
