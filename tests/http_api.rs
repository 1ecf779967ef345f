use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use storefront::app::{build_state, Components};
use storefront::clients::{LogMailer, LogPublisher, PdfRenderer, RenderError, SandboxGateway};
use storefront::config::AppConfig;
use storefront::http::router;
use storefront::store::MemoryStore;

struct FakeRenderer;

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, _html: &str) -> Result<Vec<u8>, RenderError> {
        Ok(b"%PDF-1.4 test".to_vec())
    }
}

fn app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let vars: HashMap<&str, String> = [
        ("JWT_SECRET", "http-test-secret".to_string()),
        ("INVOICE_DIR", dir.path().display().to_string()),
    ]
    .into_iter()
    .collect();
    let config = AppConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
    let components = Components {
        store: Arc::new(MemoryStore::new()),
        gateway: Arc::new(SandboxGateway),
        renderer: Arc::new(FakeRenderer),
        mailer: Arc::new(LogMailer),
        events: Arc::new(LogPublisher),
    };
    (router(build_state(&config, components).unwrap()), dir)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn register(app: &Router, usertype: &str, email: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({
            "usertype": usertype,
            "username": "tester",
            "email": email,
            "password": "secret123",
            "gender": "Female"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) =
        send(app, Method::POST, "/user/login", None, Some(json!({ "email": email, "password": "secret123" }))).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn num(v: &Value) -> f64 {
    v.as_f64().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _dir) = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn auth_errors_are_json() {
    let (app, _dir) = app();
    let (status, body) = send(&app, Method::GET, "/cart/getcart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (status, _) = send(&app, Method::GET, "/cart/getcart", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({ "email": "ghost@example.com", "password": "whatever" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn catalog_writes_need_an_admin() {
    let (app, _dir) = app();
    let admin = register(&app, "admin", "admin@example.com").await;
    let user = register(&app, "user", "user@example.com").await;

    let (status, _) = send(&app, Method::POST, "/size/addsize", Some(&user), Some(json!({ "size": "M" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::POST, "/size/addsize", Some(&admin), Some(json!({ "size": "M" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["label"], "M");

    let (status, _) = send(&app, Method::POST, "/size/addsize", Some(&admin), Some(json!({ "size": "M" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::GET, "/size/getallsize", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, &format!("/product/getproduct/{}", Uuid::new_v4()), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/product/getproduct/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_checkout_invoice_and_cancel() {
    let (app, _dir) = app();
    let admin = register(&app, "admin", "admin@example.com").await;
    let user = register(&app, "user", "user@example.com").await;

    let (_, size) = send(&app, Method::POST, "/size/addsize", Some(&admin), Some(json!({ "size": "M" }))).await;
    let size_id = size["data"]["id"].as_str().unwrap().to_string();

    let (status, tee) = send(
        &app,
        Method::POST,
        "/product/addproduct",
        Some(&admin),
        Some(json!({
            "productName": "Tee",
            "gender": "Unisex",
            "sizes": [{ "size": size_id, "price": 100, "stock": 3 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tee_id = tee["data"]["id"].as_str().unwrap().to_string();

    let (_, mug) = send(
        &app,
        Method::POST,
        "/product/addproduct",
        Some(&admin),
        Some(json!({ "productName": "Mug", "price": 50, "stock": 10 })),
    )
    .await;
    let mug_id = mug["data"]["id"].as_str().unwrap().to_string();

    let (status, cart) = send(
        &app,
        Method::POST,
        "/cart/addtocart",
        Some(&user),
        Some(json!({ "productId": tee_id, "size": "M", "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&cart["data"]["totalPrice"]), 200.0);

    let (_, cart) =
        send(&app, Method::POST, "/cart/addtocart", Some(&user), Some(json!({ "product": { "_id": mug_id } }))).await;
    assert_eq!(num(&cart["data"]["totalPrice"]), 250.0);

    let body = json!({ "shippingAddress": { "city": "Pune" } });
    let (status, _) = send(&app, Method::POST, "/order/placeorder", Some(&user), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, placed) = send(
        &app,
        Method::POST,
        "/order/placeorder",
        Some(&user),
        Some(json!({ "shippingAddress": { "city": "Pune", "state": "MH", "pincode": 411001 } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(num(&placed["data"]["totalPrice"]), 250.0);
    assert_eq!(placed["data"]["paymentMethod"], "COD");
    let order_id = placed["data"]["id"].as_str().unwrap().to_string();

    let (_, cart) = send(&app, Method::GET, "/cart/getcart", Some(&user), None).await;
    assert!(cart["data"]["items"].as_array().unwrap().is_empty());

    let (_, product) = send(&app, Method::GET, &format!("/product/getproduct/{tee_id}"), None, None).await;
    assert_eq!(product["data"]["sizes"][0]["stock"], 1);

    let (status, _) = send(&app, Method::GET, &format!("/order/invoice/{}", Uuid::new_v4()), Some(&user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = Request::builder()
        .uri(format!("/order/invoice/{order_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {user}"))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");

    let (status, cancelled) =
        send(&app, Method::PUT, &format!("/order/cancel/{order_id}"), Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["data"]["status"], "Cancelled");

    let (_, product) = send(&app, Method::GET, &format!("/product/getproduct/{tee_id}"), None, None).await;
    assert_eq!(product["data"]["sizes"][0]["stock"], 3);

    let (status, _) = send(&app, Method::GET, "/order/all", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, all) = send(&app, Method::GET, "/order/all", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn buying_more_than_stock_is_rejected() {
    let (app, _dir) = app();
    let admin = register(&app, "admin", "admin@example.com").await;
    let user = register(&app, "user", "user@example.com").await;

    let (_, mug) = send(
        &app,
        Method::POST,
        "/product/addproduct",
        Some(&admin),
        Some(json!({ "productName": "Mug", "price": 50, "stock": 3 })),
    )
    .await;
    let mug_id = mug["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/order/placeorder",
        Some(&user),
        Some(json!({
            "items": [{ "productId": mug_id, "quantity": 5 }],
            "shippingAddress": { "city": "Pune", "state": "MH", "pincode": "411001" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Insufficient stock"));

    let (_, product) = send(&app, Method::GET, &format!("/product/getproduct/{mug_id}"), None, None).await;
    assert_eq!(product["data"]["stock"], 3);
}

#[tokio::test]
async fn gateway_checkout_rejects_forged_signatures() {
    let (app, _dir) = app();
    let admin = register(&app, "admin", "admin@example.com").await;
    let user = register(&app, "user", "user@example.com").await;

    let (_, mug) = send(
        &app,
        Method::POST,
        "/product/addproduct",
        Some(&admin),
        Some(json!({ "productName": "Mug", "price": 50, "stock": 3 })),
    )
    .await;
    let mug_id = mug["data"]["id"].as_str().unwrap().to_string();

    let (status, checkout) = send(
        &app,
        Method::POST,
        "/order/create-razorpay-order",
        Some(&user),
        Some(json!({
            "items": [{ "productId": mug_id, "quantity": 2 }],
            "shippingAddress": { "city": "Pune", "state": "MH", "pincode": "411001" },
            "amount": 100
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(checkout["data"]["gatewayOrder"]["amount"], 10_000);
    let gateway_id = checkout["data"]["gatewayOrder"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        "/order/verify-payment",
        Some(&user),
        Some(json!({
            "razorpay_order_id": gateway_id,
            "razorpay_payment_id": "pay_123",
            "razorpay_signature": "deadbeef"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid payment signature");

    let (_, orders) = send(&app, Method::GET, "/order/myorders", Some(&user), None).await;
    assert_eq!(orders["data"][0]["paymentStatus"], "Pending");
    let (_, product) = send(&app, Method::GET, &format!("/product/getproduct/{mug_id}"), None, None).await;
    assert_eq!(product["data"]["stock"], 3);
}
