use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{Banner, ImageRef, Message, Product, Wishlist};
use crate::error::Result;
use crate::http::{reply, text, AdminUser, AppState, AuthUser, Body, Param, Reply};
use crate::services::{MessageDraft, MessageUpdate};

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/wish", post(add_wish))
        .route("/deletewish/:product_id", delete(remove_wish))
        .route("/getwish", get(get_wishlist))
}

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/sendmessage", post(send_message))
        .route("/getmessage", get(get_messages))
        .route("/getsinglemessage/:id", get(get_message))
        .route("/updatemessage/:id", put(update_message))
        .route("/deletmessage/:id", delete(delete_message))
}

pub fn banner_routes() -> Router<AppState> {
    Router::new()
        .route("/addbanner", post(add_banner))
        .route("/updatebanner/:id", put(update_banner))
        .route("/getbanners", get(get_banners))
        .route("/deletebanner/:id", delete(delete_banner))
}

// wishlist

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishBody {
    #[serde(alias = "product")]
    product_id: Uuid,
}

async fn add_wish(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Body(b): Body<WishBody>,
) -> Result<Json<Reply<Wishlist>>> {
    Ok(reply("Added to wishlist", s.engagement.add_to_wishlist(user.id, b.product_id).await?))
}

async fn remove_wish(
    State(s): State<AppState>,
    AuthUser(user): AuthUser,
    Param(product_id): Param<Uuid>,
) -> Result<Json<Reply<Wishlist>>> {
    Ok(reply("Removed from wishlist", s.engagement.remove_from_wishlist(user.id, product_id).await?))
}

async fn get_wishlist(State(s): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Reply<Vec<Product>>>> {
    Ok(reply("Wishlist fetched successfully", s.engagement.wishlist(user.id).await?))
}

// messages

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    name: Option<String>,
    email: Option<String>,
    contact: Option<Value>,
    message: Option<String>,
}

async fn send_message(
    State(s): State<AppState>,
    _caller: AuthUser,
    Body(b): Body<MessageBody>,
) -> Result<(StatusCode, Json<Reply<Message>>)> {
    let draft = MessageDraft {
        name: b.name.unwrap_or_default(),
        email: b.email.unwrap_or_default(),
        contact: text(b.contact).unwrap_or_default(),
        message: b.message.unwrap_or_default(),
    };
    let message = s.engagement.send_message(draft).await?;
    Ok((StatusCode::CREATED, reply("Message sent successfully", message)))
}

async fn get_messages(State(s): State<AppState>, _caller: AuthUser) -> Result<Json<Reply<Vec<Message>>>> {
    Ok(reply("Messages fetched successfully", s.engagement.messages().await?))
}

async fn get_message(
    State(s): State<AppState>,
    _caller: AuthUser,
    Param(id): Param<Uuid>,
) -> Result<Json<Reply<Message>>> {
    Ok(reply("Message fetched successfully", s.engagement.message(id).await?))
}

async fn update_message(
    State(s): State<AppState>,
    _caller: AuthUser,
    Param(id): Param<Uuid>,
    Body(b): Body<MessageBody>,
) -> Result<Json<Reply<Message>>> {
    let update = MessageUpdate { name: b.name, email: b.email, contact: text(b.contact), message: b.message };
    Ok(reply("Message updated successfully", s.engagement.update_message(id, update).await?))
}

async fn delete_message(State(s): State<AppState>, _caller: AuthUser, Param(id): Param<Uuid>) -> Result<Json<Value>> {
    s.engagement.delete_message(id).await?;
    Ok(Json(json!({ "message": "Message deleted successfully" })))
}

// banners

#[derive(Debug, Deserialize)]
struct BannerBody {
    #[serde(default, alias = "bannerimage")]
    images: Vec<ImageRef>,
}

async fn add_banner(
    State(s): State<AppState>,
    _admin: AdminUser,
    Body(b): Body<BannerBody>,
) -> Result<(StatusCode, Json<Reply<Banner>>)> {
    let banner = s.engagement.create_banner(b.images).await?;
    Ok((StatusCode::CREATED, reply("Banner uploaded successfully", banner)))
}

async fn update_banner(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
    Body(b): Body<BannerBody>,
) -> Result<Json<Reply<Banner>>> {
    Ok(reply("Banner updated successfully", s.engagement.update_banner(id, b.images).await?))
}

async fn get_banners(State(s): State<AppState>) -> Result<Json<Reply<Vec<Banner>>>> {
    Ok(reply("Banners fetched successfully", s.engagement.banners().await?))
}

async fn delete_banner(State(s): State<AppState>, _admin: AdminUser, Param(id): Param<Uuid>) -> Result<Json<Value>> {
    s.engagement.delete_banner(id).await?;
    Ok(Json(json!({ "message": "Banner deleted successfully" })))
}
