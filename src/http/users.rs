use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::clients::OutgoingMail;
use crate::domain::{User, UserAddress};
use crate::error::Result;
use crate::http::{reply, text, AdminUser, AppState, AuthUser, Body, Param, Reply};
use crate::services::{ProfileUpdate, SignupInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/updateduser/:id", put(update_user))
        .route("/getuser/:id", get(get_user))
        .route("/getallusers", get(get_all_users))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/sendmail", post(send_mail))
}

#[derive(Debug, Default, Deserialize)]
struct AddressBody {
    houseno: Option<Value>,
    society: Option<Value>,
    landmark: Option<Value>,
    area: Option<Value>,
    city: Option<Value>,
    state: Option<Value>,
    pincode: Option<Value>,
}

impl From<AddressBody> for UserAddress {
    fn from(b: AddressBody) -> Self {
        Self {
            houseno: text(b.houseno),
            society: text(b.society),
            landmark: text(b.landmark),
            area: text(b.area),
            city: text(b.city),
            state: text(b.state),
            pincode: text(b.pincode),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct SignupBody {
    usertype: Option<String>,
    #[validate(length(min = 3))]
    username: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 6))]
    password: String,
    #[validate(length(min = 1))]
    gender: String,
    contactno: Option<Value>,
    address: Option<AddressBody>,
}

async fn signup(State(s): State<AppState>, Body(b): Body<SignupBody>) -> Result<(StatusCode, Json<Reply<User>>)> {
    b.validate()?;
    let user = s
        .auth
        .signup(SignupInput {
            usertype: b.usertype,
            username: b.username,
            email: b.email,
            password: b.password,
            gender: b.gender,
            contactno: text(b.contactno),
            address: b.address.map(Into::into),
        })
        .await?;
    Ok((StatusCode::CREATED, reply("User registered successfully", user)))
}

#[derive(Debug, Deserialize, Validate)]
struct LoginBody {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

async fn login(State(s): State<AppState>, Body(b): Body<LoginBody>) -> Result<Json<Value>> {
    b.validate()?;
    let (token, user) = s.auth.login(&b.email, &b.password).await?;
    Ok(Json(json!({ "message": "Login successful", "data": user, "token": token })))
}

async fn me(AuthUser(user): AuthUser) -> Json<Reply<User>> {
    reply("Authorized", user)
}

#[derive(Debug, Default, Deserialize, Validate)]
struct UpdateBody {
    usertype: Option<String>,
    #[validate(length(min = 3))]
    username: Option<String>,
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 6))]
    password: Option<String>,
    gender: Option<String>,
    contactno: Option<Value>,
    address: Option<AddressBody>,
}

async fn update_user(
    State(s): State<AppState>,
    caller: AuthUser,
    Param(id): Param<Uuid>,
    Body(b): Body<UpdateBody>,
) -> Result<Json<Reply<User>>> {
    b.validate()?;
    let update = ProfileUpdate {
        usertype: b.usertype,
        username: b.username,
        email: b.email,
        password: b.password,
        gender: b.gender,
        contactno: text(b.contactno),
        address: b.address.map(Into::into),
    };
    let user = s.auth.update_profile(&caller.actor(), id, update).await?;
    Ok(reply("User updated successfully", user))
}

async fn get_user(State(s): State<AppState>, caller: AuthUser, Param(id): Param<Uuid>) -> Result<Json<Reply<User>>> {
    Ok(reply("User fetched successfully", s.auth.profile(&caller.actor(), id).await?))
}

async fn get_all_users(State(s): State<AppState>, _admin: AdminUser) -> Result<Json<Reply<Vec<User>>>> {
    Ok(reply("Users fetched successfully", s.auth.users().await?))
}

#[derive(Debug, Deserialize, Validate)]
struct ForgotBody {
    #[validate(email)]
    email: String,
}

async fn forgot_password(State(s): State<AppState>, Body(b): Body<ForgotBody>) -> Result<Json<Value>> {
    b.validate()?;
    s.auth.forgot_password(&b.email).await?;
    Ok(Json(json!({ "message": "OTP sent to your email" })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ResetBody {
    #[validate(email)]
    email: String,
    #[validate(length(equal = 6))]
    otp: String,
    #[serde(alias = "password")]
    #[validate(length(min = 6))]
    new_password: String,
}

async fn reset_password(State(s): State<AppState>, Body(b): Body<ResetBody>) -> Result<Json<Value>> {
    b.validate()?;
    s.auth.reset_password(&b.email, &b.otp, &b.new_password).await?;
    Ok(Json(json!({ "message": "Password reset successful" })))
}

#[derive(Debug, Deserialize, Validate)]
struct MailBody {
    #[validate(email)]
    to: String,
    #[validate(length(min = 1))]
    subject: String,
    #[serde(default)]
    html: String,
    #[serde(default)]
    text: String,
}

async fn send_mail(State(s): State<AppState>, _admin: AdminUser, Body(b): Body<MailBody>) -> Result<Json<Value>> {
    b.validate()?;
    let html = if b.html.is_empty() { b.text } else { b.html };
    s.auth.send_mail(OutgoingMail { to: b.to, subject: b.subject, html }).await?;
    Ok(Json(json!({ "message": "Email sent successfully" })))
}
