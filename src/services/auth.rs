//! Accounts, bearer tokens and password reset.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clients::{Mailer, OutgoingMail, TemplateStore};
use crate::domain::{User, UserAddress, UserType};
use crate::error::{AppError, Result};
use crate::services::Actor;
use crate::store::Store;

const MIN_PASSWORD: usize = 6;
const MIN_USERNAME: usize = 3;

#[instrument(skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(AppError::validation("Password cannot be empty"));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hashing failed");
            AppError::Internal(anyhow::anyhow!("password hashing failed: {e}"))
        })
}

pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(anyhow::anyhow!("stored hash is invalid: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!("password verification failed: {e}"))),
    }
}

/// Bearer token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub usertype: UserType,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        let claims = Claims {
            id: user.id,
            email: user.email.clone(),
            usertype: user.usertype,
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
    }

    /// Rejects bad signatures and expired tokens.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                AppError::Unauthorized("Invalid or expired token".into())
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub usertype: Option<String>,
    pub username: String,
    pub email: String,
    pub password: String,
    pub gender: String,
    pub contactno: Option<String>,
    pub address: Option<UserAddress>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub usertype: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub gender: Option<String>,
    pub contactno: Option<String>,
    pub address: Option<UserAddress>,
}

pub struct AuthDeps {
    pub store: Arc<dyn Store>,
    pub tokens: TokenKeys,
    pub mailer: Arc<dyn Mailer>,
    pub templates: Arc<TemplateStore>,
    pub otp_ttl: Duration,
    pub store_name: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenKeys,
    mailer: Arc<dyn Mailer>,
    templates: Arc<TemplateStore>,
    otp_ttl: Duration,
    store_name: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str) -> Result<()> {
    if validator::validate_email(email) {
        Ok(())
    } else {
        Err(AppError::validation("\"email\" must be a valid email"))
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD {
        return Err(AppError::validation(format!("\"password\" must be at least {MIN_PASSWORD} characters")));
    }
    Ok(())
}

fn check_username(username: &str) -> Result<()> {
    if username.trim().chars().count() < MIN_USERNAME {
        return Err(AppError::validation(format!("\"username\" must be at least {MIN_USERNAME} characters")));
    }
    Ok(())
}

impl AuthService {
    pub fn new(deps: AuthDeps) -> Self {
        Self {
            store: deps.store,
            tokens: deps.tokens,
            mailer: deps.mailer,
            templates: deps.templates,
            otp_ttl: deps.otp_ttl,
            store_name: deps.store_name,
        }
    }

    pub fn tokens(&self) -> &TokenKeys {
        &self.tokens
    }

    /// Creates an account. An `admin` usertype is honoured only while no
    /// admin exists yet; later admins are promoted by an existing one.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn signup(&self, input: SignupInput) -> Result<User> {
        let email = normalize_email(&input.email);
        check_username(&input.username)?;
        check_email(&email)?;
        check_password(&input.password)?;
        if input.gender.trim().is_empty() {
            return Err(AppError::validation("\"gender\" is required"));
        }
        if self.store.user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".into()));
        }

        let mut usertype = input.usertype.as_deref().map(UserType::parse).unwrap_or_default();
        if usertype == UserType::Admin && self.store.users().await?.iter().any(User::is_admin) {
            warn!("admin signup refused, an admin already exists");
            usertype = UserType::User;
        }

        let hash = hash_password(&input.password)?;
        let mut user = User::create(usertype, input.username.trim(), email, hash, input.gender.trim());
        user.contactno = input.contactno;
        user.address = input.address;
        self.store.insert_user(&user).await?;
        info!(user_id = %user.id, usertype = user.usertype.as_str(), "user registered");

        let data = json!({ "username": user.username, "email": user.email, "store": self.store_name });
        let html = self.templates.render("welcome.html", &data).await;
        let mail = OutgoingMail { to: user.email.clone(), subject: format!("Welcome to {}", self.store_name), html };
        if let Err(e) = self.mailer.send(mail).await {
            warn!(user_id = %user.id, error = %e, "welcome mail failed");
        }
        Ok(user)
    }

    /// Returns a bearer token and the user on success.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, User)> {
        let invalid = || AppError::Unauthorized("Invalid email or password".into());
        let user = self.store.user_by_email(&normalize_email(email)).await?.ok_or_else(invalid)?;
        if !verify_password(&user.password_hash, password)? {
            return Err(invalid());
        }
        let token = self.tokens.issue(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok((token, user))
    }

    /// Resolves a bearer token to a live user.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.tokens.decode(token)?;
        self.store
            .user(claims.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))
    }

    pub async fn profile(&self, actor: &Actor, id: Uuid) -> Result<User> {
        if actor.user_id != id && !actor.is_admin {
            return Err(AppError::Forbidden("Not authorized".into()));
        }
        self.store.user(id).await?.ok_or_else(|| AppError::not_found("User"))
    }

    #[instrument(skip(self, actor, update), fields(actor = %actor.user_id))]
    pub async fn update_profile(&self, actor: &Actor, id: Uuid, update: ProfileUpdate) -> Result<User> {
        let mut user = self.profile(actor, id).await?;

        if let Some(username) = update.username {
            check_username(&username)?;
            user.username = username.trim().to_string();
        }
        if let Some(email) = update.email {
            let email = normalize_email(&email);
            check_email(&email)?;
            if email != user.email {
                if self.store.user_by_email(&email).await?.is_some() {
                    return Err(AppError::Conflict("Email already in use".into()));
                }
                user.email = email;
            }
        }
        if let Some(password) = update.password {
            check_password(&password)?;
            user.password_hash = hash_password(&password)?;
        }
        if let Some(gender) = update.gender {
            user.gender = gender;
        }
        if update.contactno.is_some() {
            user.contactno = update.contactno;
        }
        if update.address.is_some() {
            user.address = update.address;
        }
        if let Some(usertype) = update.usertype {
            if actor.is_admin {
                user.usertype = UserType::parse(&usertype);
            } else {
                debug!("ignoring usertype change from non-admin");
            }
        }
        user.updated_at = Utc::now();

        if !self.store.update_user(&user).await? {
            return Err(AppError::not_found("User"));
        }
        info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        Ok(self.store.users().await?)
    }

    /// Issues a reset OTP and mails it.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let mut user = self
            .store
            .user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let otp = user.issue_reset_otp(Utc::now(), self.otp_ttl);
        self.store.update_user(&user).await?;

        let data = json!({ "username": user.username, "otp": otp, "minutes": self.otp_ttl.num_minutes() });
        let html = self.templates.render("otp.html", &data).await;
        let mail = OutgoingMail { to: user.email.clone(), subject: "Password reset code".into(), html };
        self.mailer.send(mail).await?;
        info!(user_id = %user.id, "password reset code sent");
        Ok(())
    }

    #[instrument(skip(self, otp, new_password))]
    pub async fn reset_password(&self, email: &str, otp: &str, new_password: &str) -> Result<()> {
        check_password(new_password)?;
        let mut user = self
            .store
            .user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        user.consume_reset_otp(otp, Utc::now())?;
        user.password_hash = hash_password(new_password)?;
        self.store.update_user(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Admin-triggered one-off mail.
    pub async fn send_mail(&self, mail: OutgoingMail) -> Result<()> {
        check_email(mail.to.trim())?;
        self.mailer.send(mail).await?;
        Ok(())
    }
}
