use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::{unique_or, PgStore};
use crate::domain::{Message, User, UserAddress, UserType, Wishlist};
use crate::store::{EngagementStore, StoreResult, UserStore};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    usertype: String,
    username: String,
    email: String,
    password_hash: String,
    gender: String,
    contactno: Option<String>,
    address: Option<Json<UserAddress>>,
    is_verified: bool,
    reset_password_otp: Option<String>,
    reset_password_expires: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            usertype: UserType::parse(&r.usertype),
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            gender: r.gender,
            contactno: r.contactno,
            address: r.address.map(|a| a.0),
            is_verified: r.is_verified,
            reset_password_otp: r.reset_password_otp,
            reset_password_expires: r.reset_password_expires,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, u: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, usertype, username, email, password_hash, gender, contactno, address, is_verified, \
             reset_password_otp, reset_password_expires, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(u.id)
        .bind(u.usertype.as_str())
        .bind(&u.username)
        .bind(&u.email)
        .bind(&u.password_hash)
        .bind(&u.gender)
        .bind(&u.contactno)
        .bind(u.address.as_ref().map(Json))
        .bind(u.is_verified)
        .bind(&u.reset_password_otp)
        .bind(u.reset_password_expires)
        .bind(u.created_at)
        .bind(u.updated_at)
        .execute(self.pool())
        .await
        .map_err(unique_or("User"))?;
        Ok(())
    }

    async fn update_user(&self, u: &User) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE users SET usertype = $2, username = $3, email = $4, password_hash = $5, gender = $6, \
             contactno = $7, address = $8, is_verified = $9, reset_password_otp = $10, \
             reset_password_expires = $11, updated_at = $12 \
             WHERE id = $1",
        )
        .bind(u.id)
        .bind(u.usertype.as_str())
        .bind(&u.username)
        .bind(&u.email)
        .bind(&u.password_hash)
        .bind(&u.gender)
        .bind(&u.contactno)
        .bind(u.address.as_ref().map(Json))
        .bind(u.is_verified)
        .bind(&u.reset_password_otp)
        .bind(u.reset_password_expires)
        .bind(u.updated_at)
        .execute(self.pool())
        .await
        .map_err(unique_or("User"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct WishlistRow {
    user_id: Uuid,
    product_ids: Vec<Uuid>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    name: String,
    email: String,
    contact: String,
    message: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            contact: r.contact,
            message: r.message,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl EngagementStore for PgStore {
    async fn wishlist(&self, user_id: Uuid) -> StoreResult<Option<Wishlist>> {
        let row = sqlx::query_as::<_, WishlistRow>("SELECT * FROM wishlists WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| Wishlist { user_id: r.user_id, product_ids: r.product_ids, updated_at: r.updated_at }))
    }

    async fn save_wishlist(&self, w: &Wishlist) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO wishlists (user_id, product_ids, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET product_ids = EXCLUDED.product_ids, updated_at = EXCLUDED.updated_at",
        )
        .bind(w.user_id)
        .bind(&w.product_ids)
        .bind(w.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn insert_message(&self, m: &Message) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, name, email, contact, message, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(m.id)
        .bind(&m.name)
        .bind(&m.email)
        .bind(&m.contact)
        .bind(&m.message)
        .bind(m.created_at)
        .bind(m.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn update_message(&self, m: &Message) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE messages SET name = $2, email = $3, contact = $4, message = $5, updated_at = $6 WHERE id = $1",
        )
        .bind(m.id)
        .bind(&m.name)
        .bind(&m.email)
        .bind(&m.contact)
        .bind(&m.message)
        .bind(m.updated_at)
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn messages(&self) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_message(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM messages WHERE id = $1").bind(id).execute(self.pool()).await?;
        Ok(res.rows_affected() > 0)
    }
}
