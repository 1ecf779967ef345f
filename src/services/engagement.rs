//! Wishlists, contact messages and homepage banners.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{Banner, ImageRef, Message, Product, Wishlist};
use crate::error::{AppError, Result};
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub name: String,
    pub email: String,
    pub contact: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MessageUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn Store>,
}

fn filled(value: String, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

impl EngagementService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // Wishlist

    /// Adding a product twice is a no-op.
    #[instrument(skip(self))]
    pub async fn add_to_wishlist(&self, user_id: Uuid, product_id: Uuid) -> Result<Wishlist> {
        if self.store.product(product_id).await?.is_none() {
            return Err(AppError::not_found("Product"));
        }
        let mut wishlist = self.store.wishlist(user_id).await?.unwrap_or_else(|| Wishlist::for_user(user_id));
        if wishlist.add(product_id) {
            self.store.save_wishlist(&wishlist).await?;
        }
        Ok(wishlist)
    }

    pub async fn remove_from_wishlist(&self, user_id: Uuid, product_id: Uuid) -> Result<Wishlist> {
        let mut wishlist = self.store.wishlist(user_id).await?.ok_or_else(|| AppError::not_found("Wishlist"))?;
        if !wishlist.remove(product_id) {
            return Err(AppError::not_found("Wishlist item"));
        }
        self.store.save_wishlist(&wishlist).await?;
        Ok(wishlist)
    }

    /// Products on the wishlist, in insertion order. Deleted products are skipped.
    pub async fn wishlist(&self, user_id: Uuid) -> Result<Vec<Product>> {
        let Some(wishlist) = self.store.wishlist(user_id).await? else {
            return Ok(vec![]);
        };
        let mut products = Vec::with_capacity(wishlist.product_ids.len());
        for id in wishlist.product_ids {
            if let Some(product) = self.store.product(id).await? {
                products.push(product);
            }
        }
        Ok(products)
    }

    // Messages

    pub async fn send_message(&self, draft: MessageDraft) -> Result<Message> {
        let message = Message::create(
            filled(draft.name, "name")?,
            filled(draft.email, "email")?,
            filled(draft.contact, "contact")?,
            filled(draft.message, "message")?,
        );
        self.store.insert_message(&message).await?;
        info!(message_id = %message.id, "contact message received");
        Ok(message)
    }

    pub async fn messages(&self) -> Result<Vec<Message>> {
        Ok(self.store.messages().await?)
    }

    pub async fn message(&self, id: Uuid) -> Result<Message> {
        self.store.message(id).await?.ok_or_else(|| AppError::not_found("Message"))
    }

    pub async fn update_message(&self, id: Uuid, update: MessageUpdate) -> Result<Message> {
        let mut message = self.message(id).await?;
        if let Some(name) = update.name {
            message.name = filled(name, "name")?;
        }
        if let Some(email) = update.email {
            message.email = filled(email, "email")?;
        }
        if let Some(contact) = update.contact {
            message.contact = filled(contact, "contact")?;
        }
        if let Some(text) = update.message {
            message.message = filled(text, "message")?;
        }
        message.updated_at = Utc::now();
        if !self.store.update_message(&message).await? {
            return Err(AppError::not_found("Message"));
        }
        Ok(message)
    }

    pub async fn delete_message(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_message(id).await? {
            return Err(AppError::not_found("Message"));
        }
        Ok(())
    }

    // Banners

    pub async fn create_banner(&self, images: Vec<ImageRef>) -> Result<Banner> {
        if images.is_empty() {
            return Err(AppError::validation("At least one image is required"));
        }
        let banner = Banner::create(images);
        self.store.insert_banner(&banner).await?;
        info!(banner_id = %banner.id, "banner created");
        Ok(banner)
    }

    pub async fn update_banner(&self, id: Uuid, images: Vec<ImageRef>) -> Result<Banner> {
        if images.is_empty() {
            return Err(AppError::validation("At least one image is required"));
        }
        let mut banner = self.store.banner(id).await?.ok_or_else(|| AppError::not_found("Banner"))?;
        banner.images = images;
        banner.updated_at = Utc::now();
        if !self.store.update_banner(&banner).await? {
            return Err(AppError::not_found("Banner"));
        }
        Ok(banner)
    }

    pub async fn banners(&self) -> Result<Vec<Banner>> {
        Ok(self.store.banners().await?)
    }

    pub async fn delete_banner(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_banner(id).await? {
            return Err(AppError::not_found("Banner"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    use crate::store::{MemoryStore, ProductStore};

    fn image(name: &str) -> ImageRef {
        ImageRef { filename: name.into(), filepath: format!("/uploads/{name}") }
    }

    #[tokio::test]
    async fn wishlist_is_a_set_of_existing_products() {
        let store = Arc::new(MemoryStore::new());
        let svc = EngagementService::new(store.clone());
        let user = Uuid::new_v4();
        let a = Product::create("A", Decimal::from(5), 1);
        let b = Product::create("B", Decimal::from(6), 1);
        store.insert_product(&a).await.unwrap();
        store.insert_product(&b).await.unwrap();

        svc.add_to_wishlist(user, a.id).await.unwrap();
        svc.add_to_wishlist(user, b.id).await.unwrap();
        let list = svc.add_to_wishlist(user, a.id).await.unwrap();
        assert_eq!(list.product_ids, vec![a.id, b.id]);
        assert!(matches!(svc.add_to_wishlist(user, Uuid::new_v4()).await, Err(AppError::NotFound(_))));

        store.delete_product(a.id).await.unwrap();
        let products = svc.wishlist(user).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, b.id);

        svc.remove_from_wishlist(user, b.id).await.unwrap();
        assert!(matches!(svc.remove_from_wishlist(user, b.id).await, Err(AppError::NotFound(_))));
        assert!(svc.wishlist(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_need_every_field() {
        let svc = EngagementService::new(Arc::new(MemoryStore::new()));
        let draft = MessageDraft {
            name: "Asha".into(),
            email: "asha@example.com".into(),
            contact: "9999999999".into(),
            message: " ".into(),
        };
        assert!(matches!(svc.send_message(draft.clone()).await, Err(AppError::Validation(_))));

        let sent = svc.send_message(MessageDraft { message: "Where is my order?".into(), ..draft }).await.unwrap();
        let update = MessageUpdate { message: Some("Found it".into()), ..Default::default() };
        assert_eq!(svc.update_message(sent.id, update).await.unwrap().message, "Found it");
        assert_eq!(svc.messages().await.unwrap().len(), 1);

        svc.delete_message(sent.id).await.unwrap();
        assert!(matches!(svc.message(sent.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.delete_message(sent.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn banners_need_an_image() {
        let svc = EngagementService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(svc.create_banner(vec![]).await, Err(AppError::Validation(_))));
        let banner = svc.create_banner(vec![image("a.jpg")]).await.unwrap();
        let updated = svc.update_banner(banner.id, vec![image("b.jpg"), image("c.jpg")]).await.unwrap();
        assert_eq!(updated.images.len(), 2);
        assert_eq!(svc.banners().await.unwrap().len(), 1);
        svc.delete_banner(banner.id).await.unwrap();
        assert!(matches!(svc.update_banner(banner.id, vec![image("d.jpg")]).await, Err(AppError::NotFound(_))));
    }
}
