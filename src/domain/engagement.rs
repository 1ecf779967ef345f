//! Wishlists and contact messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wishlist {
    pub user_id: Uuid,
    pub product_ids: Vec<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Wishlist {
    pub fn for_user(user_id: Uuid) -> Self {
        Self { user_id, product_ids: vec![], updated_at: Utc::now() }
    }

    /// Returns false when the product was already present.
    pub fn add(&mut self, product_id: Uuid) -> bool {
        if self.product_ids.contains(&product_id) {
            return false;
        }
        self.product_ids.push(product_id);
        self.updated_at = Utc::now();
        true
    }

    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.product_ids.len();
        self.product_ids.retain(|p| *p != product_id);
        self.updated_at = Utc::now();
        self.product_ids.len() != before
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn create(name: String, email: String, contact: String, message: String) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), name, email, contact, message, created_at: now, updated_at: now }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wishlist_is_a_set() {
        let mut w = Wishlist::for_user(Uuid::new_v4());
        let p = Uuid::new_v4();
        assert!(w.add(p));
        assert!(!w.add(p));
        assert_eq!(w.product_ids.len(), 1);
        assert!(w.remove(p));
        assert!(!w.remove(p));
    }
}
