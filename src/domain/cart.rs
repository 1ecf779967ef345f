//! Cart aggregate. One cart per user; lines snapshot price at add time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::PriceQuote;

/// Product fields copied into a line when it is added.
#[derive(Clone, Debug)]
pub struct LineSnapshot {
    pub product_id: Uuid,
    pub size_entry_id: Option<Uuid>,
    pub size_label: Option<String>,
    pub quote: PriceQuote,
    pub product_name: String,
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size_entry_id: Option<Uuid>,
    pub size_label: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub discounted_price: Decimal,
    pub discount_percentage: Decimal,
    pub product_name: String,
    pub image: Option<String>,
}

impl CartLine {
    pub fn quote(&self) -> PriceQuote {
        PriceQuote {
            price: self.price,
            discounted_price: self.discounted_price,
            discount_percentage: self.discount_percentage,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.discounted_price * Decimal::from(self.quantity)
    }

    fn same_slot(&self, product_id: Uuid, size_entry_id: Option<Uuid>) -> bool {
        self.product_id == product_id && self.size_entry_id == size_entry_id
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
}

/// Clamps a requested quantity to the cart's floor of one.
fn floor_quantity(quantity: i64) -> u32 {
    quantity.clamp(1, i64::from(u32::MAX)) as u32
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        Self { user_id, items: vec![], updated_at: Utc::now() }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds `quantity` of a (product, size) slot. An existing line is merged
    /// and its snapshot refreshed; its quantity never drops below one.
    pub fn add(&mut self, snapshot: LineSnapshot, quantity: i64) -> &CartLine {
        let pos = self
            .items
            .iter()
            .position(|l| l.same_slot(snapshot.product_id, snapshot.size_entry_id));
        let idx = match pos {
            Some(idx) => {
                let line = &mut self.items[idx];
                line.quantity = floor_quantity(i64::from(line.quantity).saturating_add(quantity));
                line.price = snapshot.quote.price;
                line.discounted_price = snapshot.quote.discounted_price;
                line.discount_percentage = snapshot.quote.discount_percentage;
                line.size_label = snapshot.size_label;
                idx
            }
            None => {
                self.items.push(CartLine {
                    id: Uuid::new_v4(),
                    product_id: snapshot.product_id,
                    size_entry_id: snapshot.size_entry_id,
                    size_label: snapshot.size_label,
                    quantity: floor_quantity(quantity),
                    price: snapshot.quote.price,
                    discounted_price: snapshot.quote.discounted_price,
                    discount_percentage: snapshot.quote.discount_percentage,
                    product_name: snapshot.product_name,
                    image: snapshot.image,
                });
                self.items.len() - 1
            }
        };
        self.touch();
        &self.items[idx]
    }

    pub fn set_quantity(&mut self, line_id: Uuid, quantity: i64) -> Result<&CartLine, CartError> {
        let idx = self.items.iter().position(|l| l.id == line_id).ok_or(CartError::ItemNotFound)?;
        self.items[idx].quantity = floor_quantity(quantity);
        self.touch();
        Ok(&self.items[idx])
    }

    pub fn remove(&mut self, line_id: Uuid) -> Result<CartLine, CartError> {
        let idx = self.items.iter().position(|l| l.id == line_id).ok_or(CartError::ItemNotFound)?;
        let line = self.items.remove(idx);
        self.touch();
        Ok(line)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartLine::line_total).sum()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(product_id: Uuid, size: Option<Uuid>, price: i64) -> LineSnapshot {
        LineSnapshot {
            product_id,
            size_entry_id: size,
            size_label: size.map(|_| "M".to_string()),
            quote: PriceQuote::undiscounted(Decimal::from(price)),
            product_name: "Widget".into(),
            image: None,
        }
    }

    #[test]
    fn repeated_adds_merge_into_one_line() {
        let mut cart = Cart::for_user(Uuid::new_v4());
        let product = Uuid::new_v4();
        let size = Some(Uuid::new_v4());
        cart.add(snapshot(product, size, 10), 2);
        cart.add(snapshot(product, size, 10), 3);
        cart.add(snapshot(product, size, 12), 1);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 6);
        assert_eq!(cart.items[0].price, Decimal::from(12));
    }

    #[test]
    fn quantity_is_floored_at_one() {
        let mut cart = Cart::for_user(Uuid::new_v4());
        let product = Uuid::new_v4();
        cart.add(snapshot(product, None, 10), 2);
        cart.add(snapshot(product, None, 10), -5);
        assert_eq!(cart.items[0].quantity, 1);
        let id = cart.items[0].id;
        assert_eq!(cart.set_quantity(id, 0).unwrap().quantity, 1);
    }

    #[test]
    fn huge_quantities_saturate() {
        let mut cart = Cart::for_user(Uuid::new_v4());
        let product = Uuid::new_v4();
        cart.add(snapshot(product, None, 10), 5);
        cart.add(snapshot(product, None, 10), i64::MAX);
        assert_eq!(cart.items[0].quantity, u32::MAX);
        cart.add(snapshot(product, None, 10), i64::MIN);
        assert_eq!(cart.items[0].quantity, 1);
    }

    #[test]
    fn different_sizes_are_separate_lines() {
        let mut cart = Cart::for_user(Uuid::new_v4());
        let product = Uuid::new_v4();
        cart.add(snapshot(product, Some(Uuid::new_v4()), 10), 1);
        cart.add(snapshot(product, Some(Uuid::new_v4()), 10), 1);
        cart.add(snapshot(product, None, 10), 1);
        assert_eq!(cart.items.len(), 3);
        assert_eq!(cart.total(), Decimal::from(30));
    }

    #[test]
    fn remove_unknown_line_fails() {
        let mut cart = Cart::for_user(Uuid::new_v4());
        assert_eq!(cart.remove(Uuid::new_v4()), Err(CartError::ItemNotFound));
        cart.add(snapshot(Uuid::new_v4(), None, 5), 1);
        let id = cart.items[0].id;
        assert!(cart.remove(id).is_ok());
        assert!(cart.is_empty());
    }
}
