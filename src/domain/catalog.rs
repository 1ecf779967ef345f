//! Catalog aggregates: products with optional per-size entries, and the
//! reference tables they point at.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::{Discount, PriceQuote};

/// Reference to an image already persisted in the object store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    pub filepath: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unisex => "Unisex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            "Unisex" => Some(Self::Unisex),
            _ => None,
        }
    }
}

/// How a client names a size: by id or by its label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeSelector {
    ById(Uuid),
    ByLabel(String),
}

/// Per-size price and stock of a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeEntry {
    pub id: Uuid,
    pub size_id: Uuid,
    pub label: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub discounted_price: Decimal,
    pub discount_percentage: Decimal,
}

impl SizeEntry {
    pub fn new(size_id: Uuid, label: Option<String>, price: Decimal, stock: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            size_id,
            label,
            price,
            stock,
            discounted_price: price,
            discount_percentage: Decimal::ZERO,
        }
    }

    pub fn matches(&self, selector: &SizeSelector) -> bool {
        match selector {
            SizeSelector::ById(id) => self.id == *id || self.size_id == *id,
            SizeSelector::ByLabel(label) => self
                .label
                .as_deref()
                .is_some_and(|l| l.eq_ignore_ascii_case(label.trim())),
        }
    }

    pub fn quote(&self) -> PriceQuote {
        PriceQuote {
            price: self.price,
            discounted_price: self.discounted_price,
            discount_percentage: self.discount_percentage,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub gender: Option<Gender>,
    pub description: Option<String>,
    pub review: Option<String>,
    pub images: Vec<ImageRef>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub discount: Option<Discount>,
    /// Minimum size price when sizes exist.
    pub price: Decimal,
    /// Sum of size stock when sizes exist.
    pub stock: i32,
    pub discounted_price: Decimal,
    pub discount_percentage: Decimal,
    pub sizes: Vec<SizeEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(name: impl Into<String>, price: Decimal, stock: i32) -> Self {
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(),
            name: name.into(),
            gender: None,
            description: None,
            review: None,
            images: vec![],
            category_id: None,
            subcategory_id: None,
            discount: None,
            price,
            stock,
            discounted_price: price,
            discount_percentage: Decimal::ZERO,
            sizes: vec![],
            created_at: now,
            updated_at: now,
        };
        product.reprice();
        product
    }

    pub fn has_sizes(&self) -> bool {
        !self.sizes.is_empty()
    }

    pub fn first_image(&self) -> Option<&str> {
        self.images.first().map(|i| i.filepath.as_str())
    }

    /// Recomputes every derived field: discounted prices, and for sized
    /// products the top-level price and stock.
    pub fn reprice(&mut self) {
        let discount = self.discount;
        for entry in &mut self.sizes {
            let quote = PriceQuote::resolve(entry.price, discount.as_ref());
            entry.discounted_price = quote.discounted_price;
            entry.discount_percentage = quote.discount_percentage;
        }
        if let Some(min) = self.sizes.iter().map(|s| s.price).min() {
            self.price = min;
            let total: i64 = self.sizes.iter().map(|s| i64::from(s.stock)).sum();
            self.stock = total.clamp(0, i64::from(i32::MAX)) as i32;
        }
        let quote = PriceQuote::resolve(self.price, discount.as_ref());
        self.discounted_price = quote.discounted_price;
        self.discount_percentage = quote.discount_percentage;
        self.updated_at = Utc::now();
    }

    pub fn find_size(&self, selector: &SizeSelector) -> Option<&SizeEntry> {
        self.sizes.iter().find(|s| s.matches(selector))
    }

    pub fn size_entry(&self, id: Uuid) -> Option<&SizeEntry> {
        self.sizes.iter().find(|s| s.id == id)
    }

    pub fn base_quote(&self) -> PriceQuote {
        PriceQuote {
            price: self.price,
            discounted_price: self.discounted_price,
            discount_percentage: self.discount_percentage,
        }
    }

    /// Stock available for a size entry, or the flat stock.
    pub fn available(&self, size_entry: Option<Uuid>) -> i32 {
        match size_entry {
            Some(id) => self.size_entry(id).map(|s| s.stock).unwrap_or(0),
            None => self.stock,
        }
    }

    /// Applies a stock delta in memory, keeping the derived total in step.
    pub fn adjust_stock(&mut self, size_entry: Option<Uuid>, delta: i32) -> bool {
        match size_entry {
            Some(id) => {
                let Some(entry) = self.sizes.iter_mut().find(|s| s.id == id) else {
                    return false;
                };
                entry.stock = entry.stock.saturating_add(delta);
                self.stock = self.stock.saturating_add(delta);
            }
            None => self.stock = self.stock.saturating_add(delta),
        }
        self.updated_at = Utc::now();
        true
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub image: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn create(name: impl Into<String>, image: Option<ImageRef>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), name: name.into(), image, created_at: now, updated_at: now }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub size_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subcategory {
    pub fn create(name: impl Into<String>, category_id: Option<Uuid>, size_ids: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), name: name.into(), category_id, size_ids, created_at: now, updated_at: now }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Size {
    pub fn create(label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), label: label.into(), created_at: now, updated_at: now }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: Uuid,
    pub images: Vec<ImageRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Banner {
    pub fn create(images: Vec<ImageRef>) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), images, created_at: now, updated_at: now }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn sized_product_derives_price_and_stock() {
        let mut p = Product::create("Tee", d(0), 0);
        p.sizes = vec![
            SizeEntry::new(Uuid::new_v4(), Some("M".into()), d(499), 4),
            SizeEntry::new(Uuid::new_v4(), Some("L".into()), d(549), 6),
        ];
        p.discount = Some(Discount::Flat(d(49)));
        p.reprice();
        assert_eq!(p.price, d(499));
        assert_eq!(p.stock, 10);
        assert_eq!(p.sizes[1].discounted_price, d(500));
        assert_eq!(p.discounted_price, d(450));
    }

    #[test]
    fn size_lookup_by_id_or_label() {
        let size_id = Uuid::new_v4();
        let mut p = Product::create("Tee", d(0), 0);
        p.sizes = vec![SizeEntry::new(size_id, Some("XL".into()), d(10), 1)];
        let entry_id = p.sizes[0].id;
        assert!(p.find_size(&SizeSelector::ById(entry_id)).is_some());
        assert!(p.find_size(&SizeSelector::ById(size_id)).is_some());
        assert!(p.find_size(&SizeSelector::ByLabel(" xl ".into())).is_some());
        assert!(p.find_size(&SizeSelector::ByLabel("S".into())).is_none());
    }

    #[test]
    fn adjust_stock_keeps_total_in_step() {
        let mut p = Product::create("Tee", d(0), 0);
        p.sizes = vec![SizeEntry::new(Uuid::new_v4(), None, d(10), 5)];
        p.reprice();
        let entry = p.sizes[0].id;
        assert!(p.adjust_stock(Some(entry), -2));
        assert_eq!(p.available(Some(entry)), 3);
        assert_eq!(p.stock, 3);
        assert!(!p.adjust_stock(Some(Uuid::new_v4()), -1));
    }

    #[test]
    fn stock_totals_saturate() {
        let mut p = Product::create("Tee", d(0), 0);
        p.sizes = vec![
            SizeEntry::new(Uuid::new_v4(), Some("M".into()), d(10), i32::MAX),
            SizeEntry::new(Uuid::new_v4(), Some("L".into()), d(10), 5),
        ];
        p.reprice();
        assert_eq!(p.stock, i32::MAX);
        let entry = p.sizes[0].id;
        assert!(p.adjust_stock(Some(entry), 1));
        assert_eq!(p.available(Some(entry)), i32::MAX);
    }
}
