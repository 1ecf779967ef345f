//! Catalog administration: products, categories, subcategories and sizes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{Category, Discount, Gender, ImageRef, Product, Size, SizeEntry, Subcategory};
use crate::error::{AppError, Result};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct SizeInput {
    pub size_id: Uuid,
    pub price: Decimal,
    pub stock: i32,
}

/// Product fields supplied on create or update. On update, `None` leaves a
/// field as it is and `images` are appended.
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub description: Option<String>,
    pub review: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub discount: Option<Discount>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub sizes: Option<Vec<SizeInput>>,
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, Default)]
pub struct SubcategoryDraft {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub size_ids: Option<Vec<Uuid>>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ---- products ----

    #[instrument(skip(self, draft), fields(name = ?draft.name))]
    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product> {
        let name = required(draft.name.as_deref().unwrap_or_default(), "name")?.to_string();
        let sized = draft.sizes.as_ref().is_some_and(|s| !s.is_empty());
        if !sized && draft.price.is_none() {
            return Err(AppError::validation("price is required for a product without sizes"));
        }
        let mut product = Product::create(name, draft.price.unwrap_or_default(), draft.stock.unwrap_or(0));
        self.apply_draft(&mut product, draft).await?;
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn product(&self, id: Uuid) -> Result<Product> {
        self.store.product(id).await?.ok_or_else(|| AppError::not_found("Product"))
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        Ok(self.store.products().await?)
    }

    #[instrument(skip(self, draft))]
    pub async fn update_product(&self, id: Uuid, draft: ProductDraft) -> Result<Product> {
        let mut product = self.product(id).await?;
        if let Some(name) = &draft.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name cannot be empty"));
            }
            product.name = name.trim().to_string();
        }
        self.apply_draft(&mut product, draft).await?;
        if !self.store.update_product(&product).await? {
            return Err(AppError::not_found("Product"));
        }
        info!(product_id = %id, "product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid) -> Result<Product> {
        let deleted = self.store.delete_product(id).await?.ok_or_else(|| AppError::not_found("Product"))?;
        info!(product_id = %id, "product deleted");
        Ok(deleted)
    }

    /// Validates references and copies the draft onto `product`, then
    /// recomputes derived prices and stock.
    async fn apply_draft(&self, product: &mut Product, draft: ProductDraft) -> Result<()> {
        if let Some(price) = draft.price {
            if price < Decimal::ZERO {
                return Err(AppError::validation("price cannot be negative"));
            }
            product.price = price;
        }
        if let Some(stock) = draft.stock {
            if stock < 0 {
                return Err(AppError::validation("stock cannot be negative"));
            }
            product.stock = stock;
        }
        if let Some(discount) = draft.discount {
            if !discount.is_valid() {
                return Err(AppError::validation("Invalid discount"));
            }
            product.discount = Some(discount);
        }
        if let Some(category_id) = draft.category_id {
            if self.store.category(category_id).await?.is_none() {
                return Err(AppError::validation(format!("Invalid category: {category_id}")));
            }
            product.category_id = Some(category_id);
        }
        if let Some(subcategory_id) = draft.subcategory_id {
            if self.store.subcategory(subcategory_id).await?.is_none() {
                return Err(AppError::validation(format!("Invalid subcategory: {subcategory_id}")));
            }
            product.subcategory_id = Some(subcategory_id);
        }
        if let Some(sizes) = draft.sizes {
            product.sizes = self.size_entries(product, sizes).await?;
        }
        if draft.gender.is_some() {
            product.gender = draft.gender;
        }
        if draft.description.is_some() {
            product.description = draft.description;
        }
        if draft.review.is_some() {
            product.review = draft.review;
        }
        product.images.extend(draft.images);
        product.reprice();
        Ok(())
    }

    /// Builds size entries, snapshotting each size label. Entries for sizes
    /// the product already had keep their ids so cart lines stay valid.
    async fn size_entries(&self, product: &Product, inputs: Vec<SizeInput>) -> Result<Vec<SizeEntry>> {
        let permitted: Option<HashSet<Uuid>> = match product.subcategory_id {
            Some(sub) => self
                .store
                .subcategory(sub)
                .await?
                .filter(|s| !s.size_ids.is_empty())
                .map(|s| s.size_ids.into_iter().collect()),
            None => None,
        };
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(inputs.len());
        for input in inputs {
            if !seen.insert(input.size_id) {
                return Err(AppError::validation(format!("Duplicate size: {}", input.size_id)));
            }
            if input.price < Decimal::ZERO || input.stock < 0 {
                return Err(AppError::validation("size price and stock cannot be negative"));
            }
            let size = self
                .store
                .size(input.size_id)
                .await?
                .ok_or_else(|| AppError::validation(format!("Invalid size ID: {}", input.size_id)))?;
            if let Some(permitted) = &permitted {
                if !permitted.contains(&size.id) {
                    let msg = format!("Size {} is not allowed for this subcategory", size.label);
                    return Err(AppError::validation(msg));
                }
            }
            let mut entry = SizeEntry::new(size.id, Some(size.label), input.price, input.stock);
            if let Some(existing) = product.sizes.iter().find(|s| s.size_id == size.id) {
                entry.id = existing.id;
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    // ---- categories ----

    #[instrument(skip(self, image))]
    pub async fn create_category(&self, name: &str, image: Option<ImageRef>) -> Result<Category> {
        let name = required(name, "name")?;
        if self.store.category_by_name(name).await?.is_some() {
            return Err(AppError::Conflict("Category already exists".into()));
        }
        let category = Category::create(name, image);
        self.store.insert_category(&category).await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    pub async fn category(&self, id: Uuid) -> Result<Category> {
        self.store.category(id).await?.ok_or_else(|| AppError::not_found("Category"))
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.store.categories().await?)
    }

    pub async fn update_category(&self, id: Uuid, name: Option<&str>, image: Option<ImageRef>) -> Result<Category> {
        let mut category = self.category(id).await?;
        if let Some(name) = name {
            let name = required(name, "name")?;
            if let Some(other) = self.store.category_by_name(name).await? {
                if other.id != id {
                    return Err(AppError::Conflict("Category already exists".into()));
                }
            }
            category.name = name.to_string();
        }
        if image.is_some() {
            category.image = image;
        }
        category.updated_at = Utc::now();
        if !self.store.update_category(&category).await? {
            return Err(AppError::not_found("Category"));
        }
        Ok(category)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_category(id).await? {
            return Err(AppError::not_found("Category"));
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    // ---- subcategories ----

    pub async fn create_subcategory(&self, draft: SubcategoryDraft) -> Result<Subcategory> {
        let name = required(draft.name.as_deref().unwrap_or_default(), "name")?.to_string();
        if self.store.subcategory_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict("Subcategory already exists".into()));
        }
        self.check_category(draft.category_id).await?;
        let size_ids = draft.size_ids.unwrap_or_default();
        self.check_sizes(&size_ids).await?;
        let subcategory = Subcategory::create(name, draft.category_id, size_ids);
        self.store.insert_subcategory(&subcategory).await?;
        info!(subcategory_id = %subcategory.id, "subcategory created");
        Ok(subcategory)
    }

    pub async fn subcategory(&self, id: Uuid) -> Result<Subcategory> {
        self.store.subcategory(id).await?.ok_or_else(|| AppError::not_found("Subcategory"))
    }

    pub async fn subcategories(&self) -> Result<Vec<Subcategory>> {
        Ok(self.store.subcategories().await?)
    }

    pub async fn update_subcategory(&self, id: Uuid, draft: SubcategoryDraft) -> Result<Subcategory> {
        let mut subcategory = self.subcategory(id).await?;
        if let Some(name) = draft.name.as_deref() {
            let name = required(name, "name")?;
            if let Some(other) = self.store.subcategory_by_name(name).await? {
                if other.id != id {
                    return Err(AppError::Conflict("Subcategory already exists".into()));
                }
            }
            subcategory.name = name.to_string();
        }
        if draft.category_id.is_some() {
            self.check_category(draft.category_id).await?;
            subcategory.category_id = draft.category_id;
        }
        if let Some(size_ids) = draft.size_ids {
            self.check_sizes(&size_ids).await?;
            subcategory.size_ids = size_ids;
        }
        subcategory.updated_at = Utc::now();
        if !self.store.update_subcategory(&subcategory).await? {
            return Err(AppError::not_found("Subcategory"));
        }
        Ok(subcategory)
    }

    pub async fn delete_subcategory(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_subcategory(id).await? {
            return Err(AppError::not_found("Subcategory"));
        }
        Ok(())
    }

    async fn check_category(&self, id: Option<Uuid>) -> Result<()> {
        if let Some(id) = id {
            if self.store.category(id).await?.is_none() {
                return Err(AppError::validation(format!("Invalid category: {id}")));
            }
        }
        Ok(())
    }

    async fn check_sizes(&self, ids: &[Uuid]) -> Result<()> {
        for id in ids {
            if self.store.size(*id).await?.is_none() {
                return Err(AppError::validation(format!("Invalid size ID: {id}")));
            }
        }
        Ok(())
    }

    // ---- sizes ----

    pub async fn create_size(&self, label: &str) -> Result<Size> {
        let label = size_label(label)?;
        if self.store.size_by_label(label).await?.is_some() {
            return Err(AppError::Conflict("Size already exists".into()));
        }
        let size = Size::create(label);
        self.store.insert_size(&size).await?;
        info!(size_id = %size.id, label, "size created");
        Ok(size)
    }

    pub async fn size(&self, id: Uuid) -> Result<Size> {
        self.store.size(id).await?.ok_or_else(|| AppError::not_found("Size"))
    }

    pub async fn sizes(&self) -> Result<Vec<Size>> {
        Ok(self.store.sizes().await?)
    }

    pub async fn update_size(&self, id: Uuid, label: &str) -> Result<Size> {
        let label = size_label(label)?;
        let mut size = self.size(id).await?;
        if let Some(other) = self.store.size_by_label(label).await? {
            if other.id != id {
                return Err(AppError::Conflict("Size already exists".into()));
            }
        }
        size.label = label.to_string();
        size.updated_at = Utc::now();
        if !self.store.update_size(&size).await? {
            return Err(AppError::not_found("Size"));
        }
        Ok(size)
    }

    pub async fn delete_size(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_size(id).await? {
            return Err(AppError::not_found("Size"));
        }
        Ok(())
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn size_label(label: &str) -> Result<&str> {
    let label = required(label, "size")?;
    if label.chars().count() > 20 {
        return Err(AppError::validation("Size must be less than or equal to 20 characters"));
    }
    Ok(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()))
    }

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let svc = service();
        svc.create_size("M").await.unwrap();
        assert!(matches!(svc.create_size(" M ").await, Err(AppError::Conflict(_))));
        svc.create_category("Shirts", None).await.unwrap();
        assert!(matches!(svc.create_category("Shirts", None).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn size_label_length_is_bounded() {
        let svc = service();
        assert!(matches!(svc.create_size("").await, Err(AppError::Validation(_))));
        assert!(matches!(svc.create_size(&"X".repeat(21)).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn product_with_sizes_derives_price_stock_and_labels() {
        let svc = service();
        let m = svc.create_size("M").await.unwrap();
        let l = svc.create_size("L").await.unwrap();
        let product = svc
            .create_product(ProductDraft {
                name: Some("Tee".into()),
                discount: Some(Discount::Percentage(d(10))),
                sizes: Some(vec![
                    SizeInput { size_id: m.id, price: d(500), stock: 2 },
                    SizeInput { size_id: l.id, price: d(600), stock: 3 },
                ]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(product.price, d(500));
        assert_eq!(product.stock, 5);
        assert_eq!(product.sizes[0].label.as_deref(), Some("M"));
        assert_eq!(product.sizes[1].discounted_price, d(540));
    }

    #[tokio::test]
    async fn invalid_references_are_rejected() {
        let svc = service();
        let err = svc
            .create_product(ProductDraft {
                name: Some("Tee".into()),
                price: Some(d(100)),
                category_id: Some(Uuid::new_v4()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("Invalid category")));

        let err = svc
            .create_product(ProductDraft {
                name: Some("Tee".into()),
                sizes: Some(vec![SizeInput { size_id: Uuid::new_v4(), price: d(1), stock: 1 }]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.starts_with("Invalid size ID")));
    }

    #[tokio::test]
    async fn update_keeps_size_entry_ids_and_appends_images() {
        let svc = service();
        let m = svc.create_size("M").await.unwrap();
        let product = svc
            .create_product(ProductDraft {
                name: Some("Tee".into()),
                sizes: Some(vec![SizeInput { size_id: m.id, price: d(10), stock: 1 }]),
                images: vec![ImageRef { filename: "a.jpg".into(), filepath: "uploads/a.jpg".into() }],
                ..Default::default()
            })
            .await
            .unwrap();
        let entry_id = product.sizes[0].id;
        let updated = svc
            .update_product(
                product.id,
                ProductDraft {
                    sizes: Some(vec![SizeInput { size_id: m.id, price: d(12), stock: 4 }]),
                    images: vec![ImageRef { filename: "b.jpg".into(), filepath: "uploads/b.jpg".into() }],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.sizes[0].id, entry_id);
        assert_eq!(updated.stock, 4);
        assert_eq!(updated.images.len(), 2);
        assert_eq!(svc.product(product.id).await.unwrap().price, d(12));
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let svc = service();
        assert!(matches!(svc.product(Uuid::new_v4()).await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.delete_product(Uuid::new_v4()).await, Err(AppError::NotFound(_))));
    }
}
