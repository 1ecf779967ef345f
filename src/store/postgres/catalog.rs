use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{corrupt, unique_or, PgStore};
use crate::domain::{Banner, Category, Discount, Gender, ImageRef, Product, Size, SizeEntry, Subcategory};
use crate::store::{BannerStore, ProductStore, StockMove, StoreError, StoreResult, TaxonomyStore};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    gender: Option<String>,
    description: Option<String>,
    review: Option<String>,
    images: Json<Vec<ImageRef>>,
    category_id: Option<Uuid>,
    subcategory_id: Option<Uuid>,
    discount: Option<Json<Discount>>,
    price: Decimal,
    stock: i32,
    discounted_price: Decimal,
    discount_percentage: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SizeRow {
    id: Uuid,
    product_id: Uuid,
    size_id: Uuid,
    label: Option<String>,
    price: Decimal,
    stock: i32,
    discounted_price: Decimal,
    discount_percentage: Decimal,
}

impl From<SizeRow> for SizeEntry {
    fn from(r: SizeRow) -> Self {
        Self {
            id: r.id,
            size_id: r.size_id,
            label: r.label,
            price: r.price,
            stock: r.stock,
            discounted_price: r.discounted_price,
            discount_percentage: r.discount_percentage,
        }
    }
}

impl ProductRow {
    fn into_product(self, sizes: Vec<SizeEntry>) -> StoreResult<Product> {
        let gender = match self.gender.as_deref() {
            Some(g) => Some(Gender::parse(g).ok_or_else(|| corrupt("products.gender", g))?),
            None => None,
        };
        Ok(Product {
            id: self.id,
            name: self.name,
            gender,
            description: self.description,
            review: self.review,
            images: self.images.0,
            category_id: self.category_id,
            subcategory_id: self.subcategory_id,
            discount: self.discount.map(|d| d.0),
            price: self.price,
            stock: self.stock,
            discounted_price: self.discounted_price,
            discount_percentage: self.discount_percentage,
            sizes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, gender, description, review, images, category_id, subcategory_id, discount, \
     price, stock, discounted_price, discount_percentage, created_at, updated_at";

impl PgStore {
    async fn load_products(&self, rows: Vec<ProductRow>) -> StoreResult<Vec<Product>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let size_rows = sqlx::query_as::<_, SizeRow>(
            "SELECT id, product_id, size_id, label, price, stock, discounted_price, discount_percentage \
             FROM product_sizes WHERE product_id = ANY($1) ORDER BY product_id, position",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await?;
        let mut by_product: HashMap<Uuid, Vec<SizeEntry>> = HashMap::new();
        for row in size_rows {
            by_product.entry(row.product_id).or_default().push(row.into());
        }
        rows.into_iter()
            .map(|r| {
                let sizes = by_product.remove(&r.id).unwrap_or_default();
                r.into_product(sizes)
            })
            .collect()
    }

    async fn write_sizes(tx: &mut Transaction<'_, Postgres>, product: &Product) -> StoreResult<()> {
        sqlx::query("DELETE FROM product_sizes WHERE product_id = $1").bind(product.id).execute(&mut **tx).await?;
        for (position, s) in product.sizes.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_sizes \
                 (id, product_id, size_id, label, price, stock, discounted_price, discount_percentage, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(s.id)
            .bind(product.id)
            .bind(s.size_id)
            .bind(&s.label)
            .bind(s.price)
            .bind(s.stock)
            .bind(s.discounted_price)
            .bind(s.discount_percentage)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn insert_product(&self, p: &Product) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query(
            "INSERT INTO products (id, name, gender, description, review, images, category_id, subcategory_id, \
             discount, price, stock, discounted_price, discount_percentage, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(p.gender.map(|g| g.as_str()))
        .bind(&p.description)
        .bind(&p.review)
        .bind(Json(&p.images))
        .bind(p.category_id)
        .bind(p.subcategory_id)
        .bind(p.discount.map(Json))
        .bind(p.price)
        .bind(p.stock)
        .bind(p.discounted_price)
        .bind(p.discount_percentage)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&mut *tx)
        .await?;
        Self::write_sizes(&mut tx, p).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_product(&self, p: &Product) -> StoreResult<bool> {
        let mut tx = self.pool().begin().await?;
        let updated = sqlx::query(
            "UPDATE products SET name = $2, gender = $3, description = $4, review = $5, images = $6, category_id = $7, \
             subcategory_id = $8, discount = $9, price = $10, stock = $11, discounted_price = $12, \
             discount_percentage = $13, updated_at = $14 WHERE id = $1",
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(p.gender.map(|g| g.as_str()))
        .bind(&p.description)
        .bind(&p.review)
        .bind(Json(&p.images))
        .bind(p.category_id)
        .bind(p.subcategory_id)
        .bind(p.discount.map(Json))
        .bind(p.price)
        .bind(p.stock)
        .bind(p.discounted_price)
        .bind(p.discount_percentage)
        .bind(p.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(false);
        }
        Self::write_sizes(&mut tx, p).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        match row {
            Some(row) => Ok(self.load_products(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool())
        .await?;
        self.load_products(rows).await
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let Some(product) = self.product(id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(self.pool()).await?;
        Ok(Some(product))
    }

    async fn take_stock(&self, moves: &[StockMove]) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        for mv in moves {
            let affected = match mv.size_entry_id {
                Some(entry) => sqlx::query(
                    "WITH taken AS (UPDATE product_sizes SET stock = stock - $3 \
                     WHERE product_id = $1 AND id = $2 AND stock >= $3 RETURNING product_id) \
                     UPDATE products SET stock = stock - $3, updated_at = NOW() \
                     WHERE id IN (SELECT product_id FROM taken)",
                )
                .bind(mv.product_id)
                .bind(entry)
                .bind(i64::from(mv.quantity))
                .execute(&mut *tx)
                .await?
                .rows_affected(),
                None => sqlx::query(
                    "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
                )
                .bind(mv.product_id)
                .bind(i64::from(mv.quantity))
                .execute(&mut *tx)
                .await?
                .rows_affected(),
            };
            if affected == 0 {
                // Dropping the transaction rolls back earlier lines.
                let (product_id, size_entry_id) = (mv.product_id, mv.size_entry_id);
                return Err(StoreError::InsufficientStock { product_id, size_entry_id });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn return_stock(&self, moves: &[StockMove]) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        for mv in moves {
            match mv.size_entry_id {
                Some(entry) => {
                    sqlx::query(
                        "WITH returned AS (UPDATE product_sizes SET stock = stock + $3 \
                         WHERE product_id = $1 AND id = $2 RETURNING product_id) \
                         UPDATE products SET stock = stock + $3, updated_at = NOW() \
                         WHERE id IN (SELECT product_id FROM returned)",
                    )
                    .bind(mv.product_id)
                    .bind(entry)
                    .bind(i64::from(mv.quantity))
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                        .bind(mv.product_id)
                        .bind(i64::from(mv.quantity))
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    image: Option<Json<ImageRef>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self { id: r.id, name: r.name, image: r.image.map(|i| i.0), created_at: r.created_at, updated_at: r.updated_at }
    }
}

#[derive(sqlx::FromRow)]
struct SubcategoryRow {
    id: Uuid,
    name: String,
    category_id: Option<Uuid>,
    size_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubcategoryRow> for Subcategory {
    fn from(r: SubcategoryRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            category_id: r.category_id,
            size_ids: r.size_ids,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SizeLabelRow {
    id: Uuid,
    label: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SizeLabelRow> for Size {
    fn from(r: SizeLabelRow) -> Self {
        Self { id: r.id, label: r.label, created_at: r.created_at, updated_at: r.updated_at }
    }
}

#[async_trait]
impl TaxonomyStore for PgStore {
    async fn insert_category(&self, c: &Category) -> StoreResult<()> {
        sqlx::query("INSERT INTO categories (id, name, image, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(c.id)
            .bind(&c.name)
            .bind(c.image.as_ref().map(Json))
            .bind(c.created_at)
            .bind(c.updated_at)
            .execute(self.pool())
            .await
            .map_err(unique_or("Category"))?;
        Ok(())
    }

    async fn update_category(&self, c: &Category) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE categories SET name = $2, image = $3, updated_at = $4 WHERE id = $1")
            .bind(c.id)
            .bind(&c.name)
            .bind(c.image.as_ref().map(Json))
            .bind(c.updated_at)
            .execute(self.pool())
            .await
            .map_err(unique_or("Category"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn category_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(self.pool()).await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_subcategory(&self, s: &Subcategory) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO subcategories (id, name, category_id, size_ids, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(s.id)
        .bind(&s.name)
        .bind(s.category_id)
        .bind(&s.size_ids)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(self.pool())
        .await
        .map_err(unique_or("Subcategory"))?;
        Ok(())
    }

    async fn update_subcategory(&self, s: &Subcategory) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE subcategories SET name = $2, category_id = $3, size_ids = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(s.id)
        .bind(&s.name)
        .bind(s.category_id)
        .bind(&s.size_ids)
        .bind(s.updated_at)
        .execute(self.pool())
        .await
        .map_err(unique_or("Subcategory"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn subcategory(&self, id: Uuid) -> StoreResult<Option<Subcategory>> {
        let row = sqlx::query_as::<_, SubcategoryRow>("SELECT * FROM subcategories WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn subcategory_by_name(&self, name: &str) -> StoreResult<Option<Subcategory>> {
        let row = sqlx::query_as::<_, SubcategoryRow>("SELECT * FROM subcategories WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn subcategories(&self) -> StoreResult<Vec<Subcategory>> {
        let rows = sqlx::query_as::<_, SubcategoryRow>("SELECT * FROM subcategories ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_subcategory(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM subcategories WHERE id = $1").bind(id).execute(self.pool()).await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_size(&self, s: &Size) -> StoreResult<()> {
        sqlx::query("INSERT INTO sizes (id, label, created_at, updated_at) VALUES ($1, $2, $3, $4)")
            .bind(s.id)
            .bind(&s.label)
            .bind(s.created_at)
            .bind(s.updated_at)
            .execute(self.pool())
            .await
            .map_err(unique_or("Size"))?;
        Ok(())
    }

    async fn update_size(&self, s: &Size) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE sizes SET label = $2, updated_at = $3 WHERE id = $1")
            .bind(s.id)
            .bind(&s.label)
            .bind(s.updated_at)
            .execute(self.pool())
            .await
            .map_err(unique_or("Size"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn size(&self, id: Uuid) -> StoreResult<Option<Size>> {
        let row = sqlx::query_as::<_, SizeLabelRow>("SELECT * FROM sizes WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn size_by_label(&self, label: &str) -> StoreResult<Option<Size>> {
        let row = sqlx::query_as::<_, SizeLabelRow>("SELECT * FROM sizes WHERE label = $1")
            .bind(label)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn sizes(&self) -> StoreResult<Vec<Size>> {
        let rows = sqlx::query_as::<_, SizeLabelRow>("SELECT * FROM sizes ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_size(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM sizes WHERE id = $1").bind(id).execute(self.pool()).await?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct BannerRow {
    id: Uuid,
    images: Json<Vec<ImageRef>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BannerRow> for Banner {
    fn from(r: BannerRow) -> Self {
        Self { id: r.id, images: r.images.0, created_at: r.created_at, updated_at: r.updated_at }
    }
}

#[async_trait]
impl BannerStore for PgStore {
    async fn insert_banner(&self, b: &Banner) -> StoreResult<()> {
        sqlx::query("INSERT INTO banners (id, images, created_at, updated_at) VALUES ($1, $2, $3, $4)")
            .bind(b.id)
            .bind(Json(&b.images))
            .bind(b.created_at)
            .bind(b.updated_at)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn update_banner(&self, b: &Banner) -> StoreResult<bool> {
        let res = sqlx::query("UPDATE banners SET images = $2, updated_at = $3 WHERE id = $1")
            .bind(b.id)
            .bind(Json(&b.images))
            .bind(b.updated_at)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn banner(&self, id: Uuid) -> StoreResult<Option<Banner>> {
        let row = sqlx::query_as::<_, BannerRow>("SELECT * FROM banners WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(Into::into))
    }

    async fn banners(&self) -> StoreResult<Vec<Banner>> {
        let rows = sqlx::query_as::<_, BannerRow>("SELECT * FROM banners ORDER BY created_at")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_banner(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM banners WHERE id = $1").bind(id).execute(self.pool()).await?;
        Ok(res.rows_affected() > 0)
    }
}
