use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Category, Discount, Gender, ImageRef, Product, Size, Subcategory};
use crate::error::{AppError, Result};
use crate::http::{reply, AdminUser, AppState, Body, Param, Reply};
use crate::services::{ProductDraft, SizeInput, SubcategoryDraft};

type Created<T> = (StatusCode, Json<Reply<T>>);

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/addproduct", post(add_product))
        .route("/updateproduct/:id", put(update_product))
        .route("/getproduct/:id", get(get_product))
        .route("/getallproduct", get(get_all_products))
        .route("/deleteproduct/:id", delete(delete_product))
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/addcategory", post(add_category))
        .route("/updatecategory/:id", put(update_category))
        .route("/getcategory/:id", get(get_category))
        .route("/getallcategory", get(get_all_categories))
        .route("/deletecategory/:id", delete(delete_category))
}

pub fn subcategory_routes() -> Router<AppState> {
    Router::new()
        .route("/addsubcategory", post(add_subcategory))
        .route("/updatesubcategory/:id", put(update_subcategory))
        .route("/getsubcategory/:id", get(get_subcategory))
        .route("/getallsubcategory", get(get_all_subcategories))
        .route("/deletesubcategory/:id", delete(delete_subcategory))
}

pub fn size_routes() -> Router<AppState> {
    Router::new()
        .route("/addsize", post(add_size))
        .route("/updatesize/:id", put(update_size))
        .route("/getsize/:id", get(get_size))
        .route("/getallsize", get(get_all_sizes))
        .route("/deletesize/:id", delete(delete_size))
}

// ---- products ----

#[derive(Debug, Deserialize)]
struct SizeBody {
    size: Uuid,
    price: Decimal,
    #[serde(default)]
    stock: i32,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ProductBody {
    #[serde(alias = "name")]
    #[validate(length(min = 2))]
    product_name: Option<String>,
    gender: Option<String>,
    price: Option<Decimal>,
    stock: Option<i32>,
    discount: Option<Decimal>,
    discount_type: Option<String>,
    description: Option<String>,
    review: Option<String>,
    category: Option<Uuid>,
    subcategory: Option<Uuid>,
    /// An array, or the same array encoded as a JSON string (form posts).
    sizes: Option<Value>,
    #[serde(default)]
    images: Vec<ImageRef>,
}

impl ProductBody {
    fn into_draft(self) -> Result<ProductDraft> {
        self.validate()?;
        let gender = match self.gender.as_deref() {
            Some(g) => Some(
                Gender::parse(g).ok_or_else(|| AppError::validation("gender must be one of Male, Female, Unisex"))?,
            ),
            None => None,
        };
        let discount = match (self.discount, self.discount_type.as_deref()) {
            (None, _) => None,
            (Some(v), None | Some("Percentage")) => Some(Discount::Percentage(v)),
            (Some(v), Some("Flat")) => Some(Discount::Flat(v)),
            (Some(_), Some(_)) => return Err(AppError::validation("discountType must be Percentage or Flat")),
        };
        let sizes = match self.sizes {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) if raw.trim().is_empty() => None,
            Some(Value::String(raw)) => Some(parse_sizes(serde_json::from_str(&raw))?),
            Some(other) => Some(parse_sizes(serde_json::from_value(other))?),
        };
        Ok(ProductDraft {
            name: self.product_name,
            gender,
            description: self.description,
            review: self.review,
            price: self.price,
            stock: self.stock,
            discount,
            category_id: self.category,
            subcategory_id: self.subcategory,
            sizes,
            images: self.images,
        })
    }
}

fn parse_sizes(parsed: serde_json::Result<Vec<SizeBody>>) -> Result<Vec<SizeInput>> {
    let sizes = parsed.map_err(|_| AppError::validation("Invalid JSON format for sizes"))?;
    Ok(sizes.into_iter().map(|s| SizeInput { size_id: s.size, price: s.price, stock: s.stock }).collect())
}

async fn add_product(
    State(s): State<AppState>,
    _admin: AdminUser,
    Body(b): Body<ProductBody>,
) -> Result<Created<Product>> {
    let product = s.catalog.create_product(b.into_draft()?).await?;
    Ok((StatusCode::CREATED, reply("Product added successfully", product)))
}

async fn update_product(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
    Body(b): Body<ProductBody>,
) -> Result<Json<Reply<Product>>> {
    Ok(reply("Product updated successfully", s.catalog.update_product(id, b.into_draft()?).await?))
}

async fn get_product(State(s): State<AppState>, Param(id): Param<Uuid>) -> Result<Json<Reply<Product>>> {
    Ok(reply("Product fetched successfully", s.catalog.product(id).await?))
}

async fn get_all_products(State(s): State<AppState>) -> Result<Json<Reply<Vec<Product>>>> {
    Ok(reply("Products fetched successfully", s.catalog.products().await?))
}

async fn delete_product(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
) -> Result<Json<Reply<Product>>> {
    Ok(reply("Product deleted successfully", s.catalog.delete_product(id).await?))
}

// ---- categories ----

#[derive(Debug, Deserialize, Validate)]
struct CategoryBody {
    #[serde(alias = "name")]
    #[validate(length(min = 2))]
    categoryname: Option<String>,
    #[serde(alias = "categoryimage")]
    image: Option<ImageRef>,
}

async fn add_category(
    State(s): State<AppState>,
    _admin: AdminUser,
    Body(b): Body<CategoryBody>,
) -> Result<Created<Category>> {
    b.validate()?;
    let category = s.catalog.create_category(b.categoryname.as_deref().unwrap_or_default(), b.image).await?;
    Ok((StatusCode::CREATED, reply("Category created successfully", category)))
}

async fn update_category(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
    Body(b): Body<CategoryBody>,
) -> Result<Json<Reply<Category>>> {
    b.validate()?;
    let category = s.catalog.update_category(id, b.categoryname.as_deref(), b.image).await?;
    Ok(reply("Category updated successfully", category))
}

async fn get_category(State(s): State<AppState>, Param(id): Param<Uuid>) -> Result<Json<Reply<Category>>> {
    Ok(reply("Category fetched successfully", s.catalog.category(id).await?))
}

async fn get_all_categories(State(s): State<AppState>) -> Result<Json<Reply<Vec<Category>>>> {
    Ok(reply("Categories fetched successfully", s.catalog.categories().await?))
}

async fn delete_category(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
) -> Result<Json<Reply<Value>>> {
    s.catalog.delete_category(id).await?;
    Ok(reply("Category deleted successfully", json!({ "id": id })))
}

// ---- subcategories ----

#[derive(Debug, Deserialize, Validate)]
struct SubcategoryBody {
    #[serde(alias = "name")]
    #[validate(length(min = 2))]
    subcategory: Option<String>,
    category: Option<Uuid>,
    sizes: Option<Vec<Uuid>>,
}

impl SubcategoryBody {
    fn into_draft(self) -> Result<SubcategoryDraft> {
        self.validate()?;
        Ok(SubcategoryDraft { name: self.subcategory, category_id: self.category, size_ids: self.sizes })
    }
}

async fn add_subcategory(
    State(s): State<AppState>,
    _admin: AdminUser,
    Body(b): Body<SubcategoryBody>,
) -> Result<Created<Subcategory>> {
    let subcategory = s.catalog.create_subcategory(b.into_draft()?).await?;
    Ok((StatusCode::CREATED, reply("Subcategory created successfully", subcategory)))
}

async fn update_subcategory(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
    Body(b): Body<SubcategoryBody>,
) -> Result<Json<Reply<Subcategory>>> {
    Ok(reply("Subcategory updated successfully", s.catalog.update_subcategory(id, b.into_draft()?).await?))
}

async fn get_subcategory(State(s): State<AppState>, Param(id): Param<Uuid>) -> Result<Json<Reply<Subcategory>>> {
    Ok(reply("Subcategory fetched successfully", s.catalog.subcategory(id).await?))
}

async fn get_all_subcategories(State(s): State<AppState>) -> Result<Json<Reply<Vec<Subcategory>>>> {
    Ok(reply("Subcategories fetched successfully", s.catalog.subcategories().await?))
}

async fn delete_subcategory(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
) -> Result<Json<Reply<Value>>> {
    s.catalog.delete_subcategory(id).await?;
    Ok(reply("Subcategory deleted successfully", json!({ "id": id })))
}

// ---- sizes ----

#[derive(Debug, Deserialize)]
struct SizeLabelBody {
    #[serde(alias = "label")]
    size: String,
}

async fn add_size(State(s): State<AppState>, _admin: AdminUser, Body(b): Body<SizeLabelBody>) -> Result<Created<Size>> {
    let size = s.catalog.create_size(&b.size).await?;
    Ok((StatusCode::CREATED, reply("Size created successfully", size)))
}

async fn update_size(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
    Body(b): Body<SizeLabelBody>,
) -> Result<Json<Reply<Size>>> {
    Ok(reply("Size updated successfully", s.catalog.update_size(id, &b.size).await?))
}

async fn get_size(State(s): State<AppState>, Param(id): Param<Uuid>) -> Result<Json<Reply<Size>>> {
    Ok(reply("Size fetched successfully", s.catalog.size(id).await?))
}

async fn get_all_sizes(State(s): State<AppState>) -> Result<Json<Reply<Vec<Size>>>> {
    Ok(reply("Sizes fetched successfully", s.catalog.sizes().await?))
}

async fn delete_size(
    State(s): State<AppState>,
    _admin: AdminUser,
    Param(id): Param<Uuid>,
) -> Result<Json<Reply<Value>>> {
    s.catalog.delete_size(id).await?;
    Ok(reply("Size deleted successfully", json!({ "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_accept_array_or_encoded_string() {
        let size = Uuid::new_v4();
        let as_array: ProductBody = serde_json::from_value(json!({
            "productName": "Tee",
            "sizes": [{"size": size.to_string(), "price": 100, "stock": 3}]
        }))
        .unwrap();
        let encoded = format!(r#"[{{"size":"{size}","price":100,"stock":3}}]"#);
        let as_string: ProductBody = serde_json::from_value(json!({ "productName": "Tee", "sizes": encoded })).unwrap();

        let a = as_array.into_draft().unwrap().sizes.unwrap();
        let b = as_string.into_draft().unwrap().sizes.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].size_id, b[0].size_id);
        assert_eq!(b[0].stock, 3);
    }

    #[test]
    fn discount_and_gender_are_checked() {
        let body: ProductBody =
            serde_json::from_value(json!({ "productName": "Tee", "discount": 10, "discountType": "Flat" })).unwrap();
        assert_eq!(body.into_draft().unwrap().discount, Some(Discount::Flat(Decimal::from(10))));

        let body: ProductBody =
            serde_json::from_value(json!({ "productName": "Tee", "discount": 10, "discountType": "Bogus" })).unwrap();
        assert!(body.into_draft().is_err());

        let body: ProductBody = serde_json::from_value(json!({ "productName": "Tee", "gender": "Robot" })).unwrap();
        assert!(body.into_draft().is_err());

        let body: ProductBody = serde_json::from_value(json!({ "productName": "T" })).unwrap();
        assert!(matches!(body.into_draft(), Err(AppError::Validation(_))));
    }
}
