//! Persistence traits. Services only see these; `postgres` and `memory`
//! provide the implementations.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Banner, Cart, Category, Message, Order, OrderState, Product, Size, Subcategory, User, Wishlist,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: Uuid, size_entry_id: Option<Uuid> },

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One stock change: `quantity` units of a product or one of its sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockMove {
    pub product_id: Uuid,
    pub size_entry_id: Option<Uuid>,
    pub quantity: u32,
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    /// Returns false when the product does not exist.
    async fn update_product(&self, product: &Product) -> StoreResult<bool>;
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn products(&self) -> StoreResult<Vec<Product>>;
    async fn delete_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    /// Decrements stock for every move or for none of them. Each decrement is
    /// guarded by `stock >= quantity`.
    async fn take_stock(&self, moves: &[StockMove]) -> StoreResult<()>;
    /// Gives stock back. Moves for products that no longer exist are skipped.
    async fn return_stock(&self, moves: &[StockMove]) -> StoreResult<()>;
}

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn insert_category(&self, category: &Category) -> StoreResult<()>;
    async fn update_category(&self, category: &Category) -> StoreResult<bool>;
    async fn category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn category_by_name(&self, name: &str) -> StoreResult<Option<Category>>;
    async fn categories(&self) -> StoreResult<Vec<Category>>;
    async fn delete_category(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_subcategory(&self, subcategory: &Subcategory) -> StoreResult<()>;
    async fn update_subcategory(&self, subcategory: &Subcategory) -> StoreResult<bool>;
    async fn subcategory(&self, id: Uuid) -> StoreResult<Option<Subcategory>>;
    async fn subcategory_by_name(&self, name: &str) -> StoreResult<Option<Subcategory>>;
    async fn subcategories(&self) -> StoreResult<Vec<Subcategory>>;
    async fn delete_subcategory(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_size(&self, size: &Size) -> StoreResult<()>;
    async fn update_size(&self, size: &Size) -> StoreResult<bool>;
    async fn size(&self, id: Uuid) -> StoreResult<Option<Size>>;
    async fn size_by_label(&self, label: &str) -> StoreResult<Option<Size>>;
    async fn sizes(&self) -> StoreResult<Vec<Size>>;
    async fn delete_size(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait BannerStore: Send + Sync {
    async fn insert_banner(&self, banner: &Banner) -> StoreResult<()>;
    async fn update_banner(&self, banner: &Banner) -> StoreResult<bool>;
    async fn banner(&self, id: Uuid) -> StoreResult<Option<Banner>>;
    async fn banners(&self) -> StoreResult<Vec<Banner>>;
    async fn delete_banner(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart(&self, user_id: Uuid) -> StoreResult<Option<Cart>>;
    async fn save_cart(&self, cart: &Cart) -> StoreResult<()>;
    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;
    /// Persists status, payment and stock fields if the stored order is still
    /// in `expected`. Returns false when it is missing or has moved on.
    /// Leaves the invoice number alone.
    async fn update_order(&self, order: &Order, expected: OrderState) -> StoreResult<bool>;
    /// Sets the invoice number unless one is stored already. Returns the stored
    /// number, or `None` for an unknown order.
    async fn set_invoice_number(&self, id: Uuid, number: &str) -> StoreResult<Option<String>>;
    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn order_by_gateway_id(&self, razorpay_order_id: &str) -> StoreResult<Option<Order>>;
    /// Newest first.
    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;
    /// Newest first.
    async fn all_orders(&self) -> StoreResult<Vec<Order>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user(&self, user: &User) -> StoreResult<bool>;
    async fn user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn users(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait EngagementStore: Send + Sync {
    async fn wishlist(&self, user_id: Uuid) -> StoreResult<Option<Wishlist>>;
    async fn save_wishlist(&self, wishlist: &Wishlist) -> StoreResult<()>;

    async fn insert_message(&self, message: &Message) -> StoreResult<()>;
    async fn update_message(&self, message: &Message) -> StoreResult<bool>;
    async fn message(&self, id: Uuid) -> StoreResult<Option<Message>>;
    /// Newest first.
    async fn messages(&self) -> StoreResult<Vec<Message>>;
    async fn delete_message(&self, id: Uuid) -> StoreResult<bool>;
}

/// Every store trait, for backends that implement them all.
pub trait Store:
    ProductStore + TaxonomyStore + BannerStore + CartStore + OrderStore + UserStore + EngagementStore
{
}

impl<T> Store for T where
    T: ProductStore + TaxonomyStore + BannerStore + CartStore + OrderStore + UserStore + EngagementStore
{
}
