//! In-process store used when no database is configured, and by tests.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    BannerStore, CartStore, EngagementStore, OrderStore, ProductStore, StockMove, StoreError, StoreResult,
    TaxonomyStore, UserStore,
};
use crate::domain::{
    Banner, Cart, Category, Message, Order, OrderState, Product, Size, Subcategory, User, Wishlist,
};

#[derive(Default)]
pub struct MemoryStore {
    products: Mutex<HashMap<Uuid, Product>>,
    categories: Mutex<HashMap<Uuid, Category>>,
    subcategories: Mutex<HashMap<Uuid, Subcategory>>,
    sizes: Mutex<HashMap<Uuid, Size>>,
    banners: Mutex<HashMap<Uuid, Banner>>,
    carts: Mutex<HashMap<Uuid, Cart>>,
    orders: Mutex<HashMap<Uuid, Order>>,
    users: Mutex<HashMap<Uuid, User>>,
    wishlists: Mutex<HashMap<Uuid, Wishlist>>,
    messages: Mutex<HashMap<Uuid, Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert_existing<T: Clone>(map: &Mutex<HashMap<Uuid, T>>, id: Uuid, value: &T) -> bool {
    let mut guard = map.lock();
    match guard.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            true
        }
        None => false,
    }
}

fn sorted_by<T: Clone, K: Ord>(map: &Mutex<HashMap<Uuid, T>>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut all: Vec<T> = map.lock().values().cloned().collect();
    all.sort_by_key(|v| key(v));
    all
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        self.products.lock().insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<bool> {
        Ok(upsert_existing(&self.products, product.id, product))
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.products.lock().get(&id).cloned())
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        Ok(sorted_by(&self.products, |p| std::cmp::Reverse(p.created_at)))
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.products.lock().remove(&id))
    }

    async fn take_stock(&self, moves: &[StockMove]) -> StoreResult<()> {
        let mut products = self.products.lock();
        // Check every move against a scratch copy first so a shortfall
        // leaves nothing decremented.
        let mut scratch: HashMap<Uuid, Product> = HashMap::new();
        for mv in moves {
            let shortfall =
                || StoreError::InsufficientStock { product_id: mv.product_id, size_entry_id: mv.size_entry_id };
            let product = match scratch.entry(mv.product_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(products.get(&mv.product_id).cloned().ok_or_else(shortfall)?),
            };
            let qty = i32::try_from(mv.quantity).map_err(|_| shortfall())?;
            if product.available(mv.size_entry_id) < qty || !product.adjust_stock(mv.size_entry_id, -qty) {
                return Err(shortfall());
            }
        }
        for (id, product) in scratch {
            products.insert(id, product);
        }
        Ok(())
    }

    async fn return_stock(&self, moves: &[StockMove]) -> StoreResult<()> {
        let mut products = self.products.lock();
        for mv in moves {
            if let Some(product) = products.get_mut(&mv.product_id) {
                product.adjust_stock(mv.size_entry_id, i32::try_from(mv.quantity).unwrap_or(i32::MAX));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TaxonomyStore for MemoryStore {
    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        let mut guard = self.categories.lock();
        if guard.values().any(|c| c.name == category.name) {
            return Err(StoreError::Duplicate("Category".into()));
        }
        guard.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> StoreResult<bool> {
        Ok(upsert_existing(&self.categories, category.id, category))
    }

    async fn category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.categories.lock().get(&id).cloned())
    }

    async fn category_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self.categories.lock().values().find(|c| c.name == name).cloned())
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        Ok(sorted_by(&self.categories, |c| std::cmp::Reverse(c.created_at)))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.categories.lock().remove(&id).is_some())
    }

    async fn insert_subcategory(&self, subcategory: &Subcategory) -> StoreResult<()> {
        let mut guard = self.subcategories.lock();
        if guard.values().any(|s| s.name == subcategory.name) {
            return Err(StoreError::Duplicate("Subcategory".into()));
        }
        guard.insert(subcategory.id, subcategory.clone());
        Ok(())
    }

    async fn update_subcategory(&self, subcategory: &Subcategory) -> StoreResult<bool> {
        Ok(upsert_existing(&self.subcategories, subcategory.id, subcategory))
    }

    async fn subcategory(&self, id: Uuid) -> StoreResult<Option<Subcategory>> {
        Ok(self.subcategories.lock().get(&id).cloned())
    }

    async fn subcategory_by_name(&self, name: &str) -> StoreResult<Option<Subcategory>> {
        Ok(self.subcategories.lock().values().find(|s| s.name == name).cloned())
    }

    async fn subcategories(&self) -> StoreResult<Vec<Subcategory>> {
        Ok(sorted_by(&self.subcategories, |s| std::cmp::Reverse(s.created_at)))
    }

    async fn delete_subcategory(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.subcategories.lock().remove(&id).is_some())
    }

    async fn insert_size(&self, size: &Size) -> StoreResult<()> {
        let mut guard = self.sizes.lock();
        if guard.values().any(|s| s.label == size.label) {
            return Err(StoreError::Duplicate("Size".into()));
        }
        guard.insert(size.id, size.clone());
        Ok(())
    }

    async fn update_size(&self, size: &Size) -> StoreResult<bool> {
        Ok(upsert_existing(&self.sizes, size.id, size))
    }

    async fn size(&self, id: Uuid) -> StoreResult<Option<Size>> {
        Ok(self.sizes.lock().get(&id).cloned())
    }

    async fn size_by_label(&self, label: &str) -> StoreResult<Option<Size>> {
        Ok(self.sizes.lock().values().find(|s| s.label == label).cloned())
    }

    async fn sizes(&self) -> StoreResult<Vec<Size>> {
        Ok(sorted_by(&self.sizes, |s| std::cmp::Reverse(s.created_at)))
    }

    async fn delete_size(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.sizes.lock().remove(&id).is_some())
    }
}

#[async_trait]
impl BannerStore for MemoryStore {
    async fn insert_banner(&self, banner: &Banner) -> StoreResult<()> {
        self.banners.lock().insert(banner.id, banner.clone());
        Ok(())
    }

    async fn update_banner(&self, banner: &Banner) -> StoreResult<bool> {
        Ok(upsert_existing(&self.banners, banner.id, banner))
    }

    async fn banner(&self, id: Uuid) -> StoreResult<Option<Banner>> {
        Ok(self.banners.lock().get(&id).cloned())
    }

    async fn banners(&self) -> StoreResult<Vec<Banner>> {
        Ok(sorted_by(&self.banners, |b| b.created_at))
    }

    async fn delete_banner(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.banners.lock().remove(&id).is_some())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart(&self, user_id: Uuid) -> StoreResult<Option<Cart>> {
        Ok(self.carts.lock().get(&user_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        self.carts.lock().insert(cart.user_id, cart.clone());
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        if let Some(cart) = self.carts.lock().get_mut(&user_id) {
            cart.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        self.orders.lock().insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&self, order: &Order, expected: OrderState) -> StoreResult<bool> {
        let mut guard = self.orders.lock();
        match guard.get_mut(&order.id) {
            Some(stored) if stored.state() == expected => {
                let invoice_number = stored.invoice_number.take();
                *stored = Order { invoice_number, ..order.clone() };
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_invoice_number(&self, id: Uuid, number: &str) -> StoreResult<Option<String>> {
        let mut guard = self.orders.lock();
        Ok(guard.get_mut(&id).map(|o| o.invoice_number.get_or_insert_with(|| number.to_string()).clone()))
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.lock().get(&id).cloned())
    }

    async fn order_by_gateway_id(&self, razorpay_order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .orders
            .lock()
            .values()
            .find(|o| o.razorpay_order_id.as_deref() == Some(razorpay_order_id))
            .cloned())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders = sorted_by(&self.orders, |o| std::cmp::Reverse(o.created_at));
        orders.retain(|o| o.user_id == user_id);
        Ok(orders)
    }

    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        Ok(sorted_by(&self.orders, |o| std::cmp::Reverse(o.created_at)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut guard = self.users.lock();
        if guard.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Duplicate("User".into()));
        }
        guard.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        Ok(upsert_existing(&self.users, user.id, user))
    }

    async fn user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.lock().get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.lock().values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        Ok(sorted_by(&self.users, |u| u.created_at))
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn wishlist(&self, user_id: Uuid) -> StoreResult<Option<Wishlist>> {
        Ok(self.wishlists.lock().get(&user_id).cloned())
    }

    async fn save_wishlist(&self, wishlist: &Wishlist) -> StoreResult<()> {
        self.wishlists.lock().insert(wishlist.user_id, wishlist.clone());
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.messages.lock().insert(message.id, message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &Message) -> StoreResult<bool> {
        Ok(upsert_existing(&self.messages, message.id, message))
    }

    async fn message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        Ok(self.messages.lock().get(&id).cloned())
    }

    async fn messages(&self) -> StoreResult<Vec<Message>> {
        Ok(sorted_by(&self.messages, |m| std::cmp::Reverse(m.created_at)))
    }

    async fn delete_message(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.messages.lock().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    use crate::domain::{OrderLine, OrderStatus, PaymentMethod, PricingPolicy, ShippingAddress, SizeEntry};

    #[tokio::test]
    async fn take_stock_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = Product::create("A", Decimal::from(10), 5);
        let b = Product::create("B", Decimal::from(10), 1);
        store.insert_product(&a).await.unwrap();
        store.insert_product(&b).await.unwrap();

        let moves = [
            StockMove { product_id: a.id, size_entry_id: None, quantity: 2 },
            StockMove { product_id: b.id, size_entry_id: None, quantity: 2 },
        ];
        let err = store.take_stock(&moves).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { product_id, .. } if product_id == b.id));
        assert_eq!(store.product(a.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.product(b.id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn repeated_moves_on_one_product_accumulate() {
        let store = MemoryStore::new();
        let mut p = Product::create("Tee", Decimal::ZERO, 0);
        p.sizes = vec![SizeEntry::new(Uuid::new_v4(), Some("M".into()), Decimal::from(10), 3)];
        p.reprice();
        let entry = p.sizes[0].id;
        store.insert_product(&p).await.unwrap();

        let mv = StockMove { product_id: p.id, size_entry_id: Some(entry), quantity: 2 };
        assert!(store.take_stock(&[mv, mv]).await.is_err());
        store.take_stock(&[mv]).await.unwrap();
        let after = store.product(p.id).await.unwrap().unwrap();
        assert_eq!(after.available(Some(entry)), 1);
        assert_eq!(after.stock, 1);

        store.return_stock(&[mv]).await.unwrap();
        assert_eq!(store.product(p.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let store = MemoryStore::new();
        store.insert_size(&Size::create("M")).await.unwrap();
        assert!(matches!(store.insert_size(&Size::create("M")).await, Err(StoreError::Duplicate(_))));
    }

    fn order() -> Order {
        let line = OrderLine {
            product_id: Uuid::new_v4(),
            size_entry_id: None,
            size_label: None,
            product_name: "Mug".into(),
            image: None,
            quantity: 1,
            price: Decimal::from(10),
            discounted_price: Decimal::from(10),
            discount_percentage: Decimal::ZERO,
        };
        let address = ShippingAddress {
            city: "Pune".into(),
            state: "MH".into(),
            pincode: "411001".into(),
            ..Default::default()
        };
        let policy = PricingPolicy::default();
        Order::create(Uuid::new_v4(), vec![line], address, PaymentMethod::CashOnDelivery, &policy).unwrap()
    }

    #[tokio::test]
    async fn stale_order_updates_are_refused() {
        let store = MemoryStore::new();
        let placed = order();
        store.insert_order(&placed).await.unwrap();

        let mut confirmed = placed.clone();
        confirmed.transition(OrderStatus::Confirmed).unwrap();
        assert!(store.update_order(&confirmed, placed.state()).await.unwrap());

        let mut cancelled = placed.clone();
        cancelled.transition(OrderStatus::Cancelled).unwrap();
        assert!(!store.update_order(&cancelled, placed.state()).await.unwrap());
        assert_eq!(store.order(placed.id).await.unwrap().unwrap().status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn invoice_number_is_set_once_and_survives_updates() {
        let store = MemoryStore::new();
        let placed = order();
        store.insert_order(&placed).await.unwrap();

        assert_eq!(store.set_invoice_number(placed.id, "INV-1").await.unwrap().as_deref(), Some("INV-1"));
        assert_eq!(store.set_invoice_number(placed.id, "INV-2").await.unwrap().as_deref(), Some("INV-1"));
        assert_eq!(store.set_invoice_number(Uuid::new_v4(), "INV-3").await.unwrap(), None);

        let mut shipped = placed.clone();
        shipped.transition(OrderStatus::Shipped).unwrap();
        assert!(store.update_order(&shipped, placed.state()).await.unwrap());
        assert_eq!(store.order(placed.id).await.unwrap().unwrap().invoice_number.as_deref(), Some("INV-1"));
    }
}
