//! Per-user carts with price snapshots taken at add time.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{Cart, CartLine, LineSnapshot, Product, SizeSelector};
use crate::error::{AppError, Result};
use crate::services::items::ItemRequest;
use crate::store::Store;

/// Cart as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_price: Decimal,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let total_price = cart.total();
        Self { items: cart.items, total_price }
    }
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

/// Resolves the size a request names on `product` and snapshots the line.
///
/// A sized product needs a size that exists on it; a product without sizes
/// ignores any size given.
pub(crate) fn snapshot(product: &Product, size: Option<&SizeSelector>) -> Result<LineSnapshot> {
    let entry = match (product.has_sizes(), size) {
        (true, Some(selector)) => Some(
            product
                .find_size(selector)
                .ok_or_else(|| AppError::validation(format!("Invalid size selected for {}", product.name)))?,
        ),
        (true, None) => return Err(AppError::validation(format!("Size required for {}", product.name))),
        (false, _) => None,
    };
    Ok(LineSnapshot {
        product_id: product.id,
        size_entry_id: entry.map(|e| e.id),
        size_label: entry.and_then(|e| e.label.clone()),
        quote: entry.map(|e| e.quote()).unwrap_or_else(|| product.base_quote()),
        product_name: product.name.clone(),
        image: product.first_image().map(str::to_string),
    })
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn load(&self, user_id: Uuid) -> Result<Cart> {
        Ok(self.store.cart(user_id).await?.unwrap_or_else(|| Cart::for_user(user_id)))
    }

    #[instrument(skip(self, item), fields(product_id = %item.product_id, quantity = item.quantity))]
    pub async fn add_item(&self, user_id: Uuid, item: ItemRequest) -> Result<CartView> {
        let product = self.store.product(item.product_id).await?.ok_or_else(|| AppError::not_found("Product"))?;
        let snapshot = snapshot(&product, item.size.as_ref())?;
        let mut cart = self.load(user_id).await?;
        let line = cart.add(snapshot, item.quantity);
        debug!(line_id = %line.id, quantity = line.quantity, "cart line updated");
        self.store.save_cart(&cart).await?;
        Ok(cart.into())
    }

    pub async fn cart(&self, user_id: Uuid) -> Result<CartView> {
        Ok(self.load(user_id).await?.into())
    }

    pub async fn update_item(&self, user_id: Uuid, line_id: Uuid, quantity: i64) -> Result<CartView> {
        let mut cart = self.store.cart(user_id).await?.ok_or_else(|| AppError::not_found("Cart"))?;
        cart.set_quantity(line_id, quantity)?;
        self.store.save_cart(&cart).await?;
        Ok(cart.into())
    }

    pub async fn remove_item(&self, user_id: Uuid, line_id: Uuid) -> Result<CartView> {
        let mut cart = self.store.cart(user_id).await?.ok_or_else(|| AppError::not_found("Cart"))?;
        cart.remove(line_id)?;
        self.store.save_cart(&cart).await?;
        Ok(cart.into())
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<()> {
        self.store.clear_cart(user_id).await?;
        Ok(())
    }
}
