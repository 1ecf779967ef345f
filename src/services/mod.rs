//! Application services. Each one owns a slice of the workflow and talks to
//! the store and external clients through trait objects.

use uuid::Uuid;

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod engagement;
pub mod invoices;
pub mod items;
pub mod orders;

pub use auth::{AuthDeps, AuthService, Claims, ProfileUpdate, SignupInput, TokenKeys};
pub use cart::{CartService, CartView};
pub use catalog::{CatalogService, ProductDraft, SizeInput, SubcategoryDraft};
pub use engagement::{EngagementService, MessageDraft, MessageUpdate};
pub use invoices::{Invoice, InvoiceService};
pub use items::{normalize_item, normalize_items, ItemRequest};
pub use orders::{CheckoutRequest, GatewayCheckout, OrderDeps, OrderService, PaymentConfirmation};

/// The authenticated caller, as far as services care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl From<&crate::domain::User> for Actor {
    fn from(user: &crate::domain::User) -> Self {
        Self { user_id: user.id, is_admin: user.is_admin() }
    }
}
