//! Domain model: aggregates, value objects and events.
pub mod cart;
pub mod catalog;
pub mod engagement;
pub mod events;
pub mod order;
pub mod pricing;
pub mod user;

pub use cart::{Cart, CartError, CartLine, LineSnapshot};
pub use catalog::{Banner, Category, Gender, ImageRef, Product, Size, SizeEntry, SizeSelector, Subcategory};
pub use engagement::{Message, Wishlist};
pub use events::{DomainEvent, OrderEvent};
pub use order::{Order, OrderError, OrderLine, OrderState, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};
pub use pricing::{Discount, PriceQuote, PricingPolicy, Totals};
pub use user::{OtpError, User, UserAddress, UserType};
