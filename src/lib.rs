//! Storefront backend
//!
//! JSON REST service for a small shop:
//! - Catalog: products (flat or per-size price and stock), categories,
//!   subcategories, sizes and banners
//! - Per-user carts with price snapshots
//! - Orders paid cash-on-delivery or through a Razorpay-compatible gateway,
//!   with guarded stock commits and invoice PDFs
//! - Accounts with bearer tokens and emailed password-reset codes
//! - Wishlists and contact messages

pub mod app;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod services;
pub mod store;

pub use error::{AppError, Result};
