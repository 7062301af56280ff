//! Persistence and messaging.
//!
//! # Tables
//!
//! - `users` - staff accounts and roles
//! - `products` - catalog and live stock
//! - `orders` / `order_items` - committed sales
//! - `business_settings` - single-row shop configuration
//!
//! Both backends implement [`Store`]; the PostgreSQL one is what runs in
//! production, the in-memory one backs tests and `POS_STORE=memory`.

pub mod memory;
pub mod postgres;
pub mod publisher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{BusinessSettings, Order, Product, User};
use crate::domain::checkout::{Cancellation, CheckoutRejection, CheckoutRequest, Placement};
use crate::domain::reporting::OrderRecord;

pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use publisher::EventPublisher;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The checkout rules refused the operation; nothing was written.
    #[error(transparent)]
    Rejected(#[from] CheckoutRejection),
}

/// Catalog listing filter. A category of `"all"` or `"Todas"` means no filter.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl ProductFilter {
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all") && *c != "Todas")
    }

    pub fn matches(&self, product: &Product) -> bool {
        product.active
            && self.category().map_or(true, |c| product.category == c)
            && self.search_term().map_or(true, |t| product.matches(t))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Catalog
    // =========================================================================

    /// Active products matching the filter, ordered by name.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;
    /// Active product by id.
    async fn get_product(&self, id: Uuid) -> Result<Product, StoreError>;
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn archive_product(&self, id: Uuid) -> Result<(), StoreError>;
    /// Active products with `stock <= threshold`.
    async fn count_low_stock(&self, threshold: u32) -> Result<u64, StoreError>;

    // =========================================================================
    // Users
    // =========================================================================

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn get_user(&self, id: Uuid) -> Result<User, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
    /// Users who have sold something cannot be deleted, only deactivated.
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;
    async fn count_users(&self) -> Result<u64, StoreError>;

    // =========================================================================
    // Settings
    // =========================================================================

    async fn settings(&self) -> Result<BusinessSettings, StoreError>;
    async fn save_settings(&self, settings: &BusinessSettings) -> Result<(), StoreError>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// Price the request against live stock and commit order, items and
    /// stock in one transaction. On any error nothing is written.
    async fn place_order(&self, request: &CheckoutRequest) -> Result<Placement, StoreError>;
    /// Mark a paid order cancelled and restock its items, atomically.
    async fn cancel_order(&self, id: Uuid) -> Result<Cancellation, StoreError>;
    async fn get_order(&self, id: Uuid) -> Result<Order, StoreError>;
    /// Orders with `from <= created_at < until`, any status.
    async fn order_records(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<OrderRecord>, StoreError>;
}
