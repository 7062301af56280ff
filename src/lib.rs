//! OpenSASE POS
//!
//! Self-hosted point of sale and inventory service for a coffee shop.
//!
//! ## Features
//! - Register cart with live totals and stock-bounded quantities
//! - Atomic checkout that re-validates stock and decrements it
//! - Sales reports and a weekly dashboard
//! - Role-based access for admins, salespeople and stock keepers
//! - Typed HTTP client and register state for front ends

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

pub use api::{build_app, AppState};
pub use config::{Config, ConfigError};
pub use domain::aggregates::{Cart, Order, Product, Role, User};
pub use infra::{InMemoryStore, PgStore, Store, StoreError};
