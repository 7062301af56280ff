//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;
pub mod settings;

pub use product::{Product, ProductDraft, ProductError};
pub use order::{Order, OrderError, OrderItem, OrderStatus, PricedLine, Totals};
pub use cart::{Cart, CartError, CartLine, CartView};
pub use user::{Role, UnknownRole, User, UserDraft};
pub use settings::BusinessSettings;
