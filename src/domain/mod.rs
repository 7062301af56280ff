//! Domain layer: aggregates, value objects and the pure rules of the shop.
pub mod access;
pub mod aggregates;
pub mod checkout;
pub mod events;
pub mod reporting;
pub mod value_objects;
