//! Domain events
use crate::domain::value_objects::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockDecremented { product_id: Uuid, quantity: u32, remaining: u32 },
    StockRestored { product_id: Uuid, quantity: u32, remaining: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, total: Money },
    Cancelled { order_id: Uuid },
}

impl DomainEvent {
    /// Short name used as the routing suffix when publishing.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockDecremented { .. }) => "product.stock_decremented",
            Self::Product(ProductEvent::StockRestored { .. }) => "product.stock_restored",
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::Cancelled { .. }) => "order.cancelled",
        }
    }
}
