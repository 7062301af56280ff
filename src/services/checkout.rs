//! Checkout processor.
//!
//! Drives one attempt through [`CheckoutStage`], logging every transition:
//! the request is validated, the store prices and commits it atomically,
//! and committed events are handed to the publisher.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::domain::checkout::{CheckoutRejection, CheckoutRequest, CheckoutStage};
use crate::infra::{EventPublisher, Store, StoreError};

/// Stage tracker for a single attempt.
#[derive(Debug)]
struct Attempt {
    user_id: Uuid,
    stage: CheckoutStage,
}

impl Attempt {
    fn start(user_id: Uuid) -> Self { Self { user_id, stage: CheckoutStage::Idle } }

    fn advance(&mut self, next: CheckoutStage) {
        match self.stage.advance(next) {
            Some(stage) => {
                tracing::debug!(user_id = %self.user_id, from = %self.stage, to = %stage, "checkout stage");
                self.stage = stage;
            }
            None => tracing::warn!(user_id = %self.user_id, from = %self.stage, to = %next, "illegal checkout transition ignored"),
        }
    }

    fn reject(&mut self, err: StoreError) -> StoreError {
        self.advance(CheckoutStage::Rejected);
        match &err {
            StoreError::Rejected(reason) => tracing::info!(user_id = %self.user_id, %reason, "checkout rejected"),
            other => tracing::error!(user_id = %self.user_id, error = %other, "checkout failed"),
        }
        err
    }
}

#[derive(Clone)]
pub struct CheckoutProcessor {
    store: Arc<dyn Store>,
    publisher: EventPublisher,
}

impl CheckoutProcessor {
    pub fn new(store: Arc<dyn Store>, publisher: EventPublisher) -> Self { Self { store, publisher } }

    /// Validate, persist and announce one sale. On error nothing was written.
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<Order, StoreError> {
        let mut attempt = Attempt::start(request.user_id);
        attempt.advance(CheckoutStage::Validating);
        if let Err(reason) = request.normalized() {
            return Err(attempt.reject(reason.into()));
        }

        attempt.advance(CheckoutStage::Persisting);
        let placement = match self.store.place_order(request).await {
            Ok(placement) => placement,
            Err(err) => return Err(attempt.reject(err)),
        };

        attempt.advance(CheckoutStage::Committed);
        tracing::info!(
            order_id = %placement.order.id,
            user_id = %placement.order.user_id,
            total = %placement.order.total_amount,
            items = placement.order.items.len(),
            "order placed"
        );
        self.publisher.publish(&placement.events).await;
        Ok(placement.order)
    }

    /// Cancel a paid order and restock it.
    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, StoreError> {
        let cancellation = self.store.cancel_order(order_id).await.inspect_err(|err| {
            if let StoreError::Rejected(CheckoutRejection::AlreadyCancelled) = err {
                tracing::info!(%order_id, "order already cancelled");
            }
        })?;
        tracing::info!(%order_id, "order cancelled");
        self.publisher.publish(&cancellation.events).await;
        Ok(cancellation.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::draft;
    use crate::domain::aggregates::{OrderStatus, Product};
    use crate::domain::checkout::RequestedLine;
    use crate::domain::value_objects::PaymentMethod;
    use crate::infra::InMemoryStore;
    use rust_decimal::Decimal;

    async fn processor(stock: u32) -> (CheckoutProcessor, Arc<InMemoryStore>, Product) {
        let store = Arc::new(InMemoryStore::new());
        let product = Product::create(draft("LAT-1", "Latte", "Café", Decimal::new(350, 2), stock)).unwrap();
        store.insert_product(&product).await.unwrap();
        (CheckoutProcessor::new(store.clone(), EventPublisher::disabled()), store, product)
    }

    fn request(lines: Vec<RequestedLine>) -> CheckoutRequest {
        CheckoutRequest { user_id: Uuid::now_v7(), payment_method: PaymentMethod::default(), lines }
    }

    #[tokio::test]
    async fn test_checkout_commits_order() {
        let (processor, store, product) = processor(5).await;
        let order = processor.checkout(&request(vec![RequestedLine { product_id: product.id, quantity: 2 }])).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total_amount.amount(), Decimal::new(700, 2));
        assert_eq!(store.get_product(product.id).await.unwrap().stock, 3);
        assert_eq!(store.get_order(order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected_before_store() {
        let (processor, _, _) = processor(5).await;
        let err = processor.checkout(&request(Vec::new())).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(CheckoutRejection::EmptyCart)));
    }

    #[tokio::test]
    async fn test_cancel_twice_is_rejected() {
        let (processor, store, product) = processor(5).await;
        let order = processor.checkout(&request(vec![RequestedLine { product_id: product.id, quantity: 5 }])).await.unwrap();
        let cancelled = processor.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(store.get_product(product.id).await.unwrap().stock, 5);
        assert!(matches!(processor.cancel(order.id).await, Err(StoreError::Rejected(CheckoutRejection::AlreadyCancelled))));
    }
}
