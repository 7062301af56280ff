//! Domain event fan-out over NATS.
//!
//! Publishing is best effort: a sale that committed stays committed even if
//! the broker is down, so failures are logged and swallowed.

use crate::domain::events::DomainEvent;

pub const SUBJECT_PREFIX: &str = "pos.events";

#[derive(Clone, Debug, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Publisher that only logs.
    pub fn disabled() -> Self { Self::default() }

    pub fn is_connected(&self) -> bool { self.nats.is_some() }

    pub fn subject(event: &DomainEvent) -> String { format!("{SUBJECT_PREFIX}.{}", event.kind()) }

    pub async fn publish(&self, events: &[DomainEvent]) {
        for event in events {
            tracing::info!(kind = event.kind(), "domain event");
            let Some(nats) = &self.nats else { continue };
            let payload = match serde_json::to_vec(event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(kind = event.kind(), error = %e, "could not encode event");
                    continue;
                }
            };
            if let Err(e) = nats.publish(Self::subject(event), payload.into()).await {
                tracing::warn!(kind = event.kind(), error = %e, "could not publish event");
            }
        }
    }
}
