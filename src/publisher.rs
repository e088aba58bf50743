//! Fire-and-forget publication of domain events to NATS.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    /// Publisher that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Publishes each event on its aggregate subject. Failures are logged and
    /// swallowed; the state change they describe is already persisted.
    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else { return };
        for event in events {
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(error) => {
                    tracing::warn!(%error, "failed to encode domain event");
                    continue;
                }
            };
            if let Err(error) = client.publish(event.subject().to_string(), payload.into()).await {
                tracing::warn!(%error, subject = event.subject(), "failed to publish domain event");
            }
        }
    }
}
