//! Domain event publishing.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::DomainEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Fire and forget. Failures are logged, never returned.
    async fn publish(&self, event: DomainEvent);
}

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    pub async fn connect(url: &str) -> Result<Self, async_nats::ConnectError> {
        Ok(Self::new(async_nats::connect(url).await?))
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        let payload = match serde_json::to_vec(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%subject, error = %e, "could not encode event");
                return;
            }
        };
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            warn!(%subject, error = %e, "event publish failed");
        }
    }
}

#[derive(Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: DomainEvent) {
        info!(subject = %event.subject(), ?event, "domain event");
    }
}
