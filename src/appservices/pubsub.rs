//! Pub/sub providers and their named factory.

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use futures::stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::factory::{GenericFactory, NamedOptions, ServiceRegistry};

/// Options for one named pub/sub component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubSubProviderOptions {
    /// Name of the pub/sub component on the backing platform.
    pub pub_sub_name: String,
}

impl PubSubProviderOptions {
    pub fn new(pub_sub_name: impl Into<String>) -> Self {
        Self {
            pub_sub_name: pub_sub_name.into(),
        }
    }
}

/// Publishes events to a topic.
#[async_trait]
pub trait PubSubProvider: Send + Sync {
    /// Publish an event, with or without a payload.
    async fn publish_event(&self, event_name: &str, data: Option<Value>) -> anyhow::Result<()>;
}

/// Typed helper over any [`PubSubProvider`].
#[async_trait]
pub trait PubSubExt: PubSubProvider {
    async fn publish<T: Serialize + Sync>(&self, event_name: &str, data: &T) -> anyhow::Result<()> {
        self.publish_event(event_name, Some(serde_json::to_value(data)?))
            .await
    }
}

impl<P: PubSubProvider + ?Sized> PubSubExt for P {}

/// An event as seen by in-process subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub pub_sub_name: String,
    pub event_name: String,
    pub data: Option<Value>,
}

/// Process-local pub/sub over a tokio broadcast channel.
///
/// Publishing with no subscribers succeeds and drops the event.
#[derive(Debug, Clone)]
pub struct InMemoryPubSub {
    options: PubSubProviderOptions,
    sender: broadcast::Sender<PublishedEvent>,
}

impl InMemoryPubSub {
    pub fn new(options: PubSubProviderOptions, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { options, sender }
    }

    pub fn pub_sub_name(&self) -> &str {
        &self.options.pub_sub_name
    }

    /// Stream of events published after this call. Lagging subscribers
    /// skip the events they missed.
    pub fn subscribe(&self) -> impl Stream<Item = PublishedEvent> + Send + 'static {
        let receiver = self.sender.subscribe();
        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subscriber lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

#[async_trait]
impl PubSubProvider for InMemoryPubSub {
    async fn publish_event(&self, event_name: &str, data: Option<Value>) -> anyhow::Result<()> {
        let event = PublishedEvent {
            pub_sub_name: self.options.pub_sub_name.clone(),
            event_name: event_name.to_string(),
            data,
        };

        match self.sender.send(event) {
            Ok(receivers) => debug!("Published '{}' to {} subscribers", event_name, receivers),
            Err(_) => debug!("Published '{}' with no subscribers", event_name),
        }
        Ok(())
    }
}

/// Resolves pub/sub components by logical name.
#[derive(Clone, Debug)]
pub struct PubSubProviderFactory {
    inner: GenericFactory<PubSubProviderOptions, dyn PubSubProvider>,
}

impl PubSubProviderFactory {
    pub fn new<F>(
        services: ServiceRegistry,
        options: NamedOptions<PubSubProviderOptions>,
        create: F,
    ) -> Self
    where
        F: Fn(&ServiceRegistry, Option<&PubSubProviderOptions>) -> anyhow::Result<Arc<dyn PubSubProvider>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            inner: GenericFactory::new(services, options, create),
        }
    }

    pub fn get_pub_sub_provider(&self, name: &str) -> Result<Arc<dyn PubSubProvider>> {
        self.inner.get_item(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.inner.names()
    }
}
