//! The subscription seam between the engine and the gossip transport.

use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// A transport that can deliver raw gossip payloads for a topic.
///
/// The engine subscribes once at startup and consumes payloads until the
/// channel closes. Implementations are free to back this with any bus; the
/// engine only interprets the bytes.
#[async_trait]
pub trait AnnouncementSource: Send + Sync + 'static {
    /// Subscribes to a topic, returning the payload stream.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>>;
}

/// In-process announcement source.
///
/// Used by tests and embedded setups: payloads published with
/// [`ChannelSource::publish`] are delivered to the matching topic's
/// subscriber.
#[derive(Default)]
pub struct ChannelSource {
    topics: Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>,
}

impl ChannelSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a payload to a topic's subscriber, if any.
    ///
    /// Returns whether a subscriber existed and accepted the payload.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> bool {
        let sender = self.topics.lock().get(topic).cloned();
        match sender {
            Some(sender) => sender.send(payload).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl AnnouncementSource for ChannelSource {
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(64);
        let replaced = self.topics.lock().insert(topic.to_string(), tx);
        if replaced.is_some() {
            debug!(topic, "replacing existing topic subscriber");
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let source = ChannelSource::new();
        let mut rx = source.subscribe("topic-a").await.unwrap();

        assert!(source.publish("topic-a", b"hello".to_vec()).await);
        assert_eq!(rx.recv().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_dropped() {
        let source = ChannelSource::new();
        assert!(!source.publish("topic-b", b"lost".to_vec()).await);
    }
}
