//! In-memory pub/sub for single-node deployments.

use dashmap::DashMap;
use tokio::sync::broadcast;

use chaoyue_core::types::ChannelMessage;

/// In-memory pub/sub implementation.
#[derive(Debug)]
pub struct MemoryPubSub {
    /// Channel name → broadcast sender
    channels: DashMap<String, broadcast::Sender<ChannelMessage>>,
    /// Buffer size for channels
    buffer_size: usize,
}

impl MemoryPubSub {
    /// Create a new in-memory pub/sub
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: DashMap::new(),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Publish a message to a channel, returning how many receivers got it
    pub fn publish(&self, channel: &str, payload: &[u8]) -> u64 {
        let sent = match self.channels.get(channel) {
            Some(tx) => tx.send(ChannelMessage::new(channel, payload.to_vec())),
            None => return 0,
        };
        match sent {
            Ok(delivered) => delivered as u64,
            Err(_) => {
                self.channels
                    .remove_if(channel, |_, tx| tx.receiver_count() == 0);
                0
            }
        }
    }

    /// Subscribe to a channel, returns a receiver
    ///
    /// Channels whose receivers have all been dropped are released first.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChannelMessage> {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .subscribe()
    }

    /// Number of channels with a registered sender.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let pubsub = MemoryPubSub::new(8);
        assert_eq!(pubsub.publish("orders", b"hello"), 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let pubsub = MemoryPubSub::new(8);
        let mut first = pubsub.subscribe("orders");
        let mut second = pubsub.subscribe("orders");

        assert_eq!(pubsub.publish("orders", b"paid"), 2);

        let msg = first.recv().await.unwrap();
        assert_eq!(msg.channel, "orders");
        assert_eq!(msg.payload, b"paid");
        assert_eq!(second.recv().await.unwrap().payload, b"paid");
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_released() {
        let pubsub = MemoryPubSub::new(8);
        for i in 0..100 {
            drop(pubsub.subscribe(&format!("ch{i}")));
        }
        assert_eq!(pubsub.channel_count(), 1);

        assert_eq!(pubsub.publish("ch99", b"late"), 0);
        assert_eq!(pubsub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_live_subscription_survives_release() {
        let pubsub = MemoryPubSub::new(8);
        let mut kept = pubsub.subscribe("orders");
        drop(pubsub.subscribe("audit"));
        drop(pubsub.subscribe("billing"));

        assert_eq!(pubsub.channel_count(), 2);
        assert_eq!(pubsub.publish("orders", b"still here"), 1);
        assert_eq!(kept.recv().await.unwrap().payload, b"still here");
    }
}
