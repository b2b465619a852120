//! Subscription listeners.
//!
//! A listener is driven by [`spawn_listener`], which drains a channel
//! receiver on a background task until the subscription closes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use chaoyue_core::types::ChannelMessage;

/// Handles messages delivered on a subscribed channel.
#[async_trait]
pub trait MessageListener: Send + Sync + 'static {
    /// Called once per received message, in delivery order.
    async fn on_message(&self, message: ChannelMessage);
}

/// Drive `listener` with every message from `receiver`.
///
/// Messages dropped because the listener fell behind are logged and
/// skipped. The task ends when the channel closes.
pub fn spawn_listener(
    mut receiver: broadcast::Receiver<ChannelMessage>,
    listener: Arc<dyn MessageListener>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(message) => listener.on_message(message).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Listener fell behind, messages dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Listener that logs every message and checks that its body is JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

#[async_trait]
impl MessageListener for LoggingListener {
    async fn on_message(&self, message: ChannelMessage) {
        let body = String::from_utf8_lossy(&message.payload);
        info!(channel = %message.channel, body = %body, "Received message");

        if let Err(e) = message.json::<serde_json::Map<String, serde_json::Value>>() {
            error!(channel = %message.channel, body = %body, error = %e, "Message body is not a JSON object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageListener for Collecting {
        async fn on_message(&self, message: ChannelMessage) {
            let body = message.payload_str().unwrap_or("<binary>").to_string();
            self.seen.lock().await.push(body);
        }
    }

    #[tokio::test]
    async fn test_listener_receives_in_order_and_stops_on_close() {
        let (tx, rx) = broadcast::channel(8);
        let listener = Arc::new(Collecting::default());
        let handle = spawn_listener(rx, listener.clone());

        tx.send(ChannelMessage::new("orders", "one")).unwrap();
        tx.send(ChannelMessage::new("orders", "two")).unwrap();
        drop(tx);

        handle.await.unwrap();
        assert_eq!(*listener.seen.lock().await, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_logging_listener_accepts_any_body() {
        let (tx, rx) = broadcast::channel(8);
        let handle = spawn_listener(rx, Arc::new(LoggingListener));

        tx.send(ChannelMessage::new("orders", r#"{"id":1}"#)).unwrap();
        tx.send(ChannelMessage::new("orders", "not json")).unwrap();
        drop(tx);

        handle.await.unwrap();
    }
}
