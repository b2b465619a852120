//! Redis pub/sub subscriptions.
//!
//! One background task per subscribed channel owns a dedicated pub/sub
//! connection and fans messages out through a `tokio::sync::broadcast`
//! channel, so any number of local receivers share a single Redis
//! subscription.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use chaoyue_core::error::{AppError, ErrorKind};
use chaoyue_core::result::AppResult;
use chaoyue_core::types::ChannelMessage;

/// How often an idle subscription checks whether anyone still listens.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

type Subscriptions = Arc<DashMap<String, broadcast::Sender<ChannelMessage>>>;

/// Redis pub/sub subscription registry.
#[derive(Debug, Clone)]
pub struct RedisPubSub {
    /// Client used to open pub/sub connections.
    client: redis::Client,
    /// Channel name → local fan-out sender.
    subscriptions: Subscriptions,
    /// Buffered messages per channel before slow receivers start lagging.
    buffer_size: usize,
}

impl RedisPubSub {
    /// Create a registry for the given client.
    pub fn new(client: redis::Client, buffer_size: usize) -> Self {
        Self {
            client,
            subscriptions: Arc::new(DashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Number of channels with an active Redis subscription.
    pub fn channel_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Subscribe to a channel.
    ///
    /// The Redis subscription is confirmed before the receiver is
    /// returned, so messages published after this call are delivered.
    pub async fn subscribe(&self, channel: &str) -> AppResult<broadcast::Receiver<ChannelMessage>> {
        if let Some(sender) = self.subscriptions.get(channel) {
            return Ok(sender.subscribe());
        }

        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to open pub/sub connection", e)
        })?;
        pubsub.subscribe(channel).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to subscribe to channel '{channel}'"),
                e,
            )
        })?;

        // Another task may have subscribed while we were connecting.
        let (tx, rx) = match self.subscriptions.entry(channel.to_string()) {
            Entry::Occupied(existing) => return Ok(existing.get().subscribe()),
            Entry::Vacant(slot) => {
                let (tx, rx) = broadcast::channel(self.buffer_size);
                slot.insert(tx.clone());
                (tx, rx)
            }
        };

        info!(channel, "Subscribed to Redis channel");

        let channel = channel.to_string();
        let subscriptions = Arc::clone(&self.subscriptions);
        tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);
            idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    next = stream.next() => {
                        let Some(msg) = next else {
                            error!(channel = %channel, "Redis subscription stream ended");
                            subscriptions.remove(&channel);
                            break;
                        };
                        let payload: Vec<u8> = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(channel = %channel, error = %e, "Dropping undecodable pub/sub message");
                                continue;
                            }
                        };
                        let message = ChannelMessage::new(msg.get_channel_name(), payload);
                        if tx.send(message).is_err() && release(&subscriptions, &channel) {
                            break;
                        }
                    }
                    _ = idle_check.tick() => {
                        if release(&subscriptions, &channel) {
                            break;
                        }
                    }
                }
            }
            // Dropping the stream closes the dedicated connection.
        });

        Ok(rx)
    }
}

/// Drop the registration for `channel` if no local receiver is left.
///
/// Runs under the map's shard lock, so a concurrent `subscribe` either
/// sees the old sender before removal or registers a fresh one after it.
fn release(subscriptions: &Subscriptions, channel: &str) -> bool {
    let released = subscriptions
        .remove_if(channel, |_, tx| tx.receiver_count() == 0)
        .is_some();
    if released {
        info!(channel, "Released Redis subscription without receivers");
    }
    released
}
