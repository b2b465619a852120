//! Redis connection management.

use std::time::Duration;

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use chaoyue_core::config::cache::RedisCacheConfig;
use chaoyue_core::error::{AppError, ErrorKind};
use chaoyue_core::result::AppResult;

/// Redis client wrapper with connection management.
#[derive(Clone)]
pub struct RedisClient {
    /// Client handle, used to open dedicated pub/sub connections.
    client: Client,
    /// Redis connection manager (multiplexed, reconnecting).
    conn: ConnectionManager,
    /// Masked URL for diagnostics.
    display_url: String,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("url", &self.display_url)
            .finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Create a new Redis client from configuration.
    ///
    /// The configured database is selected through the connection URL, so
    /// reconnects made by the connection manager land on the same database.
    pub async fn connect(config: &RedisCacheConfig) -> AppResult<Self> {
        let url = config.connection_url();
        let display_url = mask_redis_url(&url);
        info!(url = %display_url, "Connecting to Redis");

        let client = Client::open(url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to create Redis client", e)
        })?;

        let timeout = Duration::from_secs(config.connect_timeout_seconds.max(1));
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client.clone()))
            .await
            .map_err(|_| {
                AppError::service_unavailable(format!(
                    "Timed out connecting to Redis at {display_url}"
                ))
            })?
            .map_err(|e| {
                AppError::with_source(ErrorKind::Cache, "Failed to connect to Redis", e)
            })?;

        info!(url = %display_url, "Successfully connected to Redis");
        Ok(Self {
            client,
            conn,
            display_url,
        })
    }

    /// Get a mutable clone of the connection manager.
    pub fn conn_mut(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Get the underlying client handle.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The connection URL with any password masked.
    pub fn display_url(&self) -> &str {
        &self.display_url
    }
}

/// Mask password in Redis URL for safe logging.
pub fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos >= scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
