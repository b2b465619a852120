//! CLI command definitions and dispatch.

pub mod config;
pub mod kv;
pub mod pubsub;

use clap::{Parser, Subcommand};

use chaoyue_cache::NamespacedCache;
use chaoyue_core::config::AppConfig;
use chaoyue_core::error::AppError;

use crate::output::{self, OutputFormat};

/// chaoyue: namespaced cache administration
#[derive(Debug, Parser)]
#[command(name = "chaoyue-cli", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read a string value
    Get(kv::GetArgs),
    /// Store a string value
    Set(kv::SetArgs),
    /// Delete one or more keys
    Del(kv::DelArgs),
    /// List keys matching a glob pattern
    Keys(kv::KeysArgs),
    /// Increment a rate counter
    Incr(kv::IncrArgs),
    /// Show the remaining time-to-live of a key
    Ttl(kv::TtlArgs),
    /// Set the time-to-live of a key
    Expire(kv::ExpireArgs),
    /// Delete every key matching a glob pattern
    Purge(kv::PurgeArgs),
    /// Publish a message to a channel
    Publish(pubsub::PublishArgs),
    /// Print messages received on a channel
    Subscribe(pubsub::SubscribeArgs),
    /// Check that the cache backend is reachable
    Ping,
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Get(args) => kv::get(args, config, self.format).await,
            Commands::Set(args) => kv::set(args, config).await,
            Commands::Del(args) => kv::del(args, config).await,
            Commands::Keys(args) => kv::keys(args, config, self.format).await,
            Commands::Incr(args) => kv::incr(args, config, self.format).await,
            Commands::Ttl(args) => kv::ttl(args, config, self.format).await,
            Commands::Expire(args) => kv::expire(args, config).await,
            Commands::Purge(args) => kv::purge(args, config).await,
            Commands::Publish(args) => pubsub::publish(args, config).await,
            Commands::Subscribe(args) => pubsub::subscribe(args, config, self.format).await,
            Commands::Ping => ping(config).await,
            Commands::Config(args) => config::execute(args, config, self.format).await,
        }
    }
}

/// Helper: build the facade for the configured provider
pub async fn open_cache(config: &AppConfig) -> Result<NamespacedCache, AppError> {
    if config.cache.provider == "memory" {
        tracing::warn!("Using the in-memory provider; data lives only for this command");
    }
    NamespacedCache::from_config(&config.cache).await
}

async fn ping(config: &AppConfig) -> Result<(), AppError> {
    let cache = open_cache(config).await?;
    if cache.health_check().await? {
        output::print_success("PONG");
        Ok(())
    } else {
        Err(AppError::service_unavailable("Cache backend did not answer PING"))
    }
}
