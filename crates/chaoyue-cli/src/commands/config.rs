//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use chaoyue_cache::redis::mask_redis_url;
use chaoyue_core::config::AppConfig;
use chaoyue_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration and print a summary
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut shown = config.clone();
            shown.cache.redis.url = mask_redis_url(&shown.cache.redis.url);
            output::print_item(&shown, format);
        }
        ConfigCommand::Validate => {
            validate(config)?;
            output::print_success("Configuration is valid");
            output::print_kv("Provider", &config.cache.provider);
            output::print_kv("Key prefix", &config.cache.key_prefix);
            output::print_kv(
                "Default TTL",
                &format!("{}s", config.cache.default_ttl_seconds),
            );
            if config.cache.provider == "redis" {
                output::print_kv("Redis", &mask_redis_url(&config.cache.redis.connection_url()));
            }
            output::print_kv("Log level", &config.logging.level);
        }
    }

    Ok(())
}

/// Check settings that deserialize fine but cannot work.
fn validate(config: &AppConfig) -> Result<(), AppError> {
    if !matches!(config.cache.provider.as_str(), "memory" | "redis") {
        return Err(AppError::validation(format!(
            "Unknown cache provider '{}'",
            config.cache.provider
        )));
    }
    if config.cache.provider == "redis" && !config.cache.redis.url.starts_with("redis") {
        return Err(AppError::validation(format!(
            "Redis URL must use the redis:// or rediss:// scheme, got '{}'",
            mask_redis_url(&config.cache.redis.url)
        )));
    }
    if !matches!(config.logging.format.as_str(), "json" | "pretty") {
        return Err(AppError::validation(format!(
            "Unknown log format '{}'",
            config.logging.format
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaoyue_core::error::ErrorKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config = AppConfig::default();
        config.cache.provider = "memcached".to_string();
        let err = validate(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_non_redis_scheme_is_rejected() {
        let mut config = AppConfig::default();
        config.cache.provider = "redis".to_string();
        config.cache.redis.url = "http://localhost:6379".to_string();
        assert!(validate(&config).is_err());
    }
}
