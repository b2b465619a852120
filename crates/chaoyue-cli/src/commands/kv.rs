//! Key and value CLI commands.

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use chaoyue_core::config::AppConfig;
use chaoyue_core::error::AppError;
use chaoyue_core::types::KeyTtl;

use crate::output::{self, OutputFormat};

/// Arguments for `get`
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Key, without the namespace prefix
    pub key: String,
}

/// Arguments for `set`
#[derive(Debug, Args)]
pub struct SetArgs {
    /// Key, without the namespace prefix
    pub key: String,
    /// Value stored as UTF-8 text
    pub value: String,
    /// Time-to-live in seconds (0 = no expiry, default = configured TTL)
    #[arg(short, long)]
    pub ttl: Option<u64>,
}

/// Arguments for `del`
#[derive(Debug, Args)]
pub struct DelArgs {
    /// Keys to delete
    #[arg(required = true)]
    pub keys: Vec<String>,
}

/// Arguments for `keys`
#[derive(Debug, Args)]
pub struct KeysArgs {
    /// Glob pattern inside the namespace
    #[arg(default_value = "*")]
    pub pattern: String,
}

/// Arguments for `incr`
#[derive(Debug, Args)]
pub struct IncrArgs {
    /// Counter key
    pub key: String,
    /// Amount to add
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    pub delta: i64,
    /// Counting window in seconds
    #[arg(short, long, default_value = "60")]
    pub window: u64,
}

/// Arguments for `ttl`
#[derive(Debug, Args)]
pub struct TtlArgs {
    /// Key, without the namespace prefix
    pub key: String,
}

/// Arguments for `expire`
#[derive(Debug, Args)]
pub struct ExpireArgs {
    /// Key, without the namespace prefix
    pub key: String,
    /// Time-to-live in seconds (0 removes the expiry)
    pub seconds: u64,
}

/// Arguments for `purge`
#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Glob pattern inside the namespace
    pub pattern: String,
    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Key display row
#[derive(Debug, Serialize, Tabled)]
struct KeyRow {
    /// Key
    key: String,
    /// TTL
    ttl: String,
}

/// Single value display
#[derive(Debug, Serialize)]
struct ValueView {
    key: String,
    value: Option<String>,
}

/// Counter display
#[derive(Debug, Serialize)]
struct CounterView {
    key: String,
    count: i64,
    window_seconds: u64,
}

/// Execute `get`
pub async fn get(args: &GetArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let value = cache
        .get_bytes(&args.key)
        .await?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

    match format {
        OutputFormat::Json => output::print_item(
            &ValueView {
                key: args.key.clone(),
                value,
            },
            format,
        ),
        OutputFormat::Table => match value {
            Some(v) => println!("{v}"),
            None => output::print_warning(&format!("Key '{}' not found", args.key)),
        },
    }
    Ok(())
}

/// Execute `set`
pub async fn set(args: &SetArgs, config: &AppConfig) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let ttl = match args.ttl {
        Some(secs) => Some(Duration::from_secs(secs)),
        None => cache.default_ttl(),
    };
    cache.put_string(&args.key, &args.value, ttl).await?;

    output::print_success(&format!("Stored '{}'", cache.prefix().apply(&args.key)));
    Ok(())
}

/// Execute `del`
pub async fn del(args: &DelArgs, config: &AppConfig) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let removed = cache.delete_many(&args.keys).await?;

    output::print_success(&format!("Deleted {removed} of {} keys", args.keys.len()));
    Ok(())
}

/// Execute `keys`
pub async fn keys(args: &KeysArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let keys = cache.keys(&args.pattern).await?;

    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let ttl = cache.ttl(&key).await?;
        rows.push(KeyRow {
            key,
            ttl: describe_ttl(&ttl),
        });
    }

    if rows.is_empty() && format == OutputFormat::Table {
        println!("{}", no_match(&args.pattern));
        return Ok(());
    }
    output::print_list(&rows, format);
    Ok(())
}

/// Execute `incr`
pub async fn incr(args: &IncrArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let count = cache
        .increment(&args.key, args.delta, Duration::from_secs(args.window))
        .await?;

    match format {
        OutputFormat::Json => output::print_item(
            &CounterView {
                key: args.key.clone(),
                count,
                window_seconds: args.window,
            },
            format,
        ),
        OutputFormat::Table => {
            output::print_kv("Key", &args.key);
            output::print_kv("Count", &count.to_string());
            output::print_kv("Window", &format!("{}s", args.window));
        }
    }
    Ok(())
}

/// Execute `ttl`
pub async fn ttl(args: &TtlArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let ttl = cache.ttl(&args.key).await?;

    match format {
        OutputFormat::Json => output::print_item(&ttl, format),
        OutputFormat::Table => output::print_kv(&args.key, &describe_ttl(&ttl)),
    }
    Ok(())
}

/// Execute `expire`
pub async fn expire(args: &ExpireArgs, config: &AppConfig) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    if cache
        .expire(&args.key, Duration::from_secs(args.seconds))
        .await?
    {
        if args.seconds == 0 {
            output::print_success(&format!("'{}' no longer expires", args.key));
        } else {
            output::print_success(&format!("'{}' expires in {}s", args.key, args.seconds));
        }
    } else {
        output::print_warning(&format!("Key '{}' not found", args.key));
    }
    Ok(())
}

/// Execute `purge`
pub async fn purge(args: &PurgeArgs, config: &AppConfig) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let keys = cache.keys(&args.pattern).await?;

    if keys.is_empty() {
        println!("{}", no_match(&args.pattern));
        return Ok(());
    }

    if !args.yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Delete {} keys matching '{}{}'?",
                keys.len(),
                cache.prefix(),
                args.pattern
            ))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = cache.delete_many(&keys).await?;
    output::print_success(&format!("Purged {removed} keys"));
    Ok(())
}

fn no_match(pattern: &str) -> String {
    format!("No keys match '{pattern}'.")
}

/// Human-readable remaining lifetime
fn describe_ttl(ttl: &KeyTtl) -> String {
    match ttl {
        KeyTtl::Missing => "missing".to_string(),
        KeyTtl::Persistent => "none".to_string(),
        KeyTtl::Expires(remaining) => format!("{:.3}s", remaining.as_secs_f64()),
    }
}
