//! Publish/subscribe CLI commands.

use clap::Args;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use chaoyue_core::config::AppConfig;
use chaoyue_core::error::AppError;
use chaoyue_core::types::ChannelMessage;

use crate::output::{self, OutputFormat};

/// Arguments for `publish`
#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Channel name (not prefixed)
    pub channel: String,
    /// Message body
    pub message: String,
}

/// Arguments for `subscribe`
#[derive(Debug, Args)]
pub struct SubscribeArgs {
    /// Channel name (not prefixed)
    pub channel: String,
    /// Exit after this many messages
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

/// Received message display
#[derive(Debug, Serialize)]
struct MessageView {
    channel: String,
    payload: String,
}

impl From<ChannelMessage> for MessageView {
    fn from(msg: ChannelMessage) -> Self {
        Self {
            payload: String::from_utf8_lossy(&msg.payload).into_owned(),
            channel: msg.channel,
        }
    }
}

/// Execute `publish`
pub async fn publish(args: &PublishArgs, config: &AppConfig) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let receivers = cache.publish(&args.channel, &args.message).await?;

    output::print_success(&format!(
        "Published to '{}' ({} receivers)",
        args.channel, receivers
    ));
    Ok(())
}

/// Execute `subscribe`
///
/// Runs until interrupted with Ctrl-C, the subscription closes, or
/// `--count` messages have been printed.
pub async fn subscribe(
    args: &SubscribeArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let cache = super::open_cache(config).await?;
    let mut rx = cache.subscribe(&args.channel).await?;

    if format == OutputFormat::Table {
        println!("Listening on '{}' (Ctrl-C to stop)", args.channel);
    }

    let mut seen = 0usize;
    loop {
        if args.count.is_some_and(|limit| seen >= limit) {
            break;
        }

        tokio::select! {
            received = rx.recv() => match received {
                Ok(msg) => {
                    seen += 1;
                    print_message(MessageView::from(msg), format);
                }
                Err(RecvError::Lagged(skipped)) => {
                    output::print_warning(&format!("Skipped {skipped} messages"));
                }
                Err(RecvError::Closed) => {
                    output::print_warning("Subscription closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn print_message(view: MessageView, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
        OutputFormat::Table => println!("[{}] {}", view.channel, view.payload),
    }
}
