//! Library root for `whoasked-bot`.
//!
//! Whoasked is a Slack bot that quietly keeps track of who @-mentioned you or
//! replied to your messages, so you can catch up later:
//! - Every channel message is checked for mentions and thread replies
//! - Matches are kept per person for a few days, up to a fixed count
//! - `!whoasked` (or `/whoasked`) lists the most recent ones
//!
//! The bot integrates with Slack for chat and SurrealDB for storage. Both sit
//! behind traits, so the recording and query logic runs without either.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use anyhow::anyhow;
use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the whoasked runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with database and chat clients
/// - Starts the main event loop for processing messages
pub async fn start(config: Config) -> Void {
    info!("Starting whoasked-bot ...");
    info!("Keeping up to {} record(s) per user for {} day(s).", config.max_messages, config.storage_days);

    // Start the crypto provider.
    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install the default crypto provider."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
