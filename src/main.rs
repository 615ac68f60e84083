//! Warden - prefix-command moderation agent for group chats.
//!
//! Watches the message stream of a chat platform, recognizes prefixed text
//! commands and performs group-membership actions and spam mitigation.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `client` - Messaging client trait and the Telegram adapter
//! - `actions` - Group action executor (promote/demote/remove)
//! - `bot` - Moderation engine and connection runtime
//! - `plugins` - Command handlers
//! - `events` - Spam tracking and group invites
//! - `i18n` - User-facing notices
//! - `utils` - Command parsing helpers

mod actions;
mod bot;
mod client;
mod config;
mod events;
mod i18n;
mod plugins;
mod utils;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warden=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Warden...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);
    info!("Command prefix: {}", config.moderation.prefix);

    if config.moderation.owner_ids.is_empty() {
        info!("No owner IDs configured, commands are open to everyone");
    } else {
        info!("Bot owners: {:?}", config.moderation.owner_ids);
    }

    i18n::init();

    bot::run(&config).await;

    Ok(())
}
