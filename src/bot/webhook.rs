//! Webhook listener.
//!
//! teloxide registers the webhook with Telegram, serves updates over axum and
//! removes the webhook again when the dispatcher stops.

use std::net::SocketAddr;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::info;
use url::Url;

use crate::client::telegram::ThrottledBot;
use crate::config::Config;

/// Public URL and bind address of the webhook.
fn endpoint(config: &Config) -> anyhow::Result<(Url, SocketAddr)> {
    let raw = config
        .webhook_url
        .as_deref()
        .context("WEBHOOK_URL is required in webhook mode")?;
    let url = Url::parse(raw).with_context(|| format!("WEBHOOK_URL is not a valid URL: {}", raw))?;

    Ok((url, SocketAddr::from(([0, 0, 0, 0], config.webhook_port))))
}

/// Serve updates through the webhook until the dispatcher shuts down.
pub async fn start_webhook(
    config: &Config,
    mut dispatcher: Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey>,
    bot: ThrottledBot,
) -> anyhow::Result<()> {
    let (url, address) = endpoint(config)?;

    let mut options = Options::new(address, url.clone());
    if let Some(secret) = &config.webhook_secret {
        options = options.secret_token(secret.clone());
    }

    info!(
        "Webhook {} on {} (secret token: {})",
        url,
        address,
        config.webhook_secret.is_some()
    );

    // Registration goes through the inner bot, outside the throttle queue.
    let listener = webhooks::axum(bot.inner().clone(), options)
        .await
        .context("webhook registration failed")?;

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("Webhook listener error"),
        )
        .await;

    info!("Webhook listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{BotMode, ModerationConfig};

    fn config(url: Option<&str>) -> Config {
        Config {
            bot_token: "token".to_string(),
            bot_mode: BotMode::Webhook,
            webhook_url: url.map(str::to_string),
            webhook_port: 8443,
            webhook_secret: None,
            reconnect_delay: Duration::from_secs(5),
            moderation: ModerationConfig::default(),
        }
    }

    #[test]
    fn test_endpoint_binds_all_interfaces() {
        let (url, address) = endpoint(&config(Some("https://example.org/hook"))).unwrap();
        assert_eq!(url.path(), "/hook");
        assert_eq!(address, SocketAddr::from(([0, 0, 0, 0], 8443)));
    }

    #[test]
    fn test_endpoint_rejects_missing_or_bad_url() {
        assert!(endpoint(&config(None)).is_err());
        assert!(endpoint(&config(Some("not a url"))).is_err());
    }
}
