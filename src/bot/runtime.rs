//! Bot runtime - connection supervision.
//!
//! Connects to Telegram, feeds updates to the moderation engine and
//! reconnects after a lost connection. A logout is terminal.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::dispatcher::ModerationEngine;
use super::webhook;
use crate::client::telegram::{self, Domains, TelegramClient};
use crate::client::{ClientError, ConnectionState, DisconnectReason, PlatformEvent};
use crate::config::{BotMode, Config};

/// Updates buffered between the listener and the engine.
const EVENT_BUFFER: usize = 256;

/// What the supervisor does after a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    Reconnect,
    Stop,
}

/// Listener errors that end the session. Anything else is logged and polling goes on.
fn listener_disconnect(err: &RequestError) -> Option<DisconnectReason> {
    match err {
        RequestError::Api(ApiError::InvalidToken) => Some(DisconnectReason::LoggedOut),
        _ => None,
    }
}

fn next_step(reason: &DisconnectReason) -> NextStep {
    match reason {
        DisconnectReason::ConnectionLost(_) => NextStep::Reconnect,
        DisconnectReason::LoggedOut | DisconnectReason::Shutdown => NextStep::Stop,
    }
}

/// Run the bot until shutdown or logout.
pub async fn run(config: &Config) {
    let mut engine: Option<ModerationEngine<TelegramClient>> = None;

    loop {
        let reason = match session(config, &mut engine).await {
            Ok(reason) => reason,
            Err(ClientError::LoggedOut) => DisconnectReason::LoggedOut,
            Err(e) => DisconnectReason::ConnectionLost(e.to_string()),
        };

        match (&reason, next_step(&reason)) {
            (DisconnectReason::LoggedOut, _) => {
                error!("Logged out: the bot token was rejected. Update BOT_TOKEN and restart.");
                return;
            }
            (_, NextStep::Stop) => {
                info!("Shutting down");
                return;
            }
            (reason, NextStep::Reconnect) => {
                warn!(
                    "Disconnected ({:?}), reconnecting in {:?}...",
                    reason, config.reconnect_delay
                );
                tokio::time::sleep(config.reconnect_delay).await;
            }
        }
    }
}

/// One connection: connect, then drive the engine until the stream ends.
async fn session(
    config: &Config,
    engine: &mut Option<ModerationEngine<TelegramClient>>,
) -> Result<DisconnectReason, ClientError> {
    let client = TelegramClient::connect(
        &config.bot_token,
        Domains::from_config(&config.moderation),
    )
    .await?;
    let client = Arc::new(client);

    // Moderation state survives reconnects.
    if let Some(engine) = engine.as_mut() {
        engine.attach(client.clone());
    }
    let engine = engine
        .get_or_insert_with(|| ModerationEngine::new(client.clone(), config.moderation.clone()));

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let listener = tokio::spawn(listen(config.clone(), client.as_ref().clone(), tx));

    let reason = engine.run(&mut rx).await;
    listener.abort();
    Ok(reason)
}

/// Receive updates and forward them as platform events.
async fn listen(config: Config, client: TelegramClient, events: mpsc::Sender<PlatformEvent>) {
    let bot = client.bot();
    let mut dispatcher = Dispatcher::builder(bot.clone(), telegram::schema())
        .dependencies(dptree::deps![client, events.clone()])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build();

    let _ = events
        .send(PlatformEvent::Connection(ConnectionState::Connected))
        .await;

    let reason = match config.bot_mode {
        BotMode::Polling => {
            info!("Starting bot in polling mode...");
            let shutdown = dispatcher.shutdown_token();
            let logout_events = events.clone();
            // getUpdates keeps failing once the token is revoked.
            let error_handler = Arc::new(move |err: RequestError| {
                let events = logout_events.clone();
                let shutdown = shutdown.clone();
                async move {
                    match listener_disconnect(&err) {
                        Some(reason) => {
                            error!("Update listener stopped: {}", err);
                            let _ = events
                                .send(PlatformEvent::Connection(ConnectionState::Disconnected(
                                    reason,
                                )))
                                .await;
                            let _ = shutdown.shutdown();
                        }
                        None => error!("Error from update listener: {}", err),
                    }
                }
            });

            let listener = Polling::builder(bot.clone()).delete_webhook().await.build();
            dispatcher
                .dispatch_with_listener(listener, error_handler)
                .await;
            DisconnectReason::Shutdown
        }
        BotMode::Webhook => {
            info!("Starting bot in webhook mode...");
            match webhook::start_webhook(&config, dispatcher, bot).await {
                Ok(()) => DisconnectReason::Shutdown,
                Err(e) => DisconnectReason::ConnectionLost(format!("{:#}", e)),
            }
        }
    };

    let _ = events
        .send(PlatformEvent::Connection(ConnectionState::Disconnected(reason)))
        .await;
}
