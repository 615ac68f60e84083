//! Moderation engine.
//!
//! Consumes platform events one at a time, in arrival order, and routes
//! them to the invite handler or the command handlers. Each event is
//! handled to completion before the next one is read.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::actions::GroupActions;
use crate::client::{
    ConnectionState, DisconnectReason, InboundMessage, Jid, MessagingClient, PlatformEvent,
    SendOptions,
};
use crate::config::ModerationConfig;
use crate::events::{self, SpamTracker};
use crate::i18n::get_text;
use crate::plugins;
use crate::utils::parse_command;

/// Shared, read-only context handed to every handler.
pub struct AppState<C> {
    /// Platform client.
    pub client: Arc<C>,

    /// Moderation settings.
    pub config: Arc<ModerationConfig>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: MessagingClient> AppState<C> {
    pub fn new(client: Arc<C>, config: ModerationConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// Group action executor bound to this client.
    pub fn actions(&self) -> GroupActions<'_, C> {
        GroupActions::new(self.client.as_ref(), self.config.grace_delay)
    }

    pub fn is_group(&self, chat: &Jid) -> bool {
        chat.is_group(&self.config.group_domain)
    }

    /// Localized notice for `key`.
    pub fn text(&self, key: &str) -> String {
        get_text(&self.config.locale, key).replace("{prefix}", &self.config.prefix)
    }

    /// Send the notice for `key` to `chat`.
    pub async fn reply(&self, chat: &Jid, key: &str) -> anyhow::Result<()> {
        self.client
            .send_text(chat, &self.text(key), SendOptions::default())
            .await?;
        Ok(())
    }
}

/// Mutable state owned by one engine instance.
#[derive(Debug, Default)]
pub struct ModerationState {
    /// Promote self when invited into a group.
    pub auto_promote: bool,

    /// Per (chat, sender) spam records.
    pub spam: SpamTracker,
}

/// The moderation engine.
pub struct ModerationEngine<C> {
    app: AppState<C>,
    state: ModerationState,
}

impl<C: MessagingClient> ModerationEngine<C> {
    pub fn new(client: Arc<C>, config: ModerationConfig) -> Self {
        let state = ModerationState {
            auto_promote: false,
            spam: SpamTracker::new(config.spam),
        };

        Self {
            app: AppState::new(client, config),
            state,
        }
    }

    /// Point the engine at a fresh client after a reconnect, keeping its state.
    pub fn attach(&mut self, client: Arc<C>) {
        self.app.client = client;
    }

    pub fn auto_promote(&self) -> bool {
        self.state.auto_promote
    }

    /// Drain `events` until the platform reports a disconnect.
    ///
    /// Handler errors are logged and never stop the loop.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<PlatformEvent>) -> DisconnectReason {
        while let Some(event) = events.recv().await {
            match event {
                PlatformEvent::Message(msg) => {
                    let chat = msg.chat_id.clone();
                    if let Err(e) = self.handle(msg).await {
                        error!("Error handling message in {}: {:#}", chat, e);
                    }
                }
                PlatformEvent::Connection(ConnectionState::Connected) => {
                    info!("Connected as {}", self.app.client.own_identity());
                }
                PlatformEvent::Connection(ConnectionState::Disconnected(reason)) => {
                    return reason;
                }
            }
        }

        DisconnectReason::ConnectionLost("event stream closed".to_string())
    }

    /// Handle one inbound message.
    pub async fn handle(&mut self, msg: InboundMessage) -> anyhow::Result<()> {
        if msg.is_from_self || !msg.has_payload() {
            return Ok(());
        }

        if let Some(invite) = &msg.invite {
            events::invite::handle_invite(&self.app, &self.state, &msg, invite).await;
        }

        let Some(text) = msg.text.as_deref() else {
            return Ok(());
        };

        let Some(invocation) = parse_command(text, &self.app.config.prefix) else {
            return Ok(());
        };

        if invocation.command.is_empty() {
            return Ok(());
        }

        if !self.app.config.is_authorized(&msg.sender_id) {
            debug!(
                "Ignoring command '{}' from unauthorized sender {}",
                invocation.command, msg.sender_id
            );
            return Ok(());
        }

        debug!(
            "Command '{}' from {} in {}",
            invocation.command, msg.sender_id, msg.chat_id
        );

        plugins::command_handler(&self.app, &mut self.state, &msg, &invocation).await
    }
}
