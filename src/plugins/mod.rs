//! Command handlers.
//!
//! Add a command by:
//! 1. Adding a variant to [`Command`] and its token to `Command::parse`
//! 2. Declaring its scope in `Command::scope`
//! 3. Routing it in `command_handler()`

pub mod admin;
pub mod antiflood;
pub mod ban;

use tracing::warn;

use crate::bot::dispatcher::{AppState, ModerationState};
use crate::client::{InboundMessage, Jid, MessagingClient};
use crate::utils::CommandInvocation;

/// All bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle promoting self on group invites
    AutoPromote,
    /// Demote every other admin
    Pdm,
    /// Remove every non-admin
    Ghost,
    /// Remove one member
    Kick,
    /// Spam mitigation
    Antibot,
}

/// Where a command may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Group,
    Direct,
}

impl Command {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "autopromote" => Some(Self::AutoPromote),
            "pdm" => Some(Self::Pdm),
            "ghost" => Some(Self::Ghost),
            "kick" => Some(Self::Kick),
            "antibot" => Some(Self::Antibot),
            _ => None,
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            Self::AutoPromote => Scope::Direct,
            Self::Pdm | Self::Ghost | Self::Kick | Self::Antibot => Scope::Group,
        }
    }
}

/// Route a parsed command to its handler.
pub async fn command_handler<C: MessagingClient>(
    app: &AppState<C>,
    state: &mut ModerationState,
    msg: &InboundMessage,
    invocation: &CommandInvocation,
) -> anyhow::Result<()> {
    let chat = &msg.chat_id;

    let Some(command) = Command::parse(&invocation.command) else {
        return app.reply(chat, "common.unknown_command").await;
    };

    match (command.scope(), app.is_group(chat)) {
        (Scope::Direct, true) => return app.reply(chat, "autopromote.direct_only").await,
        (Scope::Group, false) => return app.reply(chat, "common.group_only").await,
        _ => {}
    }

    match command {
        Command::AutoPromote => admin::autopromote_command(app, state, chat, invocation).await,
        Command::Pdm => admin::pdm_command(app, chat).await,
        Command::Ghost => ban::ghost_command(app, chat).await,
        Command::Kick => ban::kick_command(app, chat, invocation).await,
        Command::Antibot => antiflood::antibot_command(app, state, msg, invocation).await,
    }
}

/// Log when the engine is not an admin of `chat`. The action still runs and
/// the platform's refusal is logged per call.
pub(crate) async fn note_admin_status<C: MessagingClient>(
    app: &AppState<C>,
    chat: &Jid,
    command: Command,
) {
    if !app.actions().is_caller_admin(chat).await {
        warn!(
            "{:?} in {}: not an admin there, the platform will likely refuse",
            command, chat
        );
    }
}
