//! Admin management commands.
//!
//! Auto promote toggle and the mass demotion command.

use tracing::info;

use super::Command;
use crate::bot::dispatcher::{AppState, ModerationState};
use crate::client::{Jid, MessagingClient};
use crate::utils::CommandInvocation;

/// Handle `autopromote on|off` (direct chats only).
pub async fn autopromote_command<C: MessagingClient>(
    app: &AppState<C>,
    state: &mut ModerationState,
    chat: &Jid,
    invocation: &CommandInvocation,
) -> anyhow::Result<()> {
    let arg = invocation.arg(0).map(str::to_lowercase);

    match arg.as_deref() {
        Some("on") => {
            state.auto_promote = true;
            info!("Auto promote enabled by {}", chat);
            app.reply(chat, "autopromote.enabled").await
        }
        Some("off") => {
            state.auto_promote = false;
            info!("Auto promote disabled by {}", chat);
            app.reply(chat, "autopromote.disabled").await
        }
        _ => app.reply(chat, "autopromote.usage").await,
    }
}

/// Handle `pdm`: demote every admin except the engine itself.
pub async fn pdm_command<C: MessagingClient>(app: &AppState<C>, chat: &Jid) -> anyhow::Result<()> {
    super::note_admin_status(app, chat, Command::Pdm).await;

    let actions = app.actions();
    let own = actions.own_id();
    actions.demote_all_admins_except(chat, &own).await;
    Ok(())
}
