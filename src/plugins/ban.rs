//! Removal commands.
//!
//! `kick` removes one member, `ghost` purges every non-admin.

use tracing::info;

use super::Command;
use crate::actions::PurgeNotices;
use crate::bot::dispatcher::AppState;
use crate::client::{Jid, MessagingClient};
use crate::utils::CommandInvocation;

/// Handle `kick <target>`.
pub async fn kick_command<C: MessagingClient>(
    app: &AppState<C>,
    chat: &Jid,
    invocation: &CommandInvocation,
) -> anyhow::Result<()> {
    let Some(arg) = invocation.arg(0) else {
        return app.reply(chat, "kick.usage").await;
    };

    let target = Jid::from_arg(arg, &app.config.user_domain);
    super::note_admin_status(app, chat, Command::Kick).await;

    app.actions().remove_one(chat, &target).await;
    Ok(())
}

/// Handle `ghost`: announce, wait, then remove every non-admin.
pub async fn ghost_command<C: MessagingClient>(app: &AppState<C>, chat: &Jid) -> anyhow::Result<()> {
    super::note_admin_status(app, chat, Command::Ghost).await;

    let notices = PurgeNotices {
        before: app.text("ghost.start"),
        after: app.text("ghost.done"),
    };

    let actions = app.actions();
    let own = actions.own_id();
    if let Some(report) = actions.remove_all_non_admins_except(chat, &own, &notices).await {
        info!(
            "Purge of {} finished: {} removed, {} failed",
            chat,
            report.succeeded(),
            report.failed
        );
    }
    Ok(())
}
