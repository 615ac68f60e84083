//! Antibot command handler.

use crate::bot::dispatcher::{AppState, ModerationState};
use crate::client::{InboundMessage, MessagingClient};
use crate::events::Mitigation;
use crate::events::antiflood::check_antibot;
use crate::utils::CommandInvocation;

/// Handle `antibot warn|delete|kick`.
///
/// The invoking message itself is what gets counted.
pub async fn antibot_command<C: MessagingClient>(
    app: &AppState<C>,
    state: &mut ModerationState,
    msg: &InboundMessage,
    invocation: &CommandInvocation,
) -> anyhow::Result<()> {
    let Some(mode) = invocation.arg(0).and_then(|a| a.parse::<Mitigation>().ok()) else {
        return app.reply(&msg.chat_id, "antibot.usage").await;
    };

    check_antibot(app, &mut state.spam, msg, mode).await
}
