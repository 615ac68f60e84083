//! Group invite handler.
//!
//! Promotes the engine's own identity when it is invited into a group and
//! auto promote is on.

use tracing::debug;

use crate::bot::dispatcher::{AppState, ModerationState};
use crate::client::{GroupInvite, InboundMessage, MessagingClient};

/// Handle a group-invite event.
pub async fn handle_invite<C: MessagingClient>(
    app: &AppState<C>,
    state: &ModerationState,
    msg: &InboundMessage,
    invite: &GroupInvite,
) {
    let actions = app.actions();

    if invite.invitee.normalized() != actions.own_id() {
        return;
    }

    if !state.auto_promote {
        debug!("Invited into {}, auto promote is off", msg.chat_id);
        return;
    }

    if !app.is_group(&msg.chat_id) {
        return;
    }

    actions.promote_self(&msg.chat_id).await;
}
