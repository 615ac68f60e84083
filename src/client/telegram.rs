//! Telegram adapter.
//!
//! Implements [`MessagingClient`] over the Bot API and converts incoming
//! updates into [`PlatformEvent`]s.
//!
//! Telegram only lists administrators, so group membership is the admin list
//! merged with a roster of members seen in the chat (senders and joins).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use teloxide::adaptors::Throttle;
use teloxide::adaptors::throttle::Limits;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{Chat, ChatMemberKind, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    ClientError, ClientResult, GroupInvite, GroupMetadata, InboundMessage, Jid, MessageRef,
    MessagingClient, Participant, PlatformEvent, SendOptions,
};
use crate::config::ModerationConfig;
use crate::utils::html_escape;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Members seen per chat.
type Roster = Arc<DashMap<ChatId, HashSet<UserId>>>;

impl From<RequestError> for ClientError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Api(ApiError::InvalidToken) => ClientError::LoggedOut,
            RequestError::Api(api) => ClientError::Api(api.to_string()),
            RequestError::Network(e) => ClientError::Network(e.to_string()),
            other => ClientError::Api(other.to_string()),
        }
    }
}

/// Mapping between Telegram ids and [`Jid`]s.
#[derive(Debug, Clone)]
pub struct Domains {
    pub user: String,
    pub group: String,
}

impl Domains {
    pub fn from_config(config: &ModerationConfig) -> Self {
        Self {
            user: config.user_domain.clone(),
            group: config.group_domain.clone(),
        }
    }

    fn chat_jid(&self, chat: &Chat) -> Jid {
        if chat.is_group() || chat.is_supergroup() {
            Jid::new(chat.id, &self.group)
        } else {
            Jid::new(chat.id, &self.user)
        }
    }

    fn user_jid(&self, id: UserId) -> Jid {
        Jid::new(id, &self.user)
    }

    fn chat_id(&self, jid: &Jid) -> ClientResult<ChatId> {
        jid.user()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| ClientError::InvalidId(jid.to_string()))
    }

    fn user_id(&self, jid: &Jid) -> ClientResult<UserId> {
        jid.normalized()
            .user()
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| ClientError::InvalidId(jid.to_string()))
    }
}

/// Telegram implementation of [`MessagingClient`].
#[derive(Clone)]
pub struct TelegramClient {
    bot: ThrottledBot,
    me: UserId,
    own: Jid,
    domains: Domains,
    roster: Roster,
}

impl TelegramClient {
    /// Create the bot and verify the token with `getMe`.
    ///
    /// A rejected token is reported as [`ClientError::LoggedOut`].
    pub async fn connect(token: &str, domains: Domains) -> ClientResult<Self> {
        let bot = Bot::new(token).throttle(Limits::default());
        let me = bot.get_me().await?;
        info!("Bot username: @{}", me.username());

        Ok(Self {
            own: domains.user_jid(me.id),
            me: me.id,
            bot,
            domains,
            roster: Arc::new(DashMap::new()),
        })
    }

    pub fn bot(&self) -> ThrottledBot {
        self.bot.clone()
    }

    /// Track membership changes visible in `msg`.
    fn observe(&self, msg: &Message) {
        if !msg.chat.is_group() && !msg.chat.is_supergroup() {
            return;
        }

        let mut members = self.roster.entry(msg.chat.id).or_default();
        if let Some(user) = msg.from.as_ref() {
            members.insert(user.id);
        }
        if let Some(joined) = msg.new_chat_members() {
            members.extend(joined.iter().map(|u| u.id));
        }
        if let Some(left) = msg.left_chat_member() {
            members.remove(&left.id);
        }
    }

    fn forget(&self, chat: ChatId, user: UserId) {
        if let Some(mut members) = self.roster.get_mut(&chat) {
            members.remove(&user);
        }
    }

    /// Convert a Telegram message into an [`InboundMessage`].
    fn to_inbound(&self, msg: &Message) -> Option<InboundMessage> {
        if msg.chat.is_channel() {
            return None;
        }
        let from = msg.from.as_ref()?;

        let invite = msg
            .new_chat_members()
            .filter(|joined| joined.iter().any(|u| u.id == self.me))
            .map(|_| GroupInvite {
                invitee: self.own.clone(),
            });

        Some(InboundMessage {
            id: MessageRef(msg.id.0.to_string()),
            chat_id: self.domains.chat_jid(&msg.chat),
            sender_id: self.domains.user_jid(from.id),
            is_from_self: from.id == self.me,
            text: msg.text().map(str::to_string),
            invite,
        })
    }
}

/// Escape `text` for HTML and turn `@<user>` of each mentioned id into a user link.
fn render_mentions(text: &str, mentions: &[Jid]) -> String {
    let mut html = html_escape(text);
    for jid in mentions {
        html = link_mention(&html, jid.normalized().user());
    }
    html
}

/// Replace whole `@<user>` handles only, so `@7` leaves `@70` alone.
fn link_mention(html: &str, user: &str) -> String {
    let handle = format!("@{}", user);
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find(&handle) {
        let end = pos + handle.len();
        out.push_str(&rest[..pos]);
        if rest[end..].starts_with(|c: char| c.is_alphanumeric() || c == '_') {
            out.push_str(&handle);
        } else {
            out.push_str(&format!("<a href=\"tg://user?id={}\">{}</a>", user, handle));
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

#[async_trait]
impl MessagingClient for TelegramClient {
    fn own_identity(&self) -> Jid {
        self.own.clone()
    }

    async fn send_text(&self, chat: &Jid, text: &str, options: SendOptions) -> ClientResult<()> {
        let chat_id = self.domains.chat_id(chat)?;
        if options.mentions.is_empty() {
            self.bot.send_message(chat_id, text).await?;
        } else {
            self.bot
                .send_message(chat_id, render_mentions(text, &options.mentions))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(())
    }

    async fn send_delete(&self, chat: &Jid, message: &MessageRef) -> ClientResult<()> {
        let chat_id = self.domains.chat_id(chat)?;
        let message_id = message
            .0
            .parse::<i32>()
            .map(MessageId)
            .map_err(|_| ClientError::InvalidId(message.0.clone()))?;
        self.bot.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    async fn group_metadata(&self, chat: &Jid) -> ClientResult<GroupMetadata> {
        let chat_id = self.domains.chat_id(chat)?;
        let admins = self.bot.get_chat_administrators(chat_id).await?;

        let mut seen = HashSet::new();
        let mut participants = Vec::new();
        for member in &admins {
            let is_admin = matches!(
                member.kind,
                ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_)
            );
            seen.insert(member.user.id);
            participants.push(Participant {
                id: self.domains.user_jid(member.user.id),
                is_admin,
            });
        }

        if let Some(members) = self.roster.get(&chat_id) {
            participants.extend(
                members
                    .iter()
                    .filter(|id| !seen.contains(*id))
                    .map(|id| Participant {
                        id: self.domains.user_jid(*id),
                        is_admin: false,
                    }),
            );
        }

        debug!("Metadata of {}: {} participant(s)", chat, participants.len());
        Ok(GroupMetadata { participants })
    }

    async fn remove_participants(&self, chat: &Jid, ids: &[Jid]) -> ClientResult<()> {
        let chat_id = self.domains.chat_id(chat)?;
        for jid in ids {
            let user_id = self.domains.user_id(jid)?;
            // Ban then unban = kick
            self.bot.ban_chat_member(chat_id, user_id).await?;
            if let Err(e) = self.bot.unban_chat_member(chat_id, user_id).await {
                warn!("{} removed from {} but still banned: {}", jid, chat, e);
            }
            self.forget(chat_id, user_id);
        }
        Ok(())
    }

    async fn demote_participant(&self, chat: &Jid, id: &Jid) -> ClientResult<()> {
        let chat_id = self.domains.chat_id(chat)?;
        let user_id = self.domains.user_id(id)?;
        // No rights = demote
        self.bot.promote_chat_member(chat_id, user_id).await?;
        Ok(())
    }

    async fn promote_participant(&self, chat: &Jid, id: &Jid) -> ClientResult<()> {
        let chat_id = self.domains.chat_id(chat)?;
        let user_id = self.domains.user_id(id)?;
        self.bot
            .promote_chat_member(chat_id, user_id)
            .can_manage_chat(true)
            .can_delete_messages(true)
            .can_restrict_members(true)
            .can_promote_members(true)
            .can_change_info(true)
            .can_invite_users(true)
            .can_pin_messages(true)
            .await?;
        Ok(())
    }
}

/// Build the update schema that feeds the engine.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    Update::filter_message().endpoint(forward_message)
}

/// Forward a message to the engine, in arrival order.
async fn forward_message(
    msg: Message,
    client: TelegramClient,
    events: mpsc::Sender<PlatformEvent>,
) -> anyhow::Result<()> {
    client.observe(&msg);

    if let Some(inbound) = client.to_inbound(&msg) {
        if inbound.is_group_invite_event() {
            info!("Added to {}", inbound.chat_id);
        }
        events.send(PlatformEvent::Message(inbound)).await?;
    }
    Ok(())
}
