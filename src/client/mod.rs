//! Messaging client abstraction.
//!
//! The moderation engine never talks to a chat platform directly. It goes
//! through [`MessagingClient`], which a platform adapter (see [`telegram`])
//! implements. Tests use the recording client in `mock`.

#[cfg(test)]
pub mod mock;
pub mod telegram;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Opaque `user@domain` identifier of a chat or participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid(String);

impl Jid {
    pub fn new(user: impl fmt::Display, domain: &str) -> Self {
        Self(format!("{}@{}", user, domain))
    }

    /// Parse a command argument into an identifier.
    ///
    /// A leading `@` (mention style) is dropped. Bare identifiers get the
    /// default user domain appended.
    pub fn from_arg(arg: &str, default_domain: &str) -> Self {
        let raw = arg.trim_start_matches('@');
        if raw.contains('@') {
            Self(raw.to_string())
        } else {
            Self::new(raw, default_domain)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before `@`, including any device suffix.
    pub fn user(&self) -> &str {
        self.0.split_once('@').map(|(u, _)| u).unwrap_or(&self.0)
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or("")
    }

    /// Strip a `:device` suffix from the user part.
    pub fn normalized(&self) -> Self {
        match self.user().split_once(':') {
            Some((user, _)) => Self::new(user, self.domain()),
            None => self.clone(),
        }
    }

    pub fn is_group(&self, group_domain: &str) -> bool {
        self.domain() == group_domain
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Jid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Platform handle of a single message, used to retract it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef(pub String);

/// A group-invite notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInvite {
    /// Participant the invite is addressed to.
    pub invitee: Jid,
}

/// One observed chat event.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageRef,
    pub chat_id: Jid,
    /// Equals `chat_id` in direct chats.
    pub sender_id: Jid,
    pub is_from_self: bool,
    pub text: Option<String>,
    pub invite: Option<GroupInvite>,
}

impl InboundMessage {
    pub fn is_group_invite_event(&self) -> bool {
        self.invite.is_some()
    }

    pub fn has_payload(&self) -> bool {
        self.text.is_some() || self.invite.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Credentials were revoked. Not retried.
    LoggedOut,
    ConnectionLost(String),
    /// Operator-requested stop (Ctrl+C).
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected(DisconnectReason),
}

/// Everything a platform adapter emits, in arrival order.
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    Message(InboundMessage),
    Connection(ConnectionState),
}

/// Extra metadata for outgoing text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub mentions: Vec<Jid>,
}

impl SendOptions {
    pub fn mention(jid: Jid) -> Self {
        Self { mentions: vec![jid] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: Jid,
    pub is_admin: bool,
}

/// Membership snapshot of a group. Fetched per operation, never cached.
#[derive(Debug, Clone, Default)]
pub struct GroupMetadata {
    pub participants: Vec<Participant>,
}

impl GroupMetadata {
    pub fn admins(&self) -> impl Iterator<Item = &Jid> {
        self.participants.iter().filter(|p| p.is_admin).map(|p| &p.id)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session logged out")]
    LoggedOut,
    #[error("platform API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Chat platform capabilities the moderation engine relies on.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Identity the engine runs as.
    fn own_identity(&self) -> Jid;

    async fn send_text(&self, chat: &Jid, text: &str, options: SendOptions) -> ClientResult<()>;

    async fn send_delete(&self, chat: &Jid, message: &MessageRef) -> ClientResult<()>;

    async fn group_metadata(&self, chat: &Jid) -> ClientResult<GroupMetadata>;

    async fn remove_participants(&self, chat: &Jid, ids: &[Jid]) -> ClientResult<()>;

    async fn demote_participant(&self, chat: &Jid, id: &Jid) -> ClientResult<()>;

    async fn promote_participant(&self, chat: &Jid, id: &Jid) -> ClientResult<()>;
}
