//! Recording client for tests.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    ClientError, ClientResult, GroupMetadata, Jid, MessageRef, MessagingClient, Participant,
    SendOptions,
};

/// A platform call as observed by [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendText { chat: Jid, text: String, mentions: Vec<Jid> },
    SendDelete { chat: Jid, message: MessageRef },
    GroupMetadata { chat: Jid },
    Remove { chat: Jid, ids: Vec<Jid> },
    Demote { chat: Jid, id: Jid },
    Promote { chat: Jid, id: Jid },
}

impl Call {
    /// Calls that read or change group membership.
    pub fn is_group_action(&self) -> bool {
        !matches!(self, Call::SendText { .. } | Call::SendDelete { .. })
    }
}

pub struct MockClient {
    own: Jid,
    participants: Mutex<Vec<Participant>>,
    failing: Mutex<HashSet<Jid>>,
    metadata_fails: Mutex<bool>,
    send_fails: Mutex<bool>,
    calls: Mutex<Vec<Call>>,
}

impl MockClient {
    pub fn new(own: &str) -> Self {
        Self {
            own: Jid::from(own),
            participants: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            metadata_fails: Mutex::new(false),
            send_fails: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_participant(self, id: &str, is_admin: bool) -> Self {
        self.participants.lock().push(Participant {
            id: Jid::from(id),
            is_admin,
        });
        self
    }

    /// Membership calls targeting `id` fail.
    pub fn failing_for(self, id: &str) -> Self {
        self.failing.lock().insert(Jid::from(id));
        self
    }

    pub fn failing_metadata(self) -> Self {
        *self.metadata_fails.lock() = true;
        self
    }

    pub fn failing_sends(self) -> Self {
        *self.send_fails.lock() = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn group_actions(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_group_action).collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn check(&self, id: &Jid) -> ClientResult<()> {
        if self.failing.lock().contains(id) {
            Err(ClientError::Api(format!("refused for {}", id)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    fn own_identity(&self) -> Jid {
        self.own.clone()
    }

    async fn send_text(&self, chat: &Jid, text: &str, options: SendOptions) -> ClientResult<()> {
        self.record(Call::SendText {
            chat: chat.clone(),
            text: text.to_string(),
            mentions: options.mentions,
        });
        if *self.send_fails.lock() {
            return Err(ClientError::Network("send failed".to_string()));
        }
        Ok(())
    }

    async fn send_delete(&self, chat: &Jid, message: &MessageRef) -> ClientResult<()> {
        self.record(Call::SendDelete {
            chat: chat.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn group_metadata(&self, chat: &Jid) -> ClientResult<GroupMetadata> {
        self.record(Call::GroupMetadata { chat: chat.clone() });
        if *self.metadata_fails.lock() {
            return Err(ClientError::Network("metadata unavailable".to_string()));
        }
        Ok(GroupMetadata {
            participants: self.participants.lock().clone(),
        })
    }

    async fn remove_participants(&self, chat: &Jid, ids: &[Jid]) -> ClientResult<()> {
        self.record(Call::Remove {
            chat: chat.clone(),
            ids: ids.to_vec(),
        });
        ids.iter().try_for_each(|id| self.check(id))
    }

    async fn demote_participant(&self, chat: &Jid, id: &Jid) -> ClientResult<()> {
        self.record(Call::Demote {
            chat: chat.clone(),
            id: id.clone(),
        });
        self.check(id)
    }

    async fn promote_participant(&self, chat: &Jid, id: &Jid) -> ClientResult<()> {
        self.record(Call::Promote {
            chat: chat.clone(),
            id: id.clone(),
        });
        self.check(id)
    }
}
