//! Group action executor.
//!
//! Privileged membership operations. Every platform call is isolated: a
//! failure is logged and never escapes, and batch operations keep going
//! past a failed participant.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::{GroupMetadata, Jid, MessagingClient, SendOptions};

/// Outcome of a batch operation, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed
    }
}

/// Notices sent around a purge.
#[derive(Debug, Clone)]
pub struct PurgeNotices {
    pub before: String,
    pub after: String,
}

/// Membership operations against one messaging client.
pub struct GroupActions<'a, C> {
    client: &'a C,
    grace_delay: Duration,
}

impl<'a, C: MessagingClient> GroupActions<'a, C> {
    pub fn new(client: &'a C, grace_delay: Duration) -> Self {
        Self { client, grace_delay }
    }

    /// Own identity without device suffix.
    pub fn own_id(&self) -> Jid {
        self.client.own_identity().normalized()
    }

    async fn metadata(&self, chat: &Jid) -> Option<GroupMetadata> {
        match self.client.group_metadata(chat).await {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Failed to fetch metadata of {}: {}", chat, e);
                None
            }
        }
    }

    /// Check if the engine's own identity is an admin of `chat`.
    ///
    /// Returns `false` when metadata can't be fetched.
    pub async fn is_caller_admin(&self, chat: &Jid) -> bool {
        let own = self.own_id();
        self.metadata(chat)
            .await
            .map(|meta| meta.admins().any(|a| a.normalized() == own))
            .unwrap_or(false)
    }

    /// Demote every admin of `chat` except `keep`.
    pub async fn demote_all_admins_except(&self, chat: &Jid, keep: &Jid) -> BatchReport {
        let mut report = BatchReport::default();
        let Some(meta) = self.metadata(chat).await else {
            return report;
        };

        let keep = keep.normalized();
        for admin in meta.admins().filter(|a| a.normalized() != keep) {
            report.attempted += 1;
            if let Err(e) = self.client.demote_participant(chat, admin).await {
                report.failed += 1;
                warn!("Failed to demote {} in {}: {}", admin, chat, e);
            }
        }

        info!(
            "Demoted {}/{} admin(s) in {}",
            report.succeeded(),
            report.attempted,
            chat
        );
        report
    }

    /// Announce, wait the grace delay, then remove every non-admin except `keep`.
    ///
    /// Returns `None` when the purge was aborted before any removal.
    pub async fn remove_all_non_admins_except(
        &self,
        chat: &Jid,
        keep: &Jid,
        notices: &PurgeNotices,
    ) -> Option<BatchReport> {
        if let Err(e) = self
            .client
            .send_text(chat, &notices.before, SendOptions::default())
            .await
        {
            warn!("Purge of {} aborted, notice not delivered: {}", chat, e);
            return None;
        }

        debug!("Purge of {} starts in {:?}", chat, self.grace_delay);
        tokio::time::sleep(self.grace_delay).await;

        // Fetched after the delay so admins appointed meanwhile are spared.
        let meta = self.metadata(chat).await?;

        let keep = keep.normalized();
        let mut report = BatchReport::default();
        for participant in meta
            .participants
            .iter()
            .filter(|p| !p.is_admin && p.id.normalized() != keep)
        {
            report.attempted += 1;
            if let Err(e) = self
                .client
                .remove_participants(chat, std::slice::from_ref(&participant.id))
                .await
            {
                report.failed += 1;
                warn!("Failed to remove {} from {}: {}", participant.id, chat, e);
            }
        }

        info!(
            "Removed {}/{} member(s) from {}",
            report.succeeded(),
            report.attempted,
            chat
        );

        if let Err(e) = self
            .client
            .send_text(chat, &notices.after, SendOptions::default())
            .await
        {
            warn!("Failed to send purge completion notice to {}: {}", chat, e);
        }

        Some(report)
    }

    /// Remove a single participant. Returns whether the call succeeded.
    pub async fn remove_one(&self, chat: &Jid, target: &Jid) -> bool {
        match self
            .client
            .remove_participants(chat, std::slice::from_ref(target))
            .await
        {
            Ok(()) => {
                info!("Removed {} from {}", target, chat);
                true
            }
            Err(e) => {
                warn!("Failed to remove {} from {}: {}", target, chat, e);
                false
            }
        }
    }

    /// Grant the engine's own identity admin rights in `chat`.
    pub async fn promote_self(&self, chat: &Jid) -> bool {
        let own = self.own_id();
        match self.client.promote_participant(chat, &own).await {
            Ok(()) => {
                info!("Promoted self in {}", chat);
                true
            }
            Err(e) => {
                warn!("Auto promote failed in {}: {}", chat, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{Call, MockClient};

    const GROUP: &str = "-100@group";
    const SELF: &str = "1@user";

    fn notices() -> PurgeNotices {
        PurgeNotices {
            before: "before".to_string(),
            after: "after".to_string(),
        }
    }

    #[tokio::test]
    async fn test_is_caller_admin() {
        let client = MockClient::new("1:5@user").with_participant(SELF, true);
        let actions = GroupActions::new(&client, Duration::ZERO);
        assert!(actions.is_caller_admin(&Jid::from(GROUP)).await);

        let client = MockClient::new(SELF).with_participant(SELF, false);
        let actions = GroupActions::new(&client, Duration::ZERO);
        assert!(!actions.is_caller_admin(&Jid::from(GROUP)).await);
    }

    #[tokio::test]
    async fn test_is_caller_admin_fails_closed() {
        let client = MockClient::new(SELF)
            .with_participant(SELF, true)
            .failing_metadata();
        let actions = GroupActions::new(&client, Duration::ZERO);
        assert!(!actions.is_caller_admin(&Jid::from(GROUP)).await);
    }

    #[tokio::test]
    async fn test_demote_continues_past_failure() {
        let client = MockClient::new(SELF)
            .with_participant(SELF, true)
            .with_participant("2@user", true)
            .with_participant("3@user", true)
            .with_participant("4@user", true)
            .with_participant("5@user", false)
            .failing_for("3@user");
        let actions = GroupActions::new(&client, Duration::ZERO);
        let chat = Jid::from(GROUP);

        let report = actions.demote_all_admins_except(&chat, &Jid::from(SELF)).await;
        assert_eq!(report, BatchReport { attempted: 3, failed: 1 });

        let demoted: Vec<Jid> = client
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Demote { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(
            demoted,
            vec![Jid::from("2@user"), Jid::from("3@user"), Jid::from("4@user")]
        );
    }

    #[tokio::test]
    async fn test_demote_without_metadata_does_nothing() {
        let client = MockClient::new(SELF)
            .with_participant("2@user", true)
            .failing_metadata();
        let actions = GroupActions::new(&client, Duration::ZERO);

        let report = actions
            .demote_all_admins_except(&Jid::from(GROUP), &Jid::from(SELF))
            .await;
        assert_eq!(report, BatchReport::default());
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_order_and_isolation() {
        let client = MockClient::new(SELF)
            .with_participant(SELF, true)
            .with_participant("2@user", true)
            .with_participant("3@user", false)
            .with_participant("4@user", false)
            .failing_for("3@user");
        let actions = GroupActions::new(&client, Duration::ZERO);
        let chat = Jid::from(GROUP);

        let report = actions
            .remove_all_non_admins_except(&chat, &Jid::from(SELF), &notices())
            .await;
        assert_eq!(report, Some(BatchReport { attempted: 2, failed: 1 }));

        let calls = client.calls();
        assert!(matches!(&calls[0], Call::SendText { text, .. } if text == "before"));
        assert!(matches!(&calls[1], Call::GroupMetadata { .. }));
        assert_eq!(
            calls[2],
            Call::Remove { chat: chat.clone(), ids: vec![Jid::from("3@user")] }
        );
        assert_eq!(
            calls[3],
            Call::Remove { chat: chat.clone(), ids: vec![Jid::from("4@user")] }
        );
        assert!(matches!(&calls[4], Call::SendText { text, .. } if text == "after"));
        assert_eq!(calls.len(), 5);
    }

    #[tokio::test]
    async fn test_purge_aborts_when_notice_fails() {
        let client = MockClient::new(SELF)
            .with_participant("3@user", false)
            .failing_sends();
        let actions = GroupActions::new(&client, Duration::ZERO);

        let report = actions
            .remove_all_non_admins_except(&Jid::from(GROUP), &Jid::from(SELF), &notices())
            .await;
        assert_eq!(report, None);
        assert!(client.group_actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_waits_grace_delay() {
        let client = MockClient::new(SELF).with_participant("3@user", false);
        let actions = GroupActions::new(&client, Duration::from_secs(5));
        let started = tokio::time::Instant::now();

        actions
            .remove_all_non_admins_except(&Jid::from(GROUP), &Jid::from(SELF), &notices())
            .await;
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_point_operations_swallow_errors() {
        let client = MockClient::new(SELF).failing_for("9@user").failing_for(SELF);
        let actions = GroupActions::new(&client, Duration::ZERO);
        let chat = Jid::from(GROUP);

        assert!(!actions.remove_one(&chat, &Jid::from("9@user")).await);
        assert!(actions.remove_one(&chat, &Jid::from("8@user")).await);
        assert!(!actions.promote_self(&chat).await);
    }
}
