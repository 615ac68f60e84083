//! Antibot spam tracking.
//!
//! Counts qualifying messages per sender and chat over a sliding window and
//! applies the mitigation chosen by the `antibot` command.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use tracing::{debug, info};

use crate::bot::dispatcher::AppState;
use crate::client::{InboundMessage, Jid, MessagingClient, SendOptions};
use crate::config::SpamLimits;
use crate::i18n::get_text;

/// What to do with a sender that is over the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mitigation {
    /// Mention the sender with a warning, once per window
    Warn,
    /// Retract the offending message
    Delete,
    /// Remove the sender from the group
    Kick,
}

impl FromStr for Mitigation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "delete" => Ok(Self::Delete),
            "kick" => Ok(Self::Kick),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Mitigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warn => "warn",
            Self::Delete => "delete",
            Self::Kick => "kick",
        })
    }
}

/// Per-sender state within one chat.
#[derive(Debug, Clone)]
struct SpamRecord {
    count: u32,
    window_start: Instant,
    /// Expiry is measured from here, not from `window_start`.
    last_seen: Instant,
    warned: bool,
}

impl SpamRecord {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            last_seen: now,
            warned: false,
        }
    }
}

/// Action the caller should take for one recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamAction {
    None,
    Warn,
    Delete,
    Kick,
}

/// Outcome of [`SpamTracker::record_and_classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpamVerdict {
    pub count: u32,
    pub over_threshold: bool,
    /// Threshold reached by this very message.
    pub newly_over: bool,
    pub action: SpamAction,
}

/// In-memory spam tracker, keyed by (chat, sender).
#[derive(Debug, Default)]
pub struct SpamTracker {
    limits: SpamLimits,
    records: HashMap<(Jid, Jid), SpamRecord>,
}

impl SpamTracker {
    pub fn new(limits: SpamLimits) -> Self {
        Self {
            limits,
            records: HashMap::new(),
        }
    }

    /// Record a message from `sender` in `chat` and decide the action under `mode`.
    ///
    /// A gap longer than the window since the sender's last message starts a
    /// new window. `Warn` fires once per window, `Delete` and `Kick` fire on
    /// every message while over the threshold.
    pub fn record_and_classify(
        &mut self,
        chat: &Jid,
        sender: &Jid,
        mode: Mitigation,
        now: Instant,
    ) -> SpamVerdict {
        let record = self
            .records
            .entry((chat.clone(), sender.clone()))
            .or_insert_with(|| SpamRecord::new(now));

        if now.saturating_duration_since(record.last_seen) > self.limits.window {
            record.count = 0;
            record.warned = false;
            record.window_start = now;
        }

        record.count += 1;
        record.last_seen = now;

        let over_threshold = record.count >= self.limits.threshold;
        let newly_over = record.count == self.limits.threshold;

        let action = if !over_threshold {
            SpamAction::None
        } else {
            match mode {
                Mitigation::Warn if record.warned => SpamAction::None,
                Mitigation::Warn => {
                    record.warned = true;
                    SpamAction::Warn
                }
                Mitigation::Delete => SpamAction::Delete,
                Mitigation::Kick => SpamAction::Kick,
            }
        };

        SpamVerdict {
            count: record.count,
            over_threshold,
            newly_over,
            action,
        }
    }

    /// Whether a warning already fired in the sender's current window.
    #[cfg(test)]
    fn is_warned(&self, chat: &Jid, sender: &Jid) -> bool {
        self.records
            .get(&(chat.clone(), sender.clone()))
            .map(|r| r.warned)
            .unwrap_or(false)
    }

    /// Start of the sender's current window, if any message was recorded.
    #[cfg(test)]
    fn window_start(&self, chat: &Jid, sender: &Jid) -> Option<Instant> {
        self.records
            .get(&(chat.clone(), sender.clone()))
            .map(|r| r.window_start)
    }
}

/// Feed `msg` into the tracker and apply `mode` if the sender is over the threshold.
pub async fn check_antibot<C: MessagingClient>(
    state: &AppState<C>,
    tracker: &mut SpamTracker,
    msg: &InboundMessage,
    mode: Mitigation,
) -> anyhow::Result<()> {
    let chat = &msg.chat_id;
    let sender = &msg.sender_id;

    let verdict = tracker.record_and_classify(chat, sender, mode, Instant::now());
    debug!(
        "Antibot: sender {} in chat {} at {} message(s), over threshold: {} (mode {})",
        sender, chat, verdict.count, verdict.over_threshold, mode
    );

    if verdict.newly_over {
        info!("{} crossed the spam threshold in {}", sender, chat);
    }

    match verdict.action {
        SpamAction::None => {}
        SpamAction::Warn => {
            let text = get_text(&state.config.locale, "antibot.warning")
                .replace("{user}", sender.user());
            state
                .client
                .send_text(chat, &text, SendOptions::mention(sender.clone()))
                .await?;
            info!("Warned {} for spamming in {}", sender, chat);
        }
        SpamAction::Delete => {
            state.client.send_delete(chat, &msg.id).await?;
            info!("Deleted spam message from {} in {}", sender, chat);
        }
        SpamAction::Kick => {
            state.actions().remove_one(chat, sender).await;
        }
    }

    Ok(())
}
