//! Configuration module for Warden.
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::client::Jid;

/// Messages from one sender within the window before mitigation kicks in.
pub const DEFAULT_SPAM_THRESHOLD: u32 = 4;
/// Spam counting window.
pub const DEFAULT_SPAM_WINDOW: Duration = Duration::from_secs(10);
/// Pause between the purge notice and the purge itself.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(5);
/// Pause before reconnecting after a lost connection.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub const DEFAULT_PREFIX: &str = "😈";
pub const DEFAULT_USER_DOMAIN: &str = "user";
pub const DEFAULT_GROUP_DOMAIN: &str = "group";

/// Bot running mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Thresholds of the spam tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpamLimits {
    pub threshold: u32,
    pub window: Duration,
}

impl Default for SpamLimits {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SPAM_THRESHOLD,
            window: DEFAULT_SPAM_WINDOW,
        }
    }
}

/// Settings the moderation engine itself needs.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub prefix: String,
    pub locale: String,
    pub user_domain: String,
    pub group_domain: String,

    /// Senders allowed to issue commands. Empty means everyone.
    pub owner_ids: Vec<Jid>,

    pub spam: SpamLimits,
    pub grace_delay: Duration,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            locale: "en".to_string(),
            user_domain: DEFAULT_USER_DOMAIN.to_string(),
            group_domain: DEFAULT_GROUP_DOMAIN.to_string(),
            owner_ids: Vec::new(),
            spam: SpamLimits::default(),
            grace_delay: DEFAULT_GRACE_DELAY,
        }
    }
}

impl ModerationConfig {
    /// Check if a sender may issue commands.
    pub fn is_authorized(&self, sender: &Jid) -> bool {
        self.owner_ids.is_empty() || self.owner_ids.contains(&sender.normalized())
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    pub reconnect_delay: Duration,

    pub moderation: ModerationConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let bot_mode = match env::var("BOT_MODE")
            .unwrap_or_else(|_| "polling".to_string())
            .to_lowercase()
            .as_str()
        {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = env::var("WEBHOOK_URL").ok().filter(|s| !s.is_empty());
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            bail!("WEBHOOK_URL must be set when BOT_MODE is webhook");
        }

        let user_domain = env::var("USER_DOMAIN")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_DOMAIN.to_string());
        let group_domain = env::var("GROUP_DOMAIN")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP_DOMAIN.to_string());

        let owner_ids = parse_owner_ids(&env::var("OWNER_IDS").unwrap_or_default(), &user_domain);

        let moderation = ModerationConfig {
            prefix: env::var("COMMAND_PREFIX")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            locale: env::var("LOCALE")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|_| "en".to_string()),
            user_domain,
            group_domain,
            owner_ids,
            spam: SpamLimits {
                threshold: env_parse("SPAM_THRESHOLD", DEFAULT_SPAM_THRESHOLD)?,
                window: env_secs("SPAM_WINDOW_SECS", DEFAULT_SPAM_WINDOW)?,
            },
            grace_delay: env_secs("GRACE_DELAY_SECS", DEFAULT_GRACE_DELAY)?,
        };

        Ok(Self {
            bot_token: env::var("BOT_TOKEN").context("BOT_TOKEN must be set")?,
            bot_mode,
            webhook_url,
            webhook_port: env_parse("WEBHOOK_PORT", 8080)?,
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            reconnect_delay: env_secs("RECONNECT_DELAY_SECS", DEFAULT_RECONNECT_DELAY)?,
            moderation,
        })
    }
}

/// Parse comma-separated owner identifiers, qualifying bare ones.
fn parse_owner_ids(raw: &str, user_domain: &str) -> Vec<Jid> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Jid::from_arg(s, user_domain).normalized())
        .collect()
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

fn env_secs(key: &str, default: Duration) -> anyhow::Result<Duration> {
    env_parse(key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = ModerationConfig::default();
        assert_eq!(config.spam.threshold, 4);
        assert_eq!(config.spam.window, Duration::from_secs(10));
        assert_eq!(config.grace_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_parse_owner_ids() {
        let owners = parse_owner_ids(" 12, 34@user ,,56:3@user", "user");
        assert_eq!(
            owners,
            vec![Jid::from("12@user"), Jid::from("34@user"), Jid::from("56@user")]
        );
    }

    #[test]
    fn test_empty_owner_list_authorizes_everyone() {
        let mut config = ModerationConfig::default();
        assert!(config.is_authorized(&Jid::from("9@user")));

        config.owner_ids = vec![Jid::from("1@user")];
        assert!(config.is_authorized(&Jid::from("1:4@user")));
        assert!(!config.is_authorized(&Jid::from("9@user")));
    }
}
