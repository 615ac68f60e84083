//! Event handlers.
//!
//! Non-command events: the antibot spam tracker and group invites.

pub mod antiflood;
pub mod invite;

pub use antiflood::{Mitigation, SpamTracker};
