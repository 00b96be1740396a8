//! Chat-facing command surface

pub mod command;

pub use command::CommandDispatcher;

use serde::{Deserialize, Serialize};

/// Authenticated chatter as reported by the chat bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub username: String,
    /// Platform user id
    pub id: u64,
    /// Role badges ("broadcaster", "moderator", ...)
    #[serde(default)]
    pub badges: Vec<String>,
}

impl ChatUser {
    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.iter().any(|b| b.eq_ignore_ascii_case(badge))
    }
}
