use std::fmt;

use chrono::{DateTime, Utc};

/// Opaque, stable identifier of a delivery target (a Telegram chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(pub i64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecipientId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One repository as returned by a single listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Repository name, unique within the account.
    pub name: String,
    /// Free-form description; empty when the owner did not set one.
    pub description: String,
    /// Browser URL of the repository.
    pub url: String,
    /// Creation time, when the API reported one.
    pub created_at: Option<DateTime<Utc>>,
}

/// One commit as returned by a single commit-listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Commit hash.
    pub sha: String,
    /// Full commit message.
    pub message: String,
    /// Login of the linked account, falling back to the git author name.
    pub author: String,
    /// Author date.
    pub date: Option<DateTime<Utc>>,
    /// Browser URL of the commit.
    pub url: String,
}

/// A raw text message received on the inbound command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub recipient_id: RecipientId,
    pub text: String,
}

impl InboundMessage {
    pub fn new(recipient_id: impl Into<RecipientId>, text: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            text: text.into(),
        }
    }
}
