//! Collaborator seams between the monitoring runtime and the outside world.
//!
//! The runtime only ever talks to a hosting account through
//! [`RepositorySource`] and to a recipient through [`DeliveryChannel`], so
//! both can be swapped for in-memory fakes in tests.

use async_trait::async_trait;

use crate::error::{DeliveryError, FetchError};
use crate::models::{Commit, RecipientId, Repository};

/// Read access to a source-code hosting account.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Every repository of `account`, in a stable server-defined order.
    ///
    /// Implementations page internally and either return the complete list
    /// or fail.
    async fn list_repositories(&self, account: &str) -> Result<Vec<Repository>, FetchError>;

    /// Up to `limit` most recent commits of `account/repo`, newest first.
    ///
    /// An empty repository yields an empty list, not an error.
    async fn latest_commits(
        &self,
        account: &str,
        repo: &str,
        limit: u8,
    ) -> Result<Vec<Commit>, FetchError>;
}

/// Outbound message transport.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver HTML-formatted `text` to `recipient`.
    ///
    /// Size and rate limits are the channel's own concern.
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError>;
}
