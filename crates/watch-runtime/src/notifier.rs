//! Stateless outbound messaging.
//!
//! Formats texts via [`watch_core::formatting`] and hands them to the
//! [`DeliveryChannel`]. Delivery failures are logged here and never reach the
//! caller, so a dropped message can neither stop a monitoring loop nor roll
//! back its snapshot.

use std::sync::Arc;
use std::time::Duration;

use watch_core::formatting;
use watch_core::{Commit, DeliveryChannel, DeliveryError, RecipientId, Repository};

#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn DeliveryChannel>,
}

impl Notifier {
    pub fn new(channel: Arc<dyn DeliveryChannel>) -> Self {
        Self { channel }
    }

    /// Deliver `text` and report the outcome.
    pub async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError> {
        self.channel.send(recipient, text).await
    }

    /// Deliver `text`, logging instead of returning a failure.
    ///
    /// Returns `true` when the channel accepted the message.
    pub async fn notify(&self, recipient: RecipientId, text: &str) -> bool {
        match self.send(recipient, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(recipient = %recipient, error = %e, "failed to deliver message");
                false
            }
        }
    }

    pub async fn monitoring_started(
        &self,
        recipient: RecipientId,
        account: &str,
        repo_count: usize,
        interval: Duration,
    ) -> bool {
        let text = formatting::monitoring_started(account, repo_count, interval);
        self.notify(recipient, &text).await
    }

    pub async fn seeding_failed(&self, recipient: RecipientId, account: &str) -> bool {
        self.notify(recipient, &formatting::seeding_failed(account))
            .await
    }

    /// One aggregated message for every repository in `repos`.
    pub async fn new_repositories(&self, recipient: RecipientId, repos: &[&Repository]) -> bool {
        if repos.is_empty() {
            return true;
        }
        self.notify(recipient, &formatting::new_repositories(repos))
            .await
    }

    pub async fn new_commit(&self, recipient: RecipientId, repo: &str, commit: &Commit) -> bool {
        self.notify(recipient, &formatting::new_commit(repo, commit))
            .await
    }
}
