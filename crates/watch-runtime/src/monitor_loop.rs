//! Per-session monitoring task.
//!
//! A [`MonitorTask`] goes through `Seeding → Polling → Cancelled`:
//!
//! - **Seeding** captures the account's current repositories and newest
//!   commits without reporting them. Failing to list repositories here is
//!   terminal for the task.
//! - **Polling** runs one diff per tick. Fetch failures only skip the
//!   affected tick or repository.
//! - **Cancelled** is reached at the next checkpoint (tick wait or before a
//!   fetch) after the token fires; in-flight fetches are never interrupted.
//!
//! The task exclusively owns its [`Snapshot`], so no locking is needed.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use watch_core::{RecipientId, RepositorySource};

use crate::notifier::Notifier;
use crate::session::Snapshot;

// ── MonitorContext ────────────────────────────────────────────────────────────

/// Collaborators shared by every monitoring task.
#[derive(Clone)]
pub struct MonitorContext {
    pub source: Arc<dyn RepositorySource>,
    pub notifier: Notifier,
    /// Commits requested per repository and tick.
    pub commit_limit: u8,
}

impl MonitorContext {
    pub fn new(source: Arc<dyn RepositorySource>, notifier: Notifier, commit_limit: u8) -> Self {
        Self {
            source,
            notifier,
            commit_limit: commit_limit.max(1),
        }
    }
}

/// Why a monitoring task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The session was stopped, replaced, or the process is shutting down.
    Cancelled,
    /// The initial repository listing failed; a fresh start is required.
    SeedingFailed,
}

// ── MonitorTask ───────────────────────────────────────────────────────────────

pub struct MonitorTask {
    ctx: MonitorContext,
    recipient_id: RecipientId,
    account: String,
    cancel: CancellationToken,
    /// Latest requested poll period, published by the coordinator.
    interval: watch::Receiver<Duration>,
    snapshot: Snapshot,
}

impl MonitorTask {
    /// Bind a task to one session. It starts with a cold snapshot.
    pub fn new(
        ctx: MonitorContext,
        recipient_id: RecipientId,
        account: String,
        cancel: CancellationToken,
        interval: watch::Receiver<Duration>,
    ) -> Self {
        Self {
            ctx,
            recipient_id,
            account,
            cancel,
            interval,
            snapshot: Snapshot::new(),
        }
    }

    /// Run the task to completion.
    pub async fn run(mut self) -> LoopExit {
        if let Err(exit) = self.seed().await {
            return exit;
        }

        let mut period = *self.interval.borrow_and_update();
        let mut ticker = new_ticker(period);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                changed = self.interval.changed() => {
                    if changed.is_err() {
                        tracing::debug!(recipient = %self.recipient_id, "interval sender dropped");
                        break;
                    }
                    let next = *self.interval.borrow_and_update();
                    if next != period {
                        tracing::debug!(
                            recipient = %self.recipient_id,
                            old_secs = period.as_secs(),
                            new_secs = next.as_secs(),
                            "poll interval changed"
                        );
                        period = next;
                        ticker = new_ticker(period);
                    }
                }

                _ = ticker.tick() => {
                    if self.poll().await.is_break() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(recipient = %self.recipient_id, account = %self.account, "monitoring cancelled");
        LoopExit::Cancelled
    }

    // ── Phases ────────────────────────────────────────────────────────────

    /// Capture the initial snapshot and confirm to the recipient.
    pub(crate) async fn seed(&mut self) -> Result<(), LoopExit> {
        if self.cancel.is_cancelled() {
            return Err(LoopExit::Cancelled);
        }

        let repos = match self.ctx.source.list_repositories(&self.account).await {
            Ok(repos) => repos,
            Err(e) => {
                tracing::warn!(
                    recipient = %self.recipient_id,
                    account = %self.account,
                    error = %e,
                    "failed to fetch initial repositories"
                );
                if self.cancel.is_cancelled() {
                    return Err(LoopExit::Cancelled);
                }
                self.ctx
                    .notifier
                    .seeding_failed(self.recipient_id, &self.account)
                    .await;
                return Err(LoopExit::SeedingFailed);
            }
        };

        self.snapshot.seed_repositories(&repos);

        for repo in &repos {
            if self.cancel.is_cancelled() {
                return Err(LoopExit::Cancelled);
            }
            match self
                .ctx
                .source
                .latest_commits(&self.account, &repo.name, self.ctx.commit_limit)
                .await
            {
                Ok(commits) => {
                    if let Some(newest) = commits.first() {
                        self.snapshot.record_commit(&repo.name, &newest.sha);
                    }
                }
                // Left unseeded; the next tick reports its newest commit.
                Err(e) => tracing::warn!(
                    account = %self.account,
                    repo = %repo.name,
                    error = %e,
                    "failed to fetch initial commits"
                ),
            }
        }

        if self.cancel.is_cancelled() {
            return Err(LoopExit::Cancelled);
        }

        let interval = *self.interval.borrow();
        tracing::info!(
            recipient = %self.recipient_id,
            account = %self.account,
            repositories = repos.len(),
            "monitoring started"
        );
        self.ctx
            .notifier
            .monitoring_started(self.recipient_id, &self.account, repos.len(), interval)
            .await;
        Ok(())
    }

    /// One tick: diff repositories, then each repository's newest commit.
    ///
    /// Breaks only when cancellation is observed before a fetch.
    pub(crate) async fn poll(&mut self) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        let repos = match self.ctx.source.list_repositories(&self.account).await {
            Ok(repos) => repos,
            Err(e) => {
                tracing::warn!(
                    account = %self.account,
                    error = %e,
                    "failed to fetch repositories; skipping tick"
                );
                return ControlFlow::Continue(());
            }
        };

        let fresh = self.snapshot.absorb_new_repositories(&repos);
        if !fresh.is_empty() {
            tracing::info!(account = %self.account, count = fresh.len(), "new repositories");
            self.ctx
                .notifier
                .new_repositories(self.recipient_id, &fresh)
                .await;
        }

        for repo in &repos {
            if self.cancel.is_cancelled() {
                return ControlFlow::Break(());
            }

            let commits = match self
                .ctx
                .source
                .latest_commits(&self.account, &repo.name, self.ctx.commit_limit)
                .await
            {
                Ok(commits) => commits,
                Err(e) => {
                    tracing::warn!(
                        account = %self.account,
                        repo = %repo.name,
                        error = %e,
                        "failed to fetch commits; skipping repository"
                    );
                    continue;
                }
            };

            let Some(newest) = commits.first() else {
                continue;
            };
            if self.snapshot.record_commit(&repo.name, &newest.sha) {
                tracing::info!(account = %self.account, repo = %repo.name, sha = %newest.sha, "new commit");
                self.ctx
                    .notifier
                    .new_commit(self.recipient_id, &repo.name, newest)
                    .await;
            }
        }

        ControlFlow::Continue(())
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// A ticker whose first tick is one full `period` from now.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

// ── Tests ─────────────────────────────────────────────────────────────────────
