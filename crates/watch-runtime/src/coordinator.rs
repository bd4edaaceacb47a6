//! Session coordinator.
//!
//! Consumes [`ControlEvent`]s one at a time and owns the registry of live
//! monitoring tasks: at most one task per recipient, each tagged with the
//! generation of the start that created it. Replacing or stopping a task
//! waits for the old one to finish before anything else happens, so two
//! tasks for the same recipient never overlap.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use watch_core::RecipientId;

use crate::events::{ControlEvent, SessionLapsed};
use crate::monitor_loop::{LoopExit, MonitorContext, MonitorTask};

// ── Registry entry ────────────────────────────────────────────────────────────

/// Live monitoring task of one recipient.
struct SessionHandle {
    generation: u64,
    account: String,
    cancel: CancellationToken,
    interval_tx: watch::Sender<Duration>,
    task: JoinHandle<LoopExit>,
}

/// Reported by a task that ended without being cancelled.
#[derive(Debug, Clone, Copy)]
struct TaskExit {
    recipient_id: RecipientId,
    generation: u64,
}

// ── Coordinator ───────────────────────────────────────────────────────────────

pub struct Coordinator {
    ctx: MonitorContext,
    sessions: HashMap<RecipientId, SessionHandle>,
    /// Parent of every task's cancellation token.
    root: CancellationToken,
    /// How long a retiring task may take to reach a checkpoint.
    retire_grace: Duration,
    lapses: mpsc::UnboundedSender<SessionLapsed>,
    exits_tx: mpsc::UnboundedSender<TaskExit>,
    exits_rx: mpsc::UnboundedReceiver<TaskExit>,
}

impl Coordinator {
    /// Create a coordinator with an empty registry.
    ///
    /// Lapsed sessions are reported on `lapses`. A retiring task that has not
    /// finished within `retire_grace` is aborted.
    pub fn new(
        ctx: MonitorContext,
        lapses: mpsc::UnboundedSender<SessionLapsed>,
        retire_grace: Duration,
    ) -> Self {
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            sessions: HashMap::new(),
            root: CancellationToken::new(),
            retire_grace,
            lapses,
            exits_tx,
            exits_rx,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Apply a single control event.
    ///
    /// Start and Stop return only after the previous task has ended or been
    /// aborted (see [`Coordinator::new`] for the bound).
    pub async fn apply(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Start {
                recipient_id,
                account,
                interval,
                generation,
            } => {
                self.retire(recipient_id).await;
                self.spawn(recipient_id, account, interval, generation);
            }
            ControlEvent::UpdateInterval {
                recipient_id,
                interval,
            } => match self.sessions.get(&recipient_id) {
                Some(handle) => {
                    handle.interval_tx.send_replace(interval);
                }
                None => {
                    tracing::debug!(recipient = %recipient_id, "no live task to retime");
                }
            },
            ControlEvent::Stop { recipient_id } => {
                if !self.retire(recipient_id).await {
                    tracing::debug!(recipient = %recipient_id, "no live task to stop");
                }
            }
        }
    }

    pub fn is_live(&self, recipient: RecipientId) -> bool {
        self.sessions.contains_key(&recipient)
    }

    pub fn live_count(&self) -> usize {
        self.sessions.len()
    }

    /// Generation of the recipient's live task, if any.
    pub fn generation(&self, recipient: RecipientId) -> Option<u64> {
        self.sessions.get(&recipient).map(|h| h.generation)
    }

    /// Process control events until cancelled or the event stream ends, then
    /// shut every task down.
    pub async fn run(mut self, mut events: mpsc::Receiver<ControlEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(exit) = self.exits_rx.recv() => self.reap(exit).await,

                event = events.recv() => match event {
                    Some(event) => self.apply(event).await,
                    None => {
                        tracing::debug!("control stream closed");
                        break;
                    }
                },
            }
        }
        self.shutdown().await;
    }

    /// Cancel every live task and wait for all of them.
    pub async fn shutdown(&mut self) {
        self.root.cancel();
        let recipients: Vec<RecipientId> = self.sessions.keys().copied().collect();
        for recipient in recipients {
            self.retire(recipient).await;
        }
        tracing::debug!("coordinator stopped");
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn spawn(
        &mut self,
        recipient_id: RecipientId,
        account: String,
        interval: Duration,
        generation: u64,
    ) {
        let cancel = self.root.child_token();
        let (interval_tx, interval_rx) = watch::channel(interval);
        let task = MonitorTask::new(
            self.ctx.clone(),
            recipient_id,
            account.clone(),
            cancel.clone(),
            interval_rx,
        );

        let exits = self.exits_tx.clone();
        let handle = tokio::spawn(async move {
            let exit = task.run().await;
            if exit != LoopExit::Cancelled {
                // The coordinator holds the receiver for as long as it lives.
                let _ = exits.send(TaskExit {
                    recipient_id,
                    generation,
                });
            }
            exit
        });

        tracing::info!(
            recipient = %recipient_id,
            account = %account,
            generation,
            interval_secs = interval.as_secs(),
            "monitoring task spawned"
        );
        self.sessions.insert(
            recipient_id,
            SessionHandle {
                generation,
                account,
                cancel,
                interval_tx,
                task: handle,
            },
        );
    }

    /// Cancel the recipient's task and wait for it to end.
    ///
    /// The wait blocks the event loop, so a task stuck in a fetch delays
    /// every other recipient's events by up to `retire_grace`; it is then
    /// aborted. Returns `false` when no task was registered.
    async fn retire(&mut self, recipient: RecipientId) -> bool {
        let Some(handle) = self.sessions.remove(&recipient) else {
            return false;
        };
        handle.cancel.cancel();

        let mut task = handle.task;
        match time::timeout(self.retire_grace, &mut task).await {
            Ok(Ok(exit)) => {
                tracing::info!(
                    recipient = %recipient,
                    account = %handle.account,
                    generation = handle.generation,
                    exit = ?exit,
                    "monitoring task retired"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(recipient = %recipient, error = %e, "monitoring task failed");
            }
            Err(_) => {
                tracing::warn!(
                    recipient = %recipient,
                    grace_secs = self.retire_grace.as_secs(),
                    "monitoring task did not stop in time; aborting"
                );
                task.abort();
            }
        }
        true
    }

    /// Drop the registry entry of a task that ended on its own and tell the
    /// router, unless a newer task already took its place.
    async fn reap(&mut self, exit: TaskExit) {
        let current = self
            .sessions
            .get(&exit.recipient_id)
            .is_some_and(|h| h.generation == exit.generation);
        if !current {
            tracing::debug!(
                recipient = %exit.recipient_id,
                generation = exit.generation,
                "ignoring exit of a superseded task"
            );
            return;
        }

        self.retire(exit.recipient_id).await;
        let lapse = SessionLapsed {
            recipient_id: exit.recipient_id,
            generation: exit.generation,
        };
        if self.lapses.send(lapse).is_err() {
            tracing::debug!(recipient = %exit.recipient_id, "router gone; lapse dropped");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
