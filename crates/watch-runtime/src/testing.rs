//! In-memory collaborators for runtime tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use watch_core::{
    Commit, DeliveryChannel, DeliveryError, FetchError, RecipientId, Repository, RepositorySource,
};

pub fn repo(name: &str) -> Repository {
    Repository {
        name: name.to_string(),
        description: format!("{name} description"),
        url: format!("https://github.com/octo/{name}"),
        created_at: None,
    }
}

pub fn commit(sha: &str) -> Commit {
    Commit {
        sha: sha.to_string(),
        message: format!("commit {sha}"),
        author: "octocat".to_string(),
        date: None,
        url: format!("https://github.com/octo/r/commit/{sha}"),
    }
}

// ── FakeSource ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SourceState {
    repos: HashMap<String, Result<Vec<Repository>, FetchError>>,
    commits: HashMap<String, Result<Vec<Commit>, FetchError>>,
    hanging: HashSet<String>,
    list_calls: Vec<Instant>,
    commit_calls: Vec<String>,
}

/// Scriptable [`RepositorySource`]; unknown accounts answer 404, unknown
/// repositories answer with no commits.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<SourceState>,
    changed: Notify,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_repositories(&self, account: &str, names: &[&str]) {
        let repos = names.iter().map(|n| repo(n)).collect();
        self.state
            .lock()
            .unwrap()
            .repos
            .insert(account.to_string(), Ok(repos));
    }

    pub fn fail_repositories(&self, account: &str) {
        self.state.lock().unwrap().repos.insert(
            account.to_string(),
            Err(FetchError::Transport("connection reset".into())),
        );
    }

    /// Listing `account` never completes.
    pub fn hang_repositories(&self, account: &str) {
        self.state
            .lock()
            .unwrap()
            .hanging
            .insert(account.to_string());
    }

    /// Newest first.
    pub fn set_commits(&self, repo: &str, shas: &[&str]) {
        let commits = shas.iter().map(|s| commit(s)).collect();
        self.state
            .lock()
            .unwrap()
            .commits
            .insert(repo.to_string(), Ok(commits));
    }

    pub fn fail_commits(&self, repo: &str) {
        self.state.lock().unwrap().commits.insert(
            repo.to_string(),
            Err(FetchError::Status {
                status: 500,
                message: "boom".into(),
            }),
        );
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls.len()
    }

    pub fn list_call_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn commit_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().commit_calls.clone()
    }

    /// Wait until at least `n` repository listings were requested.
    pub async fn wait_for_list_calls(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.list_calls() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RepositorySource for FakeSource {
    async fn list_repositories(&self, account: &str) -> Result<Vec<Repository>, FetchError> {
        let (result, hang) = {
            let mut state = self.state.lock().unwrap();
            state.list_calls.push(Instant::now());
            let result = state.repos.get(account).cloned().unwrap_or_else(|| {
                Err(FetchError::Status {
                    status: 404,
                    message: "Not Found".into(),
                })
            });
            (result, state.hanging.contains(account))
        };
        self.changed.notify_waiters();
        if hang {
            std::future::pending::<()>().await;
        }
        result
    }

    async fn latest_commits(
        &self,
        _account: &str,
        repo: &str,
        limit: u8,
    ) -> Result<Vec<Commit>, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.commit_calls.push(repo.to_string());
        state
            .commits
            .get(repo)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(|mut commits| {
                commits.truncate(limit as usize);
                commits
            })
    }
}

// ── RecordingChannel ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(RecipientId, String)>>,
    failing: Mutex<bool>,
    changed: Notify,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following delivery fail (nothing is recorded).
    pub fn fail_deliveries(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn messages(&self) -> Vec<(RecipientId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|(_, t)| t).collect()
    }

    /// Wait until at least `n` messages were delivered and return them all.
    pub async fn wait_for_messages(&self, n: usize) -> Vec<(RecipientId, String)> {
        loop {
            let notified = self.changed.notified();
            let messages = self.messages();
            if messages.len() >= n {
                return messages;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError> {
        if *self.failing.lock().unwrap() {
            return Err(DeliveryError::Transport("channel down".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient, text.to_string()));
        self.changed.notify_waiters();
        Ok(())
    }
}
