//! Per-recipient session state.
//!
//! State is split by owner: [`SessionConfig`] is written only by the command
//! router, [`Snapshot`] only by the monitoring loop that observes the account.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use watch_core::Repository;

// ── SessionConfig ─────────────────────────────────────────────────────────────

/// What the recipient asked for: which account, how often, and whether a
/// monitoring task should currently be running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Tracked account; replaced (never merged) by a later start.
    pub account: String,
    /// Poll period; changed independently of the account.
    pub interval: Duration,
    /// `true` while a monitoring task runs for this session.
    pub active: bool,
    /// Generation of the most recent start.
    pub generation: u64,
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Account state as of the last successful poll.
///
/// Diffing a fresh listing against the snapshot yields the novel items and
/// advances the snapshot in the same step.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Names of every repository observed so far.
    known_repos: HashSet<String>,
    /// Newest commit hash seen per repository.
    last_commit: HashMap<String, String>,
}

impl Snapshot {
    /// Create an empty (cold) snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Record every repository in `repos` as known without reporting any.
    pub fn seed_repositories(&mut self, repos: &[Repository]) {
        self.known_repos
            .extend(repos.iter().map(|r| r.name.clone()));
    }

    /// Return the repositories in `current` that were not known before, in
    /// the order given, and mark them known.
    pub fn absorb_new_repositories<'a>(&mut self, current: &'a [Repository]) -> Vec<&'a Repository> {
        current
            .iter()
            .filter(|repo| self.known_repos.insert(repo.name.clone()))
            .collect()
    }

    /// Record `sha` as the newest commit of `repo`.
    ///
    /// Returns `true` when it differs from the previously recorded hash (or
    /// none was recorded), i.e. when the commit is news.
    pub fn record_commit(&mut self, repo: &str, sha: &str) -> bool {
        match self.last_commit.get(repo) {
            Some(known) if known == sha => false,
            _ => {
                self.last_commit.insert(repo.to_string(), sha.to_string());
                true
            }
        }
    }

    pub fn knows_repository(&self, name: &str) -> bool {
        self.known_repos.contains(name)
    }

    pub fn last_commit(&self, repo: &str) -> Option<&str> {
        self.last_commit.get(repo).map(String::as_str)
    }

    pub fn repository_count(&self) -> usize {
        self.known_repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_repos.is_empty() && self.last_commit.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
