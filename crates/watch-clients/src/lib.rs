//! Network collaborators for the repository watcher.
//!
//! [`github::GitHubClient`] reads account state; [`telegram::TelegramChannel`]
//! delivers notifications and streams inbound chat messages.

pub mod github;
pub mod telegram;

pub use github::GitHubClient;
pub use telegram::TelegramChannel;
pub use watch_core as core;
