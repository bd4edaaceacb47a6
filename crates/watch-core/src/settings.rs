use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::RecipientId;

// ── Settings (CLI + environment) ───────────────────────────────────────────────

/// Notify Telegram chats about new GitHub repositories and commits
#[derive(Parser, Debug, Clone)]
#[command(
    name = "repo-watch",
    about = "Notify Telegram chats about new GitHub repositories and commits",
    version
)]
pub struct Settings {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Check interval in minutes for newly created sessions
    #[arg(
        long,
        env = "CHECK_INTERVAL_MINUTES",
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..=10080)
    )]
    pub default_interval: u64,

    /// Commits fetched per repository on every check (1-100)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub commit_limit: u8,

    /// Timeout in seconds for every GitHub / Telegram request
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout: u64,

    /// Telegram long-poll timeout in seconds
    #[arg(long, default_value = "60")]
    pub poll_timeout: u64,

    /// GitHub REST API base URL
    #[arg(long, default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Telegram Bot API base URL
    #[arg(long, default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// Chat to monitor from startup (requires --github-username)
    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_negative_numbers = true)]
    pub chat_id: Option<i64>,

    /// Account to monitor from startup (requires --chat-id)
    #[arg(long, env = "GITHUB_USERNAME")]
    pub github_username: Option<String>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and environment, then resolve overrides.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn try_load_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args).map(Self::resolve)
    }

    /// `--debug` overrides the log level.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Interval assigned to a session created without an explicit one.
    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout)
    }

    /// The session to start at boot, when both the chat and the account are
    /// configured.
    pub fn fixed_session(&self) -> Option<(RecipientId, String)> {
        match (self.chat_id, self.github_username.as_deref().map(str::trim)) {
            (Some(chat), Some(account)) if !account.is_empty() => {
                Some((RecipientId(chat), account.to_string()))
            }
            _ => None,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
