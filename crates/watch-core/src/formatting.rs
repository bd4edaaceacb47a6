//! Outbound message texts.
//!
//! Every message is HTML (Telegram `parse_mode = HTML`), so any value that
//! originates outside the bot is passed through [`escape_html`] first.

use std::time::Duration;

use crate::models::{Commit, Repository};

/// Escape the three characters Telegram's HTML parser treats specially.
///
/// # Examples
///
/// ```
/// use watch_core::formatting::escape_html;
///
/// assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
/// assert_eq!(escape_html("plain"), "plain");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Whole minutes in `interval` (intervals are always configured in minutes).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use watch_core::formatting::interval_minutes;
///
/// assert_eq!(interval_minutes(Duration::from_secs(300)), 5);
/// ```
pub fn interval_minutes(interval: Duration) -> u64 {
    interval.as_secs() / 60
}

// ── Command acknowledgments ───────────────────────────────────────────────────

pub fn welcome_message() -> String {
    "GitHub monitoring bot is running!\n\n\
     Send a GitHub username or profile URL to start tracking it."
        .to_string()
}

pub fn help_message() -> String {
    "Available commands:\n\
     /start - Show the welcome message\n\
     /help - Show this help\n\
     /track &lt;username&gt; - Start tracking a GitHub account\n\
     /interval &lt;minutes&gt; - Set the check interval\n\
     /status - Show monitoring status\n\
     /stop - Stop monitoring\n\n\
     You can also just send a GitHub username or profile URL."
        .to_string()
}

/// Acknowledgment for an accepted start/track request.
pub fn tracking_started(account: &str, interval: Duration) -> String {
    format!(
        "Now tracking GitHub account: <b>{}</b>\nCheck interval: {} minutes",
        escape_html(account),
        interval_minutes(interval)
    )
}

pub fn interval_updated(account: &str, interval: Duration) -> String {
    format!(
        "Check interval for <b>{}</b> set to {} minutes",
        escape_html(account),
        interval_minutes(interval)
    )
}

pub fn monitoring_stopped(account: &str) -> String {
    format!("Monitoring of <b>{}</b> stopped.", escape_html(account))
}

pub fn already_stopped() -> String {
    "Monitoring is already stopped.".to_string()
}

pub fn status_active(account: &str, interval: Duration) -> String {
    format!(
        "Monitoring status:\n\
         • Tracked account: <b>{}</b>\n\
         • Check interval: {} minutes\n\
         • Status: active",
        escape_html(account),
        interval_minutes(interval)
    )
}

pub fn status_inactive() -> String {
    "Monitoring is not active. Use /track &lt;username&gt; to start tracking.".to_string()
}

/// Reply to a rejected request.
pub fn command_failed(reason: &str) -> String {
    format!("⚠️ {}", escape_html(reason))
}

// ── Monitoring notifications ──────────────────────────────────────────────────

/// One-time confirmation sent once the initial snapshot is captured.
pub fn monitoring_started(account: &str, repo_count: usize, interval: Duration) -> String {
    format!(
        "✅ Monitoring of GitHub account <b>{}</b> started!\n\
         Repositories found: {}\n\
         Check interval: {} minutes",
        escape_html(account),
        repo_count,
        interval_minutes(interval)
    )
}

pub fn seeding_failed(account: &str) -> String {
    format!(
        "❌ Could not fetch repositories for <b>{}</b>. Check that the username is correct.",
        escape_html(account)
    )
}

/// A single aggregated message listing every newly observed repository.
pub fn new_repositories(repos: &[&Repository]) -> String {
    let mut message = String::from("🆕 New repositories detected:\n");
    for repo in repos {
        let description = if repo.description.trim().is_empty() {
            "no description".to_string()
        } else {
            escape_html(&repo.description)
        };
        message.push_str(&format!(
            "• {} - {}\n  URL: {}\n\n",
            escape_html(&repo.name),
            description,
            escape_html(&repo.url)
        ));
    }
    message
}

pub fn new_commit(repo_name: &str, commit: &Commit) -> String {
    let date = commit
        .date
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "📝 New commit in repository {}:\n\
         • Message: {}\n\
         • Author: {}\n\
         • Date: {}\n\
         • URL: {}\n",
        escape_html(repo_name),
        escape_html(&commit.message),
        escape_html(&commit.author),
        date,
        escape_html(&commit.url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn repo(name: &str, description: &str) -> Repository {
        Repository {
            name: name.to_string(),
            description: description.to_string(),
            url: format!("https://github.com/octo/{name}"),
            created_at: None,
        }
    }

    #[test]
    fn test_escape_html_leaves_quotes() {
        assert_eq!(escape_html(r#"say "hi""#), r#"say "hi""#);
    }

    #[test]
    fn test_interval_minutes_truncates() {
        assert_eq!(interval_minutes(Duration::from_secs(119)), 1);
    }

    #[test]
    fn test_tracking_started_escapes_account() {
        let msg = tracking_started("<b>", Duration::from_secs(300));
        assert!(msg.contains("&lt;b&gt;"));
        assert!(msg.contains("5 minutes"));
    }

    #[test]
    fn test_new_repositories_lists_in_given_order() {
        let a = repo("alpha", "first");
        let c = repo("gamma", "");
        let msg = new_repositories(&[&a, &c]);

        let alpha = msg.find("alpha").unwrap();
        let gamma = msg.find("gamma").unwrap();
        assert!(alpha < gamma);
        assert!(msg.contains("• alpha - first"));
        assert!(msg.contains("• gamma - no description"));
        assert!(msg.contains("URL: https://github.com/octo/gamma"));
    }

    #[test]
    fn test_new_commit_includes_all_fields() {
        let commit = Commit {
            sha: "abc123".into(),
            message: "Fix <script> injection".into(),
            author: "octocat".into(),
            date: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            url: "https://github.com/octo/alpha/commit/abc123".into(),
        };
        let msg = new_commit("alpha", &commit);

        assert!(msg.contains("New commit in repository alpha"));
        assert!(msg.contains("Fix &lt;script&gt; injection"));
        assert!(msg.contains("Author: octocat"));
        assert!(msg.contains("Date: 2024-05-01T12:00:00+00:00"));
        assert!(msg.contains("/commit/abc123"));
    }

    #[test]
    fn test_new_commit_without_date() {
        let commit = Commit {
            sha: "abc".into(),
            message: "m".into(),
            author: "a".into(),
            date: None,
            url: "u".into(),
        };
        assert!(new_commit("r", &commit).contains("Date: unknown"));
    }

    #[test]
    fn test_monitoring_started_summary() {
        let msg = monitoring_started("octo", 12, Duration::from_secs(600));
        assert!(msg.contains("<b>octo</b>"));
        assert!(msg.contains("Repositories found: 12"));
        assert!(msg.contains("10 minutes"));
    }

    #[test]
    fn test_command_failed_escapes_reason() {
        assert_eq!(command_failed("use /track <name>"), "⚠️ use /track &lt;name&gt;");
    }
}
