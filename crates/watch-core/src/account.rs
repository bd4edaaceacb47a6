//! Free-text account extraction.
//!
//! A chat message that is not a command may still name an account to track,
//! either as a bare login or as a profile URL. Anything else is not a match.

use std::sync::OnceLock;

use regex::Regex;

fn profile_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"github\.com/([A-Za-z0-9_-]+)").expect("regex is valid"))
}

/// Extract an account name from free text.
///
/// - A single token with no `/` and no whitespace is taken verbatim.
/// - Otherwise the first `github.com/<name>` occurrence yields `<name>`.
/// - Anything else (including blank input) yields `None`.
///
/// # Examples
///
/// ```
/// use watch_core::account::extract_account;
///
/// assert_eq!(extract_account("octocat").as_deref(), Some("octocat"));
/// assert_eq!(
///     extract_account("https://github.com/rust-lang").as_deref(),
///     Some("rust-lang")
/// );
/// assert_eq!(extract_account("hello there"), None);
/// ```
pub fn extract_account(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if !text.contains('/') && !text.contains(char::is_whitespace) {
        return Some(text.to_string());
    }

    profile_url()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_token_is_account() {
        assert_eq!(extract_account("torvalds").as_deref(), Some("torvalds"));
    }

    #[test]
    fn test_bare_token_is_trimmed() {
        assert_eq!(extract_account("  torvalds \n").as_deref(), Some("torvalds"));
    }

    #[test]
    fn test_bare_token_is_not_validated() {
        // Any slash-free, space-free token counts, even chat noise.
        assert_eq!(extract_account("hi!").as_deref(), Some("hi!"));
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(
            extract_account("https://github.com/DragonAir_Dragon").as_deref(),
            Some("DragonAir_Dragon")
        );
    }

    #[test]
    fn test_profile_url_with_repo_path_takes_owner() {
        assert_eq!(
            extract_account("github.com/tokio-rs/tokio").as_deref(),
            Some("tokio-rs")
        );
    }

    #[test]
    fn test_profile_url_inside_sentence() {
        assert_eq!(
            extract_account("please watch https://github.com/serde-rs thanks").as_deref(),
            Some("serde-rs")
        );
    }

    #[test]
    fn test_other_urls_do_not_match() {
        assert_eq!(extract_account("https://gitlab.com/someone"), None);
    }

    #[test]
    fn test_sentence_without_url_does_not_match() {
        assert_eq!(extract_account("what is this bot"), None);
    }

    #[test]
    fn test_blank_input_does_not_match() {
        assert_eq!(extract_account("   "), None);
        assert_eq!(extract_account(""), None);
    }
}
