//! GitHub REST client.
//!
//! Implements [`RepositorySource`] over `api.github.com` (or any compatible
//! base URL). Every request carries the client-wide timeout so a hung call
//! can never stall a monitoring loop indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use watch_core::{Commit, FetchError, RepositorySource, Repository, WatchError};

/// Page size for repository listing (the API maximum).
const PER_PAGE: usize = 100;

/// Longest error body kept in a [`FetchError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 300;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    description: Option<String>,
    html_url: String,
    created_at: Option<DateTime<Utc>>,
}

impl From<ApiRepository> for Repository {
    fn from(repo: ApiRepository) -> Self {
        Repository {
            name: repo.name,
            description: repo.description.unwrap_or_default(),
            url: repo.html_url,
            created_at: repo.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    #[serde(default)]
    html_url: String,
    commit: ApiCommitDetail,
    author: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    message: String,
    author: Option<ApiGitAuthor>,
}

#[derive(Debug, Deserialize)]
struct ApiGitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

impl From<ApiCommit> for Commit {
    fn from(c: ApiCommit) -> Self {
        let git_author = c.commit.author;
        let author = c
            .author
            .map(|u| u.login)
            .or_else(|| git_author.as_ref().and_then(|a| a.name.clone()))
            .unwrap_or_default();
        Commit {
            sha: c.sha,
            message: c.commit.message,
            author,
            date: git_author.and_then(|a| a.date),
            url: c.html_url,
        }
    }
}

// ── GitHubClient ──────────────────────────────────────────────────────────────

/// Read-only GitHub account client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
}

impl GitHubClient {
    /// Build a client for `api_base` authenticated with `token`.
    ///
    /// Fails when the base URL or the token cannot be used in a request.
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> watch_core::Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| WatchError::Config(format!("invalid GitHub API URL {api_base}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(WatchError::Config(format!(
                "GitHub API URL cannot be a base: {api_base}"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("repo-watch"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| WatchError::Config("GitHub token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Config(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { http, api_base })
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FetchError> {
        let response = request.send().await.map_err(|e| {
            tracing::debug!(operation, error = %e, "GitHub request failed");
            FetchError::Transport(e.to_string())
        })?;
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FetchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn list_repositories(&self, account: &str) -> Result<Vec<Repository>, FetchError> {
        let url = self.endpoint(&["users", account, "repos"]);
        let mut page = 1_u32;
        let mut repos = Vec::new();

        loop {
            let request = self.http.get(url.clone()).query(&[
                ("per_page", PER_PAGE.to_string()),
                ("sort", "created".to_string()),
                ("direction", "desc".to_string()),
                ("page", page.to_string()),
            ]);
            let response = self.send("list repositories", request).await?;
            let chunk: Vec<ApiRepository> = Self::decode(response).await?;
            let chunk_len = chunk.len();
            repos.extend(chunk.into_iter().map(Repository::from));

            if chunk_len < PER_PAGE {
                break;
            }
            page = page.saturating_add(1);
        }

        tracing::debug!(account, count = repos.len(), "listed repositories");
        Ok(repos)
    }

    async fn latest_commits(
        &self,
        account: &str,
        repo: &str,
        limit: u8,
    ) -> Result<Vec<Commit>, FetchError> {
        let url = self.endpoint(&["repos", account, repo, "commits"]);
        let request = self
            .http
            .get(url)
            .query(&[("per_page", limit.to_string())]);
        let response = self.send("list commits", request).await?;

        // An empty repository answers 409 "Git Repository is empty".
        if response.status() == StatusCode::CONFLICT {
            return Ok(Vec::new());
        }

        let commits: Vec<ApiCommit> = Self::decode(response).await?;
        Ok(commits.into_iter().map(Commit::from).collect())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
