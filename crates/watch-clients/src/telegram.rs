//! Telegram Bot API channel.
//!
//! Outbound: [`DeliveryChannel`] over `sendMessage`, with HTML parse mode and
//! transparent splitting of messages above Telegram's size limit.
//! Inbound: [`TelegramChannel::run_updates`] long-polls `getUpdates` and
//! forwards every text message as an [`InboundMessage`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use watch_core::{DeliveryChannel, DeliveryError, InboundMessage, RecipientId, WatchError};

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Longest HTML entity emitted by the formatter (`&quot;` plus slack).
const MAX_ENTITY_CHARS: usize = 10;

/// Pause after a failed `getUpdates` call before polling again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Account the bot token belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl Update {
    fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let text = message.text?;
        Some(InboundMessage::new(message.chat.id, text))
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

// ── TelegramChannel ───────────────────────────────────────────────────────────

/// Bot API client bound to one bot token.
#[derive(Clone)]
pub struct TelegramChannel {
    http: reqwest::Client,
    api_base: Url,
    token: String,
    request_timeout: Duration,
    poll_timeout: Duration,
}

impl TelegramChannel {
    /// Build a channel for `api_base` using the bot `token`.
    ///
    /// `request_timeout` bounds every call; long polls get `poll_timeout` on
    /// top of it.
    pub fn new(
        api_base: &str,
        token: &str,
        request_timeout: Duration,
        poll_timeout: Duration,
    ) -> watch_core::Result<Self> {
        let api_base = Url::parse(api_base).map_err(|e| {
            WatchError::Config(format!("invalid Telegram API URL {api_base}: {e}"))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(WatchError::Config(format!(
                "Telegram API URL cannot be a base: {api_base}"
            )));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(WatchError::Config("Telegram token is empty".into()));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| WatchError::Config(format!("failed to create Telegram client: {e}")))?;

        Ok(Self {
            http,
            api_base,
            token: token.to_string(),
            request_timeout,
            poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push(&format!("bot{}", self.token))
                .push(method);
        }
        url
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, DeliveryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        // Error answers still carry the JSON envelope with a description.
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            DeliveryError::Transport(format!("{method}: HTTP {status}: {}", e.without_url()))
        })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(DeliveryError::Rejected {
                description: description.unwrap_or_else(|| format!("{method}: HTTP {status}")),
            }),
        }
    }

    /// Identify the bot behind the token.
    ///
    /// Run once at startup, so a refusal surfaces as a [`WatchError`].
    pub async fn get_me(&self) -> watch_core::Result<BotUser> {
        let me = self
            .call("getMe", &serde_json::json!({}), self.request_timeout)
            .await?;
        Ok(me)
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, DeliveryError> {
        let body = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &body, self.poll_timeout + self.request_timeout)
            .await
    }

    /// Long-poll for inbound messages until `cancel` fires or `tx` closes.
    ///
    /// Polling errors are logged and retried after a short pause; they never
    /// end the loop.
    pub async fn run_updates(&self, tx: mpsc::Sender<InboundMessage>, cancel: CancellationToken) {
        let mut offset = 0_i64;

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = self.get_updates(offset) => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(message) = update.into_inbound() else {
                            continue;
                        };
                        tracing::debug!(recipient = %message.recipient_id, "inbound message");
                        if tx.send(message).await.is_err() {
                            tracing::debug!("inbound receiver dropped; stopping update poll");
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to poll Telegram updates");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }

        tracing::debug!("update poll cancelled");
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let body = SendMessage {
                chat_id: recipient.0,
                text: &chunk,
                parse_mode: "HTML",
                disable_web_page_preview: true,
            };
            let _: serde_json::Value = self
                .call("sendMessage", &body, self.request_timeout)
                .await?;
        }
        Ok(())
    }
}

// ── Message splitting ─────────────────────────────────────────────────────────

/// Split `text` into chunks of at most `limit` characters.
///
/// Breaks at line boundaries where possible; a single line longer than
/// `limit` is hard-split on character boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0_usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            let mut start = 0;
            while start < chars.len() {
                let end = entity_safe_cut(&chars, start, (start + limit).min(chars.len()));
                chunks.push(chars[start..end].iter().collect());
                start = end;
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Move a cut at `end` back to the `&` of an HTML entity it would split.
fn entity_safe_cut(chars: &[char], start: usize, end: usize) -> usize {
    if end == chars.len() {
        return end;
    }
    let window_start = end.saturating_sub(MAX_ENTITY_CHARS).max(start);
    match chars[window_start..end].iter().rposition(|&c| c == '&' || c == ';') {
        Some(offset) if chars[window_start + offset] == '&' && window_start + offset > start => {
            window_start + offset
        }
        _ => end,
    }
}
