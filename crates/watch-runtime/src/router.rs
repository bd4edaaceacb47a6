//! Command routing.
//!
//! [`parse_request`] turns inbound chat text into a [`Request`];
//! [`CommandRouter`] validates it against the session configurations it owns,
//! updates them, and emits at most one [`ControlEvent`] per accepted request.
//! The router runs as a single task, so configuration changes are serialized.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use watch_core::account::extract_account;
use watch_core::formatting;
use watch_core::{CommandError, InboundMessage, RecipientId};

use crate::events::{ControlEvent, SessionLapsed};
use crate::notifier::Notifier;
use crate::session::SessionConfig;

/// Longest accepted poll interval (one week).
pub const MAX_INTERVAL_MINUTES: i64 = 7 * 24 * 60;

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Start (or re-target) monitoring of `account`.
    Start { account: String },
    /// Change the poll interval; validated by the router.
    SetInterval { minutes: i64 },
    Stop,
    Status,
    Help,
    /// Bare `/start`: greet without touching any session.
    Welcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub recipient_id: RecipientId,
    pub kind: RequestKind,
}

/// Interpret one inbound message.
///
/// Returns `Ok(None)` for free text that names no account; such messages are
/// ignored rather than rejected.
pub fn parse_request(message: &InboundMessage) -> Result<Option<Request>, CommandError> {
    let text = message.text.trim();
    let recipient_id = message.recipient_id;

    let Some(command) = text.strip_prefix('/') else {
        return Ok(extract_account(text).map(|account| Request {
            recipient_id,
            kind: RequestKind::Start { account },
        }));
    };

    let mut parts = command.split_whitespace();
    let verb = parts
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let argument = parts.next();

    let kind = match (verb.as_str(), argument) {
        ("start", None) => RequestKind::Welcome,
        ("start" | "track", Some(account)) => RequestKind::Start {
            account: account.to_string(),
        },
        ("track", None) => {
            return Err(CommandError::InvalidArgument(
                "Please specify a GitHub username.\nExample: /track username".into(),
            ))
        }
        ("interval", None) => {
            return Err(CommandError::InvalidArgument(
                "Please specify the check interval in minutes.\nExample: /interval 5".into(),
            ))
        }
        ("interval", Some(raw)) => match raw.parse::<i64>() {
            Ok(minutes) => RequestKind::SetInterval { minutes },
            Err(_) => return Err(invalid_minutes()),
        },
        ("stop", _) => RequestKind::Stop,
        ("status", _) => RequestKind::Status,
        ("help", _) => RequestKind::Help,
        _ => {
            return Err(CommandError::InvalidArgument(
                "Unknown command. Use /help for the list of commands.".into(),
            ))
        }
    };

    Ok(Some(Request { recipient_id, kind }))
}

fn invalid_minutes() -> CommandError {
    CommandError::InvalidArgument(format!(
        "Please specify a valid number of minutes (1 to {MAX_INTERVAL_MINUTES})."
    ))
}

// ── CommandRouter ─────────────────────────────────────────────────────────────

/// Sole writer of session configurations.
pub struct CommandRouter {
    sessions: HashMap<RecipientId, SessionConfig>,
    default_interval: Duration,
    next_generation: u64,
    events: mpsc::Sender<ControlEvent>,
}

impl CommandRouter {
    /// Create a router that gives new sessions `default_interval` and
    /// publishes accepted requests on `events`.
    pub fn new(default_interval: Duration, events: mpsc::Sender<ControlEvent>) -> Self {
        Self {
            sessions: HashMap::new(),
            default_interval,
            next_generation: 1,
            events,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Apply one request and return the acknowledgment text.
    pub async fn handle(&mut self, request: Request) -> Result<String, CommandError> {
        let recipient = request.recipient_id;
        match request.kind {
            RequestKind::Start { account } => Ok(self.start(recipient, account).await),
            RequestKind::SetInterval { minutes } => self.set_interval(recipient, minutes).await,
            RequestKind::Stop => Ok(self.stop(recipient).await),
            RequestKind::Status => Ok(self.status(recipient)),
            RequestKind::Help => Ok(formatting::help_message()),
            RequestKind::Welcome => Ok(formatting::welcome_message()),
        }
    }

    /// Create or re-target the session and (re)start its monitoring.
    ///
    /// An existing session keeps its interval.
    pub async fn start(&mut self, recipient: RecipientId, account: String) -> String {
        let generation = self.next_generation;
        self.next_generation += 1;

        let default_interval = self.default_interval;
        let session = self
            .sessions
            .entry(recipient)
            .or_insert_with(|| SessionConfig {
                account: String::new(),
                interval: default_interval,
                active: false,
                generation,
            });
        session.account = account.clone();
        session.active = true;
        session.generation = generation;
        let interval = session.interval;

        tracing::info!(recipient = %recipient, account = %account, generation, "start requested");
        let reply = formatting::tracking_started(&account, interval);
        self.emit(ControlEvent::Start {
            recipient_id: recipient,
            account,
            interval,
            generation,
        })
        .await;
        reply
    }

    /// Change the poll interval of an existing session.
    pub async fn set_interval(
        &mut self,
        recipient: RecipientId,
        minutes: i64,
    ) -> Result<String, CommandError> {
        if !(1..=MAX_INTERVAL_MINUTES).contains(&minutes) {
            return Err(invalid_minutes());
        }
        let Some(session) = self.sessions.get_mut(&recipient) else {
            return Err(CommandError::NotFound(
                "First choose an account to track with /track <username>".into(),
            ));
        };

        // Range-checked above, so the conversion is lossless.
        let interval = Duration::from_secs(minutes as u64 * 60);
        session.interval = interval;
        let reply = formatting::interval_updated(&session.account, interval);

        tracing::info!(recipient = %recipient, minutes, "interval updated");
        self.emit(ControlEvent::UpdateInterval {
            recipient_id: recipient,
            interval,
        })
        .await;
        Ok(reply)
    }

    /// Stop an active session; informational no-op otherwise.
    pub async fn stop(&mut self, recipient: RecipientId) -> String {
        let session = match self.sessions.get_mut(&recipient) {
            Some(session) if session.active => session,
            _ => return formatting::already_stopped(),
        };

        session.active = false;
        let reply = formatting::monitoring_stopped(&session.account);

        tracing::info!(recipient = %recipient, "stop requested");
        self.emit(ControlEvent::Stop {
            recipient_id: recipient,
        })
        .await;
        reply
    }

    pub fn status(&self, recipient: RecipientId) -> String {
        match self.sessions.get(&recipient) {
            Some(session) if session.active => {
                formatting::status_active(&session.account, session.interval)
            }
            _ => formatting::status_inactive(),
        }
    }

    /// Read-only view of a session's configuration.
    pub fn session(&self, recipient: RecipientId) -> Option<&SessionConfig> {
        self.sessions.get(&recipient)
    }

    /// Mark a session inactive after its task ended on its own, unless a
    /// newer start has superseded that task.
    pub fn session_lapsed(&mut self, lapse: SessionLapsed) {
        if let Some(session) = self.sessions.get_mut(&lapse.recipient_id) {
            if session.generation == lapse.generation && session.active {
                session.active = false;
                tracing::info!(recipient = %lapse.recipient_id, "session lapsed");
            }
        }
    }

    /// Route inbound messages until cancelled or the inbound stream ends.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<InboundMessage>,
        mut lapses: mpsc::UnboundedReceiver<SessionLapsed>,
        notifier: Notifier,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(lapse) = lapses.recv() => self.session_lapsed(lapse),

                message = inbound.recv() => {
                    let Some(message) = message else {
                        tracing::debug!("inbound stream closed");
                        break;
                    };
                    self.dispatch(message, &notifier).await;
                }
            }
        }
        tracing::debug!("command router stopped");
    }

    // ── Private helpers ───────────────────────────────────────────────────

    async fn dispatch(&mut self, message: InboundMessage, notifier: &Notifier) {
        let recipient = message.recipient_id;
        let outcome = match parse_request(&message) {
            Ok(Some(request)) => self.handle(request).await,
            Ok(None) => {
                tracing::debug!(recipient = %recipient, "ignoring free text without an account");
                return;
            }
            Err(e) => Err(e),
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                tracing::info!(recipient = %recipient, error = %e, "request rejected");
                formatting::command_failed(&e.to_string())
            }
        };
        notifier.notify(recipient, &reply).await;
    }

    async fn emit(&self, event: ControlEvent) {
        if let Err(e) = self.events.send(event).await {
            tracing::warn!(recipient = %e.0.recipient_id(), "coordinator gone; control event dropped");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingChannel;

    const DEFAULT: Duration = Duration::from_secs(5 * 60);
    const ME: RecipientId = RecipientId(42);

    fn router() -> (CommandRouter, mpsc::Receiver<ControlEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (CommandRouter::new(DEFAULT, tx), rx)
    }

    fn parse(text: &str) -> Result<Option<RequestKind>, CommandError> {
        parse_request(&InboundMessage::new(ME, text)).map(|r| r.map(|r| r.kind))
    }

    fn start_kind(account: &str) -> Option<RequestKind> {
        Some(RequestKind::Start {
            account: account.to_string(),
        })
    }

    // ── parse_request ─────────────────────────────────────────────────────

    #[test]
    fn test_parse_start_and_track() {
        assert_eq!(parse("/start octo"), Ok(start_kind("octo")));
        assert_eq!(parse("/track octo"), Ok(start_kind("octo")));
        assert_eq!(parse("/TRACK@watch_bot octo extra"), Ok(start_kind("octo")));
    }

    #[test]
    fn test_parse_bare_start_is_welcome() {
        assert_eq!(parse("/start"), Ok(Some(RequestKind::Welcome)));
        assert_eq!(parse("/start@watch_bot"), Ok(Some(RequestKind::Welcome)));
    }

    #[test]
    fn test_parse_track_without_account_is_invalid() {
        assert!(matches!(parse("/track"), Err(CommandError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(
            parse("/interval 10"),
            Ok(Some(RequestKind::SetInterval { minutes: 10 }))
        );
        // Range is checked by the router, not the parser.
        assert_eq!(
            parse("/interval -5"),
            Ok(Some(RequestKind::SetInterval { minutes: -5 }))
        );
        assert!(matches!(parse("/interval"), Err(CommandError::InvalidArgument(_))));
        assert!(matches!(parse("/interval ten"), Err(CommandError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(parse("/stop"), Ok(Some(RequestKind::Stop)));
        assert_eq!(parse("/status"), Ok(Some(RequestKind::Status)));
        assert_eq!(parse("/help"), Ok(Some(RequestKind::Help)));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(matches!(parse("/frobnicate"), Err(CommandError::InvalidArgument(_))));
        assert!(matches!(parse("/"), Err(CommandError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_free_text() {
        assert_eq!(parse("octocat"), Ok(start_kind("octocat")));
        assert_eq!(parse("see https://github.com/rust-lang"), Ok(start_kind("rust-lang")));
        assert_eq!(parse("good morning everyone"), Ok(None));
    }

    // ── start ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_start_creates_session_with_default_interval() {
        let (mut router, mut rx) = router();

        let reply = router.start(ME, "octo".into()).await;

        assert!(reply.contains("<b>octo</b>"));
        assert!(reply.contains("5 minutes"));
        let session = router.session(ME).unwrap();
        assert_eq!(session.account, "octo");
        assert_eq!(session.interval, DEFAULT);
        assert!(session.active);
        assert_eq!(
            rx.try_recv().unwrap(),
            ControlEvent::Start {
                recipient_id: ME,
                account: "octo".into(),
                interval: DEFAULT,
                generation: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_restart_replaces_account_and_keeps_interval() {
        let (mut router, mut rx) = router();
        router.start(ME, "first".into()).await;
        router.set_interval(ME, 15).await.unwrap();
        router.stop(ME).await;
        while rx.try_recv().is_ok() {}

        router.start(ME, "second".into()).await;

        let session = router.session(ME).unwrap();
        assert_eq!(session.account, "second");
        assert_eq!(session.interval, Duration::from_secs(15 * 60));
        assert!(session.active);
        match rx.try_recv().unwrap() {
            ControlEvent::Start {
                account,
                interval,
                generation,
                ..
            } => {
                assert_eq!(account, "second");
                assert_eq!(interval, Duration::from_secs(15 * 60));
                assert_eq!(generation, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_while_active_always_emits() {
        let (mut router, mut rx) = router();
        router.start(ME, "octo".into()).await;
        router.start(ME, "octo".into()).await;

        assert!(matches!(rx.try_recv(), Ok(ControlEvent::Start { generation: 1, .. })));
        assert!(matches!(rx.try_recv(), Ok(ControlEvent::Start { generation: 2, .. })));
    }

    // ── set_interval ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_set_interval_rejects_non_positive_and_keeps_interval() {
        let (mut router, mut rx) = router();
        router.start(ME, "octo".into()).await;
        rx.try_recv().unwrap();

        for minutes in [0, -5] {
            let err = router.set_interval(ME, minutes).await.unwrap_err();
            assert!(matches!(err, CommandError::InvalidArgument(_)));
        }
        assert_eq!(router.session(ME).unwrap().interval, DEFAULT);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_interval_rejects_too_large() {
        let (mut router, _rx) = router();
        router.start(ME, "octo".into()).await;
        let err = router
            .set_interval(ME, MAX_INTERVAL_MINUTES + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_set_interval_without_session_is_not_found() {
        let (mut router, mut rx) = router();
        let err = router.set_interval(ME, 3).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
        assert!(router.session(ME).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_interval_emits_update() {
        let (mut router, mut rx) = router();
        router.start(ME, "octo".into()).await;
        rx.try_recv().unwrap();

        let reply = router.set_interval(ME, 1).await.unwrap();

        assert!(reply.contains("1 minutes"));
        assert_eq!(router.session(ME).unwrap().interval, Duration::from_secs(60));
        assert_eq!(
            rx.try_recv().unwrap(),
            ControlEvent::UpdateInterval {
                recipient_id: ME,
                interval: Duration::from_secs(60),
            }
        );
    }

    #[tokio::test]
    async fn test_set_interval_on_stopped_session_is_accepted() {
        let (mut router, mut rx) = router();
        router.start(ME, "octo".into()).await;
        router.stop(ME).await;
        while rx.try_recv().is_ok() {}

        router.set_interval(ME, 9).await.unwrap();
        assert!(matches!(rx.try_recv(), Ok(ControlEvent::UpdateInterval { .. })));
    }

    // ── stop ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_stop_without_session_is_informational() {
        let (mut router, mut rx) = router();
        let reply = router.stop(ME).await;
        assert_eq!(reply, formatting::already_stopped());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_emits_only_on_transition() {
        let (mut router, mut rx) = router();
        router.start(ME, "octo".into()).await;
        rx.try_recv().unwrap();

        let reply = router.stop(ME).await;
        assert!(reply.contains("stopped"));
        assert!(!router.session(ME).unwrap().active);
        assert_eq!(rx.try_recv().unwrap(), ControlEvent::Stop { recipient_id: ME });

        assert_eq!(router.stop(ME).await, formatting::already_stopped());
        assert!(rx.try_recv().is_err());
    }

    // ── status / lapse ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_status_reflects_activity() {
        let (mut router, _rx) = router();
        assert_eq!(router.status(ME), formatting::status_inactive());

        router.start(ME, "octo".into()).await;
        assert!(router.status(ME).contains("Status: active"));

        router.stop(ME).await;
        assert_eq!(router.status(ME), formatting::status_inactive());
    }

    #[tokio::test]
    async fn test_lapse_of_current_generation_deactivates() {
        let (mut router, _rx) = router();
        router.start(ME, "octo".into()).await;

        router.session_lapsed(SessionLapsed {
            recipient_id: ME,
            generation: 1,
        });
        assert!(!router.session(ME).unwrap().active);
    }

    #[tokio::test]
    async fn test_stale_lapse_is_ignored() {
        let (mut router, _rx) = router();
        router.start(ME, "typo".into()).await;
        router.start(ME, "octo".into()).await;

        router.session_lapsed(SessionLapsed {
            recipient_id: ME,
            generation: 1,
        });
        assert!(router.session(ME).unwrap().active);
    }

    // ── run loop ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_run_replies_and_ignores_chatter() {
        let (router, mut events) = router();
        let channel = RecordingChannel::new();
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (_lapse_tx, lapse_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(router.run(
            inbound_rx,
            lapse_rx,
            Notifier::new(channel.clone()),
            cancel.clone(),
        ));

        for text in ["hello there friend", "/interval 0", "octocat", "/status"] {
            inbound_tx.send(InboundMessage::new(ME, text)).await.unwrap();
        }
        drop(inbound_tx);
        task.await.unwrap();

        let texts = channel.texts();
        assert_eq!(texts.len(), 3, "{texts:?}");
        assert!(texts[0].starts_with("⚠️"));
        assert!(texts[1].contains("Now tracking GitHub account: <b>octocat</b>"));
        assert!(texts[2].contains("Status: active"));
        assert!(matches!(events.try_recv(), Ok(ControlEvent::Start { .. })));
        assert!(events.try_recv().is_err());
    }
}
