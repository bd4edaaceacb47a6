mod bootstrap;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use watch_clients::{GitHubClient, TelegramChannel};
use watch_core::settings::Settings;
use watch_runtime::{CommandRouter, Coordinator, MonitorContext, Notifier};

/// Buffered inbound messages and control events before producers wait.
const CHANNEL_CAPACITY: usize = 64;

fn main() -> Result<()> {
    // Environment is completed before any thread exists.
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let dotenv = bootstrap::load_dotenv(&cwd)?;
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;
    match dotenv {
        Some(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
        None => tracing::debug!("no environment file found"),
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(run(settings))
}

async fn run(settings: Settings) -> Result<()> {
    tracing::info!("repo-watch v{} starting", env!("CARGO_PKG_VERSION"));

    let github = Arc::new(GitHubClient::new(
        &settings.github_api_url,
        &settings.github_token,
        settings.request_timeout(),
    )?);
    let telegram = Arc::new(TelegramChannel::new(
        &settings.telegram_api_url,
        &settings.telegram_token,
        settings.request_timeout(),
        settings.poll_timeout(),
    )?);

    let bot = telegram
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    tracing::info!(
        bot_id = bot.id,
        username = bot.username.as_deref().unwrap_or("-"),
        "authorized on Telegram"
    );

    let notifier = Notifier::new(telegram.clone());
    let ctx = MonitorContext::new(github, notifier.clone(), settings.commit_limit);

    let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (lapse_tx, lapse_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let coordinator = Coordinator::new(ctx, lapse_tx, settings.request_timeout());
    let mut router = CommandRouter::new(settings.default_interval(), events_tx);

    if let Some((chat, account)) = settings.fixed_session() {
        tracing::info!(chat = %chat, account = %account, "starting configured session");
        router.start(chat, account).await;
    }

    let coordinator_task = tokio::spawn(coordinator.run(events_rx, cancel.clone()));
    let router_task = tokio::spawn(router.run(inbound_rx, lapse_rx, notifier, cancel.clone()));
    let poller_task = tokio::spawn({
        let telegram = telegram.clone();
        let cancel = cancel.clone();
        async move { telegram.run_updates(inbound_tx, cancel).await }
    });

    tracing::info!(
        default_interval_mins = settings.default_interval,
        "waiting for commands"
    );
    shutdown_signal().await;

    cancel.cancel();
    let (poller, router, coordinator) = tokio::join!(poller_task, router_task, coordinator_task);
    for (name, result) in [
        ("update poller", poller),
        ("command router", router),
        ("coordinator", coordinator),
    ] {
        if let Err(e) = result {
            tracing::warn!(task = name, error = %e, "task ended abnormally");
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received; shutting down"),
        _ = terminate => tracing::info!("SIGTERM received; shutting down"),
    }
}
