use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Parent directories searched above the start directory for a `.env` file.
const DOTENV_PARENT_DEPTH: usize = 3;

// ── Environment bootstrap ──────────────────────────────────────────────────────

/// Load the first `.env` found in `start` or up to three of its parents.
///
/// Variables already present in the environment are never overridden.
/// Returns the path of the loaded file, if any.
pub fn load_dotenv(start: &Path) -> anyhow::Result<Option<PathBuf>> {
    let Some(path) = find_dotenv(start) else {
        return Ok(None);
    };
    dotenvy::from_path(&path).with_context(|| format!("failed to load {}", path.display()))?;
    Ok(Some(path))
}

fn find_dotenv(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(DOTENV_PARENT_DEPTH + 1)
        .map(|dir| dir.join(".env"))
        .find(|candidate| candidate.is_file())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised. With
/// `log_file`, events are appended to that file instead of stderr.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (stderr_layer, file_layer) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            (Some(layer), None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}

/// Map the accepted level names to `tracing` filter directives.
fn filter_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
