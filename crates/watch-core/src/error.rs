use thiserror::Error;

/// A rejected session-control request.
///
/// Rendered back to the requester verbatim; the session registry is left
/// untouched whenever one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A malformed command or an out-of-range argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// The request targets a session that does not exist.
    #[error("{0}")]
    NotFound(String),
}

/// Failure reading account state from the hosting API.
///
/// Always transient from the monitoring loop's point of view: the affected
/// unit of work is skipped and retried on the next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Failure handing a message to the delivery channel. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The request never produced a response.
    #[error("delivery request failed: {0}")]
    Transport(String),

    /// The channel answered but refused the message.
    #[error("delivery rejected: {description}")]
    Rejected { description: String },
}

/// Top-level error for wiring and bootstrapping the watcher.
#[derive(Error, Debug)]
pub enum WatchError {
    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The delivery channel refused a startup call.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Convenience alias used throughout the watcher crates.
pub type Result<T> = std::result::Result<T, WatchError>;
