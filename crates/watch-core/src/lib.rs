//! Domain layer for the repository watcher.
//!
//! Shared types, the error taxonomy, collaborator traits, message
//! formatting and runtime settings used by every other crate.

pub mod account;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod source;

pub use error::{CommandError, DeliveryError, FetchError, Result, WatchError};
pub use models::{Commit, InboundMessage, RecipientId, Repository};
pub use source::{DeliveryChannel, RepositorySource};
